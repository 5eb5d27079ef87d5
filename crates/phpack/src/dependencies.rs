use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use phpack_core::Store;

#[derive(Args, Debug)]
#[command(about = "Show the dependency edges of one file")]
pub struct DependenciesArgs {
    /// Store-relative path of the file
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Store path
    #[arg(long = "database", default_value = "phpack.db")]
    pub database: PathBuf,
}

pub fn execute(args: DependenciesArgs) -> Result<()> {
    if !args.database.exists() {
        anyhow::bail!("store not found: {}", args.database.display());
    }
    let store = Store::open(&args.database).context("cannot open store")?;

    let file = store
        .file_by_path(&args.path)?
        .with_context(|| format!("file not in store: {}", args.path))?;

    let edges = store.edges_of(file.id)?;
    if edges.is_empty() {
        println!("{} has no dependencies", file.path);
        return Ok(());
    }

    for edge in edges {
        let target = match (&edge.target_symbol, edge.target_file_id) {
            (Some(symbol), _) => symbol.clone(),
            (None, _) if !edge.context.is_empty() => edge.context.clone(),
            _ => "?".to_string(),
        };
        let status = if edge.is_resolved {
            let path = edge
                .target_file_id
                .and_then(|id| store.file_by_id(id).ok().flatten())
                .map(|f| f.path)
                .unwrap_or_default();
            format!("-> {path}").green().to_string()
        } else if edge.is_external {
            "(runtime)".blue().to_string()
        } else {
            "(unresolved)".yellow().to_string()
        };
        let conditional = if edge.is_conditional { " [conditional]" } else { "" };
        println!(
            "{:>4}  {:<18} {} {}{}",
            edge.line,
            edge.kind.as_str(),
            target,
            status,
            conditional
        );
    }
    Ok(())
}
