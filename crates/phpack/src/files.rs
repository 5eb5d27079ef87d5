use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use phpack_core::Store;

#[derive(Args, Debug)]
#[command(about = "List the files known to the store")]
pub struct FilesArgs {
    /// Store path
    #[arg(long = "database", default_value = "phpack.db")]
    pub database: PathBuf,
}

pub fn execute(args: FilesArgs) -> Result<()> {
    if !args.database.exists() {
        anyhow::bail!("store not found: {}", args.database.display());
    }
    let store = Store::open(&args.database).context("cannot open store")?;

    for file in store.all_files()? {
        let marker = if file.is_entry {
            "entry".green().to_string()
        } else {
            file.class_kind.as_str().to_string()
        };
        let ast = if file.skip_ast { " (textual)" } else { "" };
        println!("{:<14} {}{}", marker, file.path, ast);
    }

    let stats = store.stats()?;
    println!(
        "\n{} files, {} symbols, {} edges ({} unresolved)",
        stats.files, stats.symbols, stats.edges, stats.unresolved_edges
    );
    Ok(())
}
