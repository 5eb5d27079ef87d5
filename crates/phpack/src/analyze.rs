use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use log::info;

use phpack_core::autoload::{
    register_composer_autoload, register_rule_spec, EXTERNAL_RULE_PRIORITY,
};
use phpack_core::{
    AnalyzeOptions, AutoloadEngine, DependencyResolver, Diagnostics, FileAnalyzer,
    NativeFileProvider, PathResolver, PhpRuntime, Store,
};

#[derive(Args, Debug)]
#[command(about = "Analyze an entry file and its dependency graph into the store")]
pub struct AnalyzeArgs {
    /// Entry PHP file to analyze
    #[arg(value_name = "ENTRY")]
    pub entry: PathBuf,

    /// Store path
    #[arg(long = "database", default_value = "phpack.db")]
    pub database: PathBuf,

    /// Project root; defaults to the current directory
    #[arg(long = "root")]
    pub root: Option<PathBuf>,

    /// External autoload configuration (composer.json shaped)
    #[arg(long = "autoload-config", value_name = "PATH")]
    pub autoload_config: Option<PathBuf>,

    /// Additional autoload rules, "kind:prefix:path"
    /// (e.g. "psr4:App\\:src/" or "files::bootstrap.php")
    #[arg(long = "rule", value_name = "SPEC")]
    pub rules: Vec<String>,

    /// Persist decomposed ASTs alongside symbols and edges
    #[arg(long = "store-asts")]
    pub store_asts: bool,
}

pub fn execute(args: AnalyzeArgs) -> Result<()> {
    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine working directory")?,
    };
    let paths = PathResolver::new(root.to_string_lossy().to_string());
    let fs = NativeFileProvider::new();
    let mut store = Store::open(&args.database).context("cannot open store")?;
    let mut diagnostics = Diagnostics::new();

    if let Some(config_path) = &args.autoload_config {
        register_external_autoload(&store, &paths, &fs, config_path)?;
    }
    for spec in &args.rules {
        if !register_rule_spec(&store, spec)? {
            anyhow::bail!("invalid rule spec {spec:?}; expected kind:prefix:path");
        }
    }

    let analyzer = FileAnalyzer::new(
        &paths,
        &fs,
        AnalyzeOptions {
            store_asts: args.store_asts,
            exclude: None,
        },
    );
    let runtime = PhpRuntime::new();

    let entry = if args.entry.is_absolute() {
        args.entry.clone()
    } else {
        root.join(&args.entry)
    };
    let outcome = analyzer
        .analyze(&mut store, &entry, &mut diagnostics)
        .with_context(|| format!("cannot analyze entry {}", entry.display()))?;
    store.mark_entry(outcome.file_id())?;
    info!("entry registered: {}", entry.display());

    let engine = AutoloadEngine::from_store(&store)?;
    let mut resolver = DependencyResolver::new(&paths, &fs, &runtime, &analyzer, engine);
    let stats = resolver.run_fixpoint(&mut store, &mut diagnostics)?;

    let totals = store.stats()?;
    println!(
        "{} {} files, {} symbols, {} edges ({} unresolved)",
        "Analyzed:".green().bold(),
        totals.files,
        totals.symbols,
        totals.edges,
        stats.unresolved,
    );
    crate::report_diagnostics(&diagnostics);
    Ok(())
}

fn register_external_autoload(
    store: &Store,
    paths: &PathResolver,
    fs: &NativeFileProvider,
    config_path: &Path,
) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("cannot read autoload config {}", config_path.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("malformed autoload config {}", config_path.display()))?;
    let count = register_composer_autoload(store, paths, fs, &doc, EXTERNAL_RULE_PRIORITY)?;
    info!(
        "registered {count} autoload rules from {}",
        config_path.display()
    );
    Ok(())
}
