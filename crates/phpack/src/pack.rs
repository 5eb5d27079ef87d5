use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use log::info;

use phpack_core::autoload::{register_composer_autoload, CONFIG_RULE_PRIORITY};
use phpack_core::{
    ingest, load_order, AnalyzeOptions, ArtifactEmitter, AutoloadEngine, DependencyResolver,
    Diagnostics, FileAnalyzer, NativeFileProvider, PackConfig, PathResolver, PhpRuntime, Store,
};

use crate::emit::TextEmitter;

#[derive(Args, Debug)]
#[command(about = "Pack the analyzed graph into a single output file")]
pub struct PackArgs {
    /// Configuration file
    #[arg(long = "config", default_value = "phpack.json")]
    pub config: PathBuf,

    /// Override the configured output path
    #[arg(long = "output")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: PackArgs) -> Result<()> {
    let fs = NativeFileProvider::new();
    let config_path = if args.config.is_absolute() {
        args.config.clone()
    } else {
        std::env::current_dir()?.join(&args.config)
    };
    let config = PackConfig::load(&fs, &config_path)?;

    let root = config_path
        .parent()
        .context("configuration file has no parent directory")?
        .to_path_buf();
    let paths = PathResolver::new(root.to_string_lossy().to_string());
    let mut store = Store::open(&paths.absolute_of(&config.database))?;
    let mut diagnostics = Diagnostics::new();

    // Rules first: the resolver snapshot sees everything.
    if !config.autoload.is_empty() {
        let count = register_composer_autoload(
            &store,
            &paths,
            &fs,
            &config.autoload.as_document(),
            CONFIG_RULE_PRIORITY,
        )?;
        info!("registered {count} autoload rules from configuration");
    }

    let exclude = phpack_core::paths::build_globset(&config.exclude_patterns)?;
    let analyzer = FileAnalyzer::new(
        &paths,
        &fs,
        AnalyzeOptions {
            store_asts: config.store_asts,
            exclude: Some(exclude),
        },
    );
    let runtime = PhpRuntime::new();

    // Always-loaded files enter the store up front so the plan can
    // place them.
    for file in &config.autoload.files {
        let path = paths.absolute_of(file);
        analyzer
            .analyze(&mut store, &path, &mut diagnostics)
            .with_context(|| format!("cannot analyze always-loaded file {file}"))?;
    }

    let entry_abs = paths.absolute_of(&config.entry);
    let outcome = analyzer
        .analyze(&mut store, &entry_abs, &mut diagnostics)
        .with_context(|| format!("cannot analyze entry {}", config.entry))?;
    store.mark_entry(outcome.file_id())?;

    ingest::scan_include_paths(
        &mut store,
        &analyzer,
        &paths,
        &config.include_paths,
        &config.exclude_patterns,
        &mut diagnostics,
    )?;

    let engine = AutoloadEngine::from_store(&store)?;
    let mut resolver = DependencyResolver::new(&paths, &fs, &runtime, &analyzer, engine);
    resolver.run_fixpoint(&mut store, &mut diagnostics)?;

    let plan = load_order(&store, &mut diagnostics)?;

    let output = args
        .output
        .unwrap_or_else(|| paths.absolute_of(&config.output));
    let mut emitter = TextEmitter::new(output.clone(), config.optimization, config.runtime.clone());
    emitter.emit(&plan)?;

    println!(
        "{} {} files -> {}",
        "Packed:".green().bold(),
        plan.files.len(),
        output.display(),
    );
    crate::report_diagnostics(&diagnostics);
    Ok(())
}
