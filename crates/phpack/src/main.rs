use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

use phpack_core::Diagnostics;

mod analyze;
mod dependencies;
mod emit;
mod files;
mod pack;

#[derive(Parser)]
#[command(name = "phpack")]
#[command(about = "Pack a PHP project into a single self-contained file", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an entry file and its dependency graph into the store
    #[command(alias = "a")]
    Analyze(analyze::AnalyzeArgs),

    /// Pack the analyzed graph into a single output file
    #[command(alias = "p")]
    Pack(pack::PackArgs),

    /// List the files known to the store
    Files(files::FilesArgs),

    /// Show the dependency edges of one file
    #[command(alias = "deps")]
    Dependencies(dependencies::DependenciesArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("warn")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Analyze(args) => analyze::execute(args),
        Commands::Pack(args) => pack::execute(args),
        Commands::Files(args) => files::execute(args),
        Commands::Dependencies(args) => dependencies::execute(args),
    }
}

/// Print accumulated warnings the way every command reports them.
pub(crate) fn report_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{} {diagnostic}", "!".yellow());
    }
    if !diagnostics.is_empty() {
        eprintln!(
            "{}",
            format!("{} warning(s)", diagnostics.warning_count()).yellow()
        );
    }
}
