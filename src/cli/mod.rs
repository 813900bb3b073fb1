//! Command-line interface for yapecs
//!
//! Provides `show`, `grid-search`, `paths` and `completions` subcommands.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod grid;
mod paths;
mod show;
mod utils;

/// Experiment configuration: apply config files to module defaults and run restartable grid searches
#[derive(Parser)]
#[command(name = "yapecs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a module's configuration after applying config files
    Show(show::ShowArgs),

    /// Hand out the next combination of a restartable grid search
    GridSearch(grid::GridSearchArgs),

    /// Print the config paths that follow --config in an argument list
    Paths(paths::PathsArgs),

    /// Generate a shell completion script
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Show(args) => show::run(args),
        Commands::GridSearch(args) => grid::run(args),
        Commands::Paths(args) => paths::run(args),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "yapecs", &mut std::io::stdout());
            Ok(())
        }
    }
}
