//! Inline Expansion CLI
//!
//! Expands the call described by a TOML fixture with the reference backend
//! and prints the parameter bindings and the generated code.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "inlinegen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Expand inline function calls into bytecode", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand the call of a fixture file and print the result
    Expand {
        /// Fixture (TOML) with the module, caller locals and call site
        fixture: PathBuf,

        /// Path to inliner configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so the listing on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inlinegen=warn")),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Expand { fixture, config } => {
            run_expand(&fixture, config.as_deref());
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "inlinegen", &mut io::stdout());
}

fn run_expand(fixture: &Path, config_path: Option<&Path>) {
    let config = match config_path {
        Some(path) => match inlinegen::InlineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => inlinegen::InlineConfig::default(),
    };

    info!(fixture = %fixture.display(), "expanding");
    match inlinegen::expand_fixture_file(fixture, &config) {
        Ok(expansion) => print!("{}", expansion),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
