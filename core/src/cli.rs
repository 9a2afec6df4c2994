use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::demos;

#[derive(Parser)]
#[command(name = "reprise")]
#[command(about = "Reprise - replay-based continuations for Rust", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the bundled demos
    List,

    /// Run a demo to completion, resuming after every suspension
    Demo {
        /// Demo name (see `reprise list`)
        name: String,

        /// Integer handed back to every suspended call (default: null)
        #[arg(long = "resume-with")]
        resume_with: Option<i64>,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn init_logging(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load config first so errors show before any command output
    let config = EngineConfig::load_from(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Commands::List => {
            for demo in demos::all() {
                println!("  {:<12} {}", demo.name, demo.about);
            }
        }

        Commands::Demo { name, resume_with } => {
            let demo = demos::find(&name).with_context(|| {
                format!("Unknown demo: {}. Run `reprise list` to see the demos", name)
            })?;

            let lines = demo
                .run(resume_with, config)
                .with_context(|| format!("Demo {} failed", name))?;
            for line in lines {
                println!("{}", line);
            }
            println!("===");
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
