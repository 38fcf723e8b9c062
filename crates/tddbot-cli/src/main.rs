mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::run::RunArgs;
use cmd::serve::ServeArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tddbot",
    about = "Dispatch issue and chat mentions to test-driven AI coding agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project configuration file (JSON array of projects)
    #[arg(long, global = true, env = "CONFIG_PATH", default_value = "config.json")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Debug-level logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive Linear webhooks and Slack events and dispatch agent runs
    Serve(ServeArgs),

    /// Run one agent workflow against a repository (what `serve` dispatches)
    Run(RunArgs),

    /// Inspect the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => tracing::Level::DEBUG,
        (Commands::Serve(_) | Commands::Run(_), false) => tracing::Level::INFO,
        (Commands::Config { .. }, false) => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => cmd::serve::run(&cli.config, args, cli.verbose),
        Commands::Run(args) => cmd::run::run(args),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
