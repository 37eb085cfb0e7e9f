//! Roster: keeps a directory's user subtree in step with access policies.
//!
//! # Usage
//!
//! ```text
//! roster run                      # daemon: bootstrap, then sync every interval
//! roster once [--dry-run] [--json]
//! roster plan [--json]
//! roster backup
//! roster config [--json]
//! ```
//!
//! Every command accepts `--config <path>` (or `ROSTER_CONFIG`); `ROSTER_*`
//! environment variables override file values.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    backup::BackupArgs, config::ConfigArgs, once::OnceArgs, plan::PlanArgs, run::RunArgs,
};
use roster_core::{config, Config};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "roster",
    version,
    about = "Reconcile access-control users into an LDAP directory",
    long_about = None,
)]
struct Cli {
    /// YAML configuration file (defaults to ~/.roster/config.yaml when present).
    #[arg(long, global = true, env = "ROSTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync daemon until SIGINT/SIGTERM.
    Run(RunArgs),

    /// Bootstrap and run a single reconciliation cycle.
    Once(OnceArgs),

    /// Show what the next cycle would change, without writing.
    Plan(PlanArgs),

    /// Write an LDIF snapshot of the directory now.
    Backup(BackupArgs),

    /// Print the effective configuration with secrets redacted.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    match cli.command {
        Commands::Run(args) => args.run(config),
        Commands::Once(args) => args.run(config),
        Commands::Plan(args) => args.run(config),
        Commands::Backup(args) => args.run(config),
        Commands::Config(args) => args.run(&config),
    }
}

/// Explicit path, else the default file if it exists, else environment only.
fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let path = match explicit {
        Some(path) => Some(path),
        None => config::default_config_path()
            .ok()
            .filter(|path| path.is_file()),
    };
    config::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration from environment".to_owned(),
    })
}
