//! Harvest command-line shell.
//!
//! This is the thin binary layer: it parses arguments, installs logging,
//! loads configuration and hands off to the library crates in `crates/`.

pub mod commands;
pub mod state;

use clap::{Parser, Subcommand};
use commands::run::RunRequest;
use harvest_core::SiteKind;
use state::AppState;
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "Harvest listing sites into deduplicated CSV exports")]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline against one site
    Run {
        /// Site to harvest (smth, tc, mfw, img)
        #[arg(long)]
        site: SiteKind,

        /// Page URL template with one %d or {page} placeholder
        #[arg(long)]
        url: Option<String>,

        /// Do not persist dedup keys or run history
        #[arg(long)]
        dry_run: bool,
    },

    /// List recent runs
    History {
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// Only show runs of this site
        #[arg(long)]
        site: Option<SiteKind>,
    },

    /// Forget the dedup keys and download markers of one site
    Forget {
        /// Site whose state is dropped
        #[arg(long)]
        site: SiteKind,
    },

    /// Print the config, database and download locations
    ConfigPath,
}

/// Initialize tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,harvest=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting harvest v{}", env!("CARGO_PKG_VERSION"));
    let state = AppState::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { site, url, dry_run } => {
            let request = RunRequest { site, url, dry_run };
            let report = commands::run::handle(&state, &request).await?;
            println!("{}", commands::run::summary(&report));
        }
        Command::History { limit, site } => {
            let runs = commands::history::execute(&state, site, limit).await?;
            if runs.is_empty() {
                println!("No runs recorded yet");
            }
            for run in &runs {
                println!("{}", commands::history::format_run(run));
            }
        }
        Command::Forget { site } => {
            let forgotten = commands::forget::execute(&state, site).await?;
            println!(
                "{site}: forgot {} keys and {} asset markers",
                forgotten.keys, forgotten.markers
            );
        }
        Command::ConfigPath => {
            let locations = commands::config::execute(&state)?;
            println!("config:    {}", locations.config.display());
            println!("database:  {}", locations.database.display());
            println!("downloads: {}", locations.downloads.display());
        }
    }

    Ok(())
}
