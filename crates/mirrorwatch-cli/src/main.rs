use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::eyre;
use commands::{cache, check, daemon, sync};
use std::path::PathBuf;
use watched_sync_config::{container_base_path, PathManager, SyncMode};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "mirrorwatch")]
#[command(about = "mirrorwatch - keep watched state in step across your media servers")]
#[command(version)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Config file (defaults to config.toml in the mirrorwatch config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file (rotated daily) instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Last-write-wins in both directions
    Actions,
    /// Only push watches the other side is missing
    Push,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Actions => SyncMode::Actions,
            ModeArg::Push => SyncMode::Push,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle across every pair of enabled servers
    Sync {
        /// Compute and print actions without writing to any server
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,

        /// Override the configured reconciliation mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Run sync cycles on a cron schedule until interrupted
    #[command(long_about = "Run mirrorwatch as a long-lived process that syncs on the configured cron schedule (six fields, seconds first). An initial cycle runs on startup unless --no-startup-sync is given.")]
    Daemon {
        /// Cron schedule override, e.g. '0 */15 * * * *'
        #[arg(long, value_name = "SCHEDULE")]
        schedule: Option<String>,

        /// Skip the initial cycle on startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_sync: bool,
    },
    /// Check that every enabled server is reachable
    Check,
    /// Inspect or clear the viewed-date cache
    Cache {
        #[command(subcommand)]
        cmd: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache location and entry counts
    Show,
    /// Delete the cache file; provenance history starts over
    Clear,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let paths = PathManager::default();
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let config = commands::read_config(&config_path)?;

    // Outside a container the daemon logs to its own file by default
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.logging.file.clone()))
        .or_else(|| match cli.command {
            Commands::Daemon { .. } if !container_base_path().exists() => Some(paths.daemon_log_file()),
            _ => None,
        });
    logging::init_logging(cli.verbose, cli.quiet, log_file).map_err(|e| eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Sync { dry_run, mode } => {
            let config = commands::require_config(config, &config_path)?;
            sync::run_sync(config, &paths, dry_run, mode.map(SyncMode::from), &output).await
        }
        Commands::Daemon {
            schedule,
            no_startup_sync,
        } => {
            let config = commands::require_config(config, &config_path)?;
            daemon::run_daemon(config, &paths, schedule, no_startup_sync, &output).await
        }
        Commands::Check => {
            let config = commands::require_config(config, &config_path)?;
            check::run_check(&config, &output).await
        }
        Commands::Cache { cmd } => match cmd {
            CacheCommands::Show => cache::run_show(config.as_ref(), &paths, &output),
            CacheCommands::Clear => cache::run_clear(config.as_ref(), &paths, &output),
        },
    }
}
