use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archivecast::commands::{accounts, run, RunArgs};
use archivecast::policy::SelectionMode;
use archivecast::runner::RunOverrides;
use archivecast::utils::parse_date_only;

#[derive(Parser)]
#[command(
    name = "archivecast",
    version,
    about = "Automated media scheduler: discovers archive and external sources, renders full and short edits, and schedules posts",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep automation profiles and schedule posts
    Run {
        /// Automation profiles document
        #[arg(short, long, default_value = "automations.json")]
        config: PathBuf,

        /// State document path (defaults to ARCHIVECAST_STATE_FILE)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Restrict the sweep to one automation id
        #[arg(short, long)]
        automation: Option<String>,

        /// Window mode override (new_since_last_run, last_x_days, specific_date, all)
        #[arg(long)]
        window_mode: Option<String>,

        /// Lookback override for last_x_days mode
        #[arg(long)]
        last_x_days: Option<i64>,

        /// Date override for specific_date mode (YYYY-MM-DD)
        #[arg(long)]
        specific_date: Option<String>,

        /// Per-profile cap override on items scheduled this run
        #[arg(long)]
        max_items: Option<usize>,

        /// Archive identifier prefix override
        #[arg(long)]
        archive_prefix: Option<String>,

        /// Download and transcode, but skip uploads and post creation
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// List connected accounts
    Accounts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Run {
            config,
            state,
            automation,
            window_mode,
            last_x_days,
            specific_date,
            max_items,
            archive_prefix,
            dry_run,
        } => {
            tracing::info!(
                config = %config.display(),
                automation = ?automation,
                window_mode = ?window_mode,
                dry_run = %dry_run,
                "Starting run command"
            );

            let specific_date = match specific_date {
                None => None,
                Some(raw) => match parse_date_only(&raw) {
                    Some(date) => Some(date),
                    None => anyhow::bail!("invalid --specific-date `{raw}`, expected YYYY-MM-DD"),
                },
            };

            // "automation" keeps each profile's own configured mode.
            let window_mode = window_mode
                .filter(|raw| !raw.trim().is_empty() && raw.trim() != "automation")
                .map(|raw| SelectionMode::parse(&raw));

            let summary = run(RunArgs {
                config_path: config,
                state_file: state,
                overrides: RunOverrides {
                    automation_id: automation,
                    window_mode,
                    last_x_days,
                    specific_date,
                    max_items,
                    archive_prefix,
                    dry_run,
                },
            })
            .await?;

            if summary.is_failure() {
                anyhow::bail!("no items scheduled and one or more failures occurred");
            }
        }

        Commands::Accounts => {
            tracing::info!("Starting accounts command");
            accounts().await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("archivecast=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("archivecast=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
