//! `run` command: wire the live collaborators together and execute one sweep.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::profiles::AutomationsConfig;
use crate::config::Config;
use crate::error::Result;
use crate::feeds::{ArchiveFeed, LiveDiscovery};
use crate::publish::{MediaPublisher, SchedulerClient};
use crate::runner::{Orchestrator, RunOverrides, RunSummary};
use crate::state::StateStore;

pub struct RunArgs {
    /// Automation profiles document.
    pub config_path: PathBuf,
    /// State document location; defaults to the environment setting.
    pub state_file: Option<PathBuf>,
    pub overrides: RunOverrides,
}

/// Execute one sweep and return its summary. The caller decides the exit
/// status from [`RunSummary::is_failure`].
pub async fn run(args: RunArgs) -> Result<RunSummary> {
    let config = Config::from_env()?;
    config.validate()?;

    let automations = AutomationsConfig::load(&args.config_path)?;

    let archive = Arc::new(ArchiveFeed::new(&config.archive)?);
    let scheduler = Arc::new(SchedulerClient::new(&config.api)?);
    let publisher = MediaPublisher::new(
        Arc::clone(&archive),
        Arc::clone(&scheduler),
        &config.paths.work_dir,
        Duration::from_secs(config.archive.download_timeout_secs),
        args.overrides.dry_run,
    )?;

    // Relative external link paths resolve next to the profiles document.
    let links_root = args
        .config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let discovery = LiveDiscovery::new(Arc::clone(&archive), links_root);

    let store = StateStore::new(
        args.state_file
            .unwrap_or_else(|| config.paths.state_file.clone()),
    );
    let mut state = store.load()?;

    let orchestrator = Orchestrator::new(&discovery, scheduler.as_ref(), &publisher, &store);
    let summary = orchestrator.run(&mut state, &automations, &args.overrides).await?;

    println!("{summary}");
    tracing::info!(
        scheduled = summary.total_scheduled,
        failed = summary.total_failed,
        dry_run = summary.dry_run,
        "Sweep finished"
    );

    if let Ok(step_summary) = std::env::var("GITHUB_STEP_SUMMARY") {
        if !step_summary.trim().is_empty() {
            append_step_summary(Path::new(&step_summary), &summary)?;
        }
    }

    Ok(summary)
}

fn append_step_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{summary}")?;
    Ok(())
}
