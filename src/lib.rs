//! archivecast - Automated media scheduling engine
//!
//! Discovers video candidates from an archive search feed and static external
//! link lists, selects what falls inside each automation profile's window,
//! renders a full and a short edit per item, and schedules both through a
//! posting API. A crash-resumable state document makes every sweep idempotent.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Environment configuration and automation profiles
//! - [`feeds`] - Candidate discovery (archive search, external link lists)
//! - [`policy`] - Selection windows and publish-time scheduling
//! - [`state`] - Crash-resumable completion state with atomic persistence
//! - [`media`] - Source downloads and ffmpeg edits
//! - [`publish`] - Scheduling-API client and publish pipeline
//! - [`runner`] - Sweep orchestration over all of the above
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use archivecast::commands::{run, RunArgs};
//! use archivecast::runner::RunOverrides;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let summary = run(RunArgs {
//!         config_path: "automations.json".into(),
//!         state_file: None,
//!         overrides: RunOverrides::default(),
//!     })
//!     .await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod captions;
pub mod commands;
pub mod config;
pub mod error;
pub mod feeds;
pub mod media;
pub mod models;
pub mod policy;
pub mod publish;
pub mod runner;
pub mod state;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::profiles::{AutomationProfile, AutomationsConfig, DedupScope};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::{Candidate, CompletionRecord};
    pub use crate::policy::SelectionMode;
    pub use crate::runner::{Orchestrator, RunOverrides, RunSummary};
    pub use crate::state::{StateDocument, StateStore};
}

// Direct re-exports for convenience
pub use models::{Candidate, CompletionRecord};
