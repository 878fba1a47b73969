//! Publishing layer: the scheduling API client and the publish pipeline.
//!
//! The orchestrator only sees two traits here. [`AccountDirectory`] resolves
//! connected account ids, and [`PublishPipeline`] turns a candidate into two
//! scheduled posts. The live implementations are [`client::SchedulerClient`]
//! and [`pipeline::MediaPublisher`]; tests substitute fakes.

pub mod client;
pub mod pipeline;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::Candidate;

pub use client::{ConnectedAccount, SchedulerClient};
pub use pipeline::MediaPublisher;

/// Errors from the scheduling API or the publish pipeline around it.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error status; body text is preserved for the log
    #[error("{path} failed ({status}): {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },

    /// API response did not carry the field the pipeline needs
    #[error("unexpected response from {path}: {detail}")]
    InvalidResponse { path: String, detail: String },

    /// No usable source file on an archive item
    #[error("no usable video source for {source_key}")]
    NoSource { source_key: String },

    #[error("publish I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which of the two edits a publish call concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Full,
    Short,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Short => "short",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate with both edits rendered and ready to upload.
#[derive(Debug, Clone)]
pub struct PreparedItem {
    pub source_key: String,
    pub title: String,
    pub source_url: String,
    pub full_path: PathBuf,
    pub short_path: PathBuf,
    /// Name and size of the archive source file, when the candidate came
    /// from the archive feed.
    pub archive_source: Option<(String, u64)>,
}

/// Everything the pipeline needs to schedule one edit.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub automation_id: String,
    pub source_key: String,
    pub variant: Variant,
    pub accounts: Vec<String>,
    pub caption: String,
    pub scheduled_at: DateTime<Utc>,
    pub skip_processing: bool,
}

/// Result of one successful publish call.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPost {
    pub post_id: String,
    pub media_url: String,
}

/// Resolves the connected accounts a profile may post to.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Account ids connected for the given platforms; an empty filter means
    /// every connected account.
    async fn account_ids(&self, platforms: &[String]) -> Result<Vec<String>, PublishError>;
}

/// Turns admitted candidates into scheduled posts.
#[async_trait]
pub trait PublishPipeline: Send + Sync {
    /// Fetch the source and render both edits into the work directory.
    async fn prepare(
        &self,
        automation_id: &str,
        candidate: &Candidate,
    ) -> Result<PreparedItem, crate::error::Error>;

    /// Upload one edit and schedule its post.
    async fn publish(
        &self,
        item: &PreparedItem,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError>;
}
