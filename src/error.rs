//! Unified error handling.
//!
//! Each domain module defines its own `thiserror` enum ([`FeedError`],
//! [`PublishError`], [`MediaError`], [`StateError`]); this module folds them
//! into a single [`Error`] usable across module boundaries, with a
//! fatal/recoverable split the run loop uses to decide between aborting the
//! sweep and recording a per-candidate failure.

use std::io;
use thiserror::Error;

pub use crate::feeds::FeedError;
pub use crate::media::MediaError;
pub use crate::publish::PublishError;
pub use crate::state::StateError;

/// Unified error type for the archivecast crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Candidate feed errors (archive search/metadata, link files)
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Scheduling-API errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Download/transcode errors
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// State store errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Fatal errors abort the whole run; everything else is recorded as a
    /// per-candidate failure and the sweep continues.
    ///
    /// Configuration and state errors are never partially applied, so both
    /// are fatal. Feed errors are fatal at the discovery stage (a broken
    /// feed must not be mistaken for "no new items") where they propagate
    /// directly; once a candidate is admitted, feed, publish, and media
    /// errors on that one item are retried implicitly on the next sweep.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::State(_))
    }
}

/// Result type alias using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;
