//! Candidate feeds.
//!
//! Two sources produce candidates: a searchable archive feed
//! ([`archive::ArchiveFeed`]) and a static external link list
//! ([`external`]). Both normalize to [`crate::models::Candidate`]. The
//! orchestrator talks to feeds through the [`Discovery`] trait so tests can
//! substitute canned candidates.

pub mod archive;
pub mod external;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::profiles::SourceConfig;
use crate::models::Candidate;
use crate::policy::SelectionMode;

pub use archive::{ArchiveFeed, ArchiveFile, SearchDoc};

/// Errors from candidate discovery. All of them are fatal for the run: a
/// broken feed must not be mistaken for "no new items".
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP transport failure
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote returned an error status; body text is preserved for the log
    #[error("{context} failed ({status}): {body}")]
    Status {
        status: u16,
        context: String,
        body: String,
    },

    /// Remote payload did not have the expected shape
    #[error("invalid feed payload from {context}: {detail}")]
    InvalidPayload { context: String, detail: String },

    /// Link file exists but is not valid JSON
    #[error("invalid link file {path}: {source}")]
    InvalidLinkFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Link file could not be read
    #[error("cannot read link file {path}: {source}")]
    LinkFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local I/O failure while spooling a feed download
    #[error("feed I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Produces the merged candidate list for one profile's source settings.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(
        &self,
        source: &SourceConfig,
        mode: SelectionMode,
    ) -> Result<Vec<Candidate>, FeedError>;
}

/// Production discovery over the real feeds.
pub struct LiveDiscovery {
    archive: Arc<ArchiveFeed>,
    /// Relative external link paths resolve against this directory.
    links_root: PathBuf,
}

impl LiveDiscovery {
    pub fn new(archive: Arc<ArchiveFeed>, links_root: impl Into<PathBuf>) -> Self {
        Self {
            archive,
            links_root: links_root.into(),
        }
    }

    fn resolve_links_path(&self, configured: &Path) -> PathBuf {
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.links_root.join(configured)
        }
    }
}

#[async_trait]
impl Discovery for LiveDiscovery {
    async fn discover(
        &self,
        source: &SourceConfig,
        mode: SelectionMode,
    ) -> Result<Vec<Candidate>, FeedError> {
        let mut candidates = Vec::new();

        if source.include_archive {
            let docs = self
                .archive
                .search(&source.archive_prefix, source.max_archive_scan)
                .await?;
            tracing::debug!(
                prefix = %source.archive_prefix,
                found = docs.len(),
                "Archive search finished"
            );
            candidates.extend(docs.into_iter().map(SearchDoc::into_candidate));
        }

        if let Some(configured) = &source.external_links_file {
            let path = self.resolve_links_path(configured);
            candidates.extend(external::candidates(
                &path,
                &source.external_link_ids,
                mode,
            )?);
        }

        Ok(candidates)
    }
}
