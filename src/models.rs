// Core data structures for the automation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::now_iso;

/// A discoverable unit of work, reconstructed every sweep and never persisted.
///
/// The variant carries the source-specific fields; shared accessors keep the
/// orchestrator free of per-source branching.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// Item found through the archive search feed.
    Archive {
        identifier: String,
        title: String,
        published_at: Option<DateTime<Utc>>,
    },
    /// Item taken from a static external link list.
    External {
        id: String,
        url: String,
        title: String,
        published_at: Option<DateTime<Utc>>,
    },
}

impl Candidate {
    pub fn source_type(&self) -> &'static str {
        match self {
            Self::Archive { .. } => "archive",
            Self::External { .. } => "external",
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            Self::Archive { identifier, .. } => identifier,
            Self::External { id, .. } => id,
        }
    }

    /// Global identity `source_type:source_id`, the dedup and idempotency key.
    pub fn source_key(&self) -> String {
        format!("{}:{}", self.source_type(), self.source_id())
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Archive { title, .. } => title,
            Self::External { title, .. } => title,
        }
    }

    pub fn source_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Archive { published_at, .. } => *published_at,
            Self::External { published_at, .. } => *published_at,
        }
    }

    pub fn source_url(&self) -> String {
        match self {
            Self::Archive { identifier, .. } => {
                format!("https://archive.org/details/{identifier}")
            }
            Self::External { url, .. } => url.clone(),
        }
    }

    /// Deterministic processing order: oldest first, timestamp-less items
    /// first of all, key as the tie break.
    pub fn sort_key(&self) -> (DateTime<Utc>, String) {
        (
            self.source_datetime().unwrap_or(DateTime::UNIX_EPOCH),
            self.source_key(),
        )
    }
}

/// Persisted proof of downstream work for one source key in one automation.
///
/// Complete iff both post ids are non-empty; a complete record is never
/// rewritten by a later sweep. Halves are filled in as each publish succeeds,
/// so a failed short edit leaves a resumable half record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionRecord {
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub full_post_id: String,
    #[serde(default)]
    pub short_post_id: String,
    #[serde(default)]
    pub full_media_url: String,
    #[serde(default)]
    pub short_media_url: String,
    #[serde(default)]
    pub full_scheduled_at: String,
    #[serde(default)]
    pub short_scheduled_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_source_size: Option<u64>,
}

impl CompletionRecord {
    /// Fresh record for a candidate, with both halves pending.
    pub fn pending(candidate: &Candidate) -> Self {
        Self {
            source_type: candidate.source_type().to_string(),
            source_id: candidate.source_id().to_string(),
            source_url: candidate.source_url(),
            title: candidate.title().to_string(),
            updated_at: now_iso(),
            ..Self::default()
        }
    }

    /// Both downstream artifacts produced.
    pub fn is_complete(&self) -> bool {
        !self.full_post_id.is_empty() && !self.short_post_id.is_empty()
    }

    /// At least one downstream artifact produced (used by legacy migration).
    pub fn has_any_post(&self) -> bool {
        !self.full_post_id.is_empty() || !self.short_post_id.is_empty()
    }

    pub fn touch(&mut self) {
        self.updated_at = now_iso();
    }
}
