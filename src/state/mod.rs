//! Durable run state: a versioned JSON document mapping automation ids to
//! their last run marker and per-item completion records.
//!
//! The document is read once at run start and flushed after every
//! state-affecting step, so an interrupted sweep loses at most the in-flight
//! item. Writes are atomic (temp file + rename). The store assumes a single
//! writer; overlapping runs are prevented operationally, not in-process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::CompletionRecord;
use crate::utils::parse_datetime;

/// Current schema version of the persisted document.
pub const STATE_VERSION: u32 = 2;

/// Bucket name legacy flat documents are migrated into.
pub const LEGACY_AUTOMATION_ID: &str = "legacy";

/// Errors from loading or flushing the state document.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-automation slice of the state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationState {
    /// ISO-8601 UTC instant of the last completed sweep, empty before the
    /// first one.
    #[serde(default)]
    pub last_run_at: String,

    /// Completion records keyed by `source_type:source_id`.
    #[serde(default)]
    pub items: BTreeMap<String, CompletionRecord>,
}

impl AutomationState {
    pub fn last_run_instant(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        parse_datetime(&self.last_run_at)
    }
}

/// Versioned container for all automations' state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: u32,
    #[serde(default)]
    pub automations: BTreeMap<String, AutomationState>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            automations: BTreeMap::new(),
        }
    }
}

impl StateDocument {
    /// Bucket for an automation, created empty on first touch.
    pub fn automation_mut(&mut self, automation_id: &str) -> &mut AutomationState {
        self.automations
            .entry(automation_id.to_string())
            .or_default()
    }

    pub fn automation(&self, automation_id: &str) -> Option<&AutomationState> {
        self.automations.get(automation_id)
    }

    /// Record for a source key in one automation's own bucket.
    pub fn record(&self, automation_id: &str, source_key: &str) -> Option<&CompletionRecord> {
        self.automations
            .get(automation_id)
            .and_then(|state| state.items.get(source_key))
    }

    /// Global-scope dedup: the first *other* automation holding a complete
    /// record for this source key, if any.
    pub fn completed_elsewhere(&self, automation_id: &str, source_key: &str) -> Option<&str> {
        self.automations
            .iter()
            .filter(|(other_id, _)| other_id.as_str() != automation_id)
            .find(|(_, other)| {
                other
                    .items
                    .get(source_key)
                    .is_some_and(CompletionRecord::is_complete)
            })
            .map(|(other_id, _)| other_id.as_str())
    }
}

/// File-backed store for the state document.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, migrating legacy layouts.
    ///
    /// A missing, empty, or non-object file yields a fresh empty document;
    /// corrupt state must never block a sweep. Flat legacy documents
    /// (`identifier -> record` with no `automations` wrapper) are moved into
    /// the `legacy` bucket with `archive:`-prefixed keys, keeping only
    /// records that already carry at least one post id.
    pub fn load(&self) -> Result<StateDocument, StateError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StateDocument::default());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(StateDocument::default());
        }

        let parsed: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Corrupt state file, starting fresh");
                return Ok(StateDocument::default());
            }
        };

        let serde_json::Value::Object(map) = parsed else {
            return Ok(StateDocument::default());
        };

        if map.contains_key("automations") {
            let mut document: StateDocument =
                serde_json::from_value(serde_json::Value::Object(map))?;
            document.version = STATE_VERSION;
            return Ok(document);
        }

        Ok(migrate_legacy(map))
    }

    /// Flush the document atomically.
    pub fn save(&self, document: &StateDocument) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StateError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut content = serde_json::to_string_pretty(document)?;
        content.push('\n');

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, content).map_err(|source| StateError::Io {
            path: temp_path.clone(),
            source,
        })?;
        std::fs::rename(&temp_path, &self.path).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), "State flushed");
        Ok(())
    }
}

/// Fold a flat `identifier -> record` document into the `legacy` bucket.
fn migrate_legacy(map: serde_json::Map<String, serde_json::Value>) -> StateDocument {
    let mut items = BTreeMap::new();

    for (key, value) in map {
        let Ok(record) = serde_json::from_value::<CompletionRecord>(value) else {
            continue;
        };
        if !record.has_any_post() {
            continue;
        }
        items.insert(format!("archive:{key}"), record);
    }

    tracing::info!(records = items.len(), "Migrated legacy state document");

    let mut document = StateDocument::default();
    document.automations.insert(
        LEGACY_AUTOMATION_ID.to_string(),
        AutomationState {
            last_run_at: String::new(),
            items,
        },
    );
    document
}
