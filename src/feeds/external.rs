//! External link list feed.
//!
//! Reads a static JSON file of `{id, url, title, date, enabled}` records,
//! either as a bare array or wrapped in `{"links": [...]}`. Field shapes are
//! forgiving (the files are hand-maintained), so parsing goes through
//! `serde_json::Value` instead of strict structs.

use std::path::Path;

use super::FeedError;
use crate::models::Candidate;
use crate::policy::SelectionMode;
use crate::utils::{parse_datetime, short_hash};

/// One normalized link record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalLink {
    pub id: String,
    pub url: String,
    pub title: String,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn value_str(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn value_bool(value: &serde_json::Value, key: &str, default: bool) -> bool {
    match value.get(key) {
        None | Some(serde_json::Value::Null) => default,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
        }
        Some(serde_json::Value::Number(n)) => n.as_i64().map_or(default, |n| n != 0),
        _ => default,
    }
}

/// Load enabled link records from a file. A missing file is an empty feed,
/// not an error; a present but unparseable file is surfaced.
pub fn load_links(path: &Path) -> Result<Vec<ExternalLink>, FeedError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "External links file missing, skipping");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(FeedError::LinkFileIo {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let payload: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| FeedError::InvalidLinkFile {
            path: path.to_path_buf(),
            source,
        })?;

    let items = match &payload {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(map) => map
            .get("links")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    let mut output = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            continue;
        }
        if !value_bool(item, "enabled", true) {
            continue;
        }
        let url = value_str(item, "url");
        if url.is_empty() {
            continue;
        }

        let id = {
            let explicit = value_str(item, "id");
            if explicit.is_empty() {
                format!("ext-{index}-{}", short_hash(&url, 12))
            } else {
                explicit
            }
        };
        let title = {
            let explicit = value_str(item, "title");
            if explicit.is_empty() {
                id.clone()
            } else {
                explicit
            }
        };
        let date_raw = ["date", "published_at", "created_at"]
            .iter()
            .map(|key| value_str(item, key))
            .find(|v| !v.is_empty())
            .unwrap_or_default();

        output.push(ExternalLink {
            id,
            url,
            title,
            published_at: parse_datetime(&date_raw),
        });
    }

    Ok(output)
}

/// Candidates from a link file, honoring the explicit inclusion filter and
/// dropping date-less records when the selection mode needs a timestamp to
/// judge them.
pub fn candidates(
    path: &Path,
    include_ids: &[String],
    mode: SelectionMode,
) -> Result<Vec<Candidate>, FeedError> {
    let include: std::collections::HashSet<&str> =
        include_ids.iter().map(String::as_str).collect();

    let mut output = Vec::new();
    for link in load_links(path)? {
        if !include.is_empty() && !include.contains(link.id.as_str()) {
            continue;
        }
        if mode.requires_timestamp() && link.published_at.is_none() {
            tracing::debug!(
                id = %link.id,
                mode = %mode,
                "Skipping external item: date required for selected window mode"
            );
            continue;
        }
        output.push(Candidate::External {
            id: link.id,
            url: link.url,
            title: link.title,
            published_at: link.published_at,
        });
    }

    Ok(output)
}
