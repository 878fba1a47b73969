//! Archive feed: paged identifier search, per-item metadata, best-source
//! selection, and source downloads.
//!
//! Requests are rate limited so sweeps stay polite against the public API,
//! and the base URL is injectable so tests can point the feed at a mock
//! server.

use futures::StreamExt;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::FeedError;
use crate::config::ArchiveConfig;
use crate::media::VIDEO_EXTENSIONS;
use crate::models::Candidate;
use crate::utils::parse_datetime;

/// Search page size against the advancedsearch endpoint.
const SEARCH_ROWS: usize = 100;

/// One row from the archive search feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchDoc {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub publicdate: String,
    #[serde(default)]
    pub title: String,
}

impl SearchDoc {
    pub fn into_candidate(self) -> Candidate {
        let published_at = parse_datetime(&self.publicdate);
        let title = if self.title.trim().is_empty() {
            self.identifier.clone()
        } else {
            self.title.trim().to_string()
        };
        Candidate::Archive {
            identifier: self.identifier,
            title,
            published_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    response: SearchResponse,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

/// Item metadata returned by the archive metadata endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemMetadata {
    #[serde(default)]
    pub metadata: ItemFields,
    #[serde(default)]
    pub files: Vec<ArchiveFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemFields {
    #[serde(default)]
    pub title: String,
}

/// A file listed in item metadata. Sizes arrive as strings or numbers
/// depending on the item, so both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveFile {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_size")]
    pub size: u64,
}

fn de_size<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Pick the best source file: recognized video extension, not a
/// thumbnail/preview derivative, positive size, largest wins. Ties keep the
/// earlier file in listing order, so repeated runs pick the same source.
pub fn choose_source(files: &[ArchiveFile]) -> Option<&ArchiveFile> {
    let mut best: Option<&ArchiveFile> = None;
    for file in files {
        let lower = file.name.to_lowercase();
        if !VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            continue;
        }
        if lower.contains("thumb") || lower.contains("preview") {
            continue;
        }
        if file.size == 0 {
            continue;
        }
        if best.map_or(true, |current| file.size > current.size) {
            best = Some(file);
        }
    }
    best
}

/// Rate-limited client for the archive search/metadata/download API.
pub struct ArchiveFeed {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    base_url: String,
    download_timeout: Duration,
}

impl ArchiveFeed {
    pub fn new(config: &ArchiveConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .build()?;

        let rate = NonZeroU32::new(config.rate_limit)
            .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }

    /// Feed pointed at a mock server, for tests.
    pub fn with_base_url(base_url: &str) -> Result<Self, FeedError> {
        let config = ArchiveConfig {
            base_url: base_url.to_string(),
            rate_limit: 100,
            request_timeout_secs: 30,
            download_timeout_secs: 30,
        };
        Self::new(&config)
    }

    /// Paged search by identifier prefix and movie media type, newest first,
    /// de-duplicated by identifier, capped at `max_scan` rows scanned.
    pub async fn search(&self, prefix: &str, max_scan: usize) -> Result<Vec<SearchDoc>, FeedError> {
        let query = format!("identifier:{prefix}* AND mediatype:movies");
        let mut collected: Vec<SearchDoc> = Vec::new();
        let mut page = 1usize;

        while collected.len() < max_scan {
            self.rate_limiter.until_ready().await;

            let rows = SEARCH_ROWS.to_string();
            let page_str = page.to_string();
            let params: Vec<(&str, &str)> = vec![
                ("q", query.as_str()),
                ("fl[]", "identifier"),
                ("fl[]", "publicdate"),
                ("fl[]", "title"),
                ("sort[]", "publicdate desc"),
                ("rows", rows.as_str()),
                ("page", page_str.as_str()),
                ("output", "json"),
            ];

            let response = self
                .client
                .get(format!("{}/advancedsearch.php", self.base_url))
                .query(&params)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(FeedError::Status {
                    status: status.as_u16(),
                    context: "archive search".to_string(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            let payload: SearchPayload = response.json().await?;
            if payload.response.docs.is_empty() {
                break;
            }

            for doc in payload.response.docs {
                if doc.identifier.trim().is_empty() {
                    continue;
                }
                collected.push(doc);
                if collected.len() >= max_scan {
                    break;
                }
            }

            page += 1;
        }

        let mut seen = HashSet::new();
        collected.retain(|doc| seen.insert(doc.identifier.clone()));
        Ok(collected)
    }

    /// Full metadata for one identifier.
    pub async fn fetch_metadata(&self, identifier: &str) -> Result<ItemMetadata, FeedError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(format!("{}/metadata/{identifier}", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                context: format!("archive metadata for {identifier}"),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response.json().await.map_err(|err| FeedError::InvalidPayload {
            context: format!("archive metadata for {identifier}"),
            detail: err.to_string(),
        })
    }

    /// Stream a source file to disk; returns the download URL recorded in
    /// the completion record.
    pub async fn download(
        &self,
        identifier: &str,
        filename: &str,
        destination: &Path,
    ) -> Result<String, FeedError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FeedError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut url = url::Url::parse(&format!("{}/download/{identifier}/", self.base_url))
            .map_err(|err| FeedError::InvalidPayload {
                context: "archive download url".to_string(),
                detail: err.to_string(),
            })?;
        {
            // Push segments individually so names with spaces stay valid.
            let mut segments = url.path_segments_mut().map_err(|_| FeedError::InvalidPayload {
                context: "archive download url".to_string(),
                detail: "cannot-be-a-base url".to_string(),
            })?;
            segments.pop_if_empty();
            for segment in filename.split('/') {
                segments.push(segment);
            }
        }

        tracing::info!(url = %url, "Downloading archive source");

        let response = self
            .client
            .get(url.clone())
            .timeout(self.download_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                context: format!("archive download for {identifier}"),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let mut file =
            tokio::fs::File::create(destination)
                .await
                .map_err(|source| FeedError::Io {
                    path: destination.to_path_buf(),
                    source,
                })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| FeedError::Io {
                    path: destination.to_path_buf(),
                    source,
                })?;
        }
        file.flush().await.map_err(|source| FeedError::Io {
            path: destination.to_path_buf(),
            source,
        })?;

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> ArchiveFile {
        ArchiveFile {
            name: name.to_string(),
            size,
        }
    }

    #[test]
    fn test_choose_source_prefers_largest() {
        let files = vec![
            file("clip.mp4", 100),
            file("master.mp4", 9000),
            file("other.mp4", 500),
        ];
        assert_eq!(choose_source(&files).unwrap().name, "master.mp4");
    }

    #[test]
    fn test_choose_source_skips_derivatives_and_empty() {
        let files = vec![
            file("video.thumbs.mp4", 9000),
            file("preview_video.mp4", 9000),
            file("notes.txt", 9000),
            file("empty.mp4", 0),
            file("real.mp4", 10),
        ];
        assert_eq!(choose_source(&files).unwrap().name, "real.mp4");
    }

    #[test]
    fn test_choose_source_tie_keeps_input_order() {
        let files = vec![file("first.mp4", 100), file("second.mp4", 100)];
        assert_eq!(choose_source(&files).unwrap().name, "first.mp4");
    }

    #[test]
    fn test_choose_source_none_when_no_usable_file() {
        let files = vec![file("readme.txt", 10), file("thumb.mp4", 10)];
        assert!(choose_source(&files).is_none());
    }

    #[test]
    fn test_choose_source_accepts_other_video_extensions() {
        let files = vec![file("a.webm", 50), file("b.mkv", 70)];
        assert_eq!(choose_source(&files).unwrap().name, "b.mkv");
    }

    #[test]
    fn test_size_accepts_strings_and_numbers() {
        let parsed: ArchiveFile =
            serde_json::from_str(r#"{"name": "a.mp4", "size": "1234"}"#).unwrap();
        assert_eq!(parsed.size, 1234);

        let parsed: ArchiveFile =
            serde_json::from_str(r#"{"name": "a.mp4", "size": 5678}"#).unwrap();
        assert_eq!(parsed.size, 5678);

        let parsed: ArchiveFile =
            serde_json::from_str(r#"{"name": "a.mp4", "size": "junk"}"#).unwrap();
        assert_eq!(parsed.size, 0);
    }

    #[test]
    fn test_search_doc_into_candidate_falls_back_to_identifier() {
        let doc = SearchDoc {
            identifier: "gp_001".to_string(),
            publicdate: "2024-01-02T00:00:00Z".to_string(),
            title: "  ".to_string(),
        };
        let candidate = doc.into_candidate();
        assert_eq!(candidate.title(), "gp_001");
        assert!(candidate.source_datetime().is_some());
    }
}
