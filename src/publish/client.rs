//! Scheduling API client.
//!
//! Thin bearer-authenticated wrapper over the scheduling service: account
//! listing, upload URL issuance, media upload, post creation. The base URL is
//! injectable so tests run against a mock server.

use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::io::ReaderStream;

use super::{AccountDirectory, PublishError};
use crate::config::ApiConfig;

const PAGE_LIMIT: usize = 100;

/// One connected account as listed by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectedAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
struct AccountsPage {
    #[serde(default)]
    data: Vec<ConnectedAccount>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    #[serde(default)]
    next: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UploadSlot {
    #[serde(default)]
    upload_url: String,
    #[serde(default)]
    media_url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    #[serde(default)]
    id: String,
}

/// Client for the scheduling API.
pub struct SchedulerClient {
    client: Client,
    base_url: String,
    api_key: String,
    upload_timeout: Duration,
}

impl SchedulerClient {
    pub fn new(config: &ApiConfig) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    /// Client pointed at a mock server, for tests.
    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self, PublishError> {
        let config = ApiConfig {
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            request_timeout_secs: 30,
            upload_timeout_secs: 30,
        };
        Self::new(&config)
    }

    fn authorized(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
    }

    async fn check(
        response: reqwest::Response,
        path: &str,
    ) -> Result<reqwest::Response, PublishError> {
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    /// All connected accounts, walking limit/offset pages until the API
    /// stops reporting a next page. An empty platform filter lists
    /// everything.
    pub async fn list_accounts(
        &self,
        platforms: &[String],
    ) -> Result<Vec<ConnectedAccount>, PublishError> {
        let mut accounts = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut params: Vec<(&str, String)> = vec![
                ("status", "connected".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("offset", offset.to_string()),
            ];
            for platform in platforms {
                params.push(("platform", platform.clone()));
            }

            let response = self
                .authorized(reqwest::Method::GET, "/social-accounts")
                .query(&params)
                .send()
                .await?;
            let response = Self::check(response, "/social-accounts").await?;

            let page: AccountsPage = response.json().await?;
            accounts.extend(page.data);

            let has_next = page
                .meta
                .next
                .map(|next| !next.is_null())
                .unwrap_or(false);
            if !has_next {
                break;
            }
            offset += PAGE_LIMIT;
        }

        Ok(accounts)
    }

    /// Ask the API for a one-shot upload slot.
    pub async fn create_upload_url(&self) -> Result<(String, String), PublishError> {
        let path = "/media/create-upload-url";
        let response = self
            .authorized(reqwest::Method::POST, path)
            .send()
            .await?;
        let response = Self::check(response, path).await?;

        let slot: UploadSlot = response.json().await?;
        if slot.upload_url.trim().is_empty() || slot.media_url.trim().is_empty() {
            return Err(PublishError::InvalidResponse {
                path: path.to_string(),
                detail: "missing upload_url or media_url".to_string(),
            });
        }
        Ok((slot.upload_url, slot.media_url))
    }

    /// PUT a rendered edit to its upload slot, streamed from disk.
    pub async fn upload_file(&self, upload_url: &str, path: &Path) -> Result<(), PublishError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| PublishError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let length = file
            .metadata()
            .await
            .map_err(|source| PublishError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .header(reqwest::header::CONTENT_LENGTH, length)
            .timeout(self.upload_timeout)
            .body(body)
            .send()
            .await?;

        Self::check(response, "media upload").await?;
        Ok(())
    }

    /// Create a scheduled post and return its id.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_post(
        &self,
        caption: &str,
        scheduled_at: &str,
        media_url: &str,
        social_accounts: &[String],
        external_id: &str,
        skip_processing: bool,
    ) -> Result<String, PublishError> {
        let path = "/social-posts";
        let payload = serde_json::json!({
            "caption": caption,
            "scheduled_at": scheduled_at,
            "media": [{"url": media_url, "skip_processing": skip_processing}],
            "social_accounts": social_accounts,
            "external_id": external_id,
            "isDraft": false,
        });

        let response = self
            .authorized(reqwest::Method::POST, path)
            .json(&payload)
            .send()
            .await?;
        let response = Self::check(response, path).await?;

        let created: CreatedPost = response.json().await?;
        let post_id = created.id.trim().to_string();
        if post_id.is_empty() {
            return Err(PublishError::InvalidResponse {
                path: path.to_string(),
                detail: "response carried no post id".to_string(),
            });
        }
        Ok(post_id)
    }
}

#[async_trait]
impl AccountDirectory for SchedulerClient {
    async fn account_ids(&self, platforms: &[String]) -> Result<Vec<String>, PublishError> {
        let accounts = self.list_accounts(platforms).await?;
        Ok(accounts
            .into_iter()
            .map(|account| account.id)
            .filter(|id| !id.trim().is_empty())
            .collect())
    }
}
