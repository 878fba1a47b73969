//! Live publish pipeline.
//!
//! [`MediaPublisher`] fetches a candidate's source, renders the full and
//! short edits into the work directory, then uploads each edit and schedules
//! its post. Dry runs still download and transcode (so media problems
//! surface) but replace the API calls with deterministic synthetic ids.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{
    PreparedItem, PublishError, PublishPipeline, PublishRequest, PublishedPost, SchedulerClient,
    Variant,
};
use crate::error::Error;
use crate::feeds::archive::choose_source;
use crate::feeds::ArchiveFeed;
use crate::media;
use crate::models::Candidate;
use crate::utils::{short_hash, slugify, to_iso_z};

/// Stable idempotency token for one (automation, source, variant) post.
pub fn make_external_id(automation_id: &str, source_key: &str, variant: Variant) -> String {
    format!(
        "{}-{}-{}",
        slugify(automation_id, "auto"),
        variant,
        short_hash(&format!("{automation_id}|{source_key}|{variant}"), 18)
    )
}

pub struct MediaPublisher {
    archive: Arc<ArchiveFeed>,
    scheduler: Arc<SchedulerClient>,
    download_client: reqwest::Client,
    work_dir: PathBuf,
    download_timeout: Duration,
    dry_run: bool,
}

impl MediaPublisher {
    pub fn new(
        archive: Arc<ArchiveFeed>,
        scheduler: Arc<SchedulerClient>,
        work_dir: impl Into<PathBuf>,
        download_timeout: Duration,
        dry_run: bool,
    ) -> Result<Self, PublishError> {
        let download_client = reqwest::Client::builder().gzip(true).build()?;
        Ok(Self {
            archive,
            scheduler,
            download_client,
            work_dir: work_dir.into(),
            download_timeout,
            dry_run,
        })
    }

    fn item_dir(&self, automation_id: &str, source_key: &str) -> PathBuf {
        self.work_dir
            .join(slugify(automation_id, "item"))
            .join(slugify(source_key, &short_hash(source_key, 12)))
    }
}

#[async_trait]
impl PublishPipeline for MediaPublisher {
    async fn prepare(
        &self,
        automation_id: &str,
        candidate: &Candidate,
    ) -> Result<PreparedItem, Error> {
        let source_key = candidate.source_key();
        let item_dir = self.item_dir(automation_id, &source_key);
        tokio::fs::create_dir_all(&item_dir).await?;

        let full_path = item_dir.join("full.mp4");
        let short_path = item_dir.join("short.mp4");

        let mut title = candidate.title().to_string();
        let mut source_url = candidate.source_url();
        let mut archive_source = None;

        let source_path = match candidate {
            Candidate::Archive { identifier, .. } => {
                let metadata = self.archive.fetch_metadata(identifier).await?;
                let chosen =
                    choose_source(&metadata.files).ok_or_else(|| PublishError::NoSource {
                        source_key: source_key.clone(),
                    })?;
                let name = chosen.name.clone();
                let size = chosen.size;

                let destination = item_dir.join("source.input");
                source_url = self.archive.download(identifier, &name, &destination).await?;

                let metadata_title = metadata.metadata.title.trim();
                if !metadata_title.is_empty() {
                    title = metadata_title.to_string();
                }
                archive_source = Some((name, size));
                destination
            }
            Candidate::External { url, .. } => {
                media::download_external(
                    &self.download_client,
                    url,
                    &item_dir.join("source"),
                    self.download_timeout,
                )
                .await?
            }
        };

        tracing::info!(automation_id, source_key = %source_key, "Rendering full edit");
        media::transcode_full(&source_path, &full_path).await?;
        tracing::info!(automation_id, source_key = %source_key, "Rendering short edit");
        media::transcode_short(&source_path, &short_path).await?;

        Ok(PreparedItem {
            source_key,
            title,
            source_url,
            full_path,
            short_path,
            archive_source,
        })
    }

    async fn publish(
        &self,
        item: &PreparedItem,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError> {
        if self.dry_run {
            let seed = short_hash(
                &format!("{}|{}", request.automation_id, request.source_key),
                16,
            );
            return Ok(PublishedPost {
                post_id: format!("dryrun-{}-{seed}", request.variant),
                media_url: format!("dryrun://{}", request.variant),
            });
        }

        let path = match request.variant {
            Variant::Full => &item.full_path,
            Variant::Short => &item.short_path,
        };

        let (upload_url, media_url) = self.scheduler.create_upload_url().await?;
        self.scheduler.upload_file(&upload_url, path).await?;

        let external_id =
            make_external_id(&request.automation_id, &request.source_key, request.variant);
        let post_id = self
            .scheduler
            .create_post(
                &request.caption,
                &to_iso_z(request.scheduled_at),
                &media_url,
                &request.accounts,
                &external_id,
                request.skip_processing,
            )
            .await?;

        tracing::info!(
            automation_id = %request.automation_id,
            source_key = %request.source_key,
            variant = %request.variant,
            post_id = %post_id,
            "Scheduled post"
        );

        Ok(PublishedPost { post_id, media_url })
    }
}
