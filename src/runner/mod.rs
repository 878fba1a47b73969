//! Run orchestration.
//!
//! [`Orchestrator::run`] executes one sweep: for each enabled profile it
//! resolves accounts, discovers candidates, applies the selection window,
//! and walks admitted candidates oldest-first through the publish pipeline.
//! State is flushed after every state-affecting step so a crash at any point
//! resumes without duplicate posts.

use chrono::{DateTime, NaiveDate, Utc};

use crate::captions::{render_caption, CaptionContext};
use crate::config::profiles::{AutomationProfile, AutomationsConfig, DedupScope, SourceConfig};
use crate::error::{Error, Result};
use crate::feeds::Discovery;
use crate::models::{Candidate, CompletionRecord};
use crate::policy::{in_window, schedule_pair, SelectionMode};
use crate::publish::{AccountDirectory, PublishPipeline, PublishRequest, Variant};
use crate::state::{StateDocument, StateStore};
use crate::utils::{now_iso, to_iso_z, unique_strings};

/// Per-invocation overrides from the CLI; `None` keeps the profile's own
/// setting.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// Restrict the sweep to one profile id.
    pub automation_id: Option<String>,
    pub window_mode: Option<SelectionMode>,
    pub last_x_days: Option<i64>,
    pub specific_date: Option<NaiveDate>,
    pub max_items: Option<usize>,
    pub archive_prefix: Option<String>,
    pub dry_run: bool,
}

/// Outcome of one profile within a sweep.
#[derive(Debug, Clone)]
pub struct ProfileReport {
    pub automation_id: String,
    pub mode: SelectionMode,
    pub accounts: usize,
    pub discovered: usize,
    pub scheduled: usize,
    pub failed: usize,
    /// Per-candidate outcome lines in processing order.
    pub notes: Vec<String>,
}

/// Outcome of a whole sweep, renderable as a markdown run report.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub profiles: Vec<ProfileReport>,
    pub total_scheduled: usize,
    pub total_failed: usize,
    pub dry_run: bool,
}

impl RunSummary {
    /// Non-zero exit condition: nothing got scheduled and something broke.
    pub fn is_failure(&self) -> bool {
        self.total_scheduled == 0 && self.total_failed > 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "## Scheduled media sweep")?;
        for profile in &self.profiles {
            writeln!(f, "### Automation `{}`", profile.automation_id)?;
            writeln!(f, "- Mode: `{}`", profile.mode)?;
            writeln!(f, "- Accounts targeted: `{}`", profile.accounts)?;
            writeln!(f, "- Candidates discovered: `{}`", profile.discovered)?;
            for note in &profile.notes {
                writeln!(f, "{note}")?;
            }
            writeln!(f, "- Scheduled this run: `{}`", profile.scheduled)?;
            writeln!(f, "- Failed this run: `{}`", profile.failed)?;
        }
        writeln!(f, "- Dry run: `{}`", self.dry_run)?;
        writeln!(f, "- Total scheduled items: `{}`", self.total_scheduled)?;
        write!(f, "- Total failures: `{}`", self.total_failed)
    }
}

/// Effective per-profile policy after overrides are applied.
struct EffectivePolicy {
    mode: SelectionMode,
    source: SourceConfig,
    max_items: usize,
}

fn effective_policy(profile: &AutomationProfile, overrides: &RunOverrides) -> EffectivePolicy {
    let mut source = profile.source.clone();
    if let Some(days) = overrides.last_x_days {
        if days > 0 {
            source.last_x_days = days;
        }
    }
    if let Some(date) = overrides.specific_date {
        source.specific_date = Some(date);
    }
    if let Some(prefix) = &overrides.archive_prefix {
        if !prefix.trim().is_empty() {
            source.archive_prefix = prefix.trim().to_string();
        }
    }
    let max_items = match overrides.max_items {
        Some(limit) if limit > 0 => limit,
        _ => source.max_items_per_run,
    };
    EffectivePolicy {
        mode: overrides.window_mode.unwrap_or(source.selection_mode),
        source,
        max_items,
    }
}

pub struct Orchestrator<'a> {
    discovery: &'a dyn Discovery,
    directory: &'a dyn AccountDirectory,
    pipeline: &'a dyn PublishPipeline,
    store: &'a StateStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        discovery: &'a dyn Discovery,
        directory: &'a dyn AccountDirectory,
        pipeline: &'a dyn PublishPipeline,
        store: &'a StateStore,
    ) -> Self {
        Self {
            discovery,
            directory,
            pipeline,
            store,
        }
    }

    /// Execute one sweep over every enabled profile.
    pub async fn run(
        &self,
        state: &mut StateDocument,
        config: &AutomationsConfig,
        overrides: &RunOverrides,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            dry_run: overrides.dry_run,
            ..RunSummary::default()
        };

        for profile in &config.automations {
            if let Some(selected) = &overrides.automation_id {
                if profile.id != *selected {
                    continue;
                }
            }
            if !profile.enabled {
                tracing::debug!(automation_id = %profile.id, "Profile disabled, skipping");
                continue;
            }

            let report = self
                .run_profile(state, config, profile, overrides)
                .await?;
            summary.total_scheduled += report.scheduled;
            summary.total_failed += report.failed;
            summary.profiles.push(report);
        }

        Ok(summary)
    }

    async fn run_profile(
        &self,
        state: &mut StateDocument,
        config: &AutomationsConfig,
        profile: &AutomationProfile,
        overrides: &RunOverrides,
    ) -> Result<ProfileReport> {
        let policy = effective_policy(profile, overrides);
        let now = Utc::now();

        let accounts = self.resolve_accounts(profile).await?;
        if accounts.is_empty() {
            return Err(Error::config(format!(
                "no connected accounts found for automation `{}`",
                profile.id
            )));
        }

        let last_run = state
            .automation(&profile.id)
            .and_then(|bucket| bucket.last_run_instant());

        let mut candidates = self.discovery.discover(&policy.source, policy.mode).await?;
        let discovered = candidates.len();
        candidates.retain(|candidate| {
            in_window(
                candidate.source_datetime(),
                policy.mode,
                last_run,
                policy.source.last_x_days,
                policy.source.specific_date,
                now,
            )
        });
        candidates.sort_by_key(Candidate::sort_key);

        tracing::info!(
            automation_id = %profile.id,
            mode = %policy.mode,
            discovered,
            admitted = candidates.len(),
            "Starting profile sweep"
        );

        let mut report = ProfileReport {
            automation_id: profile.id.clone(),
            mode: policy.mode,
            accounts: accounts.len(),
            discovered,
            scheduled: 0,
            failed: 0,
            notes: Vec::new(),
        };
        let templates = profile.caption_templates(&config.default_caption_templates);

        for candidate in &candidates {
            if report.scheduled >= policy.max_items {
                break;
            }

            let source_key = candidate.source_key();
            if state
                .record(&profile.id, &source_key)
                .map_or(false, CompletionRecord::is_complete)
            {
                tracing::debug!(
                    automation_id = %profile.id,
                    source_key = %source_key,
                    "Already completed, skipping"
                );
                continue;
            }

            if policy.source.dedupe_scope == DedupScope::Global {
                if let Some(other) = state.completed_elsewhere(&profile.id, &source_key) {
                    report.notes.push(format!(
                        "- `{source_key}` skipped: already completed by `{other}`"
                    ));
                    continue;
                }
            }

            let schedule = schedule_pair(
                now,
                report.scheduled,
                profile.posting.full_offset_minutes,
                profile.posting.short_offset_minutes,
                profile.posting.item_spacing_minutes,
            );

            match self
                .process_candidate(state, profile, candidate, &accounts, &templates, schedule)
                .await
            {
                Ok(note) => {
                    report.scheduled += 1;
                    report.notes.push(note);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        automation_id = %profile.id,
                        source_key = %source_key,
                        error = %err,
                        "Candidate failed"
                    );
                    report.failed += 1;
                    report
                        .notes
                        .push(format!("- `{}` `{source_key}` failed: {err}", profile.id));
                }
            }
        }

        state.automation_mut(&profile.id).last_run_at = now_iso();
        self.store.save(state)?;

        Ok(report)
    }

    async fn resolve_accounts(&self, profile: &AutomationProfile) -> Result<Vec<String>> {
        if !profile.posting.account_ids.is_empty() {
            return Ok(unique_strings(profile.posting.account_ids.iter().cloned()));
        }
        let platforms = AutomationsConfig::platforms(profile);
        Ok(self.directory.account_ids(&platforms).await?)
    }

    /// Publish both edits of one candidate, flushing state after each half
    /// so a crash between the two resumes with only the missing half.
    async fn process_candidate(
        &self,
        state: &mut StateDocument,
        profile: &AutomationProfile,
        candidate: &Candidate,
        accounts: &[String],
        templates: &(String, String),
        schedule: (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<String> {
        let source_key = candidate.source_key();
        let mut record = state
            .record(&profile.id, &source_key)
            .cloned()
            .unwrap_or_else(|| CompletionRecord::pending(candidate));

        let prepared = self.pipeline.prepare(&profile.id, candidate).await?;
        record.title = prepared.title.clone();
        record.source_url = prepared.source_url.clone();
        if let Some((name, size)) = &prepared.archive_source {
            record.archive_source_name = Some(name.clone());
            record.archive_source_size = Some(*size);
        }

        let (full_time, short_time) = schedule;

        if record.full_post_id.is_empty() {
            let caption = self.caption(profile, candidate, &prepared.title, &prepared.source_url, Variant::Full, &templates.0);
            let post = self
                .pipeline
                .publish(
                    &prepared,
                    &PublishRequest {
                        automation_id: profile.id.clone(),
                        source_key: source_key.clone(),
                        variant: Variant::Full,
                        accounts: accounts.to_vec(),
                        caption,
                        scheduled_at: full_time,
                        skip_processing: profile.posting.skip_media_processing,
                    },
                )
                .await?;
            record.full_post_id = post.post_id;
            record.full_media_url = post.media_url;
            record.full_scheduled_at = to_iso_z(full_time);
            record.touch();
            state
                .automation_mut(&profile.id)
                .items
                .insert(source_key.clone(), record.clone());
            self.store.save(state)?;
        }

        if record.short_post_id.is_empty() {
            let caption = self.caption(profile, candidate, &prepared.title, &prepared.source_url, Variant::Short, &templates.1);
            let post = self
                .pipeline
                .publish(
                    &prepared,
                    &PublishRequest {
                        automation_id: profile.id.clone(),
                        source_key: source_key.clone(),
                        variant: Variant::Short,
                        accounts: accounts.to_vec(),
                        caption,
                        scheduled_at: short_time,
                        skip_processing: profile.posting.skip_media_processing,
                    },
                )
                .await?;
            record.short_post_id = post.post_id;
            record.short_media_url = post.media_url;
            record.short_scheduled_at = to_iso_z(short_time);
            record.touch();
            state
                .automation_mut(&profile.id)
                .items
                .insert(source_key.clone(), record);
            self.store.save(state)?;
        }

        Ok(format!(
            "- `{}` `{source_key}` scheduled (full `{}`, short `{}`)",
            profile.id,
            to_iso_z(full_time),
            to_iso_z(short_time)
        ))
    }

    fn caption(
        &self,
        profile: &AutomationProfile,
        candidate: &Candidate,
        title: &str,
        source_url: &str,
        variant: Variant,
        template: &str,
    ) -> String {
        let context = CaptionContext {
            title: title.to_string(),
            source_url: source_url.to_string(),
            source_id: candidate.source_id().to_string(),
            variant: variant.as_str().to_string(),
            automation_id: profile.id.clone(),
        };
        let fallback = match variant {
            Variant::Full => format!("{title}\n\nSource: {source_url}"),
            Variant::Short => format!("{title}\n\nShort clip\nSource: {source_url}\n#shorts"),
        };
        render_caption(template, &context, &fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> AutomationProfile {
        serde_json::from_value(serde_json::json!({"id": id})).unwrap()
    }

    #[test]
    fn test_overrides_replace_profile_policy() {
        let profile = profile("a");
        let overrides = RunOverrides {
            window_mode: Some(SelectionMode::All),
            last_x_days: Some(30),
            max_items: Some(5),
            archive_prefix: Some("xx_".to_string()),
            ..RunOverrides::default()
        };
        let policy = effective_policy(&profile, &overrides);
        assert_eq!(policy.mode, SelectionMode::All);
        assert_eq!(policy.source.last_x_days, 30);
        assert_eq!(policy.max_items, 5);
        assert_eq!(policy.source.archive_prefix, "xx_");
    }

    #[test]
    fn test_zero_and_blank_overrides_are_ignored() {
        let profile = profile("a");
        let overrides = RunOverrides {
            last_x_days: Some(0),
            max_items: Some(0),
            archive_prefix: Some("  ".to_string()),
            ..RunOverrides::default()
        };
        let policy = effective_policy(&profile, &overrides);
        assert_eq!(policy.mode, SelectionMode::NewSinceLastRun);
        assert_eq!(policy.source.last_x_days, 7);
        assert_eq!(policy.max_items, 1);
        assert_eq!(policy.source.archive_prefix, "gp_");
    }

    #[test]
    fn test_summary_failure_condition() {
        let mut summary = RunSummary::default();
        assert!(!summary.is_failure());

        summary.total_failed = 2;
        assert!(summary.is_failure());

        summary.total_scheduled = 1;
        assert!(!summary.is_failure());
    }

    #[test]
    fn test_summary_render_shape() {
        let summary = RunSummary {
            profiles: vec![ProfileReport {
                automation_id: "daily".to_string(),
                mode: SelectionMode::All,
                accounts: 2,
                discovered: 3,
                scheduled: 1,
                failed: 0,
                notes: vec!["- `daily` `archive:gp_001` scheduled".to_string()],
            }],
            total_scheduled: 1,
            total_failed: 0,
            dry_run: true,
        };
        let rendered = summary.to_string();
        assert!(rendered.contains("### Automation `daily`"));
        assert!(rendered.contains("- Mode: `all`"));
        assert!(rendered.contains("- Dry run: `true`"));
        assert!(rendered.contains("- Total scheduled items: `1`"));
    }
}
