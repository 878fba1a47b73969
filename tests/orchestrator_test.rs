//! Integration tests for the sweep orchestrator using fake collaborators.
//!
//! Every test runs against a real state store on disk (tempfile), so the
//! persistence and resume behavior under test is the production code path.

mod common;

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use archivecast::config::profiles::{AutomationsConfig, SourceConfig};
use archivecast::error::Error;
use archivecast::feeds::{Discovery, FeedError};
use archivecast::models::Candidate;
use archivecast::policy::SelectionMode;
use archivecast::publish::{
    AccountDirectory, PreparedItem, PublishError, PublishPipeline, PublishRequest, PublishedPost,
    Variant,
};
use archivecast::runner::{Orchestrator, RunOverrides};
use archivecast::state::{StateDocument, StateStore};

use common::{archive_candidate, automations};

struct FakeDiscovery {
    candidates: Vec<Candidate>,
}

#[async_trait]
impl Discovery for FakeDiscovery {
    async fn discover(
        &self,
        _source: &SourceConfig,
        _mode: SelectionMode,
    ) -> Result<Vec<Candidate>, FeedError> {
        Ok(self.candidates.clone())
    }
}

struct FakeDirectory {
    ids: Vec<String>,
}

#[async_trait]
impl AccountDirectory for FakeDirectory {
    async fn account_ids(&self, _platforms: &[String]) -> Result<Vec<String>, PublishError> {
        Ok(self.ids.clone())
    }
}

/// Records every publish call; short publishes for keys in `fail_short`
/// return an API error.
#[derive(Default)]
struct FakePipeline {
    calls: Mutex<Vec<(String, Variant)>>,
    fail_short: Mutex<HashSet<String>>,
}

impl FakePipeline {
    fn calls_for(&self, source_key: &str, variant: Variant) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, v)| key == source_key && *v == variant)
            .count()
    }

    fn published_keys(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl PublishPipeline for FakePipeline {
    async fn prepare(
        &self,
        _automation_id: &str,
        candidate: &Candidate,
    ) -> Result<PreparedItem, Error> {
        Ok(PreparedItem {
            source_key: candidate.source_key(),
            title: candidate.title().to_string(),
            source_url: candidate.source_url(),
            full_path: "/tmp/full.mp4".into(),
            short_path: "/tmp/short.mp4".into(),
            archive_source: None,
        })
    }

    async fn publish(
        &self,
        item: &PreparedItem,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError> {
        if request.variant == Variant::Short
            && self.fail_short.lock().unwrap().contains(&item.source_key)
        {
            return Err(PublishError::Status {
                status: 502,
                path: "/social-posts".to_string(),
                body: "bad gateway".to_string(),
            });
        }

        self.calls
            .lock()
            .unwrap()
            .push((item.source_key.clone(), request.variant));

        Ok(PublishedPost {
            post_id: format!("post-{}-{}", request.variant, item.source_key),
            media_url: format!("media://{}/{}", request.variant, item.source_key),
        })
    }
}

struct Harness {
    _dir: TempDir,
    store: StateStore,
    directory: FakeDirectory,
    pipeline: FakePipeline,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        Self {
            _dir: dir,
            store,
            directory: FakeDirectory {
                ids: vec!["acct-1".to_string()],
            },
            pipeline: FakePipeline::default(),
        }
    }

    async fn run(
        &self,
        discovery: &FakeDiscovery,
        state: &mut StateDocument,
        config: &AutomationsConfig,
        overrides: &RunOverrides,
    ) -> archivecast::runner::RunSummary {
        Orchestrator::new(discovery, &self.directory, &self.pipeline, &self.store)
            .run(state, config, overrides)
            .await
            .unwrap()
    }
}

fn all_mode_config(id: &str, max_items: usize) -> AutomationsConfig {
    automations(serde_json::json!({
        "automations": [{
            "id": id,
            "source": {"selection_mode": "all", "max_items_per_run": max_items}
        }]
    }))
}

#[tokio::test]
async fn test_schedules_both_edits_and_persists_record() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let config = all_mode_config("daily", 1);
    let mut state = harness.store.load().unwrap();

    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;

    assert_eq!(summary.total_scheduled, 1);
    assert_eq!(summary.total_failed, 0);

    let record = state.record("daily", "archive:gp_001").unwrap();
    assert!(record.is_complete());
    assert_eq!(record.full_post_id, "post-full-archive:gp_001");
    assert_eq!(record.short_post_id, "post-short-archive:gp_001");
    assert!(!record.full_scheduled_at.is_empty());
    assert!(!record.short_scheduled_at.is_empty());

    // The sweep stamped and flushed the profile's last run.
    let reloaded = harness.store.load().unwrap();
    assert!(reloaded
        .automation("daily")
        .unwrap()
        .last_run_instant()
        .is_some());
    assert!(reloaded.record("daily", "archive:gp_001").unwrap().is_complete());
}

#[tokio::test]
async fn test_second_sweep_is_a_no_op() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let config = all_mode_config("daily", 1);
    let mut state = harness.store.load().unwrap();

    harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;
    let first_calls = harness.pipeline.calls.lock().unwrap().len();

    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;

    assert_eq!(summary.total_scheduled, 0);
    assert_eq!(summary.total_failed, 0);
    assert_eq!(harness.pipeline.calls.lock().unwrap().len(), first_calls);
}

#[tokio::test]
async fn test_cap_takes_oldest_candidates_first() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![
            archive_candidate("gp_new", Some("2024-05-01T00:00:00Z")),
            archive_candidate("gp_old", Some("2024-01-01T00:00:00Z")),
            archive_candidate("gp_mid", Some("2024-03-01T00:00:00Z")),
        ],
    };
    let config = all_mode_config("daily", 2);
    let mut state = harness.store.load().unwrap();

    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;

    assert_eq!(summary.total_scheduled, 2);
    let keys = harness.pipeline.published_keys();
    assert!(keys.contains(&"archive:gp_old".to_string()));
    assert!(keys.contains(&"archive:gp_mid".to_string()));
    assert!(!keys.contains(&"archive:gp_new".to_string()));
}

#[tokio::test]
async fn test_failed_short_resumes_without_duplicating_full() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let config = all_mode_config("daily", 1);
    let mut state = harness.store.load().unwrap();

    harness
        .pipeline
        .fail_short
        .lock()
        .unwrap()
        .insert("archive:gp_001".to_string());

    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;
    assert_eq!(summary.total_scheduled, 0);
    assert_eq!(summary.total_failed, 1);

    // The full half survived the failure, on disk.
    let record = harness
        .store
        .load()
        .unwrap()
        .record("daily", "archive:gp_001")
        .cloned()
        .unwrap();
    assert!(!record.full_post_id.is_empty());
    assert!(record.short_post_id.is_empty());
    assert!(!record.is_complete());

    harness.pipeline.fail_short.lock().unwrap().clear();
    let mut state = harness.store.load().unwrap();
    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;

    assert_eq!(summary.total_scheduled, 1);
    assert_eq!(harness.pipeline.calls_for("archive:gp_001", Variant::Full), 1);
    assert_eq!(harness.pipeline.calls_for("archive:gp_001", Variant::Short), 1);
    assert!(state.record("daily", "archive:gp_001").unwrap().is_complete());
}

#[tokio::test]
async fn test_global_dedupe_skips_items_completed_elsewhere() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let config = automations(serde_json::json!({
        "automations": [
            {"id": "first", "source": {"selection_mode": "all"}},
            {"id": "second", "source": {"selection_mode": "all", "dedupe_scope": "global"}}
        ]
    }));
    let mut state = harness.store.load().unwrap();

    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;

    assert_eq!(summary.total_scheduled, 1);
    assert_eq!(harness.pipeline.calls_for("archive:gp_001", Variant::Full), 1);

    let second = &summary.profiles[1];
    assert_eq!(second.scheduled, 0);
    assert!(second
        .notes
        .iter()
        .any(|note| note.contains("already completed by `first`")));

    // The skipping profile never grows a record of its own.
    assert!(state.record("second", "archive:gp_001").is_none());
}

#[tokio::test]
async fn test_automation_scope_republishes_independently() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let config = automations(serde_json::json!({
        "automations": [
            {"id": "first", "source": {"selection_mode": "all"}},
            {"id": "second", "source": {"selection_mode": "all"}}
        ]
    }));
    let mut state = harness.store.load().unwrap();

    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;

    assert_eq!(summary.total_scheduled, 2);
    assert_eq!(harness.pipeline.calls_for("archive:gp_001", Variant::Full), 2);
}

#[tokio::test]
async fn test_new_since_last_run_window_filters_old_candidates() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let config = automations(serde_json::json!({"automations": [{"id": "daily"}]}));

    let mut state = harness.store.load().unwrap();
    state.automation_mut("daily").last_run_at = "2024-06-01T00:00:00Z".to_string();

    let summary = harness
        .run(&discovery, &mut state, &config, &RunOverrides::default())
        .await;

    assert_eq!(summary.total_scheduled, 0);
    assert_eq!(summary.total_failed, 0);
    assert_eq!(summary.profiles[0].discovered, 1);
    assert!(harness.pipeline.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_and_unselected_profiles_are_skipped() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let config = automations(serde_json::json!({
        "automations": [
            {"id": "off", "enabled": false, "source": {"selection_mode": "all"}},
            {"id": "a", "source": {"selection_mode": "all"}},
            {"id": "b", "source": {"selection_mode": "all"}}
        ]
    }));
    let mut state = harness.store.load().unwrap();

    let overrides = RunOverrides {
        automation_id: Some("b".to_string()),
        ..RunOverrides::default()
    };
    let summary = harness.run(&discovery, &mut state, &config, &overrides).await;

    assert_eq!(summary.profiles.len(), 1);
    assert_eq!(summary.profiles[0].automation_id, "b");
    assert!(state.automation("a").is_none());
}

#[tokio::test]
async fn test_no_accounts_aborts_run() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    let directory = FakeDirectory { ids: Vec::new() };
    let pipeline = FakePipeline::default();
    let config = all_mode_config("daily", 1);
    let mut state = store.load().unwrap();

    let result = Orchestrator::new(&discovery, &directory, &pipeline, &store)
        .run(&mut state, &config, &RunOverrides::default())
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_window_mode_override_widens_selection() {
    let harness = Harness::new();
    let discovery = FakeDiscovery {
        candidates: vec![archive_candidate("gp_001", Some("2024-01-01T00:00:00Z"))],
    };
    // Profile default is new_since_last_run, which would reject this old
    // candidate once a last run is stamped.
    let config = automations(serde_json::json!({"automations": [{"id": "daily"}]}));
    let mut state = harness.store.load().unwrap();
    state.automation_mut("daily").last_run_at = "2024-06-01T00:00:00Z".to_string();

    let overrides = RunOverrides {
        window_mode: Some(SelectionMode::All),
        ..RunOverrides::default()
    };
    let summary = harness.run(&discovery, &mut state, &config, &overrides).await;

    assert_eq!(summary.total_scheduled, 1);
}
