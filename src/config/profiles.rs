//! Automation profile document.
//!
//! Profiles arrive as a JSON document listing independently configured
//! selection + posting policies. Each profile is deserialized into a typed
//! struct with documented defaults and validated once per run; it stays
//! immutable for the run's duration.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::policy::SelectionMode;
use crate::utils::{parse_date_only, unique_strings};

/// Default full-edit caption when no template is configured.
pub const DEFAULT_FULL_CAPTION: &str = "{{title}}\n\nSource: {{source_url}}";

/// Default short-edit caption when no template is configured.
pub const DEFAULT_SHORT_CAPTION: &str =
    "{{title}}\n\nShort clip\nSource: {{source_url}}\n#shorts";

/// How far dedup reaches when deciding a candidate is already done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// Only this profile's own history counts.
    #[default]
    Automation,
    /// Any profile's complete record blocks a re-publish.
    Global,
}

impl DedupScope {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "global" => Self::Global,
            _ => Self::Automation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automation => "automation",
            Self::Global => "global",
        }
    }
}

fn de_selection_mode<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<SelectionMode, D::Error> {
    let raw = String::deserialize(de)?;
    Ok(SelectionMode::parse(&raw))
}

fn de_dedup_scope<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<DedupScope, D::Error> {
    let raw = String::deserialize(de)?;
    Ok(DedupScope::parse(&raw))
}

fn de_opt_date<'de, D: Deserializer<'de>>(
    de: D,
) -> std::result::Result<Option<chrono::NaiveDate>, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.as_deref().and_then(parse_date_only))
}

fn default_true() -> bool {
    true
}

fn default_last_x_days() -> i64 {
    7
}

fn default_archive_prefix() -> String {
    "gp_".to_string()
}

fn default_max_archive_scan() -> usize {
    300
}

fn default_max_items_per_run() -> usize {
    1
}

fn default_full_offset() -> i64 {
    20
}

fn default_short_offset() -> i64 {
    80
}

fn default_item_spacing() -> i64 {
    240
}

/// Top-level run configuration: profiles plus optional caption defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationsConfig {
    #[serde(default)]
    pub default_caption_templates: CaptionDefaults,

    #[serde(default)]
    pub automations: Vec<AutomationProfile>,
}

/// Run-level caption fallbacks, overridable per profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionDefaults {
    #[serde(default = "CaptionDefaults::default_full")]
    pub full_caption: String,

    #[serde(default = "CaptionDefaults::default_short")]
    pub short_caption: String,
}

impl CaptionDefaults {
    fn default_full() -> String {
        DEFAULT_FULL_CAPTION.to_string()
    }

    fn default_short() -> String {
        DEFAULT_SHORT_CAPTION.to_string()
    }
}

impl Default for CaptionDefaults {
    fn default() -> Self {
        Self {
            full_caption: Self::default_full(),
            short_caption: Self::default_short(),
        }
    }
}

/// One independently configured selection + publishing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationProfile {
    /// Unique, required identifier.
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub posting: PostingConfig,
}

impl AutomationProfile {
    /// Caption templates, profile override first, run defaults second.
    pub fn caption_templates(&self, defaults: &CaptionDefaults) -> (String, String) {
        let full = self
            .posting
            .full_caption_template
            .clone()
            .unwrap_or_else(|| defaults.full_caption.clone());
        let short = self
            .posting
            .short_caption_template
            .clone()
            .unwrap_or_else(|| defaults.short_caption.clone());
        (full, short)
    }
}

/// Where and how a profile discovers candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, deserialize_with = "de_selection_mode")]
    pub selection_mode: SelectionMode,

    #[serde(default = "default_last_x_days")]
    pub last_x_days: i64,

    #[serde(default, deserialize_with = "de_opt_date")]
    pub specific_date: Option<chrono::NaiveDate>,

    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,

    #[serde(default = "default_max_archive_scan")]
    pub max_archive_scan: usize,

    #[serde(default = "default_max_items_per_run")]
    pub max_items_per_run: usize,

    #[serde(default = "default_true")]
    pub include_archive: bool,

    #[serde(default)]
    pub external_links_file: Option<PathBuf>,

    /// Explicit inclusion filter on external link ids; empty means all.
    #[serde(default)]
    pub external_link_ids: Vec<String>,

    #[serde(default, deserialize_with = "de_dedup_scope")]
    pub dedupe_scope: DedupScope,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::default(),
            last_x_days: default_last_x_days(),
            specific_date: None,
            archive_prefix: default_archive_prefix(),
            max_archive_scan: default_max_archive_scan(),
            max_items_per_run: default_max_items_per_run(),
            include_archive: true,
            external_links_file: None,
            external_link_ids: Vec::new(),
            dedupe_scope: DedupScope::default(),
        }
    }
}

/// How a profile publishes admitted candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingConfig {
    #[serde(default = "default_full_offset")]
    pub full_offset_minutes: i64,

    #[serde(default = "default_short_offset")]
    pub short_offset_minutes: i64,

    #[serde(default = "default_item_spacing")]
    pub item_spacing_minutes: i64,

    #[serde(default)]
    pub skip_media_processing: bool,

    #[serde(default)]
    pub full_caption_template: Option<String>,

    #[serde(default)]
    pub short_caption_template: Option<String>,

    /// Explicit target account ids; empty means resolve by platform.
    #[serde(default)]
    pub account_ids: Vec<String>,

    /// Platform filter used when resolving connected accounts.
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            full_offset_minutes: default_full_offset(),
            short_offset_minutes: default_short_offset(),
            item_spacing_minutes: default_item_spacing(),
            skip_media_processing: false,
            full_caption_template: None,
            short_caption_template: None,
            account_ids: Vec::new(),
            platforms: Vec::new(),
        }
    }
}

impl AutomationsConfig {
    /// Load and validate the profile document.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::config(format!("cannot read config {}: {err}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| {
            Error::config(format!("invalid config {}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce the invariants the run loop depends on.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for profile in &self.automations {
            if profile.id.trim().is_empty() {
                return Err(Error::config("automation profile with empty id"));
            }
            if !seen.insert(profile.id.trim().to_string()) {
                return Err(Error::config(format!(
                    "duplicate automation id `{}`",
                    profile.id
                )));
            }
            if profile.source.max_items_per_run == 0 {
                return Err(Error::config(format!(
                    "automation `{}`: max_items_per_run must be greater than 0",
                    profile.id
                )));
            }
        }
        Ok(())
    }

    /// Normalized platform filter for a profile.
    pub fn platforms(profile: &AutomationProfile) -> Vec<String> {
        unique_strings(profile.posting.platforms.iter().map(|p| p.to_lowercase()))
    }
}
