//! Shared builders for integration tests.

use archivecast::config::profiles::AutomationsConfig;
use archivecast::models::Candidate;
use archivecast::utils::parse_datetime;

#[allow(dead_code)]
pub fn archive_candidate(id: &str, published_at: Option<&str>) -> Candidate {
    Candidate::Archive {
        identifier: id.to_string(),
        title: format!("Title {id}"),
        published_at: published_at.and_then(parse_datetime),
    }
}

#[allow(dead_code)]
pub fn external_candidate(id: &str, published_at: Option<&str>) -> Candidate {
    Candidate::External {
        id: id.to_string(),
        url: format!("https://example.test/{id}.mp4"),
        title: format!("Clip {id}"),
        published_at: published_at.and_then(parse_datetime),
    }
}

#[allow(dead_code)]
pub fn automations(value: serde_json::Value) -> AutomationsConfig {
    let config: AutomationsConfig = serde_json::from_value(value).unwrap();
    config.validate().unwrap();
    config
}
