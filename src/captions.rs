//! Caption rendering.
//!
//! Captions are handlebars templates over a small, fixed context. Rendering
//! never fails the publish path: a broken or empty template falls back to the
//! caller's default caption so a typo in config cannot strand an item
//! mid-pipeline.

use handlebars::Handlebars;
use serde::Serialize;

/// Values available to caption templates.
#[derive(Debug, Clone, Serialize)]
pub struct CaptionContext {
    pub title: String,
    pub source_url: String,
    pub source_id: String,
    pub variant: String,
    pub automation_id: String,
}

/// Render a caption template, falling back to `fallback` when the template is
/// malformed or renders to an empty string.
pub fn render_caption(template: &str, context: &CaptionContext, fallback: &str) -> String {
    let mut handlebars = Handlebars::new();
    // Captions are plain text, not HTML; URLs must come through unescaped.
    handlebars.register_escape_fn(handlebars::no_escape);
    match handlebars.render_template(template, context) {
        Ok(rendered) if !rendered.trim().is_empty() => rendered.trim().to_string(),
        Ok(_) => fallback.to_string(),
        Err(err) => {
            tracing::warn!(
                automation_id = %context.automation_id,
                variant = %context.variant,
                error = %err,
                "Caption template failed to render, using fallback"
            );
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CaptionContext {
        CaptionContext {
            title: "Morning Sweep".to_string(),
            source_url: "https://archive.test/details/gp_001".to_string(),
            source_id: "gp_001".to_string(),
            variant: "full".to_string(),
            automation_id: "daily".to_string(),
        }
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let rendered = render_caption(
            "{{title}}\n\nSource: {{source_url}}",
            &context(),
            "fallback",
        );
        assert_eq!(
            rendered,
            "Morning Sweep\n\nSource: https://archive.test/details/gp_001"
        );
    }

    #[test]
    fn test_url_not_escaped() {
        let rendered = render_caption("{{source_url}}", &context(), "fallback");
        assert_eq!(rendered, "https://archive.test/details/gp_001");
    }

    #[test]
    fn test_broken_template_falls_back() {
        let rendered = render_caption("{{#if}} broken", &context(), "fallback caption");
        assert_eq!(rendered, "fallback caption");
    }

    #[test]
    fn test_empty_render_falls_back() {
        let rendered = render_caption("   ", &context(), "fallback caption");
        assert_eq!(rendered, "fallback caption");
    }
}
