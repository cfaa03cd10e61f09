use handlebars::Handlebars;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::MailError;

/// Template used when a notification does not name one
pub const DEFAULT_TEMPLATE: &str = "mail";

/// Inline section every mail template must define, e.g.
/// `{{#*inline "body"}}<p>{{message}}</p>{{/inline}}`
pub const BODY_SECTION: &str = "body";

/// Renders mail bodies from `<template>.html` and `<template>.plain`.
///
/// The payload is exposed to the template as `message`. Only the `body`
/// section is rendered; text outside it is discarded. HTML output then has
/// its `<style>` rules inlined into `style` attributes.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    dir: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum Variant {
    Html,
    Plain,
}

impl Variant {
    fn extension(self) -> &'static str {
        match self {
            Variant::Html => "html",
            Variant::Plain => "plain",
        }
    }
}

impl TemplateRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn render_html(&self, template: &str, payload: &Value) -> Result<String, MailError> {
        let html = self.render(template, Variant::Html, payload).await?;
        css_inline::inline(&html).map_err(|e| MailError::Render {
            template: format!("{template}.html"),
            reason: format!("CSS inlining failed: {e}"),
        })
    }

    /// Plain-text variant; values are inserted without HTML escaping
    pub async fn render_plain(&self, template: &str, payload: &Value) -> Result<String, MailError> {
        self.render(template, Variant::Plain, payload).await
    }

    async fn render(&self, template: &str, variant: Variant, payload: &Value) -> Result<String, MailError> {
        let file_name = format!("{template}.{}", variant.extension());
        let path = self.dir.join(&file_name);

        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MailError::TemplateNotFound {
                template: file_name.clone(),
                reason: e.to_string(),
            })?;

        let mut registry = Handlebars::new();
        if let Variant::Plain = variant {
            registry.register_escape_fn(handlebars::no_escape);
        }

        let render_error = |reason: String| MailError::Render {
            template: file_name.clone(),
            reason,
        };

        let data = json!({ "message": payload });

        // The page alone yields the text outside the body section; the same
        // page followed by the body partial yields that text plus the body.
        // Rendering the body partial fails when the template does not define it.
        let page = format!("{file_name}#page");
        registry
            .register_template_string(&page, &source)
            .map_err(|e| render_error(e.to_string()))?;
        registry
            .register_template_string(&file_name, format!("{source}{{{{> {BODY_SECTION}}}}}"))
            .map_err(|e| render_error(e.to_string()))?;

        let outside = registry
            .render(&page, &data)
            .map_err(|e| render_error(e.to_string()))?;
        let rendered = registry
            .render(&file_name, &data)
            .map_err(|e| render_error(e.to_string()))?;

        let body = rendered
            .strip_prefix(outside.as_str())
            .ok_or_else(|| render_error("output outside the body section is not stable".to_string()))?;

        Ok(body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_render_body_section_with_payload() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "welcome.html",
            r#"{{#*inline "body"}}<p>Hello {{message.name}}</p>{{/inline}}"#,
        );

        let renderer = TemplateRenderer::new(dir.path());
        let html = renderer
            .render_html("welcome", &json!({ "name": "Ada" }))
            .await
            .unwrap();

        assert!(html.contains("<p>Hello Ada</p>"));
    }

    #[tokio::test]
    async fn test_text_outside_body_section_is_not_emitted() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "mail.plain",
            r#"HEADER {{#*inline "body"}}BODY {{message}}{{/inline}} FOOTER"#,
        );

        let renderer = TemplateRenderer::new(dir.path());
        let plain = renderer
            .render_plain(DEFAULT_TEMPLATE, &json!("text"))
            .await
            .unwrap();

        assert_eq!(plain, "BODY text");
    }

    #[tokio::test]
    async fn test_style_rules_are_inlined() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "mail.html",
            r#"{{#*inline "body"}}<html><head><style>p { color: red; }</style></head><body><p>{{message}}</p></body></html>{{/inline}}"#,
        );

        let renderer = TemplateRenderer::new(dir.path());
        let html = renderer
            .render_html(DEFAULT_TEMPLATE, &json!("Hi"))
            .await
            .unwrap();

        assert!(html.contains("<p style=\""), "{html}");
        assert!(html.contains("red"));
        assert!(!html.contains("<style"));
    }

    #[tokio::test]
    async fn test_html_escapes_but_plain_does_not() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "mail.html", r#"{{#*inline "body"}}{{message}}{{/inline}}"#);
        write(dir.path(), "mail.plain", r#"{{#*inline "body"}}{{message}}{{/inline}}"#);

        let renderer = TemplateRenderer::new(dir.path());
        let payload = json!("Tom & Jerry <3");

        let html = renderer.render_html(DEFAULT_TEMPLATE, &payload).await.unwrap();
        let plain = renderer.render_plain(DEFAULT_TEMPLATE, &payload).await.unwrap();

        assert!(html.contains("Tom &amp; Jerry &lt;3"));
        assert_eq!(plain, "Tom & Jerry <3");
    }

    #[tokio::test]
    async fn test_missing_template_file() {
        let dir = TempDir::new().unwrap();
        let renderer = TemplateRenderer::new(dir.path());

        let err = renderer.render_html("nope", &Value::Null).await.unwrap_err();
        assert!(matches!(err, MailError::TemplateNotFound { ref template, .. } if template == "nope.html"));
        assert!(err.is_render());
    }

    #[tokio::test]
    async fn test_template_without_body_section() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bare.plain", "no sections here");

        let renderer = TemplateRenderer::new(dir.path());
        let err = renderer.render_plain("bare", &Value::Null).await.unwrap_err();

        assert!(matches!(err, MailError::Render { .. }));
    }

    #[tokio::test]
    async fn test_malformed_template() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.html", r#"{{#*inline "body"}}{{#if}}{{/inline}}"#);

        let renderer = TemplateRenderer::new(dir.path());
        let err = renderer.render_html("broken", &Value::Null).await.unwrap_err();

        assert!(matches!(err, MailError::Render { .. }));
    }
}
