//! Handlebars rendering of stored template bodies.
//!
//! Bodies live in the database, so they are compiled on every call instead of
//! being registered up front. Values are HTML-escaped; `{{{name}}}` opts out.

use handlebars::{Handlebars, Template};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::MailerResult;
use crate::models::EmailUser;

/// Per-recipient variables available to a template body.
pub type RenderContext = HashMap<String, String>;

/// Renders template bodies against a recipient context.
#[derive(Clone)]
pub struct TemplateRenderer {
    handlebars: Arc<Handlebars<'static>>,
}

impl TemplateRenderer {
    /// Non-strict renderer: unknown placeholders render empty.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        Self {
            handlebars: Arc::new(handlebars),
        }
    }

    /// Compile `body` and substitute values from `context`.
    pub fn render(&self, body: &str, context: &RenderContext) -> MailerResult<String> {
        debug!(keys = context.len(), "Rendering template body");
        Ok(self.handlebars.render_template(body, context)?)
    }

    /// Compile `body` without rendering it.
    pub fn validate(&self, body: &str) -> MailerResult<()> {
        Template::compile(body)?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Context for one recipient. Missing names become empty strings.
pub fn recipient_context(user: &EmailUser) -> RenderContext {
    HashMap::from([
        (
            "first_name".to_string(),
            user.first_name.clone().unwrap_or_default(),
        ),
        (
            "last_name".to_string(),
            user.last_name.clone().unwrap_or_default(),
        ),
        ("email".to_string(), user.email.clone()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailerError;
    use crate::models::CreateEmailUser;

    fn context(pairs: &[(&str, &str)]) -> RenderContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let renderer = TemplateRenderer::new();
        let html = renderer
            .render(
                "Hi {{first_name}} {{last_name}}",
                &context(&[("first_name", "Ana"), ("last_name", "Lee")]),
            )
            .unwrap();
        assert_eq!(html, "Hi Ana Lee");
    }

    #[test]
    fn test_unknown_placeholder_renders_empty() {
        let renderer = TemplateRenderer::new();
        let html = renderer
            .render("Hi {{nickname}}!", &context(&[("first_name", "Ana")]))
            .unwrap();
        assert_eq!(html, "Hi !");
    }

    #[test]
    fn test_values_are_escaped_unless_triple_stashed() {
        let renderer = TemplateRenderer::new();
        let ctx = context(&[("first_name", "<b>Ana</b>")]);

        let escaped = renderer.render("{{first_name}}", &ctx).unwrap();
        assert_eq!(escaped, "&lt;b&gt;Ana&lt;/b&gt;");

        let raw = renderer.render("{{{first_name}}}", &ctx).unwrap();
        assert_eq!(raw, "<b>Ana</b>");
    }

    #[test]
    fn test_syntax_error_is_template_error() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render("Hi {{#if first_name}}", &RenderContext::new())
            .unwrap_err();
        assert!(matches!(err, MailerError::Template(_)));
        assert!(renderer.validate("Hi {{#if first_name}}").is_err());
        assert!(renderer.validate("Hi {{first_name}}").is_ok());
    }

    #[test]
    fn test_recipient_context_fills_missing_names() {
        let user = EmailUser::new(CreateEmailUser {
            first_name: Some("Ana".into()),
            last_name: None,
            email: "ana@x.com".into(),
        });
        let ctx = recipient_context(&user);
        assert_eq!(ctx["first_name"], "Ana");
        assert_eq!(ctx["last_name"], "");
        assert_eq!(ctx["email"], "ana@x.com");
    }
}
