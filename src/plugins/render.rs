//! Render plugins: Markdown to HTML, then HTML into a page layout.

use crate::cache::{cache_key, markdown_fingerprint};
use crate::document::Document;
use crate::markdown;
use crate::plugin::{Capabilities, Plugin, RenderError, RenderPlugin, StageContext};
use crate::templates::TemplateEngine;
use std::sync::Arc;

/// Renders `raw` into `body`, through the content cache when one is set.
pub struct MarkdownRender;

impl RenderPlugin for MarkdownRender {
    fn render(&self, doc: &mut Document, ctx: &StageContext<'_>) -> Result<(), RenderError> {
        let settings = &ctx.config.markdown;
        let Some(cache) = ctx.cache else {
            doc.body = Some(markdown::to_html(&doc.raw, settings));
            return Ok(());
        };

        let fingerprint = markdown_fingerprint(settings);
        let key = cache_key("markdown", &[doc.raw.as_bytes(), fingerprint.as_slice()]);
        let html = match cache.get(&key) {
            Some(html) => html,
            None => {
                let html = markdown::to_html(&doc.raw, settings);
                cache.put(&key, html.clone());
                html
            }
        };
        doc.body = Some(html);
        Ok(())
    }
}

impl Plugin for MarkdownRender {
    fn name(&self) -> &str {
        "markdown"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().render(self)
    }
}

/// Wraps `body` in the document's template, producing `page`.
pub struct Templates {
    engine: Arc<dyn TemplateEngine>,
}

impl Templates {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }
}

impl RenderPlugin for Templates {
    fn render(&self, doc: &mut Document, ctx: &StageContext<'_>) -> Result<(), RenderError> {
        let page = self
            .engine
            .render_document(&doc.template, doc, ctx.config)?;
        doc.page = Some(page);
        Ok(())
    }
}

impl Plugin for Templates {
    fn name(&self) -> &str {
        "templates"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().render(self)
    }
}
