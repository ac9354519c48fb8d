//! Markdown loading.

use crate::document::Document;
use crate::frontmatter;
use crate::naming::title_from_stem;
use crate::plugin::{Capabilities, LoadError, LoadPlugin, Plugin, StageContext};
use std::path::Path;
use std::sync::Arc;

const EXTENSIONS: &[&str] = &["md", "markdown"];

/// Turns `.md` / `.markdown` files into documents. Anything else is left
/// for other loaders.
pub struct MarkdownLoader;

impl LoadPlugin for MarkdownLoader {
    fn load(&self, path: &Path, ctx: &StageContext<'_>) -> Result<Option<Document>, LoadError> {
        let is_markdown = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)));
        if !is_markdown {
            return Ok(None);
        }

        let source = std::fs::read_to_string(ctx.config.content_dir.join(path))?;
        let parsed = frontmatter::parse(&source)?;
        let mut doc = Document::from_fields(path, parsed.body, parsed.fields)?;
        if doc.title.is_none() {
            doc.title = Some(title_from_stem(&doc.stem()));
        }
        Ok(Some(doc))
    }
}

impl Plugin for MarkdownLoader {
    fn name(&self) -> &str {
        "markdown_loader"
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().load(self)
    }
}
