//! Transform plugins: derived document fields.

use crate::document::Document;
use crate::markdown;
use crate::naming::{slugify, split_stem};
use crate::plugin::{Capabilities, Plugin, StageContext, TransformError, TransformPlugin};
use std::path::Component;
use std::sync::Arc;

/// Final slug and site-relative URL.
///
/// An explicit frontmatter slug is sanitized as given; otherwise the file
/// stem is used without its `NNN-` prefix. Directories become URL segments
/// the same way. An `index` file takes its directory's URL:
///
/// - `posts/010-hello.md` → `/posts/hello/`
/// - `posts/index.md` → `/posts/`
/// - `index.md` → `/`
pub struct SlugUrl;

impl TransformPlugin for SlugUrl {
    fn transform(&self, doc: &mut Document, _: &StageContext<'_>) -> Result<(), TransformError> {
        let explicit = doc.has_explicit_slug();
        let source = if explicit {
            doc.slug.clone()
        } else {
            split_stem(&doc.stem()).name.to_string()
        };

        let mut segments: Vec<String> = doc
            .path()
            .parent()
            .into_iter()
            .flat_map(|dir| dir.components())
            .filter_map(|c| match c {
                Component::Normal(name) => Some(slugify(split_stem(&name.to_string_lossy()).name)),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect();

        if !explicit && source.eq_ignore_ascii_case("index") {
            doc.slug = segments.last().cloned().unwrap_or_else(|| "index".to_string());
        } else {
            let slug = slugify(&source);
            if slug.is_empty() {
                return Err(TransformError::Failed(format!(
                    "'{source}' does not produce a usable slug"
                )));
            }
            doc.slug = slug.clone();
            segments.push(slug);
        }

        doc.url = Some(if segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", segments.join("/"))
        });
        Ok(())
    }
}

impl Plugin for SlugUrl {
    fn name(&self) -> &str {
        "slug_url"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().transform(self)
    }
}

/// Word count and reading time of the Markdown source.
pub struct ReadingTime;

impl TransformPlugin for ReadingTime {
    fn transform(&self, doc: &mut Document, ctx: &StageContext<'_>) -> Result<(), TransformError> {
        let words = markdown::word_count(&doc.raw);
        doc.word_count = Some(words);
        doc.reading_time = Some(markdown::reading_time(
            words,
            ctx.config.reading.words_per_minute,
        ));
        Ok(())
    }
}

impl Plugin for ReadingTime {
    fn name(&self) -> &str {
        "reading_time"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().transform(self)
    }
}

/// Uses the first paragraph as the description when frontmatter gives none.
pub struct DescriptionFallback {
    pub max_chars: usize,
}

impl Default for DescriptionFallback {
    fn default() -> Self {
        Self { max_chars: 200 }
    }
}

impl TransformPlugin for DescriptionFallback {
    fn transform(&self, doc: &mut Document, _: &StageContext<'_>) -> Result<(), TransformError> {
        if doc.description.is_none() {
            doc.description = markdown::first_paragraph(&doc.raw)
                .map(|text| markdown::truncate_words(&text, self.max_chars));
        }
        Ok(())
    }
}

impl Plugin for DescriptionFallback {
    fn name(&self) -> &str {
        "description"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().transform(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::document::Value;
    use std::collections::BTreeMap;

    fn run(plugin: &dyn TransformPlugin, doc: &mut Document) -> Result<(), TransformError> {
        let config = SiteConfig::default();
        let ctx = StageContext {
            config: &config,
            cache: None,
        };
        plugin.transform(doc, &ctx)
    }

    fn url_of(path: &str) -> (String, String) {
        let mut doc = Document::new(path, "");
        run(&SlugUrl, &mut doc).unwrap();
        (doc.slug, doc.url.unwrap())
    }

    // =========================================================================
    // SlugUrl
    // =========================================================================

    #[test]
    fn prefixes_are_stripped_from_files_and_dirs() {
        assert_eq!(
            url_of("010-Posts/020-Hello World.md"),
            ("hello-world".into(), "/posts/hello-world/".into())
        );
    }

    #[test]
    fn index_files_take_the_directory_url() {
        assert_eq!(url_of("index.md"), ("index".into(), "/".into()));
        assert_eq!(url_of("docs/index.md"), ("docs".into(), "/docs/".into()));
    }

    #[test]
    fn explicit_slug_is_sanitized() {
        let mut doc = Document::new("posts/a.md", "");
        doc.set_slug("My Custom Slug!");
        run(&SlugUrl, &mut doc).unwrap();
        assert_eq!(doc.slug, "my-custom-slug");
        assert_eq!(doc.url.as_deref(), Some("/posts/my-custom-slug/"));
    }

    #[test]
    fn frontmatter_slug_equal_to_stem_keeps_its_prefix() {
        let mut fields = BTreeMap::new();
        fields.insert("slug".to_string(), Value::String("010-hello".into()));
        let mut doc = Document::from_fields("posts/010-hello.md", "", fields).unwrap();
        run(&SlugUrl, &mut doc).unwrap();
        assert_eq!(doc.slug, "010-hello");
        assert_eq!(doc.url.as_deref(), Some("/posts/010-hello/"));

        let mut derived = Document::new("posts/010-hello.md", "");
        run(&SlugUrl, &mut derived).unwrap();
        assert_eq!(derived.url.as_deref(), Some("/posts/hello/"));
    }

    #[test]
    fn unusable_slug_fails_the_document() {
        let mut doc = Document::new("a.md", "");
        doc.set_slug("!!!");
        assert!(run(&SlugUrl, &mut doc).is_err());
    }

    // =========================================================================
    // ReadingTime / DescriptionFallback
    // =========================================================================

    #[test]
    fn reading_time_uses_configured_speed() {
        let words = vec!["word"; 450].join(" ");
        let mut doc = Document::new("a.md", words);
        run(&ReadingTime, &mut doc).unwrap();
        assert_eq!(doc.word_count, Some(450));
        assert_eq!(doc.reading_time, Some(3));
    }

    #[test]
    fn description_from_first_paragraph() {
        let mut doc = Document::new("a.md", "# Title\n\nIntro text here.\n\nMore.");
        run(&DescriptionFallback::default(), &mut doc).unwrap();
        assert_eq!(doc.description.as_deref(), Some("Intro text here."));
    }

    #[test]
    fn explicit_description_is_kept() {
        let mut doc = Document::new("a.md", "Paragraph.");
        doc.description = Some("Given".into());
        run(&DescriptionFallback::default(), &mut doc).unwrap();
        assert_eq!(doc.description.as_deref(), Some("Given"));
    }
}
