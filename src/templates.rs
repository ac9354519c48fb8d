//! HTML layouts.
//!
//! Rendering goes through the [`TemplateEngine`] trait so Render and Write
//! plugins can be handed any engine. The built-in [`MaudTemplates`] knows
//! three templates:
//!
//! | Template | Used for |
//! |----------|----------|
//! | `post` | Dated article with tags and reading time |
//! | `page` | Plain standalone page |
//! | `feed` | One page of a feed listing, with prev/next links |
//!
//! Maud escapes every interpolated value; only the Markdown `body` is
//! inserted pre-escaped.

use crate::config::SiteConfig;
use crate::document::Document;
use crate::feed::{Feed, FeedPage};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("unknown template '{0}'")]
    Unknown(String),
    #[error("'{0}' has no rendered body")]
    MissingBody(String),
}

pub trait TemplateEngine: Send + Sync {
    /// Render a full page for one document.
    fn render_document(
        &self,
        template: &str,
        doc: &Document,
        site: &SiteConfig,
    ) -> Result<String, TemplateError>;

    /// Render one HTML page of a feed listing.
    fn render_feed_page(
        &self,
        template: &str,
        feed: &Feed,
        page: &FeedPage,
        site: &SiteConfig,
    ) -> Result<String, TemplateError>;
}

const CSS: &str = "\
:root{--fg:#1b1b1b;--muted:#666;--bg:#fff;--accent:#2a5db0}\
@media (prefers-color-scheme:dark){:root{--fg:#e8e8e8;--muted:#999;--bg:#121212;--accent:#8ab4f8}}\
body{max-width:42rem;margin:0 auto;padding:2rem 1rem;font:1.05rem/1.6 system-ui,sans-serif;color:var(--fg);background:var(--bg)}\
a{color:var(--accent)}\
.site-header{display:flex;justify-content:space-between;margin-bottom:2rem}\
.meta,.tags,.pagination{color:var(--muted);font-size:.9rem}\
.tags a{margin-right:.5rem}\
.feed-items{list-style:none;padding:0}\
.feed-items li{margin-bottom:1.5rem}\
.pagination{display:flex;justify-content:space-between;margin-top:2rem}";

/// The built-in Maud layouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaudTemplates;

impl TemplateEngine for MaudTemplates {
    fn render_document(
        &self,
        template: &str,
        doc: &Document,
        site: &SiteConfig,
    ) -> Result<String, TemplateError> {
        let body = doc
            .body
            .as_deref()
            .ok_or_else(|| TemplateError::MissingBody(doc.path().display().to_string()))?;
        let content = match template {
            "post" => render_post(doc, body),
            "page" => render_page(doc, body),
            other => return Err(TemplateError::Unknown(other.to_string())),
        };
        let title = format!("{} | {}", doc.display_title(), site.title);
        Ok(base_document(site, &title, doc.description.as_deref(), template, content).into_string())
    }

    fn render_feed_page(
        &self,
        template: &str,
        feed: &Feed,
        page: &FeedPage,
        site: &SiteConfig,
    ) -> Result<String, TemplateError> {
        if template != "feed" {
            return Err(TemplateError::Unknown(template.to_string()));
        }
        let title = if page.number > 1 {
            format!("{} (page {}) | {}", feed.title(), page.number, site.title)
        } else {
            format!("{} | {}", feed.title(), site.title)
        };
        let content = render_feed_listing(feed, page);
        Ok(base_document(
            site,
            &title,
            feed.config.description.as_deref(),
            "feed",
            content,
        )
        .into_string())
    }
}

fn base_document(
    site: &SiteConfig,
    title: &str,
    description: Option<&str>,
    body_class: &str,
    content: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(site.language) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @if let Some(description) = description {
                    meta name="description" content=(description);
                }
                style { (PreEscaped(CSS)) }
            }
            body class=(body_class) {
                (site_header(site))
                main { (content) }
            }
        }
    }
}

fn site_header(site: &SiteConfig) -> Markup {
    html! {
        header.site-header {
            a.site-title href="/" { (site.title) }
            @if !site.author.is_empty() {
                span.site-author { (site.author) }
            }
        }
    }
}

fn post_meta(doc: &Document) -> Markup {
    html! {
        p.meta {
            @if let Some(date) = doc.date {
                time datetime=(date.to_rfc3339()) { (date.format("%B %-d, %Y").to_string()) }
            }
            @if let Some(minutes) = doc.reading_time {
                " · " (minutes) " min read"
            }
        }
    }
}

fn render_post(doc: &Document, body: &str) -> Markup {
    html! {
        article.post {
            h1 { (doc.display_title()) }
            (post_meta(doc))
            div.content { (PreEscaped(body)) }
            @if !doc.tags().is_empty() {
                p.tags {
                    @for tag in doc.tags() {
                        span.tag { "#" (tag) " " }
                    }
                }
            }
        }
    }
}

fn render_page(doc: &Document, body: &str) -> Markup {
    html! {
        article.page {
            h1 { (doc.display_title()) }
            div.content { (PreEscaped(body)) }
        }
    }
}

fn render_feed_listing(feed: &Feed, page: &FeedPage) -> Markup {
    html! {
        h1 { (feed.title()) }
        @if let Some(description) = &feed.config.description {
            p.feed-description { (description) }
        }
        ul.feed-items {
            @for doc in feed.page_items(page) {
                li {
                    a href=(doc.url.as_deref().unwrap_or("#")) { (doc.display_title()) }
                    (post_meta(doc))
                    @if let Some(description) = &doc.description {
                        p.summary { (description) }
                    }
                }
            }
        }
        @if page.has_prev() || page.has_next() {
            nav.pagination {
                @if page.has_prev() {
                    a rel="prev" href=(feed.page_url(page.number - 1)) { "← Newer" }
                } @else {
                    span {}
                }
                span { "Page " (page.number) " of " (page.total_pages) }
                @if page.has_next() {
                    a rel="next" href=(feed.page_url(page.number + 1)) { "Older →" }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::document::parse_date;
    use crate::test_helpers::doc_with;
    use std::sync::Arc;

    fn rendered(path: &str, title: &str) -> Document {
        doc_with(path, |d| {
            d.title = Some(title.into());
            d.body = Some("<p>Hello <em>there</em></p>".into());
            d.url = Some(format!("/{}/", d.slug));
            d.date = parse_date("2024-03-05");
            d.reading_time = Some(2);
            d.set_tags(["rust"]);
        })
    }

    #[test]
    fn post_template_wraps_body() {
        let doc = rendered("hello.md", "Hello");
        let html = MaudTemplates
            .render_document("post", &doc, &SiteConfig::default())
            .unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Hello | My Site</title>"));
        assert!(html.contains("<p>Hello <em>there</em></p>"));
        assert!(html.contains("March 5, 2024"));
        assert!(html.contains("2 min read"));
        assert!(html.contains("#rust"));
    }

    #[test]
    fn page_template_has_no_meta() {
        let doc = rendered("about.md", "About");
        let html = MaudTemplates
            .render_document("page", &doc, &SiteConfig::default())
            .unwrap();
        assert!(html.contains(r#"class="page""#));
        assert!(!html.contains("min read"));
    }

    #[test]
    fn unknown_template_errors() {
        let doc = rendered("a.md", "A");
        let err = MaudTemplates
            .render_document("gallery", &doc, &SiteConfig::default())
            .unwrap_err();
        assert_eq!(err, TemplateError::Unknown("gallery".into()));
    }

    #[test]
    fn missing_body_errors() {
        let doc = Document::new("a.md", "");
        let err = MaudTemplates
            .render_document("post", &doc, &SiteConfig::default())
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingBody(_)));
    }

    #[test]
    fn titles_are_escaped() {
        let doc = rendered("x.md", "<script>alert('x')</script>");
        let html = MaudTemplates
            .render_document("post", &doc, &SiteConfig::default())
            .unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn feed_page_lists_items_and_pagination() {
        let items: Vec<_> = ["a.md", "b.md", "c.md"]
            .iter()
            .map(|p| Arc::new(rendered(p, p)))
            .collect();
        let mut config = FeedConfig::new("blog");
        config.items_per_page = 2;
        let feed = Feed::new(config, items);

        let first = MaudTemplates
            .render_feed_page("feed", &feed, &feed.pages()[0], &SiteConfig::default())
            .unwrap();
        assert!(first.contains(r#"href="/a/""#));
        assert!(first.contains(r#"href="/blog/page/2/""#));
        assert!(!first.contains(r#"rel="prev""#));

        let second = MaudTemplates
            .render_feed_page("feed", &feed, &feed.pages()[1], &SiteConfig::default())
            .unwrap();
        assert!(second.contains(r#"href="/c/""#));
        assert!(second.contains(r#"rel="prev" href="/blog/""#));
        assert!(second.contains("Page 2 of 2"));
    }

    #[test]
    fn single_page_feed_has_no_pagination() {
        let feed = Feed::new(FeedConfig::new("empty"), Vec::new());
        let html = MaudTemplates
            .render_feed_page("feed", &feed, &feed.pages()[0], &SiteConfig::default())
            .unwrap();
        assert!(!html.contains(r#"<nav class="pagination""#));
        assert!(!html.contains(r#"rel="prev""#));
        assert!(!html.contains(r#"rel="next""#));
    }
}
