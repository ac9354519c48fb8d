//! Write plugins for documents, feeds and the site map.

use crate::feed::{Feed, OutputFormat};
use crate::plugin::{Artifact, ArtifactItem, Capabilities, Plugin, WriteContext, WriteError, WritePlugin};
use crate::syndication::{self, SitemapEntry};
use crate::templates::TemplateEngine;
use std::path::PathBuf;
use std::sync::Arc;

/// Output path for a site-relative URL: `/a/b/` → `a/b/index.html`.
fn index_path(url: &str) -> PathBuf {
    let mut path: PathBuf = url
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    path.push("index.html");
    path
}

fn feed_at<'a>(ctx: &WriteContext<'a>, index: usize) -> Result<&'a Feed, WriteError> {
    ctx.feeds
        .iter()
        .nth(index)
        .ok_or_else(|| WriteError::Unsupported(PathBuf::from(format!("feed #{index}"))))
}

// =============================================================================
// Documents
// =============================================================================

/// One `index.html` per published document, at the document's URL.
/// Drafts stay out of the output but remain visible to feed filters.
pub struct PublishHtml;

impl WritePlugin for PublishHtml {
    fn artifacts(&self, ctx: &WriteContext<'_>) -> Result<Vec<Artifact>, WriteError> {
        Ok(ctx
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| !doc.draft)
            .filter_map(|(i, doc)| {
                let url = doc.url.as_deref()?;
                Some(Artifact::new(index_path(url), ArtifactItem::Document(i)))
            })
            .collect())
    }

    fn write(&self, artifact: &Artifact, ctx: &WriteContext<'_>) -> Result<Vec<u8>, WriteError> {
        let ArtifactItem::Document(index) = artifact.item else {
            return Err(WriteError::Unsupported(artifact.path.clone()));
        };
        let doc = ctx
            .documents
            .get(index)
            .ok_or_else(|| WriteError::Unsupported(artifact.path.clone()))?;
        let html = doc
            .page
            .as_deref()
            .or(doc.body.as_deref())
            .unwrap_or_default();
        Ok(html.as_bytes().to_vec())
    }
}

impl Plugin for PublishHtml {
    fn name(&self) -> &str {
        "publish_html"
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().write(self)
    }
}

// =============================================================================
// Feeds
// =============================================================================

/// Every page and format of every built feed.
pub struct PublishFeeds {
    engine: Arc<dyn TemplateEngine>,
}

impl PublishFeeds {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }
}

impl WritePlugin for PublishFeeds {
    fn artifacts(&self, ctx: &WriteContext<'_>) -> Result<Vec<Artifact>, WriteError> {
        let mut artifacts = Vec::new();
        for (index, feed) in ctx.feeds.iter().enumerate() {
            for &format in &feed.config.formats {
                if format == OutputFormat::Html {
                    artifacts.extend(feed.pages().iter().enumerate().map(|(page, p)| {
                        Artifact::new(
                            feed.page_path(p.number),
                            ArtifactItem::FeedPage { feed: index, page },
                        )
                    }));
                } else {
                    artifacts.push(Artifact::new(
                        feed.output_path(format),
                        ArtifactItem::Feed {
                            feed: index,
                            format,
                        },
                    ));
                }
            }
        }
        Ok(artifacts)
    }

    fn write(&self, artifact: &Artifact, ctx: &WriteContext<'_>) -> Result<Vec<u8>, WriteError> {
        match artifact.item {
            ArtifactItem::FeedPage { feed, page } => {
                let feed = feed_at(ctx, feed)?;
                let page = feed
                    .pages()
                    .get(page)
                    .ok_or_else(|| WriteError::Unsupported(artifact.path.clone()))?;
                let html = self
                    .engine
                    .render_feed_page(&feed.config.template, feed, page, ctx.config)?;
                Ok(html.into_bytes())
            }
            ArtifactItem::Feed { feed, format } => {
                let feed = feed_at(ctx, feed)?;
                match syndication::serialize(feed, format, ctx.config) {
                    Some(bytes) => Ok(bytes?),
                    None => Err(WriteError::Unsupported(artifact.path.clone())),
                }
            }
            _ => Err(WriteError::Unsupported(artifact.path.clone())),
        }
    }
}

impl Plugin for PublishFeeds {
    fn name(&self) -> &str {
        "publish_feeds"
    }

    fn priority(&self) -> i32 {
        110
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().write(self)
    }
}

// =============================================================================
// Sitemap
// =============================================================================

const SITEMAP_FILE: &str = "sitemap.xml";

/// Site-wide `sitemap.xml`: every published document plus the first page of
/// every HTML feed.
pub struct Sitemap;

impl WritePlugin for Sitemap {
    fn artifacts(&self, _: &WriteContext<'_>) -> Result<Vec<Artifact>, WriteError> {
        Ok(vec![Artifact::new(SITEMAP_FILE, ArtifactItem::Site)])
    }

    fn write(&self, _: &Artifact, ctx: &WriteContext<'_>) -> Result<Vec<u8>, WriteError> {
        let documents = ctx
            .documents
            .iter()
            .filter(|doc| !doc.draft)
            .filter_map(|doc| SitemapEntry::for_document(doc, ctx.config));
        let feeds = ctx
            .feeds
            .iter()
            .filter(|feed| feed.config.formats.contains(&OutputFormat::Html))
            .map(|feed| SitemapEntry {
                loc: ctx.config.absolute_url(&feed.page_url(1)),
                lastmod: None,
            });
        let entries: Vec<SitemapEntry> = documents.chain(feeds).collect();
        Ok(syndication::sitemap(&entries)?)
    }
}

impl Plugin for Sitemap {
    fn name(&self) -> &str {
        "sitemap"
    }

    fn priority(&self) -> i32 {
        120
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().write(self)
    }
}
