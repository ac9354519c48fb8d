//! Feed serializers.
//!
//! Pure functions from a built [`Feed`] (plus site metadata) to bytes. None
//! of them paginate: every format carries the feed's full item sequence, in
//! feed order.
//!
//! | Format | Function | Notes |
//! |--------|----------|-------|
//! | RSS 2.0 | [`rss`] | `rss` crate builders |
//! | Atom 1.0 | [`atom`] | written with quick-xml |
//! | JSON Feed 1.1 | [`json_feed`] | serde_json |
//! | Sitemap 0.9 | [`sitemap`] | written with quick-xml |
//!
//! Links are absolute, built from `base_url` and each document's URL.
//! Documents without a URL are skipped.

use crate::config::SiteConfig;
use crate::document::Document;
use crate::feed::{Feed, OutputFormat};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, ItemBuilder};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";
const GENERATOR: &str = "galley";

#[derive(Error, Debug)]
pub enum SyndicationError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A document that has a public URL, with that URL made absolute.
struct Linked<'a> {
    doc: &'a Document,
    url: String,
}

fn linked<'a>(items: &'a [Arc<Document>], site: &SiteConfig) -> Vec<Linked<'a>> {
    items
        .iter()
        .filter_map(|doc| {
            let url = site.absolute_url(doc.url.as_deref()?);
            Some(Linked { doc, url })
        })
        .collect()
}

fn feed_description(feed: &Feed, site: &SiteConfig) -> String {
    feed.config
        .description
        .clone()
        .unwrap_or_else(|| site.description.clone())
}

/// Newest item date, or the epoch for an undated feed so output stays stable.
fn last_updated(feed: &Feed) -> DateTime<Utc> {
    feed.items()
        .iter()
        .filter_map(|doc| doc.date)
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// =============================================================================
// RSS
// =============================================================================

pub fn rss(feed: &Feed, site: &SiteConfig) -> Result<Vec<u8>, SyndicationError> {
    let items: Vec<rss::Item> = linked(feed.items(), site)
        .into_iter()
        .map(|Linked { doc, url }| {
            let categories = doc
                .tags()
                .iter()
                .map(|tag| CategoryBuilder::default().name(tag.clone()).build())
                .collect::<Vec<_>>();
            ItemBuilder::default()
                .title(Some(doc.display_title().to_string()))
                .link(Some(url.clone()))
                .guid(Some(GuidBuilder::default().permalink(true).value(url).build()))
                .description(doc.description.clone())
                .pub_date(doc.date.map(|d| d.to_rfc2822()))
                .categories(categories)
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(format!("{} | {}", feed.title(), site.title))
        .link(site.absolute_url(&feed.page_url(1)))
        .description(feed_description(feed, site))
        .language(Some(site.language.clone()))
        .generator(Some(GENERATOR.to_string()))
        .last_build_date(Some(last_updated(feed).to_rfc2822()))
        .items(items)
        .build();
    Ok(channel.to_string().into_bytes())
}

// =============================================================================
// XML helpers
// =============================================================================

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn xml_writer() -> Result<XmlWriter, SyndicationError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), SyndicationError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn link_element(
    writer: &mut XmlWriter,
    href: &str,
    rel: Option<&str>,
) -> Result<(), SyndicationError> {
    let mut link = BytesStart::new("link");
    if let Some(rel) = rel {
        link.push_attribute(("rel", rel));
    }
    link.push_attribute(("href", href));
    writer.write_event(Event::Empty(link))?;
    Ok(())
}

// =============================================================================
// Atom
// =============================================================================

pub fn atom(feed: &Feed, site: &SiteConfig) -> Result<Vec<u8>, SyndicationError> {
    let mut writer = xml_writer()?;
    let feed_url = site.absolute_url(&feed.output_url(OutputFormat::Atom));

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(root))?;

    text_element(&mut writer, "id", &feed_url)?;
    text_element(&mut writer, "title", &format!("{} | {}", feed.title(), site.title))?;
    let subtitle = feed_description(feed, site);
    if !subtitle.is_empty() {
        text_element(&mut writer, "subtitle", &subtitle)?;
    }
    text_element(&mut writer, "updated", &last_updated(feed).to_rfc3339())?;
    link_element(&mut writer, &feed_url, Some("self"))?;
    link_element(&mut writer, &site.absolute_url(&feed.page_url(1)), Some("alternate"))?;
    if !site.author.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("author")))?;
        text_element(&mut writer, "name", &site.author)?;
        writer.write_event(Event::End(BytesEnd::new("author")))?;
    }
    text_element(&mut writer, "generator", GENERATOR)?;

    for Linked { doc, url } in linked(feed.items(), site) {
        writer.write_event(Event::Start(BytesStart::new("entry")))?;
        text_element(&mut writer, "id", &url)?;
        text_element(&mut writer, "title", doc.display_title())?;
        link_element(&mut writer, &url, None)?;
        let updated = doc.date.unwrap_or(DateTime::<Utc>::UNIX_EPOCH).to_rfc3339();
        text_element(&mut writer, "updated", &updated)?;
        if let Some(date) = doc.date {
            text_element(&mut writer, "published", &date.to_rfc3339())?;
        }
        if let Some(summary) = &doc.description {
            text_element(&mut writer, "summary", summary)?;
        }
        for tag in doc.tags() {
            let mut category = BytesStart::new("category");
            category.push_attribute(("term", tag.as_str()));
            writer.write_event(Event::Empty(category))?;
        }
        if let Some(body) = &doc.body {
            let mut content = BytesStart::new("content");
            content.push_attribute(("type", "html"));
            writer.write_event(Event::Start(content))?;
            writer.write_event(Event::Text(BytesText::new(body)))?;
            writer.write_event(Event::End(BytesEnd::new("content")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("entry")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("feed")))?;
    Ok(writer.into_inner().into_inner())
}

// =============================================================================
// JSON Feed
// =============================================================================

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    home_page_url: Option<String>,
    feed_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    language: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<JsonAuthor<'a>>,
    items: Vec<JsonItem<'a>>,
}

#[derive(Serialize)]
struct JsonAuthor<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct JsonItem<'a> {
    id: String,
    url: String,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<String>,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

pub fn json_feed(feed: &Feed, site: &SiteConfig) -> Result<Vec<u8>, SyndicationError> {
    let items = linked(feed.items(), site)
        .into_iter()
        .map(|Linked { doc, url }| JsonItem {
            id: url.clone(),
            url,
            title: doc.display_title(),
            content_html: doc.body.as_deref(),
            summary: doc.description.as_deref(),
            date_published: doc.date.map(|d| d.to_rfc3339()),
            tags: doc.tags(),
        })
        .collect();

    let json = JsonFeed {
        version: JSON_FEED_VERSION,
        title: format!("{} | {}", feed.title(), site.title),
        home_page_url: Some(site.absolute_url(&feed.page_url(1))),
        feed_url: site.absolute_url(&feed.output_url(OutputFormat::Json)),
        description: feed_description(feed, site),
        language: &site.language,
        authors: if site.author.is_empty() {
            Vec::new()
        } else {
            vec![JsonAuthor { name: &site.author }]
        },
        items,
    };
    Ok(serde_json::to_vec_pretty(&json)?)
}

// =============================================================================
// Sitemap
// =============================================================================

/// One `<url>` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
}

impl SitemapEntry {
    /// Entry for a document, if it has a URL.
    pub fn for_document(doc: &Document, site: &SiteConfig) -> Option<Self> {
        Some(Self {
            loc: site.absolute_url(doc.url.as_deref()?),
            lastmod: doc.date,
        })
    }
}

/// Sitemap listing the documents of one feed.
pub fn feed_sitemap(feed: &Feed, site: &SiteConfig) -> Result<Vec<u8>, SyndicationError> {
    let entries: Vec<SitemapEntry> = feed
        .items()
        .iter()
        .filter_map(|doc| SitemapEntry::for_document(doc, site))
        .collect();
    sitemap(&entries)
}

pub fn sitemap(entries: &[SitemapEntry]) -> Result<Vec<u8>, SyndicationError> {
    let mut writer = xml_writer()?;
    let mut root = BytesStart::new("urlset");
    root.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(root))?;
    for entry in entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        text_element(&mut writer, "loc", &entry.loc)?;
        if let Some(lastmod) = entry.lastmod {
            text_element(&mut writer, "lastmod", &lastmod.format("%Y-%m-%d").to_string())?;
        }
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("urlset")))?;
    Ok(writer.into_inner().into_inner())
}

/// Serialize `feed` in a non-HTML `format`. HTML pages go through the
/// template engine instead.
pub fn serialize(
    feed: &Feed,
    format: OutputFormat,
    site: &SiteConfig,
) -> Option<Result<Vec<u8>, SyndicationError>> {
    match format {
        OutputFormat::Html => None,
        OutputFormat::Rss => Some(rss(feed, site)),
        OutputFormat::Atom => Some(atom(feed, site)),
        OutputFormat::Json => Some(json_feed(feed, site)),
        OutputFormat::Sitemap => Some(feed_sitemap(feed, site)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::document::parse_date;
    use crate::test_helpers::doc_with;

    fn site() -> SiteConfig {
        SiteConfig {
            title: "Site".into(),
            base_url: "https://example.com/".into(),
            author: "Ada".into(),
            ..SiteConfig::default()
        }
    }

    fn blog() -> Feed {
        let items = vec![
            Arc::new(doc_with("b.md", |d| {
                d.title = Some("B & B".into());
                d.url = Some("/b/".into());
                d.date = parse_date("2024-01-02");
                d.body = Some("<p>two</p>".into());
                d.set_tags(["rust"]);
            })),
            Arc::new(doc_with("a.md", |d| {
                d.title = Some("A".into());
                d.url = Some("/a/".into());
                d.date = parse_date("2024-01-01");
            })),
            Arc::new(doc_with("draft.md", |d| d.url = None)),
        ];
        Feed::new(FeedConfig::new("blog"), items)
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn rss_lists_linked_items_in_order() {
        let xml = text(rss(&blog(), &site()).unwrap());
        let b = xml.find("https://example.com/b/").unwrap();
        let a = xml.find("https://example.com/a/").unwrap();
        assert!(b < a);
        assert!(xml.contains("B &amp; B"));
        assert!(xml.contains("<category>rust</category>"));
        assert_eq!(xml.matches("<item>").count(), 2);
    }

    #[test]
    fn atom_has_self_link_and_escaped_content() {
        let xml = text(atom(&blog(), &site()).unwrap());
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"href="https://example.com/blog/atom.xml""#));
        assert!(xml.contains("&lt;p&gt;two&lt;/p&gt;"));
        assert!(xml.contains("<updated>2024-01-02T00:00:00+00:00</updated>"));
        assert_eq!(xml.matches("<entry>").count(), 2);
    }

    #[test]
    fn json_feed_shape() {
        let json: serde_json::Value =
            serde_json::from_slice(&json_feed(&blog(), &site()).unwrap()).unwrap();
        assert_eq!(json["version"], JSON_FEED_VERSION);
        assert_eq!(json["feed_url"], "https://example.com/blog/feed.json");
        let items = json["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "https://example.com/b/");
        assert_eq!(items[0]["tags"][0], "rust");
        assert!(items[1].get("tags").is_none());
    }

    #[test]
    fn sitemap_entries() {
        let xml = text(feed_sitemap(&blog(), &site()).unwrap());
        assert!(xml.contains(SITEMAP_NS));
        assert!(xml.contains("<loc>https://example.com/a/</loc>"));
        assert!(xml.contains("<lastmod>2024-01-01</lastmod>"));
    }

    #[test]
    fn empty_feed_is_still_valid_output() {
        let feed = Feed::new(FeedConfig::new("empty"), Vec::new());
        for format in [OutputFormat::Rss, OutputFormat::Atom, OutputFormat::Json, OutputFormat::Sitemap] {
            let bytes = serialize(&feed, format, &site()).unwrap().unwrap();
            assert!(!bytes.is_empty());
        }
        assert!(serialize(&feed, OutputFormat::Html, &site()).is_none());
    }

    #[test]
    fn output_is_deterministic() {
        let a = atom(&blog(), &site()).unwrap();
        let b = atom(&blog(), &site()).unwrap();
        assert_eq!(a, b);
    }
}
