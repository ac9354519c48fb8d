//! Feed engine: select, sort, paginate.
//!
//! A feed is rebuilt from scratch on every build:
//!
//! 1. **Select**: run the feed's [`Filter`] over every document in parallel,
//!    keeping discovery order.
//! 2. **Sort**: stable sort by the configured key (see [`SortKey`]). `reverse`
//!    flips the key comparison only; equal keys stay in ascending path order.
//! 3. **Paginate**: split into [`FeedPage`]s for HTML output. Syndication
//!    formats always carry the full sequence.
//!
//! Serialization is not done here. Write-stage plugins turn a [`Feed`] into
//! bytes through [`crate::templates`] and [`crate::syndication`].
//!
//! ## Output Paths
//!
//! ```text
//! <slug>/index.html            page 1
//! <slug>/page/<n>/index.html   page n >= 2
//! <slug>/rss.xml  <slug>/atom.xml  <slug>/feed.json  <slug>/sitemap.xml
//! ```

mod paginate;
mod sort;

pub use paginate::{FeedPage, paginate};
pub use sort::{SortKey, sort_documents};

use crate::config::FeedConfig;
use crate::document::Document;
use crate::filter::{Filter, FilterError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Rss,
    Atom,
    Json,
    Sitemap,
}

impl OutputFormat {
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Rss => "rss",
            OutputFormat::Atom => "atom",
            OutputFormat::Json => "json",
            OutputFormat::Sitemap => "sitemap",
        }
    }

    /// File name inside the feed directory.
    pub fn file_name(self) -> &'static str {
        match self {
            OutputFormat::Html => "index.html",
            OutputFormat::Rss => "rss.xml",
            OutputFormat::Atom => "atom.xml",
            OutputFormat::Json => "feed.json",
            OutputFormat::Sitemap => "sitemap.xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectError {
    #[error("feed name '{0}' is defined more than once")]
    FeedNameConflict(String),
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),
    #[error("{0}")]
    Failed(String),
}

/// A selected, sorted and paginated view over documents.
#[derive(Debug, Clone)]
pub struct Feed {
    pub config: FeedConfig,
    slug: String,
    items: Vec<Arc<Document>>,
    pages: Vec<FeedPage>,
}

impl Feed {
    /// Wrap already sorted items and compute the page boundaries.
    pub fn new(config: FeedConfig, items: Vec<Arc<Document>>) -> Self {
        let slug = config.effective_slug();
        let pages = paginate(items.len(), config.items_per_page);
        Self {
            config,
            slug,
            items,
            pages,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn title(&self) -> &str {
        self.config.title.as_deref().unwrap_or(&self.config.name)
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Every selected document in feed order.
    pub fn items(&self) -> &[Arc<Document>] {
        &self.items
    }

    pub fn pages(&self) -> &[FeedPage] {
        &self.pages
    }

    pub fn page_items(&self, page: &FeedPage) -> &[Arc<Document>] {
        &self.items[page.range.clone()]
    }

    fn dir(&self) -> PathBuf {
        PathBuf::from(&self.slug)
    }

    /// Output path of HTML page `number`, relative to the output directory.
    pub fn page_path(&self, number: usize) -> PathBuf {
        if number <= 1 {
            self.dir().join(OutputFormat::Html.file_name())
        } else {
            self.dir()
                .join("page")
                .join(number.to_string())
                .join(OutputFormat::Html.file_name())
        }
    }

    /// Site-relative URL of HTML page `number`.
    pub fn page_url(&self, number: usize) -> String {
        let base = if self.slug.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", self.slug)
        };
        if number <= 1 {
            base
        } else {
            format!("{base}page/{number}/")
        }
    }

    /// Output path of a non-paginated format.
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        self.dir().join(format.file_name())
    }

    pub fn output_url(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Html => self.page_url(1),
            other => format!("{}{}", self.page_url(1), other.file_name()),
        }
    }
}

/// Keep the documents `filter` accepts, in their original order.
pub fn select(filter: &Filter, documents: &[Arc<Document>]) -> Vec<Arc<Document>> {
    documents
        .par_iter()
        .filter(|doc| filter.matches(doc))
        .cloned()
        .collect()
}

/// Select, sort and paginate one feed.
pub fn build_feed(config: &FeedConfig, documents: &[Arc<Document>]) -> Result<Feed, FilterError> {
    let filter = Filter::parse(&config.filter)?;
    let mut items = select(&filter, documents);
    let key = config.sort.as_deref().map(SortKey::parse);
    sort_documents(&mut items, key.as_ref(), config.reverse);
    Ok(Feed::new(config.clone(), items))
}

/// The feeds built during Collect, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct FeedSet {
    feeds: Vec<Feed>,
}

impl FeedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feed. A second feed with the same name is rejected.
    pub fn insert(&mut self, feed: Feed) -> Result<(), CollectError> {
        if self.contains(feed.name()) {
            return Err(CollectError::FeedNameConflict(feed.name().to_string()));
        }
        self.feeds.push(feed);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.feeds.iter().any(|f| f.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.name() == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feed> {
        self.feeds.iter()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl<'a> IntoIterator for &'a FeedSet {
    type Item = &'a Feed;
    type IntoIter = std::slice::Iter<'a, Feed>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
