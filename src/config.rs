//! Site configuration.
//!
//! Loads `config.toml` from the project root, merges it over the stock
//! defaults and validates the result. The merged value is handed to the
//! lifecycle once; Configure plugins may still adjust it, after which it is
//! frozen behind an `Arc` for the rest of the build.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! title = "My Site"
//! base_url = "https://example.com"
//! content_dir = "content"
//! output_dir = "dist"
//! static_dir = "static"
//!
//! [glob]
//! patterns = ["**/*.md"]
//! use_gitignore = true
//!
//! [processing]
//! concurrency = 4           # omit for auto = available parallelism
//!
//! [markdown]
//! tables = true
//! footnotes = true
//!
//! [[feeds]]
//! name = "blog"
//! filter = "published == true"
//! sort = "date"
//! reverse = true
//! items_per_page = 10
//! formats = ["html", "rss", "atom"]
//! ```
//!
//! Config files are sparse: override just the values you want. Tables merge
//! key by key; arrays (including `[[feeds]]`) replace the default outright.
//! Unknown keys are rejected to catch typos early.

use crate::feed::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("worker pool: {0}")]
    ThreadPool(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    /// Absolute site URL without a trailing slash. Used in feeds and sitemaps.
    pub base_url: String,
    pub author: String,
    pub language: String,
    pub content_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Copied verbatim into the output. Missing is fine.
    pub static_dir: PathBuf,
    pub glob: GlobConfig,
    pub processing: ProcessingConfig,
    pub markdown: MarkdownConfig,
    pub reading: ReadingConfig,
    pub cache: CacheConfig,
    pub plugins: PluginsConfig,
    pub feeds: Vec<FeedConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Site".to_string(),
            description: String::new(),
            base_url: "http://localhost:8000".to_string(),
            author: String::new(),
            language: "en".to_string(),
            content_dir: PathBuf::from("content"),
            output_dir: PathBuf::from("dist"),
            static_dir: PathBuf::from("static"),
            glob: GlobConfig::default(),
            processing: ProcessingConfig::default(),
            markdown: MarkdownConfig::default(),
            reading: ReadingConfig::default(),
            cache: CacheConfig::default(),
            plugins: PluginsConfig::default(),
            feeds: Vec::new(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// Feed filters and feed name uniqueness are not checked here; both are
    /// reported per feed when feeds are collected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reading.words_per_minute == 0 {
            return Err(ConfigError::Validation(
                "reading.words_per_minute must be greater than zero".into(),
            ));
        }
        if self.glob.patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "glob.patterns must not contain empty patterns".into(),
            ));
        }
        for (i, feed) in self.feeds.iter().enumerate() {
            if feed.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "feeds[{i}].name must not be empty"
                )));
            }
            if feed.formats.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "feed '{}' must list at least one format",
                    feed.name
                )));
            }
        }
        Ok(())
    }

    /// Site URL joined with a site-relative path.
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Content discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobConfig {
    /// Patterns relative to `content_dir`. Empty means the `**/*.md` default.
    pub patterns: Vec<String>,
    /// Honour `.gitignore` / `.ignore` files while walking.
    pub use_gitignore: bool,
}

impl Default for GlobConfig {
    fn default() -> Self {
        Self {
            patterns: vec![DEFAULT_GLOB_PATTERN.to_string()],
            use_gitignore: true,
        }
    }
}

pub const DEFAULT_GLOB_PATTERN: &str = "**/*.md";

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Worker pool size. When absent, defaults to the available parallelism.
    pub concurrency: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → available parallelism
/// - `Some(n)` → `n`, at least one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    match config.concurrency {
        Some(n) => n.max(1),
        None => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

/// Markdown extension toggles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    pub tables: bool,
    pub footnotes: bool,
    pub strikethrough: bool,
    pub tasklists: bool,
    pub smart_punctuation: bool,
    pub heading_attributes: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            tasklists: true,
            smart_punctuation: false,
            heading_attributes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadingConfig {
    pub words_per_minute: u32,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 200,
        }
    }
}

/// Render cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Relative paths are resolved against the project root.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".galley-cache"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginsConfig {
    /// Plugin names excluded from every stage.
    pub disabled: Vec<String>,
}

/// One `[[feeds]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Unique feed name.
    pub name: String,
    /// Output directory under `output_dir`. Defaults to the slugified name;
    /// an empty string places the feed at the site root.
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Filter expression. Empty selects every document.
    pub filter: String,
    /// Sort key. Unset keeps discovery order (path order).
    pub sort: Option<String>,
    /// Reverse the sort comparison. The path tie-break stays ascending.
    pub reverse: bool,
    /// Page size for HTML output. `<= 0` disables pagination.
    pub items_per_page: i64,
    pub formats: Vec<OutputFormat>,
    /// Template for HTML pages.
    pub template: String,
}

pub const DEFAULT_ITEMS_PER_PAGE: i64 = 10;

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            slug: None,
            title: None,
            description: None,
            filter: String::new(),
            sort: None,
            reverse: false,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            formats: vec![OutputFormat::Html],
            template: "feed".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The output directory slug, falling back to the slugified name.
    pub fn effective_slug(&self) -> String {
        match &self.slug {
            Some(slug) => slug.trim_matches('/').to_string(),
            None => crate::naming::slugify(&self.name),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` into `base`. Tables merge per key, any other
/// value (arrays included) replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `config.toml` from `dir`, if present.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config for the project rooted at `root`.
///
/// Relative directories in the result are resolved against `root`.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    let mut config = resolve_config(base, overlay)?;
    for dir in [
        &mut config.content_dir,
        &mut config.output_dir,
        &mut config.static_dir,
        &mut config.cache.dir,
    ] {
        if dir.is_relative() {
            *dir = root.join(&*dir);
        }
    }
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Galley Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

title = "My Site"
description = ""
# Absolute URL of the published site, used in feeds and the sitemap.
base_url = "http://localhost:8000"
author = ""
language = "en"

# Directories, relative to this file.
content_dir = "content"
output_dir = "dist"
static_dir = "static"

# ---------------------------------------------------------------------------
# Content discovery
# ---------------------------------------------------------------------------
[glob]
# Glob patterns relative to content_dir.
patterns = ["**/*.md"]
# Skip files matched by .gitignore / .ignore.
use_gitignore = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Worker pool size. Omit to use every available core.
# concurrency = 4

# ---------------------------------------------------------------------------
# Markdown extensions
# ---------------------------------------------------------------------------
[markdown]
tables = true
footnotes = true
strikethrough = true
tasklists = true
smart_punctuation = false
heading_attributes = false

[reading]
words_per_minute = 200

# ---------------------------------------------------------------------------
# Render cache
# ---------------------------------------------------------------------------
[cache]
enabled = true
dir = ".galley-cache"

# ---------------------------------------------------------------------------
# Plugins
# ---------------------------------------------------------------------------
[plugins]
# Built-in plugin names to switch off, e.g. ["sitemap", "static_assets"].
disabled = []

# ---------------------------------------------------------------------------
# Feeds
# ---------------------------------------------------------------------------
# Each [[feeds]] entry selects documents with a filter expression, sorts
# them and writes one or more formats: html, rss, atom, json, sitemap.
#
# [[feeds]]
# name = "blog"
# filter = "published == true and template == 'post'"
# sort = "date"            # date, title, word_count, reading_time, path,
#                          # slug, tags, tag:<name>, or any frontmatter key
# reverse = true
# items_per_page = 10      # <= 0 puts everything on one page
# formats = ["html", "rss", "atom", "json"]
# template = "feed"
"##
}
