//! Built-in plugins.
//!
//! Each plugin covers one concern and joins exactly the stages it needs.
//! [`default_registry`] wires them up in the order a normal site build uses:
//!
//! | Plugin | Stage | Priority |
//! |--------|-------|----------|
//! | `config_defaults` | Configure | 0 |
//! | `config_validate` | Validate | 0 |
//! | `glob` | Glob | 100 |
//! | `markdown_loader` | Load | 100 |
//! | `slug_url` | Transform | 10 |
//! | `reading_time` | Transform | 50 |
//! | `description` | Transform | 60 |
//! | `markdown` | Render | 10 |
//! | `templates` | Render | 50 |
//! | `feeds` | Collect | 100 |
//! | `publish_html` | Write | 100 |
//! | `publish_feeds` | Write | 110 |
//! | `sitemap` | Write | 120 |
//! | `static_assets` | Write | 130 |
//! | `cache_flush` | Cleanup | 100 |
//!
//! Any of them can be switched off by name through `plugins.disabled` or
//! `galley build --disable NAME`.

mod assets;
mod cleanup;
mod config;
mod feeds;
mod glob;
mod load;
mod publish;
mod render;
mod transform;

pub use assets::StaticAssets;
pub use cleanup::CacheFlush;
pub use config::{ConfigDefaults, ConfigValidate};
pub use feeds::Feeds;
pub use glob::Glob;
pub use load::MarkdownLoader;
pub use publish::{PublishFeeds, PublishHtml, Sitemap};
pub use render::{MarkdownRender, Templates};
pub use transform::{DescriptionFallback, ReadingTime, SlugUrl};

use crate::plugin::Registry;
use crate::templates::{MaudTemplates, TemplateEngine};
use std::sync::Arc;

/// Registry holding every built-in plugin, rendering with the Maud layouts.
pub fn default_registry() -> Registry {
    registry_with_templates(Arc::new(MaudTemplates))
}

/// Registry holding every built-in plugin, rendering with `engine`.
pub fn registry_with_templates(engine: Arc<dyn TemplateEngine>) -> Registry {
    let mut registry = Registry::new();
    registry
        .register(ConfigDefaults)
        .register(ConfigValidate)
        .register(Glob)
        .register(MarkdownLoader)
        .register(SlugUrl)
        .register(ReadingTime)
        .register(DescriptionFallback::default())
        .register(MarkdownRender)
        .register(Templates::new(engine.clone()))
        .register(Feeds)
        .register(PublishHtml)
        .register(PublishFeeds::new(engine))
        .register(Sitemap)
        .register(StaticAssets)
        .register(CacheFlush);
    registry
}
