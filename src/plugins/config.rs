//! Configure and Validate plugins.

use crate::config::{ConfigError, DEFAULT_GLOB_PATTERN, SiteConfig};
use crate::feed::OutputFormat;
use crate::plugin::{Capabilities, ConfigurePlugin, Plugin, ValidatePlugin};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fills in values that depend on other values: the fallback glob pattern,
/// a normalized `base_url`, and explicit feed slugs.
pub struct ConfigDefaults;

impl ConfigurePlugin for ConfigDefaults {
    fn configure(&self, config: &mut SiteConfig) -> Result<(), ConfigError> {
        if config.glob.patterns.is_empty() {
            config.glob.patterns.push(DEFAULT_GLOB_PATTERN.to_string());
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        for feed in &mut config.feeds {
            if feed.slug.is_none() {
                feed.slug = Some(feed.effective_slug());
            }
        }
        Ok(())
    }
}

impl Plugin for ConfigDefaults {
    fn name(&self) -> &str {
        "config_defaults"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().configure(self)
    }
}

/// Rejects configurations the build cannot run with.
pub struct ConfigValidate;

impl ValidatePlugin for ConfigValidate {
    fn validate(&self, config: &SiteConfig) -> Result<(), ConfigError> {
        config.validate()?;

        for pattern in &config.glob.patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid glob pattern '{pattern}': {e}"))
            })?;
        }

        if !config.content_dir.is_dir() {
            return Err(ConfigError::Validation(format!(
                "content directory {} does not exist",
                config.content_dir.display()
            )));
        }

        let mut slugs = BTreeSet::new();
        for feed in &config.feeds {
            let slug = feed.effective_slug();
            // The site root's sitemap.xml belongs to the site-wide sitemap.
            if slug.is_empty() && feed.formats.contains(&OutputFormat::Sitemap) {
                return Err(ConfigError::Validation(format!(
                    "feed '{}' is published at the site root and cannot emit a sitemap",
                    feed.name
                )));
            }
            if !slugs.insert(slug.clone()) {
                tracing::warn!(feed = %feed.name, slug = %slug, "feed shares its output directory with another feed");
            }
        }
        Ok(())
    }
}

impl Plugin for ConfigValidate {
    fn name(&self) -> &str {
        "config_validate"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::test_helpers::site_in;
    use tempfile::TempDir;

    #[test]
    fn defaults_fill_pattern_slug_and_base_url() {
        let mut config = SiteConfig::default();
        config.glob.patterns.clear();
        config.base_url = "https://example.com/".into();
        config.feeds.push(FeedConfig::new("Blog Posts"));
        ConfigDefaults.configure(&mut config).unwrap();

        assert_eq!(config.glob.patterns, vec![DEFAULT_GLOB_PATTERN]);
        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.feeds[0].slug.as_deref(), Some("blog-posts"));
    }

    #[test]
    fn explicit_slugs_are_kept() {
        let mut config = SiteConfig::default();
        let mut feed = FeedConfig::new("home");
        feed.slug = Some(String::new());
        config.feeds.push(feed);
        ConfigDefaults.configure(&mut config).unwrap();
        assert_eq!(config.feeds[0].slug.as_deref(), Some(""));
    }

    #[test]
    fn validate_rejects_bad_pattern() {
        let tmp = TempDir::new().unwrap();
        let mut config = site_in(tmp.path());
        std::fs::create_dir_all(&config.content_dir).unwrap();
        config.glob.patterns = vec!["[".into()];
        let err = ConfigValidate.validate(&config).unwrap_err();
        assert!(err.to_string().contains("invalid glob pattern"));
    }

    #[test]
    fn validate_requires_content_dir() {
        let tmp = TempDir::new().unwrap();
        let config = site_in(tmp.path());
        assert!(ConfigValidate.validate(&config).is_err());
        std::fs::create_dir_all(&config.content_dir).unwrap();
        assert!(ConfigValidate.validate(&config).is_ok());
    }

    #[test]
    fn validate_rejects_root_feed_sitemap() {
        let tmp = TempDir::new().unwrap();
        let mut config = site_in(tmp.path());
        std::fs::create_dir_all(&config.content_dir).unwrap();
        let mut home = FeedConfig::new("home");
        home.slug = Some(String::new());
        home.formats = vec![OutputFormat::Html, OutputFormat::Sitemap];
        config.feeds.push(home);

        let err = ConfigValidate.validate(&config).unwrap_err();
        assert!(err.to_string().contains("cannot emit a sitemap"));

        config.feeds[0].formats = vec![OutputFormat::Html, OutputFormat::Rss];
        assert!(ConfigValidate.validate(&config).is_ok());
    }

    #[test]
    fn validate_leaves_filters_to_collect() {
        let tmp = TempDir::new().unwrap();
        let mut config = site_in(tmp.path());
        std::fs::create_dir_all(&config.content_dir).unwrap();
        let mut feed = FeedConfig::new("broken");
        feed.filter = "tags in".into();
        config.feeds.push(feed);
        assert!(ConfigValidate.validate(&config).is_ok());
    }
}
