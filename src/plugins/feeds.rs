//! Feed collection.

use crate::feed::{CollectError, build_feed};
use crate::plugin::{Capabilities, CollectContext, CollectPlugin, Plugin};
use crate::report::{DiagnosticKind, Subject};
use std::sync::Arc;

/// Builds every `[[feeds]]` entry, in configuration order.
///
/// A feed whose filter does not parse, or whose name is already taken, is
/// reported and skipped; the remaining feeds are still built.
pub struct Feeds;

impl CollectPlugin for Feeds {
    fn collect(&self, ctx: &mut CollectContext<'_>) -> Result<(), CollectError> {
        let config = ctx.config;
        for feed_config in &config.feeds {
            let subject = Subject::Feed(feed_config.name.clone());
            if ctx.feeds.contains(&feed_config.name) {
                let err = CollectError::FeedNameConflict(feed_config.name.clone());
                ctx.error(DiagnosticKind::FeedNameConflict, subject, err.to_string());
                continue;
            }
            let feed = match build_feed(feed_config, ctx.documents) {
                Ok(feed) => feed,
                Err(err) => {
                    ctx.error(DiagnosticKind::FilterError, subject, err.to_string());
                    continue;
                }
            };
            tracing::debug!(
                feed = %feed.name(),
                items = feed.items().len(),
                pages = feed.pages().len(),
                "feed built"
            );
            ctx.feeds.insert(feed)?;
        }
        Ok(())
    }
}

impl Plugin for Feeds {
    fn name(&self) -> &str {
        "feeds"
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().collect(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeedConfig, SiteConfig};
    use crate::document::Document;
    use crate::feed::FeedSet;
    use crate::test_helpers::{doc_with, paths};

    fn docs() -> Vec<Arc<Document>> {
        ["a.md", "b.md", "c.md"]
            .into_iter()
            .map(|p| Arc::new(doc_with(p, |d| d.set_tags([p.trim_end_matches(".md")]))))
            .collect()
    }

    fn collect(config: &SiteConfig, documents: &[Arc<Document>]) -> (FeedSet, Vec<crate::report::Diagnostic>) {
        let mut feeds = FeedSet::new();
        let mut ctx = CollectContext::new(config, documents, &mut feeds);
        Feeds.collect(&mut ctx).unwrap();
        let diagnostics = ctx.into_diagnostics();
        (feeds, diagnostics)
    }

    #[test]
    fn builds_each_configured_feed() {
        let mut config = SiteConfig::default();
        let mut only_b = FeedConfig::new("b");
        only_b.filter = "'b' in tags".into();
        config.feeds = vec![FeedConfig::new("all"), only_b];

        let (feeds, diagnostics) = collect(&config, &docs());
        assert!(diagnostics.is_empty());
        assert_eq!(paths(feeds.get("all").unwrap().items()), ["a.md", "b.md", "c.md"]);
        assert_eq!(paths(feeds.get("b").unwrap().items()), ["b.md"]);
    }

    #[test]
    fn bad_filter_skips_only_that_feed() {
        let mut config = SiteConfig::default();
        let mut broken = FeedConfig::new("broken");
        broken.filter = "tags in".into();
        config.feeds = vec![broken, FeedConfig::new("ok")];

        let (feeds, diagnostics) = collect(&config, &docs());
        assert!(feeds.get("broken").is_none());
        assert!(feeds.get("ok").is_some());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::FilterError);
        assert_eq!(diagnostics[0].subject, Subject::Feed("broken".into()));
        assert!(diagnostics[0].message.contains("position 5"));
    }

    #[test]
    fn duplicate_name_keeps_the_first() {
        let mut config = SiteConfig::default();
        let mut second = FeedConfig::new("blog");
        second.filter = "false".into();
        config.feeds = vec![FeedConfig::new("blog"), second];

        let (feeds, diagnostics) = collect(&config, &docs());
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds.get("blog").unwrap().items().len(), 3);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::FeedNameConflict);
    }
}
