//! End-of-build housekeeping.

use crate::plugin::{Capabilities, CleanupContext, CleanupError, CleanupPlugin, Plugin};
use std::sync::Arc;

/// Persists the content cache and logs its hit rate.
pub struct CacheFlush;

impl CleanupPlugin for CacheFlush {
    fn cleanup(&self, ctx: &CleanupContext<'_>) -> Result<(), CleanupError> {
        let Some(cache) = ctx.cache else {
            return Ok(());
        };
        let stats = cache.stats();
        tracing::debug!(hits = stats.hits, misses = stats.misses, "content cache");
        cache.flush()?;
        Ok(())
    }
}

impl Plugin for CacheFlush {
    fn name(&self) -> &str {
        "cache_flush"
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().cleanup(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ContentCache, FileCache};
    use crate::config::SiteConfig;
    use crate::report::BuildReport;
    use tempfile::TempDir;

    #[test]
    fn flush_writes_manifest() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path().join("cache"));
        cache.put("k", "v".into());
        let config = SiteConfig::default();
        let report = BuildReport::default();
        let ctx = CleanupContext {
            config: &config,
            cache: Some(&cache),
            report: &report,
        };
        CacheFlush.cleanup(&ctx).unwrap();
        assert!(cache.manifest_path().exists());
    }

    #[test]
    fn no_cache_is_a_no_op() {
        let config = SiteConfig::default();
        let report = BuildReport::default();
        let ctx = CleanupContext {
            config: &config,
            cache: None,
            report: &report,
        };
        assert!(CacheFlush.cleanup(&ctx).is_ok());
    }
}
