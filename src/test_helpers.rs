//! Shared test utilities for the galley test suite.
//!
//! Document builders for the pure engines (filter, sort, feeds, templates)
//! and temp-directory fixtures for the plugins that touch the filesystem.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let doc = doc_with("posts/a.md", |d| d.published = false);
//!
//! let tmp = TempDir::new().unwrap();
//! write_file(tmp.path(), "content/a.md", "---\ntitle: A\n---\nHello");
//! let config = site_in(tmp.path());
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::config::SiteConfig;
use crate::document::Document;

// =========================================================================
// Documents
// =========================================================================

/// A document at `path` with an empty source, adjusted by `edit`.
pub fn doc_with(path: &str, edit: impl FnOnce(&mut Document)) -> Document {
    let mut doc = Document::new(path, "");
    edit(&mut doc);
    doc
}

/// Paths of `docs`, in order, for compact assertions.
pub fn paths(docs: &[Arc<Document>]) -> Vec<String> {
    docs.iter()
        .map(|d| d.path().to_string_lossy().replace('\\', "/"))
        .collect()
}

// =========================================================================
// Filesystem fixtures
// =========================================================================

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Default config with every directory rooted at `root`.
pub fn site_in(root: &Path) -> SiteConfig {
    let mut config = SiteConfig::default();
    config.content_dir = root.join("content");
    config.output_dir = root.join("dist");
    config.static_dir = root.join("static");
    config.cache.dir = root.join(".galley-cache");
    config
}
