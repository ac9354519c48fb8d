//! # Galley
//!
//! A plugin-driven static site generator. A directory of Markdown documents
//! with frontmatter goes in; a rendered site with paginated, filtered feeds
//! (HTML, RSS, Atom, JSON Feed, sitemap) comes out.
//!
//! # Architecture: Nine Fixed Stages
//!
//! Every build walks the same totally ordered lifecycle. Each stage is a
//! barrier: no work of stage N+1 starts until all work of stage N is done.
//!
//! ```text
//! Configure → Validate → Glob → Load → Transform → Render → Collect → Write → Cleanup
//!   config     config    files  docs     docs        docs     feeds   artifacts
//! ```
//!
//! Plugins opt into stages by declaring capabilities (see [`plugin`]). The
//! [`lifecycle::Lifecycle`] drives the stages, fans per-document work out over
//! a bounded rayon pool, and applies a per-stage failure policy: configuration
//! problems abort, everything else is recorded in the [`report::BuildReport`]
//! and the build moves on without the offending file, document, feed, or
//! artifact.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`lifecycle`] | Stage driver: ordering, fan-out, failure policy, cancellation |
//! | [`plugin`] | `Stage` enum, capability traits, the plugin [`plugin::Registry`] |
//! | [`filter`] | Boolean selection DSL used by feeds (`published == true and 'rust' in tags`) |
//! | [`feed`] | Feed engine: select, sort, paginate |
//! | [`syndication`] | Pure serializers for RSS, Atom, JSON Feed and sitemaps |
//! | [`document`] | The content item and its typed extension map |
//! | [`frontmatter`] | YAML/TOML frontmatter splitting |
//! | [`markdown`] | Markdown rendering and text statistics |
//! | [`templates`] | HTML layouts rendered with Maud |
//! | [`cache`] | Content-addressed render cache |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`plugins`] | The built-in plugin set and [`plugins::default_registry`] |
//! | [`report`] | Diagnostics and the aggregated build result |
//! | [`output`] | CLI formatting of build events and reports |
//! | [`naming`] | `NNN-name` filename convention and slug sanitizing |
//! | [`logging`] | `tracing` subscriber setup for the binary |
//!
//! # Design Decisions
//!
//! ## Capabilities Over Type Assertions
//!
//! A plugin advertises the stages it joins by returning a
//! [`plugin::Capabilities`] value once, at registration. The registry caches
//! one ordered list per stage, so the hot loop never asks a plugin what it is.
//!
//! ## Ownership Instead of Locks
//!
//! During Load, Transform and Render each rayon task owns exactly one
//! [`document::Document`]. After Render the collection is frozen into
//! `Arc`s and only read. There are no cross-document locks anywhere in the
//! pipeline.
//!
//! ## Explicit Options, No Globals
//!
//! Verbosity, concurrency, disabled plugins, the cache and the cancellation
//! token all travel in [`lifecycle::BuildOptions`]. Nothing in the library
//! reads process-wide state.

pub mod cache;
pub mod config;
pub mod document;
pub mod feed;
pub mod filter;
pub mod frontmatter;
pub mod lifecycle;
pub mod logging;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod plugin;
pub mod plugins;
pub mod report;
pub mod syndication;
pub mod templates;

pub use document::{Document, Value};
pub use filter::{Filter, FilterError};
pub use lifecycle::{BuildError, BuildOptions, CancellationToken, Lifecycle};
pub use plugin::{Registry, Stage};
pub use report::BuildReport;

#[cfg(test)]
pub(crate) mod test_helpers;
