//! Stages, plugin capabilities and the plugin registry.
//!
//! A plugin joins a stage by implementing that stage's capability trait and
//! listing the implementation in [`Plugin::capabilities`]:
//!
//! ```ignore
//! impl Plugin for ReadingTime {
//!     fn name(&self) -> &str { "reading_time" }
//!     fn priority(&self) -> i32 { 50 }
//!     fn capabilities(self: Arc<Self>) -> Capabilities {
//!         Capabilities::new().transform(self)
//!     }
//! }
//! ```
//!
//! The [`Registry`] probes capabilities once, at registration, and keeps one
//! list per stage ordered by priority (lower first) and then registration
//! order. A plugin with no capabilities is kept but never invoked.
//!
//! ## Stage contracts
//!
//! | Stage | Trait | Invocation |
//! |-------|-------|------------|
//! | Configure | [`ConfigurePlugin`] | serial, may mutate the config |
//! | Validate | [`ValidatePlugin`] | serial, read-only config |
//! | Glob | [`GlobPlugin`] | serial, owns the file list |
//! | Load | [`LoadPlugin`] | once per unclaimed file, in parallel |
//! | Transform | [`TransformPlugin`] | once per document, in parallel |
//! | Render | [`RenderPlugin`] | once per document, in parallel |
//! | Collect | [`CollectPlugin`] | serial, owns the feed set |
//! | Write | [`WritePlugin`] | lists artifacts, then renders each in parallel |
//! | Cleanup | [`CleanupPlugin`] | serial, best effort |

use crate::cache::ContentCache;
use crate::config::{ConfigError, SiteConfig};
use crate::document::{Document, FieldError};
use crate::feed::{FeedSet, OutputFormat};
use crate::frontmatter::FrontmatterError;
use crate::report::{BuildReport, Diagnostic, DiagnosticKind, Subject};
use crate::syndication::SyndicationError;
use crate::templates::TemplateError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PRIORITY: i32 = 100;

// =============================================================================
// Stages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Configure,
    Validate,
    Glob,
    Load,
    Transform,
    Render,
    Collect,
    Write,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Configure,
        Stage::Validate,
        Stage::Glob,
        Stage::Load,
        Stage::Transform,
        Stage::Render,
        Stage::Collect,
        Stage::Write,
        Stage::Cleanup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Configure => "configure",
            Stage::Validate => "validate",
            Stage::Glob => "glob",
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Render => "render",
            Stage::Collect => "collect",
            Stage::Write => "write",
            Stage::Cleanup => "cleanup",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown stage '{0}' (expected one of configure, validate, glob, load, transform, render, collect, write, cleanup)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == wanted)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

// =============================================================================
// Per-stage errors
// =============================================================================

#[derive(Error, Debug)]
pub enum GlobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("{0}")]
    Walk(String),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("another file already produced document {0}")]
    Duplicate(PathBuf),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Syndication(#[from] SyndicationError),
    #[error("path {0} escapes the output directory")]
    OutsideOutput(PathBuf),
    #[error("{0} is already written by another artifact")]
    Conflict(PathBuf),
    #[error("artifact {0} is not handled by this plugin")]
    Unsupported(PathBuf),
}

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

// =============================================================================
// Stage contexts
// =============================================================================

/// Read-only view shared by the per-item stages (Load, Transform, Render).
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a SiteConfig,
    pub cache: Option<&'a dyn ContentCache>,
}

/// Glob state: the candidate file list, relative to `content_dir`.
pub struct GlobContext<'a> {
    pub config: &'a SiteConfig,
    files: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> GlobContext<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, path: impl Into<PathBuf>) {
        self.files.push(path.into());
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn retain(&mut self, keep: impl FnMut(&PathBuf) -> bool) {
        self.files.retain(keep);
    }

    pub fn warn(&mut self, subject: Subject, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(
            Stage::Glob,
            DiagnosticKind::GlobWarning,
            subject,
            message,
        ));
    }

    /// Sorted, deduplicated file list plus recorded warnings.
    pub(crate) fn finish(self) -> (Vec<PathBuf>, Vec<Diagnostic>) {
        let mut files = self.files;
        files.sort();
        files.dedup();
        (files, self.diagnostics)
    }
}

/// Collect state: frozen documents in, feeds out.
pub struct CollectContext<'a> {
    pub config: &'a SiteConfig,
    /// Every rendered document, in discovery (path) order.
    pub documents: &'a [Arc<Document>],
    pub feeds: &'a mut FeedSet,
    plugin: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CollectContext<'a> {
    pub fn new(config: &'a SiteConfig, documents: &'a [Arc<Document>], feeds: &'a mut FeedSet) -> Self {
        Self {
            config,
            documents,
            feeds,
            plugin: None,
            diagnostics: Vec::new(),
        }
    }

    /// Record a per-feed failure; the build carries on.
    pub fn error(&mut self, kind: DiagnosticKind, subject: Subject, message: impl Into<String>) {
        let mut diagnostic = Diagnostic::error(Stage::Collect, kind, subject, message);
        diagnostic.plugin = self.plugin.clone();
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn set_plugin(&mut self, name: &str) {
        self.plugin = Some(name.to_string());
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Read-only view for the Write stage.
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    pub config: &'a SiteConfig,
    pub documents: &'a [Arc<Document>],
    pub feeds: &'a FeedSet,
}

pub struct CleanupContext<'a> {
    pub config: &'a SiteConfig,
    pub cache: Option<&'a dyn ContentCache>,
    /// The report as of the end of Write.
    pub report: &'a BuildReport,
}

/// One output file. `path` is relative to the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub item: ArtifactItem,
}

/// What an artifact is built from. Indices point into [`WriteContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactItem {
    Document(usize),
    FeedPage { feed: usize, page: usize },
    Feed { feed: usize, format: OutputFormat },
    /// A source file copied as-is.
    File(PathBuf),
    /// Site-wide output not tied to a single document or feed.
    Site,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, item: ArtifactItem) -> Self {
        Self {
            path: path.into(),
            item,
        }
    }
}

// =============================================================================
// Capability traits
// =============================================================================

pub trait ConfigurePlugin: Send + Sync {
    fn configure(&self, config: &mut SiteConfig) -> Result<(), ConfigError>;
}

pub trait ValidatePlugin: Send + Sync {
    fn validate(&self, config: &SiteConfig) -> Result<(), ConfigError>;
}

pub trait GlobPlugin: Send + Sync {
    fn glob(&self, ctx: &mut GlobContext<'_>) -> Result<(), GlobError>;
}

pub trait LoadPlugin: Send + Sync {
    /// Turn one file into a document. `Ok(None)` leaves the file for the
    /// next loader.
    fn load(&self, path: &Path, ctx: &StageContext<'_>) -> Result<Option<Document>, LoadError>;
}

pub trait TransformPlugin: Send + Sync {
    fn transform(&self, doc: &mut Document, ctx: &StageContext<'_>) -> Result<(), TransformError>;
}

pub trait RenderPlugin: Send + Sync {
    fn render(&self, doc: &mut Document, ctx: &StageContext<'_>) -> Result<(), RenderError>;
}

pub trait CollectPlugin: Send + Sync {
    fn collect(&self, ctx: &mut CollectContext<'_>) -> Result<(), crate::feed::CollectError>;
}

pub trait WritePlugin: Send + Sync {
    /// The files this plugin will produce.
    fn artifacts(&self, ctx: &WriteContext<'_>) -> Result<Vec<Artifact>, WriteError>;

    /// Bytes for one of the artifacts returned by [`WritePlugin::artifacts`].
    fn write(&self, artifact: &Artifact, ctx: &WriteContext<'_>) -> Result<Vec<u8>, WriteError>;
}

pub trait CleanupPlugin: Send + Sync {
    fn cleanup(&self, ctx: &CleanupContext<'_>) -> Result<(), CleanupError>;
}

/// The stages a plugin takes part in, with the implementation for each.
#[derive(Clone, Default)]
pub struct Capabilities {
    configure: Option<Arc<dyn ConfigurePlugin>>,
    validate: Option<Arc<dyn ValidatePlugin>>,
    glob: Option<Arc<dyn GlobPlugin>>,
    load: Option<Arc<dyn LoadPlugin>>,
    transform: Option<Arc<dyn TransformPlugin>>,
    render: Option<Arc<dyn RenderPlugin>>,
    collect: Option<Arc<dyn CollectPlugin>>,
    write: Option<Arc<dyn WritePlugin>>,
    cleanup: Option<Arc<dyn CleanupPlugin>>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(mut self, plugin: Arc<dyn ConfigurePlugin>) -> Self {
        self.configure = Some(plugin);
        self
    }

    pub fn validate(mut self, plugin: Arc<dyn ValidatePlugin>) -> Self {
        self.validate = Some(plugin);
        self
    }

    pub fn glob(mut self, plugin: Arc<dyn GlobPlugin>) -> Self {
        self.glob = Some(plugin);
        self
    }

    pub fn load(mut self, plugin: Arc<dyn LoadPlugin>) -> Self {
        self.load = Some(plugin);
        self
    }

    pub fn transform(mut self, plugin: Arc<dyn TransformPlugin>) -> Self {
        self.transform = Some(plugin);
        self
    }

    pub fn render(mut self, plugin: Arc<dyn RenderPlugin>) -> Self {
        self.render = Some(plugin);
        self
    }

    pub fn collect(mut self, plugin: Arc<dyn CollectPlugin>) -> Self {
        self.collect = Some(plugin);
        self
    }

    pub fn write(mut self, plugin: Arc<dyn WritePlugin>) -> Self {
        self.write = Some(plugin);
        self
    }

    pub fn cleanup(mut self, plugin: Arc<dyn CleanupPlugin>) -> Self {
        self.cleanup = Some(plugin);
        self
    }

    pub fn stages(&self) -> Vec<Stage> {
        let present = [
            self.configure.is_some(),
            self.validate.is_some(),
            self.glob.is_some(),
            self.load.is_some(),
            self.transform.is_some(),
            self.render.is_some(),
            self.collect.is_some(),
            self.write.is_some(),
            self.cleanup.is_some(),
        ];
        Stage::ALL
            .into_iter()
            .zip(present)
            .filter_map(|(stage, has)| has.then_some(stage))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages().is_empty()
    }
}

/// A named unit of build logic.
pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Lower runs earlier within a stage.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Probed once when the plugin is registered.
    fn capabilities(self: Arc<Self>) -> Capabilities;
}

// =============================================================================
// Registry
// =============================================================================

struct Entry {
    name: String,
    priority: i32,
    capabilities: Capabilities,
}

/// Summary of one registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub priority: i32,
    pub stages: Vec<Stage>,
    pub disabled: bool,
}

/// All plugins of a build, with per-stage order cached at registration.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
    by_stage: [Vec<usize>; 9],
    disabled: BTreeSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: Plugin>(&mut self, plugin: P) -> &mut Self {
        self.register_shared(Arc::new(plugin))
    }

    pub fn register_shared(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        let name = plugin.name().to_string();
        let priority = plugin.priority();
        let capabilities = plugin.capabilities();
        let stages = capabilities.stages();
        if stages.is_empty() {
            tracing::debug!(plugin = %name, "plugin declares no stages; it will never run");
        }

        let index = self.entries.len();
        self.entries.push(Entry {
            name,
            priority,
            capabilities,
        });
        let entries = &self.entries;
        for stage in stages {
            let list = &mut self.by_stage[stage.index()];
            list.push(index);
            // Stable: equal priorities stay in registration order.
            list.sort_by_key(|&i| entries[i].priority);
        }
        self
    }

    /// Exclude every plugin called `name` from all stages.
    pub fn disable(&mut self, name: impl Into<String>) -> &mut Self {
        self.disabled.insert(name.into());
        self
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the plugins that run in `stage`, in execution order.
    pub fn plugins_for(&self, stage: Stage) -> Vec<&str> {
        self.active(stage).map(|e| e.name.as_str()).collect()
    }

    /// Every registered plugin, in registration order.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.entries
            .iter()
            .map(|e| PluginInfo {
                name: e.name.clone(),
                priority: e.priority,
                stages: e.capabilities.stages(),
                disabled: self.is_disabled(&e.name),
            })
            .collect()
    }

    fn active(&self, stage: Stage) -> impl Iterator<Item = &Entry> {
        self.by_stage[stage.index()]
            .iter()
            .map(|&i| &self.entries[i])
            .filter(|e| !self.disabled.contains(&e.name))
    }

    fn stage_plugins<'a, T: ?Sized>(
        &'a self,
        stage: Stage,
        pick: impl Fn(&'a Capabilities) -> Option<&'a Arc<T>>,
    ) -> Vec<(&'a str, &'a Arc<T>)> {
        self.active(stage)
            .filter_map(|e| Some((e.name.as_str(), pick(&e.capabilities)?)))
            .collect()
    }

    pub(crate) fn configure_plugins(&self) -> Vec<(&str, &Arc<dyn ConfigurePlugin>)> {
        self.stage_plugins(Stage::Configure, |c| c.configure.as_ref())
    }

    pub(crate) fn validate_plugins(&self) -> Vec<(&str, &Arc<dyn ValidatePlugin>)> {
        self.stage_plugins(Stage::Validate, |c| c.validate.as_ref())
    }

    pub(crate) fn glob_plugins(&self) -> Vec<(&str, &Arc<dyn GlobPlugin>)> {
        self.stage_plugins(Stage::Glob, |c| c.glob.as_ref())
    }

    pub(crate) fn load_plugins(&self) -> Vec<(&str, &Arc<dyn LoadPlugin>)> {
        self.stage_plugins(Stage::Load, |c| c.load.as_ref())
    }

    pub(crate) fn transform_plugins(&self) -> Vec<(&str, &Arc<dyn TransformPlugin>)> {
        self.stage_plugins(Stage::Transform, |c| c.transform.as_ref())
    }

    pub(crate) fn render_plugins(&self) -> Vec<(&str, &Arc<dyn RenderPlugin>)> {
        self.stage_plugins(Stage::Render, |c| c.render.as_ref())
    }

    pub(crate) fn collect_plugins(&self) -> Vec<(&str, &Arc<dyn CollectPlugin>)> {
        self.stage_plugins(Stage::Collect, |c| c.collect.as_ref())
    }

    pub(crate) fn write_plugins(&self) -> Vec<(&str, &Arc<dyn WritePlugin>)> {
        self.stage_plugins(Stage::Write, |c| c.write.as_ref())
    }

    pub(crate) fn cleanup_plugins(&self) -> Vec<(&str, &Arc<dyn CleanupPlugin>)> {
        self.stage_plugins(Stage::Cleanup, |c| c.cleanup.as_ref())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("plugins", &self.plugins())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop {
        name: &'static str,
        priority: i32,
        stages: &'static [Stage],
    }

    impl TransformPlugin for Noop {
        fn transform(&self, _: &mut Document, _: &StageContext<'_>) -> Result<(), TransformError> {
            Ok(())
        }
    }

    impl ValidatePlugin for Noop {
        fn validate(&self, _: &SiteConfig) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    impl Plugin for Noop {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn capabilities(self: Arc<Self>) -> Capabilities {
            let mut caps = Capabilities::new();
            if self.stages.contains(&Stage::Validate) {
                caps = caps.validate(self.clone());
            }
            if self.stages.contains(&Stage::Transform) {
                caps = caps.transform(self);
            }
            caps
        }
    }

    fn noop(name: &'static str, priority: i32, stages: &'static [Stage]) -> Noop {
        Noop {
            name,
            priority,
            stages,
        }
    }

    // =========================================================================
    // Stage
    // =========================================================================

    #[test]
    fn stages_are_totally_ordered() {
        assert!(Stage::ALL.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Stage::Cleanup.index(), 8);
    }

    #[test]
    fn stage_parses_case_insensitively() {
        assert_eq!("Render".parse::<Stage>().unwrap(), Stage::Render);
        assert!("publish".parse::<Stage>().is_err());
    }

    // =========================================================================
    // Registry
    // =========================================================================

    #[test]
    fn plugins_ordered_by_priority_then_registration() {
        let mut registry = Registry::new();
        registry
            .register(noop("late", 20, &[Stage::Transform]))
            .register(noop("early", 10, &[Stage::Transform]))
            .register(noop("tie-a", 15, &[Stage::Transform]))
            .register(noop("tie-b", 15, &[Stage::Transform]));
        assert_eq!(
            registry.plugins_for(Stage::Transform),
            ["early", "tie-a", "tie-b", "late"]
        );
    }

    #[test]
    fn plugins_join_only_declared_stages() {
        let mut registry = Registry::new();
        registry.register(noop("both", 100, &[Stage::Validate, Stage::Transform]));
        registry.register(noop("one", 100, &[Stage::Validate]));
        assert_eq!(registry.plugins_for(Stage::Validate), ["both", "one"]);
        assert_eq!(registry.plugins_for(Stage::Transform), ["both"]);
        assert!(registry.plugins_for(Stage::Render).is_empty());
        assert_eq!(registry.transform_plugins().len(), 1);
    }

    #[test]
    fn inert_plugin_is_never_listed() {
        let mut registry = Registry::new();
        registry.register(noop("inert", 100, &[]));
        assert_eq!(registry.len(), 1);
        assert!(Stage::ALL.iter().all(|&s| registry.plugins_for(s).is_empty()));
        assert!(registry.plugins()[0].stages.is_empty());
    }

    #[test]
    fn disabled_plugins_are_excluded_everywhere() {
        let mut registry = Registry::new();
        registry.register(noop("a", 100, &[Stage::Validate, Stage::Transform]));
        registry.register(noop("b", 100, &[Stage::Transform]));
        registry.disable("a");
        assert!(registry.plugins_for(Stage::Validate).is_empty());
        assert_eq!(registry.plugins_for(Stage::Transform), ["b"]);
        assert!(registry.plugins()[0].disabled);
    }

    #[test]
    fn capabilities_report_stages() {
        let caps = Arc::new(noop("x", 1, &[Stage::Transform])).capabilities();
        assert_eq!(caps.stages(), vec![Stage::Transform]);
        assert!(Capabilities::new().is_empty());
    }

    // =========================================================================
    // Contexts
    // =========================================================================

    #[test]
    fn glob_context_sorts_and_dedups() {
        let config = SiteConfig::default();
        let mut ctx = GlobContext::new(&config);
        ctx.add("b.md");
        ctx.add("a.md");
        ctx.add("b.md");
        let (files, diags) = ctx.finish();
        assert_eq!(files, vec![PathBuf::from("a.md"), PathBuf::from("b.md")]);
        assert!(diags.is_empty());
    }
}
