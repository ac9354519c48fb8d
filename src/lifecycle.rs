//! The build lifecycle.
//!
//! [`Lifecycle`] runs the nine [`Stage`]s in order, dispatching to the
//! plugins the [`Registry`] lists for each. Every stage is a barrier: per-item
//! work fans out over a rayon pool, and the next stage starts only when the
//! whole fan-out has returned.
//!
//! ## Failure policy
//!
//! | Stage | On error |
//! |-------|----------|
//! | Configure, Validate | fatal, the build stops with [`BuildError::Fatal`] |
//! | Glob | recorded; zero candidates is a warning |
//! | Load | file skipped, warning recorded |
//! | Transform, Render | document dropped from later stages, error recorded |
//! | Collect | feed skipped, error recorded |
//! | Write | artifact skipped, error recorded |
//! | Cleanup | warning recorded, never raised |
//!
//! ## Document ownership
//!
//! Load fills a `BTreeMap` keyed by document path. Transform and Render hand
//! each worker a `&mut Document` from that map, so no two tasks ever share a
//! document and no locks are needed. Before Collect the map is frozen into a
//! path-ordered `Vec<Arc<Document>>` that feeds and writers share read-only.
//!
//! ## Progress and cancellation
//!
//! Stage entry and exit are sent as [`BuildEvent`]s to an optional channel
//! and logged through `tracing`. A [`CancellationToken`] is checked before
//! each stage; work already started in a stage always finishes.

use crate::cache::ContentCache;
use crate::config::{ConfigError, SiteConfig, effective_threads};
use crate::document::Document;
use crate::feed::FeedSet;
use crate::plugin::{
    Artifact, CleanupContext, CollectContext, GlobContext, LoadError, LoadPlugin, Registry, Stage,
    StageContext, WriteContext, WriteError, WritePlugin,
};
use crate::report::{BuildReport, Diagnostic, DiagnosticKind, Subject};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Cooperative cancellation, honoured between stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    StageStarted {
        stage: Stage,
    },
    StageFinished {
        stage: Stage,
        elapsed: Duration,
        /// Diagnostics recorded during this stage.
        diagnostics: usize,
    },
}

/// Per-invocation knobs that live outside the site configuration.
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// Worker count; overrides `processing.concurrency`.
    pub concurrency: Option<usize>,
    /// Plugin names to exclude, on top of `plugins.disabled`.
    pub disabled: BTreeSet<String>,
    pub cache: Option<Arc<dyn ContentCache>>,
    pub cancel: CancellationToken,
    pub events: Option<Sender<BuildEvent>>,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{stage} stage failed: {source}")]
    Fatal {
        stage: Stage,
        plugin: Option<String>,
        source: ConfigError,
    },
    #[error("build cancelled before the {stage} stage")]
    Cancelled { stage: Stage },
}

impl BuildError {
    pub fn stage(&self) -> Stage {
        match self {
            BuildError::Fatal { stage, .. } | BuildError::Cancelled { stage } => *stage,
        }
    }

    pub fn plugin(&self) -> Option<&str> {
        match self {
            BuildError::Fatal { plugin, .. } => plugin.as_deref(),
            BuildError::Cancelled { .. } => None,
        }
    }
}

/// Runs builds for one configuration and plugin set.
pub struct Lifecycle {
    config: SiteConfig,
    registry: Registry,
    options: BuildOptions,
}

impl Lifecycle {
    /// Plugins listed in `config.plugins.disabled` are disabled here.
    pub fn new(config: SiteConfig, mut registry: Registry) -> Self {
        for name in &config.plugins.disabled {
            registry.disable(name.clone());
        }
        Self {
            config,
            registry,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        for name in &options.disabled {
            self.registry.disable(name.clone());
        }
        self.options = options;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run all nine stages.
    pub fn run(&self) -> Result<BuildReport, BuildError> {
        self.run_to(Stage::Cleanup)
    }

    /// Run Configure through `last`, inclusive.
    pub fn run_to(&self, last: Stage) -> Result<BuildReport, BuildError> {
        let mut build = Build::new(self);
        for stage in Stage::ALL.into_iter().take_while(|&s| s <= last) {
            if self.options.cancel.is_cancelled() {
                tracing::warn!(%stage, "build cancelled");
                return Err(BuildError::Cancelled { stage });
            }
            build.run_stage(stage)?;
        }
        let report = build.report;
        tracing::info!(
            documents = report.documents_rendered,
            feeds = report.feeds_built,
            artifacts = report.artifacts_written,
            errors = report.errors().count(),
            warnings = report.warnings().count(),
            "build finished"
        );
        Ok(report)
    }
}

/// Run `op` inside the build's pool, or on the caller's pool when none has
/// been built yet.
fn install<R: Send>(pool: Option<&rayon::ThreadPool>, op: impl FnOnce() -> R + Send) -> R {
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

/// State of one build invocation.
struct Build<'a> {
    registry: &'a Registry,
    options: &'a BuildOptions,
    config: Arc<SiteConfig>,
    pool: Option<rayon::ThreadPool>,
    files: Vec<PathBuf>,
    documents: BTreeMap<PathBuf, Document>,
    frozen: Vec<Arc<Document>>,
    feeds: FeedSet,
    report: BuildReport,
}

impl<'a> Build<'a> {
    fn new(lifecycle: &'a Lifecycle) -> Self {
        Self {
            registry: &lifecycle.registry,
            options: &lifecycle.options,
            config: Arc::new(lifecycle.config.clone()),
            pool: None,
            files: Vec::new(),
            documents: BTreeMap::new(),
            frozen: Vec::new(),
            feeds: FeedSet::new(),
            report: BuildReport::default(),
        }
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.options.events {
            // A closed receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            tracing::error!("{diagnostic}");
        } else {
            tracing::warn!("{diagnostic}");
        }
        self.report.diagnostics.push(diagnostic);
    }

    fn run_stage(&mut self, stage: Stage) -> Result<(), BuildError> {
        let span = tracing::info_span!("stage", stage = stage.name());
        let _entered = span.enter();
        tracing::debug!(plugins = ?self.registry.plugins_for(stage), "stage started");
        self.emit(BuildEvent::StageStarted { stage });

        let started = Instant::now();
        let before = self.report.diagnostics.len();
        match stage {
            Stage::Configure => self.configure()?,
            Stage::Validate => self.validate()?,
            Stage::Glob => self.glob(),
            Stage::Load => self.load(),
            Stage::Transform => self.transform(),
            Stage::Render => self.render(),
            Stage::Collect => self.collect(),
            Stage::Write => self.write(),
            Stage::Cleanup => self.cleanup(),
        }
        let elapsed = started.elapsed();
        let diagnostics = self.report.diagnostics.len() - before;

        self.report.completed.push(stage);
        tracing::info!(?elapsed, diagnostics, "stage finished");
        self.emit(BuildEvent::StageFinished {
            stage,
            elapsed,
            diagnostics,
        });
        Ok(())
    }

    // =========================================================================
    // Configure / Validate
    // =========================================================================

    fn configure(&mut self) -> Result<(), BuildError> {
        let config = Arc::make_mut(&mut self.config);
        for (name, plugin) in self.registry.configure_plugins() {
            tracing::debug!(plugin = name, "configuring");
            plugin
                .configure(config)
                .map_err(|source| BuildError::Fatal {
                    stage: Stage::Configure,
                    plugin: Some(name.to_string()),
                    source,
                })?;
        }

        let threads = self
            .options
            .concurrency
            .map(|n| n.max(1))
            .unwrap_or_else(|| effective_threads(&self.config.processing));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("galley-worker-{i}"))
            .build()
            .map_err(|e| BuildError::Fatal {
                stage: Stage::Configure,
                plugin: None,
                source: ConfigError::ThreadPool(e.to_string()),
            })?;
        tracing::debug!(threads, "worker pool ready");
        self.pool = Some(pool);
        Ok(())
    }

    fn validate(&mut self) -> Result<(), BuildError> {
        for (name, plugin) in self.registry.validate_plugins() {
            plugin
                .validate(&self.config)
                .map_err(|source| BuildError::Fatal {
                    stage: Stage::Validate,
                    plugin: Some(name.to_string()),
                    source,
                })?;
        }
        Ok(())
    }

    // =========================================================================
    // Glob / Load
    // =========================================================================

    fn glob(&mut self) {
        let mut ctx = GlobContext::new(&self.config);
        let mut failures = Vec::new();
        for (name, plugin) in self.registry.glob_plugins() {
            if let Err(err) = plugin.glob(&mut ctx) {
                failures.push(
                    Diagnostic::error(
                        Stage::Glob,
                        DiagnosticKind::GlobError,
                        Subject::Plugin(name.to_string()),
                        err.to_string(),
                    )
                    .with_plugin(name),
                );
            }
        }
        let (files, warnings) = ctx.finish();

        for diagnostic in failures.into_iter().chain(warnings) {
            self.record(diagnostic);
        }
        if files.is_empty() {
            self.record(Diagnostic::warning(
                Stage::Glob,
                DiagnosticKind::GlobWarning,
                Subject::Build,
                "no candidate files matched",
            ));
        }
        tracing::info!(files = files.len(), "files discovered");
        self.report.files_discovered = files.len();
        self.files = files;
    }

    fn load(&mut self) {
        let loaders = self.registry.load_plugins();
        let ctx = StageContext {
            config: &self.config,
            cache: self.options.cache.as_deref(),
        };
        let files = std::mem::take(&mut self.files);
        let results: Vec<_> = install(self.pool.as_ref(), || {
            files
                .par_iter()
                .map(|path| (path, load_one(&loaders, path, &ctx)))
                .collect()
        });

        let mut diagnostics = Vec::new();
        for (path, result) in results {
            match result {
                Ok(Some(doc)) => {
                    if self.documents.contains_key(doc.path()) {
                        let err = LoadError::Duplicate(doc.path().to_path_buf());
                        diagnostics.push(Diagnostic::warning(
                            Stage::Load,
                            DiagnosticKind::LoadError,
                            Subject::File(path.clone()),
                            err.to_string(),
                        ));
                    } else {
                        self.documents.insert(doc.path().to_path_buf(), doc);
                    }
                }
                Ok(None) => diagnostics.push(Diagnostic::warning(
                    Stage::Load,
                    DiagnosticKind::LoadError,
                    Subject::File(path.clone()),
                    "no loader accepted this file",
                )),
                Err((plugin, err)) => diagnostics.push(
                    Diagnostic::warning(
                        Stage::Load,
                        DiagnosticKind::LoadError,
                        Subject::File(path.clone()),
                        err.to_string(),
                    )
                    .with_plugin(plugin),
                ),
            }
        }
        for diagnostic in diagnostics {
            self.record(diagnostic);
        }
        self.report.documents_loaded = self.documents.len();
    }

    // =========================================================================
    // Transform / Render
    // =========================================================================

    fn transform(&mut self) {
        let registry = self.registry;
        for (name, plugin) in registry.transform_plugins() {
            let ctx = StageContext {
                config: &self.config,
                cache: self.options.cache.as_deref(),
            };
            let documents = &mut self.documents;
            let failures: Vec<(PathBuf, String)> = install(self.pool.as_ref(), || {
                documents
                    .par_iter_mut()
                    .filter_map(|(path, doc)| {
                        let err = plugin.transform(doc, &ctx).err()?;
                        Some((path.clone(), err.to_string()))
                    })
                    .collect()
            });
            self.drop_failed(Stage::Transform, DiagnosticKind::TransformError, name, failures);
        }
    }

    fn render(&mut self) {
        let registry = self.registry;
        for (name, plugin) in registry.render_plugins() {
            let ctx = StageContext {
                config: &self.config,
                cache: self.options.cache.as_deref(),
            };
            let documents = &mut self.documents;
            let failures: Vec<(PathBuf, String)> = install(self.pool.as_ref(), || {
                documents
                    .par_iter_mut()
                    .filter_map(|(path, doc)| {
                        let err = plugin.render(doc, &ctx).err()?;
                        Some((path.clone(), err.to_string()))
                    })
                    .collect()
            });
            self.drop_failed(Stage::Render, DiagnosticKind::RenderError, name, failures);
        }
        self.report.documents_rendered = self.documents.len();
    }

    /// Remove documents that failed `stage` so later plugins never see them.
    fn drop_failed(
        &mut self,
        stage: Stage,
        kind: DiagnosticKind,
        plugin: &str,
        failures: Vec<(PathBuf, String)>,
    ) {
        for (path, message) in failures {
            self.documents.remove(&path);
            self.record(
                Diagnostic::error(stage, kind, Subject::Document(path), message)
                    .with_plugin(plugin),
            );
        }
    }

    // =========================================================================
    // Collect
    // =========================================================================

    fn collect(&mut self) {
        self.frozen = std::mem::take(&mut self.documents)
            .into_values()
            .map(Arc::new)
            .collect();

        let mut feeds = FeedSet::new();
        let mut ctx = CollectContext::new(&self.config, &self.frozen, &mut feeds);
        let mut failures = Vec::new();
        for (name, plugin) in self.registry.collect_plugins() {
            ctx.set_plugin(name);
            if let Err(err) = install(self.pool.as_ref(), || plugin.collect(&mut ctx)) {
                failures.push(
                    Diagnostic::error(
                        Stage::Collect,
                        DiagnosticKind::CollectError,
                        Subject::Plugin(name.to_string()),
                        err.to_string(),
                    )
                    .with_plugin(name),
                );
            }
        }
        let diagnostics = ctx.into_diagnostics();

        for diagnostic in diagnostics.into_iter().chain(failures) {
            self.record(diagnostic);
        }
        self.report.feeds_built = feeds.len();
        self.feeds = feeds;
    }

    // =========================================================================
    // Write
    // =========================================================================

    fn write(&mut self) {
        let ctx = WriteContext {
            config: &self.config,
            documents: &self.frozen,
            feeds: &self.feeds,
        };
        let mut diagnostics = Vec::new();
        let mut claimed: BTreeSet<PathBuf> = BTreeSet::new();
        let mut jobs: Vec<(&str, &Arc<dyn WritePlugin>, Artifact)> = Vec::new();

        for (name, plugin) in self.registry.write_plugins() {
            let artifacts = match plugin.artifacts(&ctx) {
                Ok(artifacts) => artifacts,
                Err(err) => {
                    diagnostics.push(write_error(name, Subject::Plugin(name.to_string()), &err));
                    continue;
                }
            };
            for artifact in artifacts {
                let conflict = if !is_inside_output(&artifact.path) {
                    Some(WriteError::OutsideOutput(artifact.path.clone()))
                } else if claimed.contains(&artifact.path) {
                    Some(WriteError::Conflict(artifact.path.clone()))
                } else {
                    None
                };
                if let Some(err) = conflict {
                    let subject = Subject::Artifact(artifact.path.clone());
                    diagnostics.push(write_error(name, subject, &err));
                    continue;
                }
                claimed.insert(artifact.path.clone());
                jobs.push((name, plugin, artifact));
            }
        }

        let output_dir = &self.config.output_dir;
        let results: Vec<Result<(), Diagnostic>> = install(self.pool.as_ref(), || {
            jobs.par_iter()
                .map(|(name, plugin, artifact)| {
                    write_artifact(output_dir, plugin, artifact, &ctx).map_err(|err| {
                        write_error(name, Subject::Artifact(artifact.path.clone()), &err)
                    })
                })
                .collect()
        });

        let mut written = 0;
        for result in results {
            match result {
                Ok(()) => written += 1,
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }
        for diagnostic in diagnostics {
            self.record(diagnostic);
        }
        self.report.artifacts_written = written;
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    fn cleanup(&mut self) {
        let ctx = CleanupContext {
            config: &self.config,
            cache: self.options.cache.as_deref(),
            report: &self.report,
        };
        let failures: Vec<Diagnostic> = self
            .registry
            .cleanup_plugins()
            .into_iter()
            .filter_map(|(name, plugin)| {
                let err = plugin.cleanup(&ctx).err()?;
                Some(
                    Diagnostic::warning(
                        Stage::Cleanup,
                        DiagnosticKind::CleanupError,
                        Subject::Plugin(name.to_string()),
                        err.to_string(),
                    )
                    .with_plugin(name),
                )
            })
            .collect();
        for diagnostic in failures {
            self.record(diagnostic);
        }
    }
}

/// Offer `path` to each loader in turn; the first `Some` wins.
fn load_one(
    loaders: &[(&str, &Arc<dyn LoadPlugin>)],
    path: &Path,
    ctx: &StageContext<'_>,
) -> Result<Option<Document>, (String, LoadError)> {
    for (name, loader) in loaders {
        match loader.load(path, ctx) {
            Ok(Some(doc)) => return Ok(Some(doc)),
            Ok(None) => continue,
            Err(err) => return Err((name.to_string(), err)),
        }
    }
    Ok(None)
}

fn write_artifact(
    output_dir: &Path,
    plugin: &Arc<dyn WritePlugin>,
    artifact: &Artifact,
    ctx: &WriteContext<'_>,
) -> Result<(), WriteError> {
    let bytes = plugin.write(artifact, ctx)?;
    let target = output_dir.join(&artifact.path);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, bytes)?;
    Ok(())
}

fn write_error(plugin: &str, subject: Subject, err: &WriteError) -> Diagnostic {
    Diagnostic::error(Stage::Write, DiagnosticKind::WriteError, subject, err.to_string())
        .with_plugin(plugin)
}

/// Relative, non-empty, and free of `..`.
fn is_inside_output(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{
        Capabilities, CollectPlugin, ConfigurePlugin, GlobError, GlobPlugin, Plugin,
        RenderError, RenderPlugin, TransformError, TransformPlugin, ArtifactItem,
    };
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use tempfile::TempDir;

    /// Globs a fixed list and loads each path as an empty document.
    struct Fixed(Vec<&'static str>);

    impl GlobPlugin for Fixed {
        fn glob(&self, ctx: &mut GlobContext<'_>) -> Result<(), GlobError> {
            for path in &self.0 {
                ctx.add(*path);
            }
            Ok(())
        }
    }

    impl LoadPlugin for Fixed {
        fn load(&self, path: &Path, _: &StageContext<'_>) -> Result<Option<Document>, LoadError> {
            if path.to_string_lossy().contains("broken") {
                return Err(LoadError::Io(std::io::Error::other("unreadable")));
            }
            Ok(Some(Document::new(path, "")))
        }
    }

    impl Plugin for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn capabilities(self: Arc<Self>) -> Capabilities {
            Capabilities::new().glob(self.clone()).load(self)
        }
    }

    /// Records every call as "<stage>:<path>".
    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl TransformPlugin for Recorder {
        fn transform(&self, doc: &mut Document, _: &StageContext<'_>) -> Result<(), TransformError> {
            let path = doc.path().display().to_string();
            self.calls.lock().push(format!("transform:{path}"));
            if self.fail_on == Some(path.as_str()) {
                return Err(TransformError::Failed("boom".into()));
            }
            Ok(())
        }
    }

    impl RenderPlugin for Recorder {
        fn render(&self, doc: &mut Document, _: &StageContext<'_>) -> Result<(), RenderError> {
            self.calls
                .lock()
                .push(format!("render:{}", doc.path().display()));
            Ok(())
        }
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn capabilities(self: Arc<Self>) -> Capabilities {
            Capabilities::new().transform(self.clone()).render(self)
        }
    }

    struct FailingConfigure;

    impl ConfigurePlugin for FailingConfigure {
        fn configure(&self, _: &mut SiteConfig) -> Result<(), ConfigError> {
            Err(ConfigError::Validation("nope".into()))
        }
    }

    impl Plugin for FailingConfigure {
        fn name(&self) -> &str {
            "failing"
        }

        fn capabilities(self: Arc<Self>) -> Capabilities {
            Capabilities::new().configure(self)
        }
    }

    struct Cleaner(Arc<Mutex<bool>>);

    impl crate::plugin::CleanupPlugin for Cleaner {
        fn cleanup(&self, _: &CleanupContext<'_>) -> Result<(), crate::plugin::CleanupError> {
            *self.0.lock() = true;
            Err(crate::plugin::CleanupError::Failed("disk full".into()))
        }
    }

    impl Plugin for Cleaner {
        fn name(&self) -> &str {
            "cleaner"
        }

        fn capabilities(self: Arc<Self>) -> Capabilities {
            Capabilities::new().cleanup(self)
        }
    }

    fn registry_with(files: Vec<&'static str>, recorder: Recorder) -> Registry {
        let mut registry = Registry::new();
        registry.register(Fixed(files)).register(recorder);
        registry
    }

    // =========================================================================
    // Ordering and isolation
    // =========================================================================

    #[test]
    fn every_transform_finishes_before_any_render() {
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        let registry = registry_with(vec!["a.md", "b.md", "c.md"], recorder);
        let report = Lifecycle::new(SiteConfig::default(), registry)
            .run_to(Stage::Render)
            .unwrap();

        let calls = calls.lock();
        let last_transform = calls.iter().rposition(|c| c.starts_with("transform:")).unwrap();
        let first_render = calls.iter().position(|c| c.starts_with("render:")).unwrap();
        assert!(last_transform < first_render);
        assert_eq!(report.documents_rendered, 3);
    }

    #[test]
    fn failed_transform_drops_only_that_document() {
        let recorder = Recorder {
            fail_on: Some("b.md"),
            ..Recorder::default()
        };
        let calls = recorder.calls.clone();
        let registry = registry_with(vec!["a.md", "b.md", "c.md"], recorder);
        let report = Lifecycle::new(SiteConfig::default(), registry)
            .run_to(Stage::Render)
            .unwrap();

        let calls = calls.lock();
        assert!(calls.contains(&"render:a.md".to_string()));
        assert!(calls.contains(&"render:c.md".to_string()));
        assert!(!calls.contains(&"render:b.md".to_string()));
        assert_eq!(report.documents_rendered, 2);
        let error = report.errors().next().unwrap();
        assert_eq!(error.kind, DiagnosticKind::TransformError);
        assert_eq!(error.subject, Subject::Document("b.md".into()));
        assert_eq!(error.plugin.as_deref(), Some("recorder"));
    }

    #[test]
    fn load_errors_are_warnings() {
        let registry = registry_with(vec!["a.md", "broken.md"], Recorder::default());
        let report = Lifecycle::new(SiteConfig::default(), registry)
            .run_to(Stage::Load)
            .unwrap();
        assert_eq!(report.documents_loaded, 1);
        assert!(report.success());
        assert_eq!(report.warnings().count(), 1);
    }

    // =========================================================================
    // Stage control
    // =========================================================================

    #[test]
    fn run_to_stops_after_the_requested_stage() {
        let registry = registry_with(vec!["a.md"], Recorder::default());
        let report = Lifecycle::new(SiteConfig::default(), registry)
            .run_to(Stage::Glob)
            .unwrap();
        assert_eq!(
            report.completed,
            vec![Stage::Configure, Stage::Validate, Stage::Glob]
        );
        assert_eq!(report.documents_loaded, 0);
    }

    #[test]
    fn configure_failure_is_fatal_and_names_the_plugin() {
        let mut registry = Registry::new();
        registry.register(FailingConfigure);
        let err = Lifecycle::new(SiteConfig::default(), registry)
            .run()
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Configure);
        assert_eq!(err.plugin(), Some("failing"));
    }

    #[test]
    fn disabled_plugins_do_not_run() {
        let mut registry = Registry::new();
        registry.register(FailingConfigure);
        let mut config = SiteConfig::default();
        config.plugins.disabled = vec!["failing".into()];
        assert!(Lifecycle::new(config, registry).run().is_ok());
    }

    #[test]
    fn cancellation_is_honoured_between_stages() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = BuildOptions {
            cancel,
            ..BuildOptions::default()
        };
        let err = Lifecycle::new(SiteConfig::default(), Registry::new())
            .with_options(options)
            .run()
            .unwrap_err();
        assert!(matches!(err, BuildError::Cancelled { stage: Stage::Configure }));
    }

    #[test]
    fn cleanup_errors_never_fail_the_build() {
        let ran = Arc::new(Mutex::new(false));
        let mut registry = registry_with(vec!["a.md"], Recorder::default());
        registry.register(Cleaner(ran.clone()));
        let report = Lifecycle::new(SiteConfig::default(), registry).run().unwrap();
        assert!(*ran.lock());
        assert!(report.success());
        assert_eq!(
            report.warnings().next().map(|d| d.kind),
            Some(DiagnosticKind::CleanupError)
        );
    }

    #[test]
    fn cleanup_is_skipped_by_run_to() {
        let ran = Arc::new(Mutex::new(false));
        let mut registry = Registry::new();
        registry.register(Cleaner(ran.clone()));
        Lifecycle::new(SiteConfig::default(), registry)
            .run_to(Stage::Write)
            .unwrap();
        assert!(!*ran.lock());
    }

    #[test]
    fn empty_glob_is_a_warning_and_exit_two() {
        let report = Lifecycle::new(SiteConfig::default(), Registry::new())
            .run()
            .unwrap();
        assert_eq!(report.warnings().next().map(|d| d.kind), Some(DiagnosticKind::GlobWarning));
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn stage_events_are_sent_in_order() {
        let (tx, rx) = mpsc::channel();
        let options = BuildOptions {
            events: Some(tx),
            ..BuildOptions::default()
        };
        Lifecycle::new(SiteConfig::default(), Registry::new())
            .with_options(options)
            .run_to(Stage::Validate)
            .unwrap();
        let started: Vec<Stage> = rx
            .try_iter()
            .filter_map(|e| match e {
                BuildEvent::StageStarted { stage } => Some(stage),
                BuildEvent::StageFinished { .. } => None,
            })
            .collect();
        assert_eq!(started, vec![Stage::Configure, Stage::Validate]);
    }

    // =========================================================================
    // Write
    // =========================================================================

    struct Emitter(Vec<&'static str>);

    impl WritePlugin for Emitter {
        fn artifacts(&self, _: &WriteContext<'_>) -> Result<Vec<Artifact>, WriteError> {
            Ok(self
                .0
                .iter()
                .map(|p| Artifact::new(*p, ArtifactItem::Site))
                .collect())
        }

        fn write(&self, artifact: &Artifact, _: &WriteContext<'_>) -> Result<Vec<u8>, WriteError> {
            Ok(artifact.path.display().to_string().into_bytes())
        }
    }

    impl Plugin for Emitter {
        fn name(&self) -> &str {
            "emitter"
        }

        fn capabilities(self: Arc<Self>) -> Capabilities {
            Capabilities::new().write(self)
        }
    }

    #[test]
    fn write_rejects_conflicts_and_escapes() {
        let tmp = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.output_dir = tmp.path().join("dist");
        let mut registry = registry_with(vec!["a.md"], Recorder::default());
        registry.register(Emitter(vec!["a/index.html", "../evil.txt", "a/index.html"]));

        let report = Lifecycle::new(config, registry).run().unwrap();
        assert_eq!(report.artifacts_written, 1);
        assert_eq!(report.errors().count(), 2);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("dist/a/index.html")).unwrap(),
            "a/index.html"
        );
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn output_path_checks() {
        assert!(is_inside_output(Path::new("a/b.html")));
        assert!(!is_inside_output(Path::new("")));
        assert!(!is_inside_output(Path::new("/etc/passwd")));
        assert!(!is_inside_output(Path::new("a/../../b")));
    }

    #[test]
    fn collect_sees_frozen_documents_in_path_order() {
        struct Snapshot(Arc<Mutex<Vec<String>>>);
        impl CollectPlugin for Snapshot {
            fn collect(&self, ctx: &mut CollectContext<'_>) -> Result<(), crate::feed::CollectError> {
                *self.0.lock() = crate::test_helpers::paths(ctx.documents);
                Ok(())
            }
        }
        impl Plugin for Snapshot {
            fn name(&self) -> &str {
                "snapshot"
            }
            fn capabilities(self: Arc<Self>) -> Capabilities {
                Capabilities::new().collect(self)
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry_with(vec!["c.md", "a.md", "b.md"], Recorder::default());
        registry.register(Snapshot(seen.clone()));
        Lifecycle::new(SiteConfig::default(), registry)
            .run_to(Stage::Collect)
            .unwrap();
        assert_eq!(*seen.lock(), ["a.md", "b.md", "c.md"]);
    }
}
