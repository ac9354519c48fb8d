//! Diagnostics and the aggregated build result.
//!
//! Every non-fatal problem becomes one [`Diagnostic`] naming the stage, the
//! plugin (when known), and the file, document, feed or artifact involved.
//! Nothing is dropped: the caller decides what to do with the report.

use crate::plugin::Stage;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// What went wrong, following the build's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Glob matched nothing, or skipped an unreadable entry.
    GlobWarning,
    GlobError,
    LoadError,
    TransformError,
    RenderError,
    FilterError,
    FeedNameConflict,
    CollectError,
    WriteError,
    CleanupError,
}

impl DiagnosticKind {
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticKind::GlobWarning => "GlobWarning",
            DiagnosticKind::GlobError => "GlobError",
            DiagnosticKind::LoadError => "LoadError",
            DiagnosticKind::TransformError => "TransformError",
            DiagnosticKind::RenderError => "RenderError",
            DiagnosticKind::FilterError => "FilterError",
            DiagnosticKind::FeedNameConflict => "FeedNameConflict",
            DiagnosticKind::CollectError => "CollectError",
            DiagnosticKind::WriteError => "WriteError",
            DiagnosticKind::CleanupError => "CleanupError",
        }
    }
}

/// The thing a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum Subject {
    /// A discovered file, relative to the content directory.
    File(PathBuf),
    /// A loaded document, by path.
    Document(PathBuf),
    Feed(String),
    /// An output file, relative to the output directory.
    Artifact(PathBuf),
    Plugin(String),
    Build,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::File(p) => write!(f, "file {}", p.display()),
            Subject::Document(p) => write!(f, "document {}", p.display()),
            Subject::Feed(name) => write!(f, "feed '{name}'"),
            Subject::Artifact(p) => write!(f, "output {}", p.display()),
            Subject::Plugin(name) => write!(f, "plugin '{name}'"),
            Subject::Build => f.write_str("build"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub subject: Subject,
    pub plugin: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(stage: Stage, kind: DiagnosticKind, subject: Subject, message: impl Into<String>) -> Self {
        Self {
            stage,
            severity: Severity::Error,
            kind,
            subject,
            plugin: None,
            message: message.into(),
        }
    }

    pub fn warning(
        stage: Stage,
        kind: DiagnosticKind,
        subject: Subject,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(stage, kind, subject, message)
        }
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "[{}] {level} {}: {}: {}",
            self.stage,
            self.kind.name(),
            self.subject,
            self.message
        )?;
        if let Some(plugin) = &self.plugin {
            write!(f, " (plugin {plugin})")?;
        }
        Ok(())
    }
}

/// Aggregated result of a build that did not fail fatally.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Stages that ran to completion, in order.
    pub completed: Vec<Stage>,
    pub files_discovered: usize,
    pub documents_loaded: usize,
    /// Documents that made it through Render.
    pub documents_rendered: usize,
    pub feeds_built: usize,
    pub artifacts_written: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    pub fn last_stage(&self) -> Option<Stage> {
        self.completed.last().copied()
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// True when Glob ran and found nothing to build.
    pub fn no_candidates(&self) -> bool {
        self.ran(Stage::Glob) && self.files_discovered == 0
    }

    /// No recorded errors. Warnings are fine.
    pub fn success(&self) -> bool {
        !self.has_errors()
    }

    /// Process exit code: 1 on any recorded error, 2 when there was
    /// nothing to build, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.has_errors() {
            1
        } else if self.no_candidates() {
            2
        } else {
            0
        }
    }

    pub fn diagnostics_for(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.stage == stage)
    }
}
