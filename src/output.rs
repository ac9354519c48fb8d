//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Progress
//!
//! One line per finished stage, with its wall time and how many
//! diagnostics it recorded:
//!
//! ```text
//! configure    0ms
//! glob         3ms
//! load        12ms  (1 diagnostic)
//! ```
//!
//! ## Report
//!
//! Diagnostics grouped by stage, followed by a one-line summary:
//!
//! ```text
//! Load
//!     warning LoadError: file drafts/x.md: unterminated frontmatter (plugin markdown_loader)
//! Collect
//!     error FilterError: feed 'broken': expected a value at position 5 near 'in' (plugin feeds)
//!
//! 12 files, 11 documents, 11 rendered, 2 feeds, 31 files written
//! 1 error, 1 warning
//! ```
//!
//! ## Plugins
//!
//! ```text
//! Configure
//!     000 config_defaults
//! Transform
//!     010 slug_url
//!     050 reading_time (disabled)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::lifecycle::BuildEvent;
use crate::plugin::{PluginInfo, Stage};
use crate::report::{BuildReport, Diagnostic, Severity};
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a priority as a 3-digit zero-padded number. Negative values keep
/// their sign.
fn format_priority(priority: i32) -> String {
    if priority < 0 {
        format!("-{:0>3}", priority.unsigned_abs())
    } else {
        format!("{:0>3}", priority)
    }
}

/// "1 warning", "2 warnings".
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// A diagnostic without its stage prefix, for display under a stage header.
fn diagnostic_line(diag: &Diagnostic) -> String {
    let level = match diag.severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    };
    let mut line = format!(
        "{level} {}: {}: {}",
        diag.kind.name(),
        diag.subject,
        diag.message
    );
    if let Some(plugin) = &diag.plugin {
        line.push_str(&format!(" (plugin {plugin})"));
    }
    line
}

/// Capitalized stage name for section headers.
fn stage_header(stage: Stage) -> String {
    let name = stage.name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Format a lifecycle progress event. Stage starts produce no output; the
/// finish line carries the timing.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::StageStarted { .. } => Vec::new(),
        BuildEvent::StageFinished {
            stage,
            elapsed,
            diagnostics,
        } => {
            let mut line = format!("{:<10}{:>6}", stage.name(), format_elapsed(*elapsed));
            if *diagnostics > 0 {
                line.push_str(&format!("  ({})", plural(*diagnostics, "diagnostic")));
            }
            vec![line]
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Format the diagnostics of a finished build, grouped by stage in lifecycle
/// order, and a closing summary.
pub fn format_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    for stage in Stage::ALL {
        let mut diags = report.diagnostics_for(stage).peekable();
        if diags.peek().is_none() {
            continue;
        }
        lines.push(stage_header(stage));
        for diag in diags {
            lines.push(format!("{}{}", indent(1), diagnostic_line(diag)));
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }

    lines.extend(format_summary(report));
    lines
}

/// Counts for every stage that ran, then the error/warning tally.
pub fn format_summary(report: &BuildReport) -> Vec<String> {
    let mut counts = Vec::new();
    if report.ran(Stage::Glob) {
        counts.push(plural(report.files_discovered, "file"));
    }
    if report.ran(Stage::Load) {
        counts.push(plural(report.documents_loaded, "document"));
    }
    if report.ran(Stage::Render) {
        counts.push(format!("{} rendered", report.documents_rendered));
    }
    if report.ran(Stage::Collect) {
        counts.push(plural(report.feeds_built, "feed"));
    }
    if report.ran(Stage::Write) {
        counts.push(format!("{} written", plural(report.artifacts_written, "file")));
    }

    let mut lines = Vec::new();
    if !counts.is_empty() {
        lines.push(counts.join(", "));
    }
    if report.no_candidates() {
        lines.push("Nothing to build: no files matched the glob patterns".to_string());
    }
    let errors = report.errors().count();
    let warnings = report.warnings().count();
    if errors + warnings > 0 {
        lines.push(format!(
            "{}, {}",
            plural(errors, "error"),
            plural(warnings, "warning")
        ));
    }
    lines
}

/// Print the build report to stdout.
pub fn print_report(report: &BuildReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Plugins
// ============================================================================

/// Format the registry grouped by stage, in execution order within each
/// stage. A plugin appears once under every stage it participates in.
pub fn format_plugin_table(plugins: &[PluginInfo]) -> Vec<String> {
    let mut lines = Vec::new();
    for stage in Stage::ALL {
        let mut entries: Vec<&PluginInfo> = plugins
            .iter()
            .filter(|p| p.stages.contains(&stage))
            .collect();
        if entries.is_empty() {
            continue;
        }
        entries.sort_by_key(|p| p.priority);
        lines.push(stage_header(stage));
        for info in entries {
            let mut line = format!(
                "{}{} {}",
                indent(1),
                format_priority(info.priority),
                info.name
            );
            if info.disabled {
                line.push_str(" (disabled)");
            }
            lines.push(line);
        }
    }
    lines
}

/// Print the plugin table to stdout.
pub fn print_plugin_table(plugins: &[PluginInfo]) {
    for line in format_plugin_table(plugins) {
        println!("{}", line);
    }
}
