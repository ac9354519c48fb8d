//! Content discovery.

use crate::plugin::{Capabilities, GlobContext, GlobError, GlobPlugin, Plugin};
use crate::report::Subject;
use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use std::sync::Arc;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Walks `content_dir` and adds every file matching a `glob.patterns` entry,
/// as a path relative to `content_dir`.
///
/// Hidden files are skipped. With `glob.use_gitignore`, `.gitignore` and
/// `.ignore` files inside the content tree are honoured, repository or not.
pub struct Glob;

impl GlobPlugin for Glob {
    fn glob(&self, ctx: &mut GlobContext<'_>) -> Result<(), GlobError> {
        let config = ctx.config;
        let root = &config.content_dir;
        if !root.is_dir() {
            ctx.warn(
                Subject::File(root.clone()),
                "content directory does not exist",
            );
            return Ok(());
        }

        let patterns = config
            .glob
            .patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| GlobError::Pattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let use_gitignore = config.glob.use_gitignore;
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .parents(false)
            .git_global(false)
            .git_ignore(use_gitignore)
            .git_exclude(use_gitignore)
            .ignore(use_gitignore)
            .require_git(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    ctx.warn(Subject::Build, err.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if path.starts_with(&config.output_dir) || path.starts_with(&config.cache.dir) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if patterns
                .iter()
                .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
            {
                ctx.add(relative);
            }
        }
        tracing::debug!(matched = ctx.files().len(), root = %root.display(), "content walked");
        Ok(())
    }
}

impl Plugin for Glob {
    fn name(&self) -> &str {
        "glob"
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().glob(self)
    }
}
