//! Static file passthrough.

use crate::plugin::{Artifact, ArtifactItem, Capabilities, Plugin, WriteContext, WriteError, WritePlugin};
use std::sync::Arc;
use walkdir::WalkDir;

/// OS clutter that never belongs in the output.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Copies everything under `static_dir` into the output, keeping relative
/// paths. A missing directory contributes nothing.
pub struct StaticAssets;

impl WritePlugin for StaticAssets {
    fn artifacts(&self, ctx: &WriteContext<'_>) -> Result<Vec<Artifact>, WriteError> {
        let root = &ctx.config.static_dir;
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut artifacts = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| WriteError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_str().unwrap_or_default();
            if IGNORED_FILES.contains(&name) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            artifacts.push(Artifact::new(
                rel,
                ArtifactItem::File(entry.path().to_path_buf()),
            ));
        }
        Ok(artifacts)
    }

    fn write(&self, artifact: &Artifact, _: &WriteContext<'_>) -> Result<Vec<u8>, WriteError> {
        match &artifact.item {
            ArtifactItem::File(source) => Ok(std::fs::read(source)?),
            _ => Err(WriteError::Unsupported(artifact.path.clone())),
        }
    }
}

impl Plugin for StaticAssets {
    fn name(&self) -> &str {
        "static_assets"
    }

    fn priority(&self) -> i32 {
        130
    }

    fn capabilities(self: Arc<Self>) -> Capabilities {
        Capabilities::new().write(self)
    }
}
