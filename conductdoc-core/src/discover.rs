//! Walks an acquired repository and lists the Python files worth parsing.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names pruned from the walk, on top of every dot-directory.
pub const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules", "venv", "env"];

pub const SOURCE_EXTENSION: &str = "py";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read repository root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lists source files under `root` in a stable order (file name order at each level).
///
/// Only a failure on `root` itself is an error; unreadable entries below it
/// are logged and skipped.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    std::fs::read_dir(root).map_err(|source| DiscoveryError::Root {
        path: root.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_pruned_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during discovery");
                continue;
            }
        };
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            debug!(path = %entry.path().display(), "Discovered source file");
            files.push(entry.into_path());
        }
    }

    info!(root = %root.display(), count = files.len(), "Discovery finished");
    Ok(files)
}

fn is_pruned_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn is_source_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.')
        && path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
}
