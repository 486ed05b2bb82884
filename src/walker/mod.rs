// Project file walker
// Enumerates indexable source files under a project root without ever
// escaping it, pruning dependency/build/cache directories.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// File extensions recognized as indexable source code.
pub const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "py", "java", "c", "cc", "cpp", "cxx", "h", "hpp", "go", "rb",
    "php", "cs", "scala", "swift", "rs", "kt", "kts", "sh", "bash", "sql",
];

/// Directory names never descended into.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    "venv",
    ".env",
    "build",
    "dist",
    "out",
    "target",
    ".next",
    ".nuxt",
    ".svelte-kit",
    "coverage",
    ".nyc_output",
    ".pytest_cache",
    ".tox",
    ".eggs",
    "egg-info",
    ".cache",
    "tmp",
    "temp",
    ".vscode",
    ".idea",
    ".Trash",
    ".npm",
];

/// Hidden directory that is still descended into (it holds the index data).
const DATA_DIR_NAME: &str = ".terminal_helper";

/// Walk `project_root` and collect up to `max_files` indexable source files.
///
/// Directory entries are visited in name order at every level so index
/// builds are reproducible. Symlinks are followed but resolved and
/// bounds-checked against the canonicalized root; anything escaping it is
/// skipped. Per-entry permission errors are logged and swallowed.
#[inline]
pub fn walk_source_files(
    project_root: &Path,
    extra_excludes: &[String],
    max_files: usize,
) -> std::io::Result<Vec<PathBuf>> {
    let root = project_root.canonicalize()?;

    let mut excluded: HashSet<String> = DEFAULT_EXCLUDED_DIRS
        .iter()
        .map(|name| (*name).to_string())
        .collect();
    excluded.extend(extra_excludes.iter().cloned());

    let extensions: HashSet<&str> = CODE_EXTENSIONS.iter().copied().collect();

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, &root, &excluded));

    for entry in walker {
        if files.len() >= max_files {
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let has_code_ext = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.contains(ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !has_code_ext {
            continue;
        }

        files.push(entry.path().to_path_buf());
    }

    debug!(
        "Walker found {} source files under {}",
        files.len(),
        root.display()
    );
    Ok(files)
}

/// Directory pruning and symlink containment for one walk entry.
fn keep_entry(entry: &DirEntry, root: &Path, excluded: &HashSet<String>) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    let name = entry.file_name().to_string_lossy();

    if entry.file_type().is_dir() {
        if excluded.contains(name.as_ref()) {
            return false;
        }
        if name.starts_with('.') && name != DATA_DIR_NAME {
            return false;
        }
    }

    if entry.path_is_symlink() {
        match entry.path().canonicalize() {
            Ok(resolved) if resolved.starts_with(root) => true,
            Ok(resolved) => {
                debug!(
                    "Skipping symlink escaping project root: {} -> {}",
                    entry.path().display(),
                    resolved.display()
                );
                false
            }
            Err(e) => {
                debug!("Skipping broken symlink {}: {}", entry.path().display(), e);
                false
            }
        }
    } else {
        true
    }
}
