//! Discovery of the files a transfer has to move.
//!
//! The walk is the producer half of a transfer: it yields an immutable,
//! ordered list of work items that the drain loop consumes.

use crate::utils::errors::{BackupError, Result};
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferWorkItem {
    /// Path below the walked root, `/`-separated on every platform.
    pub relative_key: String,
    /// Absolute path of the source file.
    pub source_path: PathBuf,
}

/// Walk `root` and collect every regular file, in walk order.
///
/// Entries are visited sorted by file name so the same tree always yields
/// the same order. Symlinks are followed; a broken one fails the walk like
/// any other I/O error, and nothing is returned in that case.
pub fn discover(root: &Path, cancel: &CancellationToken) -> Result<Vec<TransferWorkItem>> {
    let mut items = Vec::new();

    let walker = WalkDir::new(root).follow_links(true).sort_by_file_name();

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled {
                completed: items.len(),
            });
        }

        let entry = entry.map_err(|e| discovery_error(root, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative_key = relative_key(root, entry.path())?;
        items.push(TransferWorkItem {
            relative_key,
            source_path: entry.into_path(),
        });
    }

    Ok(items)
}

fn discovery_error(root: &Path, reason: String) -> BackupError {
    BackupError::Discovery {
        root: root.to_path_buf(),
        reason,
    }
}

/// `path` below `root` as a `/`-joined key. A root that is itself a file
/// maps to its file name.
fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = if relative.as_os_str().is_empty() {
        Path::new(path.file_name().unwrap_or_default())
    } else {
        relative
    };

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => match segment.to_str() {
                Some(segment) => segments.push(segment),
                None => {
                    return Err(discovery_error(
                        root,
                        format!("non UTF-8 file name: {}", path.display()),
                    ))
                }
            },
            Component::CurDir => {}
            _ => {
                return Err(discovery_error(
                    root,
                    format!("unexpected path component in {}", path.display()),
                ))
            }
        }
    }
    Ok(segments.join("/"))
}
