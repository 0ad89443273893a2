//! Path validation — confines file tools to the workspace directory.
//!
//! Requested paths are joined onto the workspace root, normalized, and then
//! resolved through the nearest existing ancestor so that a symlink pointing
//! outside the root is caught even when the final file does not exist yet.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' escapes the workspace root")]
    OutsideWorkspace { path: String },

    #[error("Path is empty")]
    Empty,

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// Resolve `requested` against `root`, rejecting anything outside it.
///
/// Relative paths are taken relative to `root`; absolute paths are accepted
/// only if they already point inside it. Returns an absolute path whose
/// existing prefix has been canonicalized.
pub fn resolve_in_workspace(root: &Path, requested: &str) -> Result<PathBuf, PathValidationError> {
    if requested.trim().is_empty() {
        return Err(PathValidationError::Empty);
    }

    let root = root
        .canonicalize()
        .map_err(|e| PathValidationError::CanonicalizeFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

    let joined = root.join(requested);
    let normalized =
        normalize(&joined).ok_or_else(|| PathValidationError::OutsideWorkspace {
            path: requested.into(),
        })?;

    let resolved = canonicalize_existing_prefix(&normalized).map_err(|e| {
        PathValidationError::CanonicalizeFailed {
            path: requested.into(),
            reason: e.to_string(),
        }
    })?;

    if !resolved.starts_with(&root) {
        return Err(PathValidationError::OutsideWorkspace {
            path: requested.into(),
        });
    }
    Ok(resolved)
}

/// Lexically fold `.` and `..`. `None` if `..` climbs above the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Symlink hops followed before giving up on a chain of dangling links.
const MAX_LINK_HOPS: usize = 40;

/// Canonicalize the longest existing ancestor and re-append the rest.
///
/// Existence is checked without following links, so a dangling symlink is
/// resolved to its target rather than treated as a missing file.
fn canonicalize_existing_prefix(path: &Path) -> std::io::Result<PathBuf> {
    resolve_prefix(path, MAX_LINK_HOPS)
}

fn resolve_prefix(path: &Path, hops: usize) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut tail = Vec::new();
    while std::fs::symlink_metadata(existing).is_err() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = if existing.is_symlink() && !existing.exists() {
        if hops == 0 {
            return Err(std::io::Error::other("too many levels of symbolic links"));
        }
        let target = std::fs::read_link(existing)?;
        let base = existing.parent().unwrap_or(Path::new("/"));
        let target = normalize(&base.join(target))
            .ok_or_else(|| std::io::Error::other("symlink target climbs above the root"))?;
        resolve_prefix(&target, hops - 1)?
    } else {
        existing.canonicalize()?
    };
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_resolves_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        let resolved = resolve_in_workspace(dir.path(), "notes.txt").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("notes.txt"));
    }

    #[test]
    fn missing_nested_path_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_in_workspace(dir.path(), "a/b/c.txt").unwrap();
        assert!(resolved.ends_with("a/b/c.txt"));
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_in_workspace(dir.path(), "../outside.txt").unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideWorkspace { .. }));

        let err = resolve_in_workspace(dir.path(), "src/../../etc/passwd").unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideWorkspace { .. }));
    }

    #[test]
    fn inner_dotdot_that_stays_inside_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_in_workspace(dir.path(), "src/../README.md").unwrap();
        assert!(resolved.ends_with("README.md"));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_in_workspace(dir.path(), "/etc/passwd").unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideWorkspace { .. }));
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let inside = dir.path().join("x.txt");
        assert!(resolve_in_workspace(dir.path(), &inside.to_string_lossy()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let err = resolve_in_workspace(dir.path(), "link/new.txt").unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideWorkspace { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_to_outside_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let err = resolve_in_workspace(dir.path(), "link.txt").unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideWorkspace { .. }));
        let err = resolve_in_workspace(dir.path(), "link.txt/child").unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideWorkspace { .. }));
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_inside_root_resolves_to_its_target() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("draft.txt", dir.path().join("current.txt")).unwrap();
        let resolved = resolve_in_workspace(dir.path(), "current.txt").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("draft.txt"));
    }

    #[test]
    fn empty_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_in_workspace(dir.path(), "  "),
            Err(PathValidationError::Empty)
        ));
    }
}
