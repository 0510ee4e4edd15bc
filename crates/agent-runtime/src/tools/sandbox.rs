//! Path confinement for the file tools.
//!
//! A requested path is joined onto the root and `.`/`..` are folded
//! lexically. The longest existing prefix is then canonicalized (resolving
//! symlinks) and the missing tail, plain names only, is appended. The result must equal or descend from the canonical
//! root. Only metadata lookups happen here; no file content is touched.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use agent_core::ToolError;

#[derive(Clone, Debug)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create the root if needed and pin its canonical form
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path inside the root
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ToolError> {
        if requested.trim().is_empty() {
            return Err(ToolError::InvalidInput("'path' is required".into()));
        }

        let resolved = resolve_existing_prefix(&self.root.join(requested))?;
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            tracing::warn!(path = requested, "Blocked path outside sandbox root");
            Err(ToolError::PathEscape(requested.to_string()))
        }
    }
}

/// Fold `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize the longest existing prefix of a normalized path. The
/// missing tail holds only plain names, so no unchecked link survives.
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf, ToolError> {
    let normalized = normalize(path);
    let components: Vec<Component<'_>> = normalized.components().collect();

    for split in (1..=components.len()).rev() {
        let prefix: PathBuf = components[..split].iter().collect();
        match prefix.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(&components[split..]);
                return Ok(resolved);
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Err(ToolError::Io(format!("cannot resolve '{}'", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("workspace")).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn test_paths_inside_root() {
        let (_dir, sandbox) = sandbox();
        std::fs::create_dir(sandbox.root().join("notes")).unwrap();

        assert_eq!(sandbox.resolve("a.txt").unwrap(), sandbox.root().join("a.txt"));
        assert_eq!(
            sandbox.resolve("notes/../notes/./b.txt").unwrap(),
            sandbox.root().join("notes/b.txt")
        );
        assert_eq!(
            sandbox.resolve("new/deeper/c.txt").unwrap(),
            sandbox.root().join("new/deeper/c.txt")
        );
        assert_eq!(sandbox.resolve(".").unwrap(), sandbox.root());
    }

    #[test]
    fn test_traversal_is_rejected() {
        let (_dir, sandbox) = sandbox();

        for path in ["../outside.txt", "../../etc/passwd", "missing/../../x", "/etc/passwd"] {
            assert!(
                matches!(sandbox.resolve(path), Err(ToolError::PathEscape(_))),
                "{path}"
            );
        }
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_rejected() {
        let (dir, sandbox) = sandbox();
        std::fs::create_dir(dir.path().join("workspace-evil")).unwrap();

        assert!(matches!(
            sandbox.resolve("../workspace-evil/x"),
            Err(ToolError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let (dir, sandbox) = sandbox();
        let outside = dir.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), "s3cret").unwrap();
        std::os::unix::fs::symlink(&outside, sandbox.root().join("link")).unwrap();

        assert!(matches!(sandbox.resolve("link/secret.txt"), Err(ToolError::PathEscape(_))));
        assert!(matches!(sandbox.resolve("link/new.txt"), Err(ToolError::PathEscape(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_behind_missing_parent_is_rejected() {
        let (dir, sandbox) = sandbox();
        let outside = dir.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, sandbox.root().join("link")).unwrap();

        for path in ["missing/../link/secret.txt", "a/b/../../link/new.txt", "missing/./../link"] {
            assert!(
                matches!(sandbox.resolve(path), Err(ToolError::PathEscape(_))),
                "{path}"
            );
        }
    }

    #[test]
    fn test_missing_parent_folds_inside_root() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(
            sandbox.resolve("missing/../notes.txt").unwrap(),
            sandbox.root().join("notes.txt")
        );
    }

    #[test]
    fn test_empty_path() {
        let (_dir, sandbox) = sandbox();
        assert!(matches!(sandbox.resolve("  "), Err(ToolError::InvalidInput(_))));
    }
}
