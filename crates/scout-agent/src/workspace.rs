use crate::errors::ToolError;
use std::path::{Component, Path, PathBuf};

/// Files whose presence marks a directory as a project root.
const ROOT_MARKERS: &[&str] = &[".git", "Cargo.toml", "pyproject.toml", "package.json"];

/// The directory tree all file-system tools are confined to.
///
/// Every path a tool receives goes through [`Workspace::resolve`], which
/// rejects anything that would escape the root. Confinement is lexical;
/// symlinks inside the root are not chased.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk upward from `start` looking for a project marker; fall back to
    /// `start` itself when no ancestor carries one.
    pub fn discover(start: impl AsRef<Path>) -> Self {
        let start = start.as_ref();
        let mut current = Some(start);
        while let Some(dir) = current {
            if ROOT_MARKERS.iter().any(|m| dir.join(m).exists()) {
                return Self::new(dir);
            }
            current = dir.parent();
        }
        Self::new(start)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path against the workspace root.
    ///
    /// Relative paths are joined to the root; absolute paths are accepted
    /// only when they already sit under it. `.` and `..` components are
    /// folded lexically before the containment check so `a/../../etc` cannot
    /// sneak out.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, ToolError> {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let normalized = normalize(&joined);
        if normalized.starts_with(&self.root) {
            Ok(normalized)
        } else {
            Err(ToolError::Validation(format!(
                "path '{}' is outside the workspace root '{}'",
                path.display(),
                self.root.display()
            )))
        }
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let resolved = ws.resolve("src/main.rs").unwrap();
        assert_eq!(resolved, dir.path().join("src/main.rs"));
    }

    #[test]
    fn parent_traversal_out_of_the_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        assert!(ws.resolve("../outside.txt").is_err());
        assert!(ws.resolve("src/../../outside.txt").is_err());
    }

    #[test]
    fn absolute_path_inside_the_root_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let inside = dir.path().join("notes.md");
        assert_eq!(ws.resolve(&inside).unwrap(), inside);

        assert!(ws.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn dot_components_fold_away() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let resolved = ws.resolve("./a/./b/../c").unwrap();
        assert_eq!(resolved, dir.path().join("a/c"));
    }

    #[test]
    fn discover_stops_at_a_marker_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        let nested = project.join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(project.join("Cargo.toml"), "[package]\n").unwrap();

        let ws = Workspace::discover(&nested);
        assert_eq!(ws.root(), project.as_path());
    }
}
