//! Solver executable lookup
//!
//! Re-evaluated for every run from the then-current directory; nothing is cached.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::solver::SolverLayout;

/// Absolute form of the directory the lookup starts from.
///
/// Existing directories are canonicalized so `..` segments are resolved before
/// taking parents. Anything else is joined onto the process's current directory.
pub fn absolute_base(dir: &Path) -> PathBuf {
    if let Ok(canonical) = dir.canonicalize() {
        return canonical;
    }
    match std::path::absolute(dir) {
        Ok(absolute) => absolute,
        Err(e) => {
            warn!("Cannot make {:?} absolute: {}", dir, e);
            dir.to_path_buf()
        }
    }
}

/// Candidate executable locations for `cwd`, in priority order
pub fn candidate_paths(cwd: &Path, layout: &SolverLayout) -> Vec<PathBuf> {
    let parent = cwd.parent().unwrap_or(cwd);
    let mut candidates = vec![
        // Started from the backend root: ../spare/m.exe
        parent.join(&layout.solver_dir).join(&layout.executable),
        // Solver folder inside the current directory: ./spare/m.exe
        cwd.join(&layout.solver_dir).join(&layout.executable),
    ];

    let in_backend_root = cwd
        .file_name()
        .map(|name| name == layout.backend_dir.as_str())
        .unwrap_or(false);
    if in_backend_root {
        if let Some(project_root) = cwd.parent() {
            candidates.push(project_root.join(&layout.solver_dir).join(&layout.executable));
        }
    }

    candidates
}

/// Resolve the solver executable for `cwd`.
///
/// Returns the first candidate that exists, or the first candidate when none
/// does so that callers can name it in diagnostics.
pub fn locate_executable(cwd: &Path, layout: &SolverLayout) -> PathBuf {
    let candidates = candidate_paths(cwd, layout);

    for path in &candidates {
        debug!("Checking solver path: {:?}", path);
        if path.exists() {
            info!("Found solver executable at {:?}", path);
            return path.clone();
        }
    }

    debug!(
        "No solver executable found from {:?}, falling back to {:?}",
        cwd, candidates[0]
    );
    candidates[0].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn layout() -> SolverLayout {
        SolverLayout::builtin().unwrap()
    }

    #[test]
    fn test_prefers_sibling_solver_dir() {
        let root = tempfile::tempdir().unwrap();
        let backend = root.path().join("backend");
        fs::create_dir_all(backend.join("spare")).unwrap();
        fs::create_dir_all(root.path().join("spare")).unwrap();
        fs::write(root.path().join("spare/m.exe"), "").unwrap();
        fs::write(backend.join("spare/m.exe"), "").unwrap();

        let found = locate_executable(&backend, &layout());
        assert_eq!(found, root.path().join("spare/m.exe"));
    }

    #[test]
    fn test_falls_back_to_nested_solver_dir() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("app");
        fs::create_dir_all(cwd.join("spare")).unwrap();
        fs::write(cwd.join("spare/m.exe"), "").unwrap();

        let found = locate_executable(&cwd, &layout());
        assert_eq!(found, cwd.join("spare/m.exe"));
    }

    #[test]
    fn test_missing_executable_returns_first_candidate() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("backend");
        fs::create_dir_all(&cwd).unwrap();

        let candidates = candidate_paths(&cwd, &layout());
        assert_eq!(candidates.len(), 3);

        let found = locate_executable(&cwd, &layout());
        assert_eq!(found, root.path().join("spare/m.exe"));
        assert_eq!(found, candidates[0]);
    }

    #[test]
    fn test_absolute_base_resolves_parent_segments() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("backend")).unwrap();

        let base = absolute_base(&root.path().join("backend").join(".."));
        assert_eq!(base, root.path().canonicalize().unwrap());
        assert_eq!(
            locate_executable(&base, &layout()),
            base.parent().unwrap().join("spare/m.exe")
        );
    }

    #[test]
    fn test_absolute_base_anchors_relative_paths() {
        let cwd = std::env::current_dir().unwrap();

        assert_eq!(absolute_base(Path::new(".")), cwd.canonicalize().unwrap());

        let missing = absolute_base(Path::new("no-such-dir/backend"));
        assert!(missing.is_absolute());
        assert_eq!(missing, cwd.join("no-such-dir/backend"));
    }

    #[test]
    fn test_backend_candidate_requires_exact_segment() {
        let root = tempfile::tempdir().unwrap();

        let candidates = candidate_paths(&root.path().join("mybackend"), &layout());
        assert_eq!(candidates.len(), 2);

        let candidates = candidate_paths(&root.path().join("backend"), &layout());
        assert_eq!(candidates.len(), 3);
    }
}
