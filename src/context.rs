//! Per-run execution context
//!
//! The only place execution identifiers are minted. Each run gets its own input
//! file and output directory named after the identifier, so concurrent runs
//! sharing one solver directory never touch each other's files.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Identifier and derived paths of one solver run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    execution_id: String,
    executable: PathBuf,
    work_dir: PathBuf,
    input_file: PathBuf,
    output_dir: PathBuf,
}

impl ExecutionContext {
    /// Allocate a fresh context for the given solver executable.
    ///
    /// Pure value construction; nothing is created on disk.
    pub fn allocate(executable: impl AsRef<Path>) -> Self {
        let execution_id = Uuid::new_v4().to_string();
        let executable = executable.as_ref().to_path_buf();
        let work_dir = executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let input_file = work_dir.join(format!("input_{}.txt", execution_id));
        let output_dir = work_dir.join(format!("output_{}", execution_id));

        Self {
            execution_id,
            executable,
            work_dir,
            input_file,
            output_dir,
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Solver directory; the run's working directory
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Shortened identifier fragment, e.g. `1b4e28ba...`
pub fn short_id(execution_id: &str) -> String {
    let prefix: String = execution_id.chars().take(8).collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_paths_derive_from_id() {
        let ctx = ExecutionContext::allocate("/opt/cosmo/spare/m.exe");
        let id = ctx.execution_id().to_string();

        assert_eq!(ctx.work_dir(), Path::new("/opt/cosmo/spare"));
        assert_eq!(
            ctx.input_file(),
            Path::new("/opt/cosmo/spare").join(format!("input_{}.txt", id))
        );
        assert_eq!(
            ctx.output_dir(),
            Path::new("/opt/cosmo/spare").join(format!("output_{}", id))
        );
        assert!(!ctx.input_file().exists());
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| ExecutionContext::allocate("spare/m.exe").execution_id().to_string())
            .collect();

        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(
            short_id("1b4e28ba-2fa1-11d2-883f-0016d3cca427"),
            "1b4e28ba..."
        );
        let ctx = ExecutionContext::allocate("spare/m.exe");
        let short = short_id(ctx.execution_id());
        assert_eq!(short.len(), 11);
        assert!(ctx.execution_id().starts_with(short.trim_end_matches('.')));
    }
}
