//! Solver layout configuration
//!
//! Describes where the pre-compiled solver lives relative to the backend root,
//! how it is rebuilt (for diagnostics only) and how long one run may take.

use std::fs;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Default wall-clock ceiling for one solver run
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Location conventions of the solver executable
#[derive(Debug, Clone, PartialEq)]
pub struct SolverLayout {
    /// Conventional subfolder holding the solver (e.g., "spare")
    pub solver_dir: String,
    /// File name of the executable inside `solver_dir` (e.g., "m.exe")
    pub executable: String,
    /// Final path segment that marks the backend root (e.g., "backend")
    pub backend_dir: String,
    /// Solver source file the executable is built from
    pub source_file: String,
    /// Command that rebuilds the executable, run from inside `solver_dir`
    pub compile_command: Vec<String>,
    /// Wall-clock ceiling for one run
    pub timeout_secs: u64,
}

impl SolverLayout {
    /// Parse a layout from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let raw: RawSolverLayout = toml::from_str(content).context("Invalid solver layout")?;

        for (key, value) in [
            ("dir", &raw.dir),
            ("executable", &raw.executable),
            ("backend_dir", &raw.backend_dir),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("Solver layout `{}` must not be empty", key);
            }
        }
        if raw.executable.contains('/') || raw.executable.contains('\\') {
            anyhow::bail!(
                "Solver layout `executable` must be a bare file name: {}",
                raw.executable
            );
        }
        if raw.timeout_secs == 0 {
            anyhow::bail!("Solver layout `timeout_secs` must be positive");
        }

        let compile_command = into_command(&raw.compile_command)
            .into_iter()
            .map(|part| {
                part.replace("{source}", &raw.source_file)
                    .replace("{executable}", &raw.executable)
            })
            .collect();

        Ok(Self {
            solver_dir: raw.dir,
            executable: raw.executable,
            backend_dir: raw.backend_dir,
            source_file: raw.source_file,
            compile_command,
            timeout_secs: raw.timeout_secs,
        })
    }

    /// The built-in layout shipped with the worker
    pub fn builtin() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/solver.toml"));
        Self::from_toml_str(content)
    }

    /// Wall-clock ceiling as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Shell command a user runs to (re)build the executable,
    /// e.g. `cd spare && gfortran gravitationalwaves.f -o m.exe`
    pub fn recompile_hint(&self) -> String {
        format!("cd {} && {}", self.solver_dir, self.compile_command.join(" "))
    }
}

/// Raw TOML layout
#[derive(Debug, Deserialize)]
struct RawSolverLayout {
    dir: String,
    executable: String,
    backend_dir: String,
    #[serde(default)]
    source_file: String,
    #[serde(default)]
    compile_command: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Global solver layout
static LAYOUT: OnceLock<SolverLayout> = OnceLock::new();

/// Initialize the solver layout, from `path` if given, otherwise the built-in one
pub fn init_layout(path: Option<&str>) -> anyhow::Result<&'static SolverLayout> {
    let layout = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read solver layout: {}", path))?;
            SolverLayout::from_toml_str(&content)?
        }
        None => SolverLayout::builtin()?,
    };

    LAYOUT
        .set(layout)
        .map_err(|_| anyhow::anyhow!("Solver layout already initialized"))?;

    get_layout().ok_or_else(|| anyhow::anyhow!("Solver layout missing after initialization"))
}

/// Get the solver layout, if initialized
pub fn get_layout() -> Option<&'static SolverLayout> {
    LAYOUT.get()
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
