use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::configuration::ConfigurationError;
use crate::report::ErrorKind;

/// Why a solver run did not succeed.
///
/// Carries enough detail for the reporter to build the user-facing message.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Work directory does not exist: {}", .0.display())]
    MissingWorkDir(PathBuf),

    #[error(
        "Solver executable not found at: {}. Please compile the solver first: {recompile_hint}",
        path.display()
    )]
    MissingExecutable {
        path: PathBuf,
        recompile_hint: String,
    },

    #[error("Execution timeout after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Solver exited with error code {0}. Check output for details.")]
    NonZeroExit(i32),

    #[error("Solver terminated by signal {0}. Check output for details.")]
    Signaled(i32),

    #[error("IO Error: {0}. Check if executable exists and has permissions.")]
    Io(#[from] std::io::Error),

    #[error("Execution interrupted: {0}")]
    Interrupted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),

    #[error("Error: {cause}")]
    Unexpected {
        category: &'static str,
        cause: anyhow::Error,
    },
}

impl ExecutionError {
    pub fn unexpected(category: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected {
            category,
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingWorkDir(_) => ErrorKind::MissingWorkDir,
            Self::MissingExecutable { .. } => ErrorKind::MissingExecutable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NonZeroExit(_) | Self::Signaled(_) => ErrorKind::NonZeroExit,
            Self::Io(_) => ErrorKind::Io,
            Self::Interrupted(_) => ErrorKind::Interrupted,
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Diagnostic text used as console output when nothing was captured
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Io(e) => Some(format!("{:?}: {}", e.kind(), e)),
            Self::Unexpected { category, cause } => {
                let mut details = format!("{}: {}", category, cause);
                if cause.chain().nth(1).is_some() {
                    details.push_str(&format!(" (Caused by: {})", cause.root_cause()));
                }
                Some(details)
            }
            _ => None,
        }
    }
}
