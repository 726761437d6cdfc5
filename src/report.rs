//! Structured result of one solver run

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::short_id;
use crate::error::ExecutionError;

/// Failure category of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingWorkDir,
    MissingExecutable,
    Timeout,
    NonZeroExit,
    Io,
    Interrupted,
    InvalidConfiguration,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::MissingWorkDir => "missing_work_dir",
            ErrorKind::MissingExecutable => "missing_executable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NonZeroExit => "non_zero_exit",
            ErrorKind::Io => "io",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::InvalidConfiguration => "invalid_configuration",
            ErrorKind::Unexpected => "unexpected",
        };
        write!(f, "{}", s)
    }
}

/// Result handed back to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: String,
    pub success: bool,
    pub message: String,
    /// Merged stdout/stderr of the solver
    pub output: Option<String>,
    /// Files in the run's output directory, relative to it
    pub output_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ExecutionResult {
    pub fn success(execution_id: &str, output: String, output_files: Vec<String>) -> Self {
        let message = format!(
            "Calculation completed successfully! Generated {} output file(s). Execution ID: {}",
            output_files.len(),
            short_id(execution_id)
        );

        Self {
            execution_id: execution_id.to_string(),
            success: true,
            message,
            output: Some(output),
            output_files: Some(output_files),
            error_kind: None,
        }
    }

    /// Failed run, keeping whatever console output and files were gathered
    pub fn failure(
        execution_id: &str,
        error: &ExecutionError,
        output: Option<String>,
        output_files: Option<Vec<String>>,
    ) -> Self {
        let output = match output {
            Some(console) if !console.is_empty() => Some(console),
            console => error.details().or(console),
        };

        Self {
            execution_id: execution_id.to_string(),
            success: false,
            message: error.to_string(),
            output,
            output_files,
            error_kind: Some(error.kind()),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.error_kind == Some(ErrorKind::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const ID: &str = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";

    #[test]
    fn test_success_message_uses_short_id() {
        let result = ExecutionResult::success(
            ID,
            "done\n".to_string(),
            vec!["spectrum.dat".to_string(), "bg/phi.dat".to_string()],
        );

        assert!(result.success);
        assert_eq!(
            result.message,
            "Calculation completed successfully! Generated 2 output file(s). Execution ID: 1b4e28ba..."
        );
        assert!(!result.message.contains(ID));
        assert_eq!(result.execution_id, ID);
        assert_eq!(result.error_kind, None);
    }

    #[test]
    fn test_failure_keeps_gathered_output() {
        let err = ExecutionError::NonZeroExit(2);
        let result = ExecutionResult::failure(
            ID,
            &err,
            Some("STOP 2\n".to_string()),
            Some(vec!["partial.dat".to_string()]),
        );

        assert!(!result.success);
        assert_eq!(
            result.message,
            "Solver exited with error code 2. Check output for details."
        );
        assert_eq!(result.output.as_deref(), Some("STOP 2\n"));
        assert_eq!(result.output_files, Some(vec!["partial.dat".to_string()]));
        assert_eq!(result.error_kind, Some(ErrorKind::NonZeroExit));
    }

    #[test]
    fn test_io_failure_without_console_carries_details() {
        let err = ExecutionError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let result = ExecutionResult::failure(ID, &err, None, None);

        assert_eq!(
            result.message,
            "IO Error: denied. Check if executable exists and has permissions."
        );
        assert_eq!(result.output.as_deref(), Some("PermissionDenied: denied"));
        assert_eq!(result.error_kind, Some(ErrorKind::Io));
    }

    #[test]
    fn test_timeout_failure_has_no_details() {
        let err = ExecutionError::Timeout(Duration::from_secs(600));
        let result = ExecutionResult::failure(ID, &err, Some(String::new()), None);

        assert_eq!(result.output.as_deref(), Some(""));
        assert_eq!(result.message, "Execution timeout after 600 seconds");
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = ExecutionResult::success(ID, String::new(), vec![]);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["executionId"], ID);
        assert_eq!(json["outputFiles"], serde_json::json!([]));
        assert!(json.get("errorKind").is_none());

        let err = ExecutionError::Interrupted("ctrl-c".to_string());
        let failed = ExecutionResult::failure(ID, &err, None, None);
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["errorKind"], "interrupted");
        assert!(failed.is_interrupted());
    }
}
