//! Error types for framesense-container.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a container engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither docker nor singularity answered `--version`.
    #[error("no container engine found (tried docker, singularity)")]
    NoEngine,

    /// The engine override named something we cannot drive.
    #[error("unknown container engine '{0}' (expected docker or singularity)")]
    UnknownEngine(String),

    /// A program could not be started at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A command ran and exited non-zero.
    #[error("command failed with exit code {}: {command}", code.map_or_else(|| "?".to_string(), |c| c.to_string()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The service process exited before announcing readiness.
    #[error("service {name} exited before it was ready")]
    ServiceStartup { name: String, output: String },

    /// The readiness marker never appeared.
    #[error("service {name} not ready after {timeout:?}")]
    ServiceTimeout { name: String, timeout: Duration },

    /// The service answered a request with an error.
    #[error("service error on {}: {message}", input.display())]
    ServiceCall { input: PathBuf, message: String },

    /// HTTP transport error talking to a service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An image could not be prepared.
    #[error("image build failed for {operator}: {message}")]
    ImageBuild { operator: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a spawn error.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Create a service call error.
    pub fn service_call(input: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ServiceCall {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create an image build error.
    pub fn image_build(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ImageBuild {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Captured process output worth echoing before the error line.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr.as_str()),
            Self::ServiceStartup { output, .. } => Some(output.as_str()),
            _ => None,
        }
        .filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = Error::command_failed("docker run --rm framesense/x", Some(2), "boom\n");
        assert_eq!(
            err.to_string(),
            "command failed with exit code 2: docker run --rm framesense/x"
        );
        assert_eq!(err.diagnostics(), Some("boom\n"));

        let err = Error::command_failed("docker ps", None, "");
        assert!(err.to_string().contains("exit code ?"));
        assert_eq!(err.diagnostics(), None);
    }

    #[test]
    fn test_service_call_names_input() {
        let err = Error::service_call("/media/col/v1/0001.jpg", "CUDA out of memory");
        assert_eq!(
            err.to_string(),
            "service error on /media/col/v1/0001.jpg: CUDA out of memory"
        );
    }

    #[test]
    fn test_startup_diagnostics() {
        let err = Error::ServiceStartup {
            name: "framesense_embed_service".to_string(),
            output: "Traceback ...".to_string(),
        };
        assert_eq!(err.diagnostics(), Some("Traceback ..."));
        assert!(Error::NoEngine.diagnostics().is_none());
    }
}
