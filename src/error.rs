//! Error type for operator runs.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the operator runtime and built-in operators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing configuration; reported before any container work.
    #[error("{0}")]
    Config(String),

    /// No operator is registered under this name.
    #[error("unknown operator '{name}'; available operators: {}", available.join(", "))]
    OperatorNotFound { name: String, available: Vec<String> },

    /// The operator does not accept some of the supplied flags.
    #[error("operator {operator} does not support {}", flags.join(", "))]
    UnsupportedArguments { operator: String, flags: Vec<String> },

    /// The operator found something it cannot work with.
    #[error("{0}")]
    Operator(String),

    /// The run was interrupted (Ctrl-C).
    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Container(#[from] framesense_container::Error),

    #[error(transparent)]
    Records(#[from] framesense_common::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an operator error.
    pub fn operator(msg: impl Into<String>) -> Self {
        Self::Operator(msg.into())
    }

    /// Captured process output to echo before the error line.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Container(e) => e.diagnostics(),
            _ => None,
        }
    }
}
