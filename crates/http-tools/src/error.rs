//! Error types for `openmcp-http-tools`.

use crate::safety::sanitize_reqwest_error;
use thiserror::Error;

/// Coarse error taxonomy shared by every OpenMCP crate.
///
/// Callers that surface errors over a wire (CLI exit codes, HTTP status codes) match on this
/// instead of on the concrete error enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing file, directory, or tool.
    NotFound,
    /// Malformed YAML/JSON or an unexpected document shape.
    Parse,
    /// Unreachable URL, non-2xx spec fetch, timeout.
    Network,
    /// HTTP method the dispatcher cannot issue.
    UnsupportedMethod,
    /// Missing or inconsistent registration fields.
    Validation,
}

#[derive(Debug, Error)]
pub enum HttpToolsError {
    #[error("Tool {0} not found")]
    ToolNotFound(String),
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("config error: {0}")]
    Config(String),
}

impl HttpToolsError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ToolNotFound(_) => ErrorKind::NotFound,
            Self::UnsupportedMethod(_) => ErrorKind::UnsupportedMethod,
            Self::InvalidUrl(_) | Self::InvalidResponse(_) => ErrorKind::Parse,
            Self::Transport(_) => ErrorKind::Network,
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpToolsError>;

impl From<reqwest::Error> for HttpToolsError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() {
            return Self::Config(sanitize_reqwest_error(&value));
        }
        Self::Transport(sanitize_reqwest_error(&value))
    }
}
