//! Error types for `openmcp-openapi-tools`.

use openmcp_http_tools::error::{ErrorKind, HttpToolsError};
use thiserror::Error;

/// Main error type for `OpenAPI` tooling.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// A spec file or scan directory does not exist.
    #[error("{what} not found: {location}")]
    NotFound { what: &'static str, location: String },

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    SpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {message}")]
    SpecParse { location: String, message: String },

    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    SpecFetch { url: String, message: String },

    #[error("OpenAPI error: failed to read spec body from '{url}': {message}")]
    SpecReadBody { url: String, message: String },

    /// The document parsed, but its shape is not what tool extraction needs.
    #[error("Malformed document: {0}")]
    Document(String),

    /// Missing or inconsistent registration input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors (invalid source location, client construction).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    HttpTools(#[from] HttpToolsError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OpenApiToolsError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SpecReadFile { source, .. } | Self::Io(source)
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ErrorKind::NotFound
            }
            Self::SpecReadFile { .. } | Self::Io(_) | Self::SpecParse { .. } | Self::Document(_) => {
                ErrorKind::Parse
            }
            Self::SpecFetch { .. } | Self::SpecReadBody { .. } => ErrorKind::Network,
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::HttpTools(e) => e.kind(),
        }
    }
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
