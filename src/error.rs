//! Error types for the managed delivery tooling.
//!
//! This module provides the error hierarchy for every stage of working with a
//! delivery config: parsing and rewriting the document, and talking to the
//! Spinnaker API.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// The main error type for the managed delivery tooling.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Delivery config document errors.
    #[error("Delivery config error: {0}")]
    Document(#[from] DocumentError),

    /// Spinnaker API errors.
    #[error("Spinnaker API error: {0}")]
    Remote(#[from] RemoteError),

    /// Filesystem errors, annotated with the operation and path.
    #[error("Failed to {context} {}: {source}", path.display())]
    Io {
        /// Operation that failed (e.g. "read", "write").
        context: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// YAML encoding errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading, merging, or rewriting a delivery config.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Bytes could not be parsed as the expected document format.
    #[error("invalid content: {source}")]
    InvalidContent {
        /// The offending bytes.
        content: Vec<u8>,
        /// The underlying parse error.
        #[source]
        source: ParseError,
    },

    /// Artifact reference rewriting does not know this resource kind.
    #[error("cannot update artifact reference for unexpected kind: {kind:?}")]
    UnsupportedResourceKind {
        /// The resource kind.
        kind: String,
    },

    /// The resource is missing the nested structure required for its kind.
    #[error("resource for {kind} missing {missing} property")]
    MalformedResource {
        /// The resource kind.
        kind: String,
        /// Dotted path of the missing property.
        missing: String,
    },

    /// The delivery config has no name, so it cannot be addressed remotely.
    #[error("delivery config has no name")]
    MissingName,

    /// A document error annotated with where it happened.
    #[error("{context}: {source}")]
    Context {
        /// Description of the operation, usually including a path.
        context: String,
        /// The wrapped error.
        #[source]
        source: Box<DocumentError>,
    },
}

/// The parse failure behind [`DocumentError::InvalidContent`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The content was not valid YAML for the target type.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// The content was not valid JSON for the target type.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while talking to the Spinnaker API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API answered with a non-2xx status.
    #[error(transparent)]
    UnexpectedResponse(#[from] UnexpectedResponse),

    /// Publishing was rejected and the API explained why.
    #[error("failed to publish delivery config: {}", .0.message())]
    PublishFailed(Box<crate::model::PublishError>),

    /// The request never produced a response.
    #[error("failed to {method} {url}: {message}")]
    Transport {
        /// HTTP method.
        method: String,
        /// Full request URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// No API base URL was configured.
    #[error("Spinnaker API base URL not set (use --base-url or SPINNAKER_API_BASE_URL)")]
    MissingBaseUrl,

    /// The configured base URL cannot be used to build API URLs.
    #[error("invalid Spinnaker API base URL {url:?}: {message}")]
    InvalidBaseUrl {
        /// The configured value.
        url: String,
        /// Why it was rejected.
        message: String,
    },
}

/// A non-2xx response captured with enough detail to re-parse its body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected response from {url}, expected a 2xx status but got {status}")]
pub struct UnexpectedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full request URL.
    pub url: String,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl UnexpectedResponse {
    /// Parses the response body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Returns the body as lossy UTF-8 text.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Result type alias for managed delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

impl DeliveryError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates an IO error for the given operation and path.
    #[must_use]
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Returns the unexpected response behind this error, if any.
    #[must_use]
    pub const fn unexpected_response(&self) -> Option<&UnexpectedResponse> {
        match self {
            Self::Remote(RemoteError::UnexpectedResponse(resp)) => Some(resp),
            _ => None,
        }
    }

    /// Returns the innermost document error, skipping context wrappers.
    #[must_use]
    pub fn document_error(&self) -> Option<&DocumentError> {
        match self {
            Self::Document(err) => Some(err.root()),
            _ => None,
        }
    }
}

impl DocumentError {
    /// Creates an invalid content error from YAML bytes and the parse error.
    #[must_use]
    pub fn invalid_yaml(content: &[u8], source: serde_yaml::Error) -> Self {
        Self::InvalidContent {
            content: content.to_vec(),
            source: ParseError::Yaml(source),
        }
    }

    /// Creates an invalid content error from JSON bytes and the parse error.
    #[must_use]
    pub fn invalid_json(content: &[u8], source: serde_json::Error) -> Self {
        Self::InvalidContent {
            content: content.to_vec(),
            source: ParseError::Json(source),
        }
    }

    /// Creates a malformed resource error.
    #[must_use]
    pub fn malformed(kind: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::MalformedResource {
            kind: kind.into(),
            missing: missing.into(),
        }
    }

    /// Wraps this error with a description of where it happened.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping context wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl RemoteError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            method: method.into(),
            url: url.into(),
            message: message.into(),
        }
    }
}
