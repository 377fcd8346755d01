//! Error types for the Strato core library
//!
//! This module defines the error handling system for the request pipeline,
//! using thiserror for ergonomic error definitions and anyhow for flexible
//! error contexts. Service-level failures carry their own taxonomy in
//! [`crate::http::ServiceError`]; everything else lives here.

use thiserror::Error;

use crate::http::error::ServiceError;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// The service answered with a non-success status code
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The request never produced a response: DNS, connect, TLS, or timeout
    /// failures on the wire
    #[error("Transport fault: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A success payload could not be converted into the requested type
    #[error("Deserialization failed: {message}")]
    Deserialization {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Caller-supplied request parts were rejected before any I/O happened
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Client or endpoint configuration is unusable
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Credential validation or token acquisition failed
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON serialization or parsing error outside response conversion
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Creates an invalid-argument error from any displayable message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a configuration error from any displayable message
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates an authentication error without an underlying cause
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the HTTP status code when this error came from a service
    /// response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Service(err) => Some(err.status),
            _ => None,
        }
    }
}

/// Result type alias for operations that can fail with a pipeline [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}
