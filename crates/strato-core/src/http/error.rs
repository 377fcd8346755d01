//! Service error taxonomy and response classification
//!
//! Maps non-success HTTP responses into a fixed, exhaustively matchable set
//! of error kinds, and extracts the most specific human-readable message the
//! response body offers.

use std::fmt;

use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Fixed message for 401 responses. Credential failures never echo
/// server-provided body text, which tends to be ambiguous or misleading.
pub const UNAUTHORIZED_MESSAGE: &str =
    "Unauthorized: Access is denied due to invalid credentials";

/// Kind of service-reported failure, keyed by HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceErrorKind {
    /// 400 - request was malformed or missing required parts
    BadRequest,
    /// 401 - credentials missing, invalid, or expired
    Unauthorized,
    /// 403 - authenticated but not allowed
    Forbidden,
    /// 404 - no resource at the requested path
    NotFound,
    /// 409 - request conflicts with current resource state
    Conflict,
    /// 413 - request entity exceeds the server limit
    RequestTooLarge,
    /// 415 - payload media type not accepted by the endpoint
    UnsupportedMediaType,
    /// 429 - rate limited
    TooManyRequests,
    /// 500 - server-side failure
    InternalServerError,
    /// 503 - service temporarily unavailable
    ServiceUnavailable,
    /// Any other non-success status; the raw status travels on the error
    Other,
}

impl ServiceErrorKind {
    /// Maps an HTTP status to its error kind
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ServiceErrorKind::BadRequest,
            401 => ServiceErrorKind::Unauthorized,
            403 => ServiceErrorKind::Forbidden,
            404 => ServiceErrorKind::NotFound,
            409 => ServiceErrorKind::Conflict,
            413 => ServiceErrorKind::RequestTooLarge,
            415 => ServiceErrorKind::UnsupportedMediaType,
            429 => ServiceErrorKind::TooManyRequests,
            500 => ServiceErrorKind::InternalServerError,
            503 => ServiceErrorKind::ServiceUnavailable,
            _ => ServiceErrorKind::Other,
        }
    }

    /// Static message used when the response body yields nothing usable
    pub fn default_message(&self, status: u16) -> String {
        match self {
            ServiceErrorKind::BadRequest => "Bad Request".to_string(),
            ServiceErrorKind::Unauthorized => UNAUTHORIZED_MESSAGE.to_string(),
            ServiceErrorKind::Forbidden => "Forbidden: Service refused the request".to_string(),
            ServiceErrorKind::NotFound => "Not found".to_string(),
            ServiceErrorKind::Conflict => "Conflict".to_string(),
            ServiceErrorKind::RequestTooLarge => {
                "Request too large: entity exceeds server limit".to_string()
            }
            ServiceErrorKind::UnsupportedMediaType => "Unsupported MIME type".to_string(),
            ServiceErrorKind::TooManyRequests => "Too many requests".to_string(),
            ServiceErrorKind::InternalServerError => "Internal Server Error".to_string(),
            ServiceErrorKind::ServiceUnavailable => "Service Unavailable".to_string(),
            ServiceErrorKind::Other => format!("Error {}", status),
        }
    }

    /// Whether an outer retry policy may retry this kind at all
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceErrorKind::TooManyRequests | ServiceErrorKind::ServiceUnavailable
        )
    }
}

/// A non-success response, classified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    /// HTTP status the service answered with
    pub status: u16,
    /// Classified kind for exhaustive matching
    pub kind: ServiceErrorKind,
    /// Most specific message the response offered, or the kind's default
    pub message: String,
    /// Parsed JSON body when the service sent one
    pub body: Option<Value>,
    /// Retry-After header in seconds, when present
    pub retry_after: Option<u64>,
}

impl ServiceError {
    /// Consumes a non-success response and classifies it. The body is read
    /// exactly once; unreadable bodies degrade to the kind's default message.
    pub async fn from_response(response: Response) -> Self {
        let status = response.status().as_u16();
        let kind = ServiceErrorKind::from_status(status);

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).ok();

        let message = if kind == ServiceErrorKind::Unauthorized {
            UNAUTHORIZED_MESSAGE.to_string()
        } else {
            Self::extract_message(&body, &text)
                .unwrap_or_else(|| kind.default_message(status))
        };

        Self {
            status,
            kind,
            message,
            body,
            retry_after,
        }
    }

    /// Pulls the most specific message out of an error body: the `error`
    /// field, then `error_message`, then `message`, then the raw body text.
    fn extract_message(body: &Option<Value>, text: &str) -> Option<String> {
        if let Some(json) = body {
            for field in ["error", "error_message", "message"] {
                if let Some(value) = json.get(field) {
                    return Some(match value.as_str() {
                        Some(s) => s.to_string(),
                        None => value.to_string(),
                    });
                }
            }
        }
        if text.trim().is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Whether an outer retry policy may retry this error
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error {}: {}", self.status, self.message)
    }
}

impl std::error::Error for ServiceError {}

/// Maps a wire-level failure into the transport fault kind, keeping timeout
/// and connect failures distinguishable in the message.
pub(crate) fn transport_error(error: reqwest::Error) -> Error {
    let message = if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };
    Error::Transport {
        message,
        source: Some(anyhow::Error::new(error)),
    }
}
