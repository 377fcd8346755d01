//! HTTP pipeline for authenticated service communication
//!
//! This module provides the full request/response pipeline:
//! - Request building with parameterized paths, query encoding, and bodies
//! - Credential providers for basic, bearer, and IAM token authentication
//! - Authenticated dispatch with base URL resolution and standing headers
//! - Status-code classification into structured service errors
//! - Opt-in retry with linear backoff and Retry-After support

pub mod auth;
pub mod builder;
pub mod client;
pub mod error;
pub mod media;
pub mod retry;

pub use auth::{
    create_authenticator, Authenticator, BasicAuthenticator, BearerAuthenticator,
    IamAuthenticator, NoAuthAuthenticator, DEFAULT_IAM_URL,
};
pub use builder::{
    resolve_request_url, FormPart, HttpRequest, RequestBody, RequestBuilder, RequestTarget,
};
pub use client::{ServiceClient, ServiceClientConfig, ServiceResponse};
pub use error::{ServiceError, ServiceErrorKind, UNAUTHORIZED_MESSAGE};
pub use retry::{execute_with_retry, RetryPolicy};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
