//! Strato Core - HTTP pipeline for authenticated cloud service SDKs
//!
//! This crate provides the shared machinery that concrete service bindings
//! build on: request construction, credential lifecycle management, response
//! conversion, and status-code classification into structured errors.
//!
//! # Main Components
//!
//! - **Error Handling**: Layered error types using `thiserror` and `anyhow`
//! - **Request Building**: Parameterized paths, query encoding, JSON, form,
//!   and multipart bodies assembled into inert request descriptors
//! - **Authentication**: Basic, bearer, and IAM token credential providers
//!   behind a single [`Authenticator`] trait
//! - **Transport**: [`ServiceClient`] dispatch with base URL resolution,
//!   standing headers, and opt-in retry
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strato_core::{
//!     IamAuthenticator, RequestBuilder, Result, ServiceClient,
//! };
//!
//! async fn example() -> Result<()> {
//!     let authenticator = Arc::new(IamAuthenticator::new("my-api-key")?);
//!     let client = ServiceClient::new(authenticator)?
//!         .with_base_url("https://api.example.cloud/assistant/api")?
//!         .with_api_version("2024-05-01");
//!
//!     let request = RequestBuilder::get("/v1/workspaces").build()?;
//!     let workspaces: serde_json::Value = client.send(&request).await?.json()?;
//!     println!("{}", workspaces);
//!     Ok(())
//! }
//! ```

pub mod datetime;
pub mod error;
pub mod http;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use http::{
    // Request construction
    resolve_request_url, FormPart, HttpRequest, RequestBody, RequestBuilder, RequestTarget,

    // Credential providers
    create_authenticator, Authenticator, BasicAuthenticator, BearerAuthenticator,
    IamAuthenticator, NoAuthAuthenticator,

    // Transport and responses
    ServiceClient, ServiceClientConfig, ServiceResponse,

    // Error classification
    ServiceError, ServiceErrorKind,

    // Retry
    execute_with_retry, RetryPolicy,

    // Wire types
    Method, StatusCode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
