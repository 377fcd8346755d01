//! Authentication for service requests
//!
//! Supports the credential schemes services actually deploy:
//! - Basic username/password pairs
//! - User-managed bearer tokens (never refreshed here)
//! - IAM API keys exchanged for short-lived access tokens, with caching,
//!   margin-based refresh, and single-flight refresh per authenticator
//! - No authentication, for anonymous or self-hosted endpoints
//!
//! Every authenticator owns its state; nothing here is process-wide.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::http::error::{transport_error, ServiceError};
use crate::{Error, Result};

/// Default IAM token service URL
pub const DEFAULT_IAM_URL: &str = "https://iam.ng.bluemix.net/identity/token";

/// Fixed client credential the token service expects on every grant request
const IAM_ENDPOINT_AUTHORIZATION: &str = "Basic Yng6Yng=";

/// Grant type for exchanging an API key for an access token
const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Grant type for refreshing a previously issued token
const REFRESH_GRANT_TYPE: &str = "refresh_token";

/// Fraction of the token lifetime kept as refresh margin: a token is
/// refreshed once less than 20% of its time-to-live remains
const REFRESH_MARGIN: f64 = 0.2;

/// Timeout for token service requests, independent of client configuration
const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Attaches credentials to outgoing requests
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Adds the scheme's `Authorization` header (or nothing) to the request
    async fn authenticate(&self, headers: &mut HeaderMap) -> Result<()>;

    /// Checks the configured credentials for construction-time mistakes
    fn validate(&self) -> Result<()>;
}

/// Rejects empty credentials and the brace/quote artifacts left behind by
/// copy-pasting values out of credential JSON
fn check_credential(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::authentication(format!("The {} must not be empty", name)));
    }
    if value.starts_with(['{', '"']) || value.ends_with(['}', '"']) {
        return Err(Error::authentication(format!(
            "The {} must not start or end with curly brackets or quotes; \
             remove any surrounding {{, }}, or \" characters",
            name
        )));
    }
    Ok(())
}

/// Performs no authentication at all
#[derive(Default)]
pub struct NoAuthAuthenticator;

impl NoAuthAuthenticator {
    /// Creates the no-op authenticator
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for NoAuthAuthenticator {
    async fn authenticate(&self, _headers: &mut HeaderMap) -> Result<()> {
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Basic username/password authentication
pub struct BasicAuthenticator {
    username: String,
    password: String,
}

impl BasicAuthenticator {
    /// Creates a basic authenticator, validating both credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let authenticator = Self {
            username: username.into(),
            password: password.into(),
        };
        authenticator.validate()?;
        Ok(authenticator)
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    async fn authenticate(&self, headers: &mut HeaderMap) -> Result<()> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let value = HeaderValue::from_str(&format!("Basic {}", encoded)).map_err(|e| {
            Error::Authentication {
                message: format!("credentials are not a valid header value: {}", e),
                source: Some(anyhow::Error::new(e)),
            }
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        check_credential("username", &self.username)?;
        check_credential("password", &self.password)
    }
}

/// Caller-managed bearer token, attached verbatim and never refreshed
pub struct BearerAuthenticator {
    token: String,
}

impl BearerAuthenticator {
    /// Creates a bearer authenticator from an existing access token
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let authenticator = Self { token: token.into() };
        authenticator.validate()?;
        Ok(authenticator)
    }
}

#[async_trait]
impl Authenticator for BearerAuthenticator {
    async fn authenticate(&self, headers: &mut HeaderMap) -> Result<()> {
        let value = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|e| {
            Error::Authentication {
                message: format!("token is not a valid header value: {}", e),
                source: Some(anyhow::Error::new(e)),
            }
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        check_credential("bearer token", &self.token)
    }
}

/// Token payload issued by the IAM token service. Unknown fields are
/// ignored; expiry metadata may be absent, in which case every request
/// re-acquires a token.
#[derive(Debug, Clone, Deserialize)]
struct IamToken {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expiration: Option<i64>,
}

impl IamToken {
    /// True once less than [`REFRESH_MARGIN`] of the lifetime remains, or
    /// when the service omitted expiry metadata
    fn needs_refresh(&self, now: i64) -> bool {
        match (self.expiration, self.expires_in) {
            (Some(expiration), Some(ttl)) => {
                let refresh_at = expiration - (ttl as f64 * REFRESH_MARGIN) as i64;
                refresh_at <= now
            }
            _ => true,
        }
    }
}

/// Exchanges an IAM API key for short-lived access tokens and caches them
///
/// The first acquisition uses the API-key grant; later refreshes use the
/// refresh-token grant when the service issued one. Refreshes are serialized
/// through an internal async mutex, so concurrent requests on a stale token
/// trigger exactly one round trip to the token service. A failed token
/// request is retried once before the failure propagates.
pub struct IamAuthenticator {
    api_key: String,
    url: String,
    user_token: Option<String>,
    http: reqwest::Client,
    state: Mutex<Option<IamToken>>,
}

impl IamAuthenticator {
    /// Creates an IAM authenticator for the default token service URL
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_credential("IAM API key", &api_key)?;
        Ok(Self {
            api_key,
            url: DEFAULT_IAM_URL.to_string(),
            user_token: None,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
                .build()
                .map_err(|e| Error::Configuration {
                    message: format!("failed to build token service client: {}", e),
                })?,
            state: Mutex::new(None),
        })
    }

    /// Overrides the token service URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Supplies a caller-managed access token. The token is used verbatim
    /// for every request and never refreshed; managing its lifecycle stays
    /// the caller's responsibility.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }

    /// Returns a valid access token, acquiring or refreshing as needed
    pub async fn token(&self) -> Result<String> {
        if let Some(user_token) = &self.user_token {
            return Ok(user_token.clone());
        }

        // Lock held across the refresh: concurrent callers wait here and
        // then observe the freshly cached token instead of re-requesting
        let mut state = self.state.lock().await;
        let now = Utc::now().timestamp();
        if let Some(token) = state.as_ref() {
            if !token.needs_refresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let refreshed = self.request_token(state.as_ref()).await?;
        let access_token = refreshed.access_token.clone();
        *state = Some(refreshed);
        Ok(access_token)
    }

    /// Requests a token, retrying exactly once on failure
    async fn request_token(&self, current: Option<&IamToken>) -> Result<IamToken> {
        let params = match current.and_then(|t| t.refresh_token.clone()) {
            Some(refresh_token) => vec![
                ("grant_type", REFRESH_GRANT_TYPE.to_string()),
                ("refresh_token", refresh_token),
            ],
            None => vec![
                ("grant_type", APIKEY_GRANT_TYPE.to_string()),
                ("apikey", self.api_key.clone()),
                ("response_type", "cloud_iam".to_string()),
            ],
        };

        match self.send_token_request(&params).await {
            Ok(token) => Ok(token),
            Err(first_failure) => {
                log::warn!("IAM token request failed, retrying once: {}", first_failure);
                self.send_token_request(&params).await
            }
        }
    }

    async fn send_token_request(&self, params: &[(&str, String)]) -> Result<IamToken> {
        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, IAM_ENDPOINT_AUTHORIZATION)
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let service_error = ServiceError::from_response(response).await;
            return Err(Error::Authentication {
                message: format!("IAM token request failed: {}", service_error),
                source: Some(anyhow::Error::new(service_error)),
            });
        }

        response.json::<IamToken>().await.map_err(|e| Error::Authentication {
            message: format!("invalid IAM token response: {}", e),
            source: Some(anyhow::Error::new(e)),
        })
    }
}

#[async_trait]
impl Authenticator for IamAuthenticator {
    async fn authenticate(&self, headers: &mut HeaderMap) -> Result<()> {
        let token = self.token().await?;
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            Error::Authentication {
                message: format!("token is not a valid header value: {}", e),
                source: Some(anyhow::Error::new(e)),
            }
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.user_token.is_some() {
            return Ok(());
        }
        check_credential("IAM API key", &self.api_key)
    }
}

/// True when a username/password pair is really an IAM API key in disguise:
/// cloud deployments hand out the literal username `apikey`, while `icp-`
/// prefixed passwords belong to installed deployments that keep basic auth
pub fn uses_iam_credentials(username: &str, password: &str) -> bool {
    username == "apikey" && !password.starts_with("icp-")
}

/// Builds the right authenticator for a resolved username/password pair
pub fn create_authenticator(username: &str, password: &str) -> Result<Arc<dyn Authenticator>> {
    if uses_iam_credentials(username, password) {
        Ok(Arc::new(IamAuthenticator::new(password)?))
    } else {
        Ok(Arc::new(BasicAuthenticator::new(username, password)?))
    }
}
