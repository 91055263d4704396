//! OAuth2 client-credentials tokens for API carriers.
//!
//! Each API adapter owns one [`CredentialManager`]. The current token is
//! cached with its expiry and shared read-mostly between concurrent fetches.
//! Refreshes are single-flight: when several fetches find the token expired
//! (or rejected) at once, one of them requests a new token and the rest reuse
//! it.

use parcelwatch_core::ErrorKind;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Tokens are treated as expired this long before the server says so.
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token endpoint doesn't report one.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// Errors obtaining an access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Client ID or secret not configured
    #[error("credentials not configured: set {prefix}_CLIENT_ID and {prefix}_CLIENT_SECRET")]
    Missing {
        /// Environment variable prefix
        prefix: String,
    },

    /// The token endpoint refused the client credentials
    #[error("token endpoint rejected the client credentials ({0})")]
    Rejected(StatusCode),

    /// The token endpoint failed for another reason
    #[error("token endpoint returned {0}")]
    Upstream(StatusCode),

    /// The token request didn't complete
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CredentialError {
    /// The tracking failure kind this error surfaces as.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Missing { .. } | Self::Rejected(_) => ErrorKind::AuthError,
            Self::Upstream(StatusCode::TOO_MANY_REQUESTS) => ErrorKind::RateLimited,
            Self::Upstream(_) => ErrorKind::UpstreamUnavailable,
            Self::Transport(e) if e.is_timeout() => ErrorKind::NetworkTimeout,
            Self::Transport(e) if e.is_decode() => ErrorKind::AuthError,
            Self::Transport(_) => ErrorKind::UpstreamUnavailable,
        }
    }
}

/// An opaque client ID / secret pair.
///
/// The secret is zeroized on drop and never printed.
#[derive(Clone)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: Zeroizing<String>,
}

impl ClientCredentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Zeroizing::new(client_secret.into()),
        }
    }

    /// Read `<PREFIX>_CLIENT_ID` and `<PREFIX>_CLIENT_SECRET` through `lookup`.
    ///
    /// Returns `None` unless both are set and non-empty.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let id = lookup(&format!("{prefix}_CLIENT_ID")).filter(|v| !v.is_empty())?;
        let secret = Zeroizing::new(
            lookup(&format!("{prefix}_CLIENT_SECRET")).filter(|v| !v.is_empty())?,
        );
        Some(Self {
            client_id: id,
            client_secret: secret,
        })
    }

    /// The client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// A bearer token and when it stops being usable.
pub struct AccessToken {
    value: Zeroizing<String>,
    expires_at: Instant,
}

impl AccessToken {
    /// The bearer token.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.value
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Per-carrier client-credentials token cache.
pub struct CredentialManager {
    client: Client,
    token_url: String,
    scope: Option<String>,
    credentials_env: String,
    credentials: Option<ClientCredentials>,
    cached: RwLock<Option<Arc<AccessToken>>>,
    refresh_lock: Mutex<()>,
    token_requests: AtomicUsize,
}

impl CredentialManager {
    /// Create a manager. `credentials` may be absent, in which case every
    /// token request fails with [`CredentialError::Missing`].
    #[must_use]
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        scope: Option<String>,
        credentials_env: impl Into<String>,
        credentials: Option<ClientCredentials>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            scope,
            credentials_env: credentials_env.into(),
            credentials,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            token_requests: AtomicUsize::new(0),
        }
    }

    /// The configured credentials, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&ClientCredentials> {
        self.credentials.as_ref()
    }

    /// A valid token, from cache if possible.
    pub async fn token(&self) -> Result<Arc<AccessToken>, CredentialError> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(Arc::clone(token));
            }
        }
        self.refresh(None).await
    }

    /// Replace a token the carrier rejected.
    ///
    /// If another fetch already replaced `stale`, its token is returned
    /// without a new request.
    pub async fn refresh_rejected(
        &self,
        stale: &Arc<AccessToken>,
    ) -> Result<Arc<AccessToken>, CredentialError> {
        self.refresh(Some(stale)).await
    }

    /// How many token requests have been sent.
    #[must_use]
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::Relaxed)
    }

    async fn refresh(
        &self,
        stale: Option<&Arc<AccessToken>>,
    ) -> Result<Arc<AccessToken>, CredentialError> {
        let _guard = self.refresh_lock.lock().await;

        // Another fetch may have refreshed while we waited for the lock
        if let Some(current) = self.cached.read().await.as_ref() {
            let superseded = stale.map_or(true, |s| !Arc::ptr_eq(s, current));
            if superseded && !current.is_expired() {
                return Ok(Arc::clone(current));
            }
        }

        let token = Arc::new(self.request_token().await?);
        *self.cached.write().await = Some(Arc::clone(&token));
        Ok(token)
    }

    async fn request_token(&self) -> Result<AccessToken, CredentialError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| CredentialError::Missing {
                prefix: self.credentials_env.clone(),
            })?;

        self.token_requests.fetch_add(1, Ordering::Relaxed);
        debug!(token_url = %self.token_url, "requesting access token");

        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scope) = &self.scope {
            form.push(("scope", scope.as_str()));
        }

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&credentials.client_id, Some(credentials.client_secret.as_str()))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(CredentialError::Rejected(status));
        }
        if !status.is_success() {
            return Err(CredentialError::Upstream(status));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = body
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs)
            .saturating_sub(EXPIRY_SKEW);

        info!(
            lifetime_secs = lifetime.as_secs(),
            "obtained access token"
        );

        Ok(AccessToken {
            value: Zeroizing::new(body.access_token),
            expires_at: Instant::now() + lifetime,
        })
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("token_url", &self.token_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
