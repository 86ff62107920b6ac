//! Token authority: acquisition and time-bounded caching of the bearer credential.
//!
//! # Modes
//!
//! | Mode | Source | Refresh |
//! |------|--------|---------|
//! | `NoAuth` | nothing configured | never; no `Authorization` header is sent |
//! | `Static` | `--token` | never |
//! | `Dynamic` | OAuth2 client-credentials exchange | on first use, then after 90% of the advertised lifetime |
//!
//! # Single-flight refresh
//!
//! `current_token` takes a shared read lock first. Only when no usable token is
//! cached does it take the write lock, re-check, and perform the login while
//! holding it. Callers arriving during a login queue on the write lock and then
//! reuse the token it produced.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use gqlbatch_types::BearerToken;

/// Source of "now" for token expiry.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// OAuth2 client-credentials settings.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

// Manual Debug impl to prevent leaking the client secret in logs.
impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Mutually exclusive credential modes.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    Static(BearerToken),
    OAuth(OAuthCredentials),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid status code {status} during login")]
    Status { status: u16 },
    #[error("login request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid login response: {0}")]
    Decode(String),
    #[error("login response did not include access token")]
    MissingAccessToken,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    token: BearerToken,
    /// Instant from which the token must no longer be handed out.
    stale_at: Instant,
}

/// Fraction of the advertised lifetime after which a token is refreshed, as
/// (numerator, denominator) so that the computation stays in whole seconds.
const USABLE_LIFETIME: (u64, u64) = (9, 10);

/// Usable part of an advertised token lifetime, rounded down to whole seconds.
fn usable_lifetime(expires_in_secs: u64) -> Duration {
    let (num, den) = USABLE_LIFETIME;
    Duration::from_secs(expires_in_secs.saturating_mul(num) / den)
}

struct DynamicToken {
    http: reqwest::Client,
    oauth: OAuthCredentials,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<CachedToken>>,
    logins: AtomicU64,
}

enum Mode {
    NoAuth,
    Static(BearerToken),
    Dynamic(Box<DynamicToken>),
}

/// Owns the credential for one run.
pub struct TokenAuthority {
    mode: Mode,
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.mode {
            Mode::NoAuth => "NoAuth",
            Mode::Static(_) => "Static",
            Mode::Dynamic(_) => "Dynamic",
        };
        f.debug_struct("TokenAuthority")
            .field("mode", &mode)
            .finish()
    }
}

impl TokenAuthority {
    /// `http` is only used for the login exchange; it can be the run's shared client.
    #[must_use]
    pub fn new(credentials: Credentials, http: reqwest::Client) -> Self {
        Self::with_clock(credentials, http, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        credentials: Credentials,
        http: reqwest::Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mode = match credentials {
            Credentials::None => Mode::NoAuth,
            Credentials::Static(token) => Mode::Static(token),
            Credentials::OAuth(oauth) => Mode::Dynamic(Box::new(DynamicToken {
                http,
                oauth,
                clock,
                cached: RwLock::new(None),
                logins: AtomicU64::new(0),
            })),
        };
        Self { mode }
    }

    /// The token to attach to the next call, if any.
    ///
    /// In dynamic mode this may perform a login exchange; at most one exchange
    /// is in flight at a time.
    pub async fn current_token(&self) -> Result<Option<BearerToken>, AuthError> {
        match &self.mode {
            Mode::NoAuth => Ok(None),
            Mode::Static(token) => Ok(Some(token.clone())),
            Mode::Dynamic(dynamic) => dynamic.current().await.map(Some),
        }
    }

    /// Number of login exchanges attempted so far (always 0 outside dynamic mode).
    #[must_use]
    pub fn login_count(&self) -> u64 {
        match &self.mode {
            Mode::Dynamic(dynamic) => dynamic.logins.load(Ordering::Relaxed),
            Mode::NoAuth | Mode::Static(_) => 0,
        }
    }
}

impl DynamicToken {
    async fn current(&self) -> Result<BearerToken, AuthError> {
        if let Some(token) = self.usable(self.cached.read().await.as_ref()) {
            return Ok(token);
        }

        let mut cached = self.cached.write().await;
        // Another caller may have logged in while we waited for the write lock.
        if let Some(token) = self.usable(cached.as_ref()) {
            return Ok(token);
        }
        *cached = None;

        let fresh = self.login().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn usable(&self, cached: Option<&CachedToken>) -> Option<BearerToken> {
        cached
            .filter(|entry| self.clock.now() < entry.stale_at)
            .map(|entry| entry.token.clone())
    }

    async fn login(&self) -> Result<CachedToken, AuthError> {
        self.logins.fetch_add(1, Ordering::Relaxed);
        let started = self.clock.now();
        tracing::debug!(url = %self.oauth.token_url, "Requesting access token");

        let response = self
            .http
            .post(self.oauth.token_url.clone())
            .basic_auth(&self.oauth.client_id, Some(&self.oauth.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.oauth.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Login exchange rejected");
            return Err(AuthError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let login: LoginResponse =
            serde_json::from_slice(&body).map_err(|e| AuthError::Decode(e.to_string()))?;
        let token = BearerToken::new(login.access_token).ok_or(AuthError::MissingAccessToken)?;

        let usable = usable_lifetime(login.expires_in);
        tracing::debug!(
            expires_in = login.expires_in,
            refresh_after_secs = usable.as_secs(),
            "Access token acquired"
        );
        Ok(CachedToken {
            token,
            stale_at: started + usable,
        })
    }
}
