//! Supabase auth types, the backend seam, and deep-link handling.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::util::unix_timestamp_now;

mod client;
pub mod deep_link;
mod events;
mod platform;

pub use client::{normalize_auth_url, AuthConfigStatus, SupabaseAuthClient};
pub use deep_link::{extract_session_tokens, DeepLinkHandler, DeepLinkOutcome};
pub use events::{AuthChange, AuthChangeEvent, AuthEvents, AuthSubscription};
pub use platform::{PageLocation, Platform};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    /// `user_metadata.name`, when the account has one
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    /// Time left until the session is due for a refresh; zero once due.
    #[must_use]
    pub fn refresh_in(&self) -> Duration {
        let remaining = self.expires_at - EXPIRY_SKEW_SECONDS - unix_timestamp_now();
        Duration::from_secs(u64::try_from(remaining).unwrap_or(0))
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Bearer/refresh pair delivered through a magic-link redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("{0}")]
    InvalidEmail(&'static str),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Durable storage for the single live session of a process.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Authentication operations the session lifecycle depends on.
///
/// Implemented by [`SupabaseAuthClient`]; tests substitute in-memory fakes.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, restoring (and refreshing) persisted state.
    async fn get_session(&self) -> AuthResult<Option<AuthSession>>;

    /// Stream of session transitions. Dropping or unsubscribing the handle
    /// releases it.
    fn subscribe(&self) -> AuthSubscription;

    /// Exchange the stored refresh token for a new session.
    ///
    /// Success emits `TokenRefreshed`. A refresh token the server rejects
    /// drops the stored session and emits `SignedOut`.
    async fn refresh(&self) -> AuthResult<AuthSession>;

    /// Install a session from link tokens.
    async fn set_session(&self, tokens: &SessionTokens) -> AuthResult<AuthSession>;

    /// Request a magic-link email.
    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> AuthResult<()>;

    /// Invalidate the current session.
    async fn sign_out(&self) -> AuthResult<()>;

    /// Authoritative user record for the current session.
    async fn get_user(&self) -> AuthResult<Option<AuthUser>>;
}
