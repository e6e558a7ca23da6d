//! Supabase GoTrue client with pluggable session persistence.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{
    AuthBackend, AuthChange, AuthChangeEvent, AuthError, AuthEvents, AuthResult, AuthSession,
    AuthSubscription, AuthUser, SessionPersistence, SessionTokens,
};
use crate::config::SupabaseConfig;
use crate::util::{compact_text, unix_timestamp_now};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthConfigStatus {
    pub email_enabled: bool,
    pub signup_enabled: bool,
    pub smtp_configured: bool,
    pub rate_limit_email_sent: Option<i64>,
}

impl AuthConfigStatus {
    /// Whether the project can deliver magic links to new and returning users.
    pub const fn supports_magic_links(&self) -> bool {
        self.email_enabled && self.smtp_configured
    }
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
    events: AuthEvents,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(config: &SupabaseConfig, store: S, timeout: Duration) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(&config.url)?;
        let anon_key = config.anon_key.trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().timeout(timeout).build()?,
            store,
            events: AuthEvents::new(),
        })
    }

    pub const fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// A failed refresh clears storage and reports "no session".
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                self.events.emit(AuthChange::signed_out());
                Ok(None)
            }
        }
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response = self.send_json::<SupabaseAuthResponse>(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        self.events.emit(AuthChange::new(
            AuthChangeEvent::TokenRefreshed,
            Some(session.clone()),
        ));
        Ok(session)
    }

    /// Install a session from a token pair, as delivered by a magic link.
    ///
    /// Expired or undecodable access tokens are exchanged through the
    /// refresh token instead of being trusted.
    pub async fn install_tokens(&self, tokens: &SessionTokens) -> AuthResult<AuthSession> {
        let expires_at = access_token_expiry(&tokens.access_token)
            .filter(|expires_at| *expires_at > unix_timestamp_now());
        let Some(expires_at) = expires_at else {
            return self.refresh_session(&tokens.refresh_token).await;
        };

        let user = self.fetch_user(&tokens.access_token).await?;
        let session = AuthSession {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at,
            user,
        };

        self.store.save_session(&session)?;
        self.events.emit(AuthChange::new(
            AuthChangeEvent::SignedIn,
            Some(session.clone()),
        ));
        Ok(session)
    }

    pub async fn send_magic_link(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::InvalidEmail("Email is required"));
        }

        let payload = serde_json::json!({
            "email": email,
            "create_user": true,
        });
        let mut request = self.client.post(format!("{}/otp", self.auth_url));
        if !redirect_to.trim().is_empty() {
            request = request.query(&[("redirect_to", redirect_to.trim())]);
        }
        let request = self.public_request(request.json(&payload));

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        tracing::info!("Magic link requested (redirect_to={})", redirect_to);
        Ok(())
    }

    pub async fn sign_out_current(&self) -> AuthResult<()> {
        if let Some(session) = self.store.load_session()? {
            let request = self
                .client
                .post(format!("{}/logout", self.auth_url))
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token);

            let response = request.send().await?;
            // An already-revoked token still counts as signed out.
            if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED)
            {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::Api(parse_api_error(status, &body)));
            }
        }

        self.store.clear_session()?;
        self.events.emit(AuthChange::signed_out());
        Ok(())
    }

    pub async fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        let Some(session) = self.restore_session().await? else {
            return Ok(None);
        };
        self.fetch_user(&session.access_token).await.map(Some)
    }

    pub async fn verify_configuration(&self) -> AuthResult<AuthConfigStatus> {
        let request = self.public_request(
            self.client
                .get(format!("{}/settings", self.auth_url))
                .header("Accept", "application/json"),
        );
        let payload = self.send_json::<SupabaseSettingsResponse>(request).await?;
        Ok(payload.into())
    }

    async fn fetch_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        let request = self
            .client
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        let user = self.send_json::<SupabaseUser>(request).await?;
        Ok(user.into())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> AuthResult<T> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl<S: SessionPersistence> AuthBackend for SupabaseAuthClient<S> {
    async fn get_session(&self) -> AuthResult<Option<AuthSession>> {
        self.restore_session().await
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn refresh(&self) -> AuthResult<AuthSession> {
        let Some(stored_session) = self.store.load_session()? else {
            return Err(AuthError::NotAuthenticated);
        };

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(session) => Ok(session),
            Err(AuthError::Api(message)) => {
                // Transport failures keep the session for a later retry.
                self.store.clear_session()?;
                self.events.emit(AuthChange::signed_out());
                Err(AuthError::Api(message))
            }
            Err(error) => Err(error),
        }
    }

    async fn set_session(&self, tokens: &SessionTokens) -> AuthResult<AuthSession> {
        self.install_tokens(tokens).await
    }

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        self.send_magic_link(email, redirect_to).await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sign_out_current().await
    }

    async fn get_user(&self) -> AuthResult<Option<AuthUser>> {
        self.current_user().await
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

/// `exp` claim of a JWT, read without verifying the signature.
///
/// The server verifies every request; the client only needs to know when to
/// refresh.
fn access_token_expiry(access_token: &str) -> Option<i64> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = access_token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<Claims>(&decoded)
        .ok()
        .map(|claims| claims.exp)
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

impl SupabaseAuthResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
        });

        match (
            self.access_token,
            self.refresh_token,
            expires_at,
            self.user.map(AuthUser::from),
        ) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, _) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<SupabaseUserMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct SupabaseUserMetadata {
    #[serde(default)]
    name: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email.filter(|email| !email.trim().is_empty()),
            name: value
                .user_metadata
                .and_then(|metadata| metadata.name)
                .filter(|name| !name.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseSettingsResponse {
    external: Option<SupabaseSettingsExternal>,
    disable_signup: Option<bool>,
    rate_limit_email_sent: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SupabaseSettingsExternal {
    email: Option<bool>,
    #[serde(default)]
    smtp_admin_email: Option<String>,
    #[serde(default)]
    smtp_host: Option<String>,
}

impl From<SupabaseSettingsResponse> for AuthConfigStatus {
    fn from(value: SupabaseSettingsResponse) -> Self {
        let external = value.external;
        let email_enabled = external.as_ref().and_then(|cfg| cfg.email).unwrap_or(false);
        let smtp_configured = external.as_ref().is_some_and(|cfg| {
            [cfg.smtp_admin_email.as_ref(), cfg.smtp_host.as_ref()]
                .into_iter()
                .flatten()
                .any(|value| !value.trim().is_empty())
        });

        Self {
            email_enabled,
            signup_enabled: !value.disable_signup.unwrap_or(true),
            smtp_configured,
            rate_limit_email_sent: value.rate_limit_email_sent,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload
            .msg
            .or(payload.message)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn normalize_auth_url_appends_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_keeps_existing_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/auth/v1").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn access_token_expiry_reads_exp_claim() {
        let token = jwt_with_payload(r#"{"sub":"user-1","exp":1700000000,"role":"authenticated"}"#);
        assert_eq!(access_token_expiry(&token), Some(1_700_000_000));
    }

    #[test]
    fn access_token_expiry_rejects_garbage() {
        assert_eq!(access_token_expiry("abc"), None);
        assert_eq!(access_token_expiry("a.!!!.c"), None);
        assert_eq!(access_token_expiry(&jwt_with_payload(r#"{"sub":"x"}"#)), None);
    }

    #[test]
    fn token_response_builds_session_with_metadata_name() {
        let response: SupabaseAuthResponse = serde_json::from_str(
            r#"{
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 3600,
                "user": {
                    "id": "user-1",
                    "email": "ada@example.com",
                    "user_metadata": {"name": "Ada"}
                }
            }"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.user.name.as_deref(), Some("Ada"));
        assert!(session.expires_at > unix_timestamp_now());
    }

    #[test]
    fn partial_token_response_is_an_error() {
        let response = SupabaseAuthResponse {
            access_token: Some("a".to_string()),
            refresh_token: None,
            expires_at: None,
            expires_in: Some(10),
            user: None,
        };
        assert!(matches!(response.into_session(), Err(AuthError::Api(_))));
    }

    #[test]
    fn api_error_prefers_msg_field() {
        let message = parse_api_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"code":429,"msg":"Email rate limit exceeded"}"#,
        );
        assert_eq!(message, "Email rate limit exceeded (429)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn settings_detect_magic_link_support() {
        let settings: SupabaseSettingsResponse = serde_json::from_str(
            r#"{
                "external": {"email": true, "smtp_host": "smtp.example.com"},
                "disable_signup": false
            }"#,
        )
        .unwrap();
        let status = AuthConfigStatus::from(settings);
        assert!(status.supports_magic_links());
        assert!(status.signup_enabled);
    }
}
