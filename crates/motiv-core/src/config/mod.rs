//! Client configuration.
//!
//! Resolves the Supabase project endpoint and anon key, the magic-link
//! redirect target, and HTTP client settings. Only public values live here;
//! sessions are persisted separately through `SessionPersistence`.

use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

/// URL scheme registered for deep links into the app.
pub const DEFAULT_APP_SCHEME: &str = "motiv";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_REDIRECT_URL: &str = "MOTIV_REDIRECT_URL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Missing Supabase configuration. Set SUPABASE_URL and SUPABASE_ANON_KEY or run `motiv config init`."
    )]
    MissingSupabase,
    #[error("Supabase URL and anon key must be configured together")]
    PartialSupabase,
    #[error("Invalid configuration for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Supabase project endpoint and public anon key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: impl AsRef<str>, anon_key: impl AsRef<str>) -> Result<Self, ConfigError> {
        let url = url.as_ref().trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "supabase_url",
                reason: "must not be empty",
            });
        }
        if !is_http_url(url) {
            return Err(ConfigError::Invalid {
                field: "supabase_url",
                reason: "must include http:// or https://",
            });
        }

        let anon_key = anon_key.as_ref().trim();
        if anon_key.is_empty() {
            return Err(ConfigError::Invalid {
                field: "supabase_anon_key",
                reason: "must not be empty",
            });
        }

        Ok(Self {
            url: url.to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    /// Resolve optional URL/key values.
    ///
    /// Both missing means "not configured" (`Ok(None)`); exactly one present
    /// is an error.
    pub fn resolve(
        url: Option<String>,
        anon_key: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        match (normalize_text_option(url), normalize_text_option(anon_key)) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            _ => Err(ConfigError::PartialSupabase),
        }
    }

    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::resolve(
            std::env::var(ENV_SUPABASE_URL).ok(),
            std::env::var(ENV_SUPABASE_ANON_KEY).ok(),
        )
    }
}

/// Everything a client process needs to talk to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    /// Explicit magic-link redirect; wins over `app_scheme`
    pub redirect_url: Option<String>,
    pub app_scheme: Option<String>,
    pub http_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Overlay values from `SUPABASE_URL`, `SUPABASE_ANON_KEY` and
    /// `MOTIV_REDIRECT_URL` when they are set and non-empty.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_SUPABASE_URL).ok(),
            std::env::var(ENV_SUPABASE_ANON_KEY).ok(),
            std::env::var(ENV_REDIRECT_URL).ok(),
        )
    }

    #[must_use]
    pub fn with_overrides(
        mut self,
        supabase_url: Option<String>,
        supabase_anon_key: Option<String>,
        redirect_url: Option<String>,
    ) -> Self {
        if let Some(url) = normalize_text_option(supabase_url) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = normalize_text_option(supabase_anon_key) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(redirect) = normalize_text_option(redirect_url) {
            self.redirect_url = Some(redirect);
        }
        self
    }

    pub fn supabase(&self) -> Result<SupabaseConfig, ConfigError> {
        SupabaseConfig::resolve(self.supabase_url.clone(), self.supabase_anon_key.clone())?
            .ok_or(ConfigError::MissingSupabase)
    }

    /// Deep-link target used for magic links on non-web platforms.
    pub fn redirect_target(&self) -> String {
        if let Some(url) = normalize_text_option(self.redirect_url.clone()) {
            return url;
        }
        let scheme = normalize_text_option(self.app_scheme.clone())
            .unwrap_or_else(|| DEFAULT_APP_SCHEME.to_string());
        format!("{}://", scheme.trim_end_matches("://"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(
            self.http_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_requires_both_values() {
        assert_eq!(SupabaseConfig::resolve(None, None).unwrap(), None);
        assert_eq!(
            SupabaseConfig::resolve(Some("https://demo.supabase.co".to_string()), None),
            Err(ConfigError::PartialSupabase)
        );
        assert_eq!(
            SupabaseConfig::resolve(None, Some("  ".to_string())).unwrap(),
            None
        );
    }

    #[test]
    fn new_trims_trailing_slash_and_rejects_bad_scheme() {
        let config = SupabaseConfig::new(" https://demo.supabase.co/ ", " anon ").unwrap();
        assert_eq!(config.url, "https://demo.supabase.co");
        assert_eq!(config.anon_key, "anon");

        assert!(matches!(
            SupabaseConfig::new("demo.supabase.co", "anon"),
            Err(ConfigError::Invalid {
                field: "supabase_url",
                ..
            })
        ));
    }

    #[test]
    fn missing_supabase_values_are_reported() {
        let config = ClientConfig::default();
        assert_eq!(config.supabase(), Err(ConfigError::MissingSupabase));
    }

    #[test]
    fn redirect_target_prefers_explicit_url() {
        let config = ClientConfig {
            redirect_url: Some("https://app.example.com/auth".to_string()),
            app_scheme: Some("custom".to_string()),
            ..Default::default()
        };
        assert_eq!(config.redirect_target(), "https://app.example.com/auth");
    }

    #[test]
    fn redirect_target_falls_back_to_app_scheme() {
        assert_eq!(ClientConfig::default().redirect_target(), "motiv://");

        let config = ClientConfig {
            app_scheme: Some("exp+motiv://".to_string()),
            ..Default::default()
        };
        assert_eq!(config.redirect_target(), "exp+motiv://");
    }

    #[test]
    fn overrides_ignore_blank_values() {
        let config = ClientConfig {
            supabase_url: Some("https://a.supabase.co".to_string()),
            ..Default::default()
        }
        .with_overrides(Some(" ".to_string()), Some("key".to_string()), None);
        assert_eq!(config.supabase_url.as_deref(), Some("https://a.supabase.co"));
        assert_eq!(config.supabase_anon_key.as_deref(), Some("key"));
    }

    #[test]
    fn http_timeout_defaults_when_unset_or_zero() {
        assert_eq!(ClientConfig::default().http_timeout(), Duration::from_secs(15));
        let config = ClientConfig {
            http_timeout_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
    }
}
