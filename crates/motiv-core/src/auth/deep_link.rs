//! Magic-link token extraction from redirect URLs.
//!
//! A completed magic link redirects to the app with
//! `#access_token=...&refresh_token=...` in the fragment. Extraction is
//! best-effort: anything malformed is ignored, and the session-change stream
//! stays the authoritative signal that sign-in completed.

use std::sync::Arc;

use tokio::sync::mpsc;
use url::{form_urlencoded, Url};

use super::{AuthBackend, SessionTokens};

const TOKEN_MARKER: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLinkOutcome {
    /// The URL carried no complete token pair.
    Ignored,
    /// Tokens were accepted and the session installed.
    Installed,
    /// Tokens were present but the backend refused them.
    Rejected,
}

/// Pull the token pair out of a redirect URL's fragment.
///
/// Returns `None` unless the URL mentions `access_token` and its fragment has
/// both a non-empty `access_token` and a non-empty `refresh_token`.
pub fn extract_session_tokens(url: &str) -> Option<SessionTokens> {
    if !url.contains(TOKEN_MARKER) {
        return None;
    }
    let fragment = url.split('#').nth(1)?;

    let mut access_token = None;
    let mut refresh_token = None;
    for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" if access_token.is_none() => access_token = Some(value.into_owned()),
            "refresh_token" if refresh_token.is_none() => refresh_token = Some(value.into_owned()),
            _ => {}
        }
    }

    let access_token = access_token.filter(|token| !token.is_empty())?;
    let refresh_token = refresh_token.filter(|token| !token.is_empty())?;
    Some(SessionTokens {
        access_token,
        refresh_token,
    })
}

/// URL with query and fragment removed, for cleaning up the address bar.
pub fn strip_auth_fragment(url: &str) -> String {
    if let Ok(mut parsed) = Url::parse(url) {
        parsed.set_fragment(None);
        parsed.set_query(None);
        return parsed.to_string();
    }
    url.split(['#', '?']).next().unwrap_or_default().to_string()
}

/// Installs sessions from deep links delivered by the host OS.
pub struct DeepLinkHandler<A: AuthBackend + ?Sized> {
    auth: Arc<A>,
}

impl<A: AuthBackend + ?Sized> Clone for DeepLinkHandler<A> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<A: AuthBackend + ?Sized> DeepLinkHandler<A> {
    pub fn new(auth: Arc<A>) -> Self {
        Self { auth }
    }

    pub async fn handle_url(&self, url: &str) -> DeepLinkOutcome {
        let Some(tokens) = extract_session_tokens(url) else {
            tracing::debug!("Deep link carried no session tokens; ignoring");
            return DeepLinkOutcome::Ignored;
        };

        match self.auth.set_session(&tokens).await {
            Ok(session) => {
                tracing::info!("Session installed from deep link for user {}", session.user.id);
                DeepLinkOutcome::Installed
            }
            Err(error) => {
                tracing::warn!("Failed to set session from deep link: {}", error);
                DeepLinkOutcome::Rejected
            }
        }
    }

    /// Handle the launch URL, then every URL delivered while running, until
    /// the sender side is dropped.
    pub async fn listen(&self, initial_url: Option<String>, mut urls: mpsc::Receiver<String>) {
        if let Some(url) = initial_url {
            self.handle_url(&url).await;
        }
        while let Some(url) = urls.recv().await {
            self.handle_url(&url).await;
        }
    }
}
