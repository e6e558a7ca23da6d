//! Sign-in and sign-out entry points for the UI layer.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::sync::watch;

use super::{AuthState, ProfileResolver, SessionStore};
use crate::auth::{AuthBackend, AuthError, AuthResult, Platform};
use crate::data::{DataError, DataResult, ProfileBackend};
use crate::models::Profile;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"))
}

/// Check an address typed by the user and normalize it for sending.
///
/// Returns the trimmed, lowercased address.
pub fn validate_email(raw: &str) -> AuthResult<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(AuthError::InvalidEmail("Email is required"));
    }
    if !email_pattern().is_match(email) {
        return Err(AuthError::InvalidEmail("Please enter a valid email address"));
    }
    Ok(email.to_lowercase())
}

/// Keeps `loading` raised for the lifetime of a transition.
///
/// On drop the previous value comes back, unless the store was written in
/// the meantime (a publish settles loading itself).
struct LoadingGuard<'a> {
    store: &'a SessionStore,
    previous: bool,
    changes: watch::Receiver<AuthState>,
}

impl<'a> LoadingGuard<'a> {
    fn raise(store: &'a SessionStore) -> Self {
        let previous = store.snapshot().loading;
        store.set_loading(true);
        Self {
            store,
            previous,
            changes: store.subscribe(),
        }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let written = self.changes.has_changed().unwrap_or(true);
        self.store.set_loading(self.previous && !written);
    }
}

pub struct AuthFacade<A: AuthBackend + ?Sized, P: ProfileBackend + ?Sized> {
    auth: Arc<A>,
    store: SessionStore,
    profiles: ProfileResolver<P>,
    platform: Platform,
}

impl<A: AuthBackend + ?Sized, P: ProfileBackend + ?Sized> Clone for AuthFacade<A, P> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            store: self.store.clone(),
            profiles: self.profiles.clone(),
            platform: self.platform.clone(),
        }
    }
}

impl<A: AuthBackend + ?Sized, P: ProfileBackend + ?Sized> AuthFacade<A, P> {
    pub fn new(
        auth: Arc<A>,
        store: SessionStore,
        profiles: ProfileResolver<P>,
        platform: Platform,
    ) -> Self {
        Self {
            auth,
            store,
            profiles,
            platform,
        }
    }

    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Send a magic link to `email`.
    ///
    /// Success only means the email was dispatched; the session arrives later
    /// through the link and the session-change stream.
    pub async fn sign_in(&self, email: &str) -> AuthResult<()> {
        let _loading = LoadingGuard::raise(&self.store);
        let redirect_to = self.platform.redirect_target();
        self.auth.sign_in_with_otp(email, &redirect_to).await?;
        tracing::info!("Magic link sent (redirect: {})", redirect_to);
        Ok(())
    }

    /// End the session. On failure the current user and session are kept.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let _loading = LoadingGuard::raise(&self.store);
        self.auth.sign_out().await?;
        self.store.clear();
        tracing::info!("Signed out");
        Ok(())
    }

    /// Rename the signed-in user and republish their profile.
    pub async fn update_profile_name(&self, name: Option<&str>) -> DataResult<Profile> {
        let session = self
            .store
            .current_session()
            .ok_or(DataError::NotAuthenticated)?;
        let profile = self.profiles.update_name(&session, name).await?;
        self.store.set_user(profile.clone());
        Ok(profile)
    }
}
