//! Durable profile rows keyed by the auth user id.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthSession;
use crate::data::{DataError, DataResult, ProfileBackend};
use crate::models::{NewProfile, Profile, ProfileUpdate};
use crate::util::non_empty_text;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// Finds or creates the `profiles` row for a session's user.
///
/// The row may also be created server-side (sign-up trigger), so an insert
/// that conflicts is followed by a short bounded wait for the row to become
/// readable.
pub struct ProfileResolver<P: ProfileBackend + ?Sized> {
    backend: Arc<P>,
    attempts: u32,
    interval: Duration,
}

impl<P: ProfileBackend + ?Sized> Clone for ProfileResolver<P> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            attempts: self.attempts,
            interval: self.interval,
        }
    }
}

impl<P: ProfileBackend + ?Sized> ProfileResolver<P> {
    pub fn new(backend: Arc<P>) -> Self {
        Self {
            backend,
            attempts: DEFAULT_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.interval = interval;
        self
    }

    pub async fn resolve(&self, session: &AuthSession) -> DataResult<Profile> {
        let user_id = session.user_id();
        if let Some(profile) = self.backend.fetch_profile(session, user_id).await? {
            return ensure_owner(profile, user_id);
        }

        let new_profile = NewProfile {
            id: user_id.to_string(),
            email: session.user.email.clone(),
            name: non_empty_text(session.user.name.as_deref()),
        };
        match self.backend.insert_profile(session, &new_profile).await {
            Ok(profile) => {
                tracing::info!("Created profile for user {}", user_id);
                ensure_owner(profile, user_id)
            }
            Err(DataError::Conflict(_)) => {
                tracing::debug!("Profile for {} created concurrently; waiting for it", user_id);
                self.wait_for_row(session).await
            }
            Err(error) => Err(error),
        }
    }

    /// Set or clear the display name of the session user's profile.
    pub async fn update_name(&self, session: &AuthSession, name: Option<&str>) -> DataResult<Profile> {
        let user_id = session.user_id();
        let update = ProfileUpdate {
            name: non_empty_text(name),
        };
        let profile = self
            .backend
            .update_profile(session, user_id, &update)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("Profile not found: {user_id}")))?;
        ensure_owner(profile, user_id)
    }

    async fn wait_for_row(&self, session: &AuthSession) -> DataResult<Profile> {
        let user_id = session.user_id();
        for attempt in 1..=self.attempts {
            tokio::time::sleep(self.interval).await;
            if let Some(profile) = self.backend.fetch_profile(session, user_id).await? {
                return ensure_owner(profile, user_id);
            }
            tracing::debug!("Profile for {} not readable yet (attempt {})", user_id, attempt);
        }
        Err(DataError::NotFound(format!("Profile not found: {user_id}")))
    }
}

fn ensure_owner(profile: Profile, user_id: &str) -> DataResult<Profile> {
    if profile.id == user_id {
        Ok(profile)
    } else {
        Err(DataError::InvalidPayload(format!(
            "profile {} returned for user {user_id}",
            profile.id
        )))
    }
}
