//! Startup session resolution and the session-change follower.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{ProfileResolver, SessionStore};
use crate::auth::deep_link::{extract_session_tokens, strip_auth_fragment};
use crate::auth::{AuthBackend, AuthError, AuthSession, AuthSubscription, Platform};
use crate::data::ProfileBackend;

/// Pause before retrying a refresh that failed without a server verdict.
const REFRESH_RETRY: Duration = Duration::from_secs(10);

/// Resolves the session at process start and keeps the [`SessionStore`] in
/// step with the auth backend afterwards.
pub struct AuthBootstrapper<A: AuthBackend + ?Sized, P: ProfileBackend + ?Sized> {
    auth: Arc<A>,
    profiles: ProfileResolver<P>,
    store: SessionStore,
    platform: Platform,
}

impl<A, P> AuthBootstrapper<A, P>
where
    A: AuthBackend + ?Sized + 'static,
    P: ProfileBackend + ?Sized + 'static,
{
    pub fn new(
        auth: Arc<A>,
        profiles: ProfileResolver<P>,
        store: SessionStore,
        platform: Platform,
    ) -> Self {
        Self {
            auth,
            profiles,
            store,
            platform,
        }
    }

    /// Start the bootstrap task.
    ///
    /// The task owns its subscription; it is released when the task ends,
    /// whether through [`BootstrapHandle::shutdown`], the stream closing, or
    /// the handle being dropped.
    pub fn spawn(self) -> BootstrapHandle {
        let (shutdown, shutdown_signal) = oneshot::channel();
        let store = self.store.clone();
        let task = tokio::spawn(self.run(shutdown_signal));
        BootstrapHandle {
            task: Some(task),
            shutdown: Some(shutdown),
            store,
        }
    }

    async fn run(self, mut shutdown_signal: oneshot::Receiver<()>) {
        // Subscribe before the one-shot lookup so no transition slips between.
        let mut subscription = self.auth.subscribe();

        if !self.install_from_page().await {
            let session = match self.auth.get_session().await {
                Ok(session) => session,
                Err(error) => {
                    tracing::warn!("Failed to restore session: {}", error);
                    None
                }
            };
            self.derive_and_publish(session).await;
        }

        self.follow(&mut subscription, &mut shutdown_signal).await;
        subscription.unsubscribe();
        tracing::debug!("Auth bootstrapper stopped");
    }

    async fn follow(
        &self,
        subscription: &mut AuthSubscription,
        shutdown_signal: &mut oneshot::Receiver<()>,
    ) {
        let mut retrying = false;
        loop {
            let refresh_in = if retrying {
                Some(REFRESH_RETRY)
            } else {
                self.store.current_session().map(|session| session.refresh_in())
            };

            tokio::select! {
                _ = &mut *shutdown_signal => break,
                () = wait_for_refresh(refresh_in) => {
                    retrying = !self.refresh().await;
                }
                change = subscription.recv() => match change {
                    Some(change) => {
                        tracing::debug!(event = ?change.event, "Applying auth change");
                        retrying = false;
                        self.derive_and_publish(change.session).await;
                    }
                    None => break,
                },
            }
        }
    }

    /// Replace the session before its access token lapses.
    ///
    /// Returns false when the refresh should be retried. A rejected refresh
    /// token signs the user out.
    async fn refresh(&self) -> bool {
        match self.auth.refresh().await {
            Ok(session) => {
                tracing::info!("Session refreshed for user {}", session.user.id);
                self.derive_and_publish(Some(session)).await;
                true
            }
            Err(error @ (AuthError::Api(_) | AuthError::NotAuthenticated)) => {
                tracing::warn!("Session refresh rejected: {}", error);
                self.store.clear();
                true
            }
            Err(error) => {
                tracing::warn!("Failed to refresh session: {}", error);
                false
            }
        }
    }

    /// Install tokens carried in the browser URL fragment.
    ///
    /// Returns true when a session was installed; the resulting sign-in
    /// notification then publishes the state.
    async fn install_from_page(&self) -> bool {
        let Some(location) = self.platform.location() else {
            return false;
        };
        let href = location.href();
        let Some(tokens) = extract_session_tokens(&href) else {
            return false;
        };

        match self.auth.set_session(&tokens).await {
            Ok(session) => {
                tracing::info!("Session installed from page URL for user {}", session.user.id);
                location.replace(&strip_auth_fragment(&href));
                true
            }
            Err(error) => {
                tracing::warn!("Failed to set session from page URL: {}", error);
                false
            }
        }
    }

    async fn derive_and_publish(&self, session: Option<AuthSession>) {
        let Some(session) = session else {
            self.store.publish(None, None);
            return;
        };

        let user = match self.profiles.resolve(&session).await {
            Ok(profile) => Some(profile),
            Err(error) => {
                tracing::warn!("Failed to load profile for {}: {}", session.user.id, error);
                None
            }
        };
        self.store.publish(Some(session), user);
    }
}

async fn wait_for_refresh(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

/// Handle to a running bootstrap task. Dropping it aborts the task.
#[derive(Debug)]
pub struct BootstrapHandle {
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    store: SessionStore,
}

impl BootstrapHandle {
    /// Wait until the store has left its loading phase.
    pub async fn ready(&self) {
        let mut receiver = self.store.subscribe();
        if receiver.wait_for(|state| !state.loading).await.is_err() {
            tracing::debug!("Session store closed before bootstrap finished");
        }
    }

    /// Stop following session changes and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!("Auth bootstrapper ended abnormally: {}", error);
            }
        }
    }
}

impl Drop for BootstrapHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
