//! Authentication state shared with the UI layer.
//!
//! [`SessionStore`] is the single place the UI reads to decide between the
//! signed-out and signed-in views. Only the bootstrapper and the facade
//! write to it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthSession;
use crate::models::Profile;

pub mod bootstrap;
pub mod facade;
pub mod profile;

pub use bootstrap::{AuthBootstrapper, BootstrapHandle};
pub use facade::{validate_email, AuthFacade};
pub use profile::ProfileResolver;

/// Snapshot of who is signed in.
///
/// `user` is only ever set together with a `session` for the same user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<Profile>,
    pub session: Option<AuthSession>,
    /// True while bootstrapping or during a sign-in/out transition
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }
}

impl AuthState {
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    sender: Arc<watch::Sender<AuthState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(AuthState::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn snapshot(&self) -> AuthState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }

    pub fn current_session(&self) -> Option<AuthSession> {
        self.sender.borrow().session.clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.sender
            .borrow()
            .session
            .as_ref()
            .map(|session| session.user.id.clone())
    }

    /// Publish a resolved session and ends any loading phase.
    ///
    /// A profile without a session, or one belonging to a different user, is
    /// dropped rather than published.
    pub fn publish(&self, session: Option<AuthSession>, user: Option<Profile>) {
        let user = match (&session, user) {
            (Some(session), Some(profile)) if profile.id == session.user.id => Some(profile),
            (_, Some(profile)) => {
                tracing::warn!(
                    "Dropping profile {} that does not match the current session",
                    profile.id
                );
                None
            }
            (_, None) => None,
        };

        self.sender.send_modify(|state| {
            state.session = session;
            state.user = user;
            state.loading = false;
        });
    }

    /// Replace the profile of the current session, keeping everything else.
    pub fn set_user(&self, profile: Profile) -> bool {
        self.sender.send_if_modified(|state| {
            let matches = state
                .session
                .as_ref()
                .is_some_and(|session| session.user.id == profile.id);
            if matches {
                state.user = Some(profile);
            }
            matches
        })
    }

    pub fn set_loading(&self, loading: bool) {
        self.sender.send_if_modified(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    pub fn clear(&self) {
        self.publish(None, None);
    }
}
