//! Session-change notifications.

use tokio::sync::broadcast;

use super::AuthSession;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One session transition and the session that resulted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<AuthSession>,
}

impl AuthChange {
    pub const fn new(event: AuthChangeEvent, session: Option<AuthSession>) -> Self {
        Self { event, session }
    }

    pub const fn signed_out() -> Self {
        Self::new(AuthChangeEvent::SignedOut, None)
    }
}

/// Publisher side of the session-change stream.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthChange>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Deliver a transition to every live subscription. Having none is fine.
    pub fn emit(&self, change: AuthChange) {
        tracing::debug!(
            event = ?change.event,
            has_session = change.session.is_some(),
            "auth state changed"
        );
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of subscriptions that have not been released.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving end of the session-change stream.
///
/// The subscription is released when this value is dropped or passed to
/// [`AuthSubscription::unsubscribe`]; both consume it, so release happens
/// at most once.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// Next transition, or `None` once the publisher is gone.
    ///
    /// A subscriber that falls behind skips to the oldest retained change;
    /// every change carries the full resulting session, so only the latest
    /// one matters.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Auth subscription lagged; skipped {} changes", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}
