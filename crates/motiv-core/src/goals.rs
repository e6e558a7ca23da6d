//! Goals list kept in step with confirmed backend writes.
//!
//! Every mutation waits for the backend before touching the local list, so
//! the list never shows a row the backend rejected. Failures are recorded in
//! [`GoalsState::error`] instead of being returned.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthSession;
use crate::data::{DataError, DataResult, GoalsBackend};
use crate::models::{Goal, GoalId, GoalPatch, NewGoal};
use crate::session::SessionStore;
use crate::util::non_empty_text;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalsState {
    /// Newest first
    pub goals: Vec<Goal>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct GoalsStore<B: GoalsBackend + ?Sized> {
    backend: Arc<B>,
    session: SessionStore,
    state: Arc<watch::Sender<GoalsState>>,
}

impl<B: GoalsBackend + ?Sized> Clone for GoalsStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            session: self.session.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: GoalsBackend + ?Sized> GoalsStore<B> {
    pub fn new(backend: Arc<B>, session: SessionStore) -> Self {
        let (state, _) = watch::channel(GoalsState::default());
        Self {
            backend,
            session,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> GoalsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GoalsState> {
        self.state.subscribe()
    }

    /// Forget everything, e.g. after the signed-in user changed.
    pub fn reset(&self) {
        self.state.send_replace(GoalsState::default());
    }

    /// Reload the list from the backend.
    pub async fn fetch(&self) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = match self.session.current_session() {
            Some(session) => self.backend.list_goals(&session).await,
            None => Err(DataError::NotAuthenticated),
        };

        self.state.send_modify(|state| {
            match result {
                Ok(goals) => {
                    tracing::debug!("Fetched {} goals", goals.len());
                    state.goals = goals;
                }
                Err(error) => {
                    tracing::warn!("Failed to fetch goals: {}", error);
                    state.error = Some(error.to_string());
                }
            }
            state.loading = false;
        });
    }

    /// Create a goal and put it at the head of the list.
    pub async fn create(&self, title: &str, description: Option<&str>) -> Option<Goal> {
        self.clear_error();
        let result = self.insert(title, description).await;
        match result {
            Ok(goal) => {
                self.state
                    .send_modify(|state| state.goals.insert(0, goal.clone()));
                tracing::info!("Created goal {}", goal.id);
                Some(goal)
            }
            Err(error) => {
                self.record_error("create goal", &error);
                None
            }
        }
    }

    /// Replace the title and description of a goal.
    pub async fn update(&self, id: &GoalId, title: &str, description: Option<&str>) -> bool {
        self.clear_error();
        let patch = match validate_title(title) {
            Ok(title) => GoalPatch {
                title,
                description: non_empty_text(description),
            },
            Err(error) => {
                self.record_error("update goal", &error);
                return false;
            }
        };

        let result = match self.require_session() {
            Ok(session) => self.backend.update_goal(&session, id, &patch).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(0) => {
                let error = DataError::NotFound(format!("Goal not found: {id}"));
                self.record_error("update goal", &error);
                false
            }
            Ok(_) => {
                self.state.send_modify(|state| {
                    if let Some(goal) = state.goals.iter_mut().find(|goal| goal.id == *id) {
                        goal.apply(&patch);
                    }
                });
                true
            }
            Err(error) => {
                self.record_error("update goal", &error);
                false
            }
        }
    }

    /// Delete a goal. Deleting a goal that is already gone succeeds.
    pub async fn delete(&self, id: &GoalId) -> bool {
        self.clear_error();
        let result = match self.require_session() {
            Ok(session) => self.backend.delete_goal(&session, id).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(deleted) => {
                tracing::debug!("Deleted goal {} ({} rows)", id, deleted);
                self.state
                    .send_modify(|state| state.goals.retain(|goal| goal.id != *id));
                true
            }
            Err(error) => {
                self.record_error("delete goal", &error);
                false
            }
        }
    }

    async fn insert(&self, title: &str, description: Option<&str>) -> DataResult<Goal> {
        let session = self.require_session()?;
        let goal = NewGoal {
            user_id: session.user.id.clone(),
            title: validate_title(title)?,
            description: non_empty_text(description),
        };
        self.backend.insert_goal(&session, &goal).await
    }

    fn require_session(&self) -> DataResult<AuthSession> {
        self.session
            .current_session()
            .ok_or(DataError::NotAuthenticated)
    }

    fn clear_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    fn record_error(&self, action: &str, error: &DataError) {
        tracing::warn!("Failed to {}: {}", action, error);
        let message = error.to_string();
        self.state.send_modify(|state| state.error = Some(message));
    }
}

fn validate_title(title: &str) -> DataResult<String> {
    non_empty_text(Some(title))
        .ok_or(DataError::Validation("Goal title is required"))
}
