//! Row storage seams for goals, habits, and profiles.
//!
//! Every call carries the caller's session; the backend scopes rows to that
//! user through row-level security, so no method filters by user itself.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::auth::AuthSession;
use crate::config::ConfigError;
use crate::models::{
    Goal, GoalId, GoalPatch, Habit, HabitId, HabitLog, HabitPatch, NewGoal, NewHabit,
    NewHabitLog, NewProfile, Profile, ProfileUpdate,
};

mod rest;

pub use rest::{normalize_rest_url, SupabaseRestClient};

#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid data configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("{0}")]
    Validation(&'static str),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Session rejected by the backend: {0}")]
    Unauthorized(String),
    #[error("Row already exists: {0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Api(String),
}

pub type DataResult<T> = Result<T, DataError>;

#[async_trait]
pub trait GoalsBackend: Send + Sync {
    /// All goals visible to the session, newest first.
    async fn list_goals(&self, session: &AuthSession) -> DataResult<Vec<Goal>>;

    async fn insert_goal(&self, session: &AuthSession, goal: &NewGoal) -> DataResult<Goal>;

    /// Returns the number of rows the update touched.
    async fn update_goal(
        &self,
        session: &AuthSession,
        id: &GoalId,
        patch: &GoalPatch,
    ) -> DataResult<usize>;

    /// Returns the number of rows deleted.
    async fn delete_goal(&self, session: &AuthSession, id: &GoalId) -> DataResult<usize>;
}

#[async_trait]
pub trait HabitsBackend: Send + Sync {
    /// Habits visible to the session, oldest first, optionally for one goal.
    async fn list_habits(
        &self,
        session: &AuthSession,
        goal_id: Option<&GoalId>,
    ) -> DataResult<Vec<Habit>>;

    async fn insert_habit(&self, session: &AuthSession, habit: &NewHabit) -> DataResult<Habit>;

    async fn update_habit(
        &self,
        session: &AuthSession,
        id: &HabitId,
        patch: &HabitPatch,
    ) -> DataResult<usize>;

    async fn delete_habit(&self, session: &AuthSession, id: &HabitId) -> DataResult<usize>;

    /// Logs of one habit, newest date first, at most `limit` when given.
    async fn list_habit_logs(
        &self,
        session: &AuthSession,
        habit_id: &HabitId,
        limit: Option<usize>,
    ) -> DataResult<Vec<HabitLog>>;

    /// All logs of the session's user for one day.
    async fn list_logs_on(&self, session: &AuthSession, date: NaiveDate)
        -> DataResult<Vec<HabitLog>>;

    /// Fails with [`DataError::Conflict`] when the day is already logged.
    async fn insert_habit_log(
        &self,
        session: &AuthSession,
        log: &NewHabitLog,
    ) -> DataResult<HabitLog>;

    async fn delete_habit_log(
        &self,
        session: &AuthSession,
        habit_id: &HabitId,
        date: NaiveDate,
    ) -> DataResult<usize>;
}

#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn fetch_profile(&self, session: &AuthSession, id: &str)
        -> DataResult<Option<Profile>>;

    /// Fails with [`DataError::Conflict`] when the row already exists.
    async fn insert_profile(
        &self,
        session: &AuthSession,
        profile: &NewProfile,
    ) -> DataResult<Profile>;

    async fn update_profile(
        &self,
        session: &AuthSession,
        id: &str,
        update: &ProfileUpdate,
    ) -> DataResult<Option<Profile>>;
}
