//! Habits and daily check-ins for the signed-in user.
//!
//! Follows the same rules as [`crate::goals::GoalsStore`]: local state changes
//! only after the backend confirms, and failures land in
//! [`HabitsState::error`].

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::watch;

use crate::auth::AuthSession;
use crate::data::{DataError, DataResult, HabitsBackend};
use crate::models::{GoalId, Habit, HabitId, HabitLog, HabitPatch, NewHabit, NewHabitLog};
use crate::session::SessionStore;
use crate::util::non_empty_text;

pub mod streak;

pub use streak::{build_dashboard, compute_streak, DashboardHabit, HabitWithStreak, StreakData};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitsState {
    /// Oldest first
    pub habits: Vec<Habit>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct HabitsStore<B: HabitsBackend + ?Sized> {
    backend: Arc<B>,
    session: SessionStore,
    state: Arc<watch::Sender<HabitsState>>,
}

impl<B: HabitsBackend + ?Sized> Clone for HabitsStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            session: self.session.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: HabitsBackend + ?Sized> HabitsStore<B> {
    pub fn new(backend: Arc<B>, session: SessionStore) -> Self {
        let (state, _) = watch::channel(HabitsState::default());
        Self {
            backend,
            session,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> HabitsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HabitsState> {
        self.state.subscribe()
    }

    pub fn reset(&self) {
        self.state.send_replace(HabitsState::default());
    }

    /// Reload habits, optionally only those of one goal.
    pub async fn fetch(&self, goal_id: Option<&GoalId>) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = match self.require_session() {
            Ok(session) => self.backend.list_habits(&session, goal_id).await,
            Err(error) => Err(error),
        };

        self.state.send_modify(|state| {
            match result {
                Ok(habits) => state.habits = habits,
                Err(error) => {
                    tracing::warn!("Failed to fetch habits: {}", error);
                    state.error = Some(error.to_string());
                }
            }
            state.loading = false;
        });
    }

    pub async fn create(&self, goal_id: &GoalId, name: &str) -> Option<Habit> {
        self.clear_error();
        match self.insert(goal_id, name).await {
            Ok(habit) => {
                self.state.send_modify(|state| state.habits.push(habit.clone()));
                tracing::info!("Created habit {} for goal {}", habit.id, goal_id);
                Some(habit)
            }
            Err(error) => {
                self.record_error("create habit", &error);
                None
            }
        }
    }

    pub async fn update(&self, id: &HabitId, name: &str) -> bool {
        self.clear_error();
        let result = self.rename(id, name).await;
        match result {
            Ok(patch) => {
                self.state.send_modify(|state| {
                    if let Some(habit) = state.habits.iter_mut().find(|habit| habit.id == *id) {
                        habit.name.clone_from(&patch.name);
                    }
                });
                true
            }
            Err(error) => {
                self.record_error("update habit", &error);
                false
            }
        }
    }

    /// Delete a habit. Deleting a habit that is already gone succeeds.
    pub async fn delete(&self, id: &HabitId) -> bool {
        self.clear_error();
        let result = match self.require_session() {
            Ok(session) => self.backend.delete_habit(&session, id).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(_) => {
                self.state
                    .send_modify(|state| state.habits.retain(|habit| habit.id != *id));
                true
            }
            Err(error) => {
                self.record_error("delete habit", &error);
                false
            }
        }
    }

    /// Mark a habit done for `date`. Checking in twice is not an error.
    pub async fn check_in(&self, habit_id: &HabitId, date: NaiveDate) -> bool {
        self.clear_error();
        let result = match self.require_session() {
            Ok(session) => {
                let log = NewHabitLog {
                    habit_id: *habit_id,
                    user_id: session.user.id.clone(),
                    date,
                };
                self.backend.insert_habit_log(&session, &log).await
            }
            Err(error) => Err(error),
        };
        match result {
            Ok(_) => true,
            Err(DataError::Conflict(_)) => {
                tracing::debug!("Habit {} already checked in on {}", habit_id, date);
                true
            }
            Err(error) => {
                self.record_error("check in habit", &error);
                false
            }
        }
    }

    pub async fn uncheck(&self, habit_id: &HabitId, date: NaiveDate) -> bool {
        self.clear_error();
        let result = match self.require_session() {
            Ok(session) => self.backend.delete_habit_log(&session, habit_id, date).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(_) => true,
            Err(error) => {
                self.record_error("uncheck habit", &error);
                false
            }
        }
    }

    /// Check-in history of one habit, newest first. Empty on failure.
    pub async fn logs(&self, habit_id: &HabitId) -> Vec<HabitLog> {
        let result = match self.require_session() {
            Ok(session) => self.backend.list_habit_logs(&session, habit_id, None).await,
            Err(error) => Err(error),
        };
        result.unwrap_or_else(|error| {
            self.record_error("load habit logs", &error);
            Vec::new()
        })
    }

    /// Every check-in of the user on `today`. Empty on failure.
    pub async fn today_logs(&self, today: NaiveDate) -> Vec<HabitLog> {
        let result = match self.require_session() {
            Ok(session) => self.backend.list_logs_on(&session, today).await,
            Err(error) => Err(error),
        };
        result.unwrap_or_else(|error| {
            self.record_error("load today's check-ins", &error);
            Vec::new()
        })
    }

    pub async fn streak(&self, habit_id: &HabitId, today: NaiveDate) -> StreakData {
        let logs = self.logs(habit_id).await;
        compute_streak(habit_id, &logs, today)
    }

    async fn insert(&self, goal_id: &GoalId, name: &str) -> DataResult<Habit> {
        let session = self.require_session()?;
        let habit = NewHabit {
            goal_id: *goal_id,
            user_id: session.user.id.clone(),
            name: validate_name(name)?,
        };
        self.backend.insert_habit(&session, &habit).await
    }

    async fn rename(&self, id: &HabitId, name: &str) -> DataResult<HabitPatch> {
        let patch = HabitPatch {
            name: validate_name(name)?,
        };
        let session = self.require_session()?;
        match self.backend.update_habit(&session, id, &patch).await? {
            0 => Err(DataError::NotFound(format!("Habit not found: {id}"))),
            _ => Ok(patch),
        }
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

fn validate_name(name: &str) -> DataResult<String> {
    non_empty_text(Some(name)).ok_or(DataError::Validation("Habit name is required"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::Goal;
    use crate::testing::{base_time, day, test_session, FakeDataBackend, USER_ID};

    fn signed_in_store(backend: &Arc<FakeDataBackend>) -> HabitsStore<FakeDataBackend> {
        let session = SessionStore::new();
        session.publish(Some(test_session()), None);
        HabitsStore::new(Arc::clone(backend), session)
    }

    fn seeded_goal(backend: &FakeDataBackend, title: &str) -> Goal {
        backend.seed_goal(USER_ID, title, base_time())
    }

    fn names(store: &HabitsStore<FakeDataBackend>) -> Vec<String> {
        store
            .state()
            .habits
            .into_iter()
            .map(|habit| habit.name)
            .collect()
    }

    #[tokio::test]
    async fn fetch_filters_by_goal_in_creation_order() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        let mind = seeded_goal(&backend, "Mind");
        backend.seed_habit(&fitness, "Run");
        backend.seed_habit(&mind, "Read");
        backend.seed_habit(&fitness, "Stretch");
        let store = signed_in_store(&backend);

        store.fetch(Some(&fitness.id)).await;
        assert_eq!(names(&store), vec!["Run", "Stretch"]);

        store.fetch(None).await;
        assert_eq!(names(&store), vec!["Run", "Read", "Stretch"]);
    }

    #[tokio::test]
    async fn create_appends_and_validates_name() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        backend.seed_habit(&fitness, "Run");
        let store = signed_in_store(&backend);
        store.fetch(None).await;

        let habit = store.create(&fitness.id, " Swim ").await.unwrap();
        assert_eq!(habit.name, "Swim");
        assert_eq!(names(&store), vec!["Run", "Swim"]);

        assert_eq!(store.create(&fitness.id, "").await, None);
        assert_eq!(store.state().error.as_deref(), Some("Habit name is required"));
    }

    #[tokio::test]
    async fn update_renames_in_place_or_reports_missing() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        let run = backend.seed_habit(&fitness, "Run");
        let store = signed_in_store(&backend);
        store.fetch(None).await;

        assert!(store.update(&run.id, "Run 5k").await);
        assert_eq!(names(&store), vec!["Run 5k"]);

        let missing = HabitId::from_uuid(uuid::Uuid::new_v4());
        assert!(!store.update(&missing, "Ghost").await);
        assert_eq!(names(&store), vec!["Run 5k"]);
        assert_eq!(store.state().error, Some(format!("Habit not found: {missing}")));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        let run = backend.seed_habit(&fitness, "Run");
        let store = signed_in_store(&backend);
        store.fetch(None).await;

        assert!(store.delete(&run.id).await);
        assert!(store.delete(&run.id).await);
        assert!(store.state().habits.is_empty());
    }

    #[tokio::test]
    async fn double_check_in_counts_as_success() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        let run = backend.seed_habit(&fitness, "Run");
        let store = signed_in_store(&backend);

        assert!(store.check_in(&run.id, day("2025-03-10")).await);
        assert!(store.check_in(&run.id, day("2025-03-10")).await);

        assert_eq!(backend.logs().len(), 1);
        assert_eq!(store.state().error, None);
    }

    #[tokio::test]
    async fn uncheck_removes_only_that_day() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        let run = backend.seed_habit(&fitness, "Run");
        backend.seed_log(&run, day("2025-03-09"));
        backend.seed_log(&run, day("2025-03-10"));
        let store = signed_in_store(&backend);

        assert!(store.uncheck(&run.id, day("2025-03-10")).await);

        let remaining: Vec<NaiveDate> = store.logs(&run.id).await.iter().map(|log| log.date).collect();
        assert_eq!(remaining, vec![day("2025-03-09")]);
    }

    #[tokio::test]
    async fn logs_are_newest_first_and_today_is_scoped() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        let run = backend.seed_habit(&fitness, "Run");
        let read = backend.seed_habit(&fitness, "Read");
        backend.seed_log(&run, day("2025-03-08"));
        backend.seed_log(&run, day("2025-03-10"));
        backend.seed_log(&read, day("2025-03-10"));
        let store = signed_in_store(&backend);

        let dates: Vec<NaiveDate> = store.logs(&run.id).await.iter().map(|log| log.date).collect();
        assert_eq!(dates, vec![day("2025-03-10"), day("2025-03-08")]);
        assert_eq!(store.today_logs(day("2025-03-10")).await.len(), 2);

        let streak = store.streak(&run.id, day("2025-03-10")).await;
        assert_eq!(streak.streak, 1);
        assert!(streak.is_completed_today);
    }

    #[tokio::test]
    async fn failures_are_recorded_not_raised() {
        let backend = Arc::new(FakeDataBackend::new());
        let fitness = seeded_goal(&backend, "Fitness");
        let run = backend.seed_habit(&fitness, "Run");
        backend.fail("insert_habit_log", "timeout");
        backend.fail("list_habit_logs", "timeout");
        let store = signed_in_store(&backend);

        assert!(!store.check_in(&run.id, day("2025-03-10")).await);
        assert!(store.logs(&run.id).await.is_empty());
        assert_eq!(store.state().error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn signed_out_store_reports_not_authenticated() {
        let backend = Arc::new(FakeDataBackend::new());
        let store = HabitsStore::new(Arc::clone(&backend), SessionStore::new());

        store.fetch(None).await;

        assert_eq!(store.state().error.as_deref(), Some("Not authenticated"));
        assert!(!store.state().loading);
    }
}
