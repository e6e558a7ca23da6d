//! In-memory backends shared by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::auth::{
    AuthBackend, AuthChange, AuthChangeEvent, AuthError, AuthEvents, AuthResult, AuthSession,
    AuthSubscription, AuthUser, PageLocation, SessionTokens,
};
use crate::data::{DataError, DataResult, GoalsBackend, HabitsBackend, ProfileBackend};
use crate::models::{
    Goal, GoalId, GoalPatch, Habit, HabitId, HabitLog, HabitLogId, HabitPatch, NewGoal,
    NewHabit, NewHabitLog, NewProfile, Profile, ProfileUpdate,
};

pub(crate) const USER_ID: &str = "0b7e2c4a-1111-4d2b-9a6f-5a2b7c9d0e11";

pub(crate) fn session_for(user_id: &str, access_token: &str) -> AuthSession {
    AuthSession {
        access_token: access_token.to_string(),
        refresh_token: format!("{access_token}-refresh"),
        expires_at: Utc::now().timestamp() + 3_600,
        user: AuthUser {
            id: user_id.to_string(),
            email: Some("ada@example.com".to_string()),
            name: Some("Ada".to_string()),
        },
    }
}

pub(crate) fn test_session() -> AuthSession {
    session_for(USER_ID, "access")
}

pub(crate) fn profile_for(user_id: &str) -> Profile {
    Profile {
        id: user_id.to_string(),
        email: Some("ada@example.com".to_string()),
        name: Some("Ada".to_string()),
        created_at: base_time(),
    }
}

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

pub(crate) fn day(value: &str) -> NaiveDate {
    value.parse().unwrap()
}

/// In-memory address bar.
#[derive(Debug)]
pub(crate) struct FakeLocation {
    href: Mutex<String>,
}

impl FakeLocation {
    pub(crate) fn new(href: &str) -> Arc<Self> {
        Arc::new(Self {
            href: Mutex::new(href.to_string()),
        })
    }

    pub(crate) fn current(&self) -> String {
        self.href.lock().unwrap().clone()
    }
}

impl PageLocation for FakeLocation {
    fn href(&self) -> String {
        self.current()
    }

    fn replace(&self, url: &str) {
        *self.href.lock().unwrap() = url.to_string();
    }
}

#[derive(Default)]
struct AuthFakeState {
    session: Option<AuthSession>,
    calls: Vec<String>,
    fail_set_session: Option<String>,
    fail_sign_in: Option<String>,
    fail_sign_out: Option<String>,
    fail_get_session: Option<String>,
    fail_refresh: Option<String>,
}

/// Auth backend that keeps one session in memory and emits the same
/// transitions as the GoTrue client.
#[derive(Default)]
pub(crate) struct FakeAuthBackend {
    events: AuthEvents,
    state: Mutex<AuthFakeState>,
}

impl FakeAuthBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_session(session: AuthSession) -> Self {
        let backend = Self::new();
        backend.state.lock().unwrap().session = Some(session);
        backend
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn current_session(&self) -> Option<AuthSession> {
        self.state.lock().unwrap().session.clone()
    }

    pub(crate) fn fail_set_session(&self, message: &str) {
        self.state.lock().unwrap().fail_set_session = Some(message.to_string());
    }

    pub(crate) fn fail_sign_in(&self, message: &str) {
        self.state.lock().unwrap().fail_sign_in = Some(message.to_string());
    }

    pub(crate) fn fail_sign_out(&self, message: &str) {
        self.state.lock().unwrap().fail_sign_out = Some(message.to_string());
    }

    pub(crate) fn fail_get_session(&self, message: &str) {
        self.state.lock().unwrap().fail_get_session = Some(message.to_string());
    }

    pub(crate) fn fail_refresh(&self, message: &str) {
        self.state.lock().unwrap().fail_refresh = Some(message.to_string());
    }

    pub(crate) const fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Replace the session as if the backend changed it on its own.
    pub(crate) fn push_change(&self, event: AuthChangeEvent, session: Option<AuthSession>) {
        self.state.lock().unwrap().session.clone_from(&session);
        self.events.emit(AuthChange::new(event, session));
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl AuthBackend for FakeAuthBackend {
    async fn get_session(&self) -> AuthResult<Option<AuthSession>> {
        self.record("get_session".to_string());
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_get_session {
            return Err(AuthError::Api(message.clone()));
        }
        Ok(state.session.clone())
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    /// Issues `<access>-refreshed`; a configured failure signs out like a
    /// rejected refresh token does.
    async fn refresh(&self) -> AuthResult<AuthSession> {
        self.record("refresh".to_string());
        let (current, failure) = {
            let state = self.state.lock().unwrap();
            (state.session.clone(), state.fail_refresh.clone())
        };
        let Some(current) = current else {
            return Err(AuthError::NotAuthenticated);
        };
        if let Some(message) = failure {
            self.push_change(AuthChangeEvent::SignedOut, None);
            return Err(AuthError::Api(message));
        }
        let session = session_for(
            current.user_id(),
            &format!("{}-refreshed", current.access_token),
        );
        self.push_change(AuthChangeEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    async fn set_session(&self, tokens: &SessionTokens) -> AuthResult<AuthSession> {
        self.record(format!(
            "set_session:{}:{}",
            tokens.access_token, tokens.refresh_token
        ));
        if let Some(message) = self.state.lock().unwrap().fail_set_session.clone() {
            return Err(AuthError::Api(message));
        }
        let mut session = session_for(USER_ID, &tokens.access_token);
        session.refresh_token.clone_from(&tokens.refresh_token);
        self.push_change(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        self.record(format!("sign_in:{email}:{redirect_to}"));
        if let Some(message) = self.state.lock().unwrap().fail_sign_in.clone() {
            return Err(AuthError::Api(message));
        }
        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.record("sign_out".to_string());
        if let Some(message) = self.state.lock().unwrap().fail_sign_out.clone() {
            return Err(AuthError::Api(message));
        }
        self.push_change(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn get_user(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .session
            .as_ref()
            .map(|session| session.user.clone()))
    }
}

#[derive(Default)]
struct DataFakeState {
    goals: Vec<Goal>,
    habits: Vec<Habit>,
    logs: Vec<HabitLog>,
    profiles: Vec<Profile>,
    failures: HashMap<&'static str, String>,
    hidden_profile_reads: usize,
    profile_reads: usize,
    inserted_rows: i64,
}

impl DataFakeState {
    fn check(&self, operation: &'static str) -> DataResult<()> {
        match self.failures.get(operation) {
            Some(message) => Err(DataError::Api(message.clone())),
            None => Ok(()),
        }
    }

    /// Strictly increasing creation times so ordering is deterministic.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        self.inserted_rows += 1;
        base_time() + Duration::minutes(self.inserted_rows)
    }
}

/// Row store scoped by `session.user.id`, standing in for row-level security.
#[derive(Default)]
pub(crate) struct FakeDataBackend {
    state: Mutex<DataFakeState>,
}

impl FakeDataBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` (a trait method name) fail.
    pub(crate) fn fail(&self, operation: &'static str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, message.to_string());
    }

    pub(crate) fn recover(&self, operation: &'static str) {
        self.state.lock().unwrap().failures.remove(operation);
    }

    pub(crate) fn seed_goal(&self, user_id: &str, title: &str, created_at: DateTime<Utc>) -> Goal {
        let goal = Goal {
            id: GoalId::from_uuid(Uuid::new_v4()),
            user_id: user_id.to_string(),
            title: title.to_string(),
            description: None,
            created_at,
        };
        self.state.lock().unwrap().goals.push(goal.clone());
        goal
    }

    pub(crate) fn seed_habit(&self, goal: &Goal, name: &str) -> Habit {
        let mut state = self.state.lock().unwrap();
        let habit = Habit {
            id: HabitId::from_uuid(Uuid::new_v4()),
            goal_id: goal.id,
            user_id: goal.user_id.clone(),
            name: name.to_string(),
            created_at: state.next_created_at(),
        };
        state.habits.push(habit.clone());
        habit
    }

    pub(crate) fn seed_log(&self, habit: &Habit, date: NaiveDate) {
        let mut state = self.state.lock().unwrap();
        let log = HabitLog {
            id: HabitLogId::from_uuid(Uuid::new_v4()),
            habit_id: habit.id,
            user_id: habit.user_id.clone(),
            date,
            created_at: state.next_created_at(),
        };
        state.logs.push(log);
    }

    pub(crate) fn seed_profile(&self, profile: Profile) {
        self.state.lock().unwrap().profiles.push(profile);
    }

    /// Answer the next `count` profile reads with "no row", as a replica
    /// lagging behind a trigger insert would.
    pub(crate) fn hide_profile_reads(&self, count: usize) {
        self.state.lock().unwrap().hidden_profile_reads = count;
    }

    pub(crate) fn profile_reads(&self) -> usize {
        self.state.lock().unwrap().profile_reads
    }

    pub(crate) fn goals(&self) -> Vec<Goal> {
        self.state.lock().unwrap().goals.clone()
    }

    pub(crate) fn logs(&self) -> Vec<HabitLog> {
        self.state.lock().unwrap().logs.clone()
    }

    pub(crate) fn profiles(&self) -> Vec<Profile> {
        self.state.lock().unwrap().profiles.clone()
    }
}

#[async_trait]
impl GoalsBackend for FakeDataBackend {
    async fn list_goals(&self, session: &AuthSession) -> DataResult<Vec<Goal>> {
        let state = self.state.lock().unwrap();
        state.check("list_goals")?;
        let mut goals: Vec<Goal> = state
            .goals
            .iter()
            .filter(|goal| goal.user_id == session.user.id)
            .cloned()
            .collect();
        goals.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(goals)
    }

    async fn insert_goal(&self, _session: &AuthSession, goal: &NewGoal) -> DataResult<Goal> {
        let mut state = self.state.lock().unwrap();
        state.check("insert_goal")?;
        let row = Goal {
            id: GoalId::from_uuid(Uuid::new_v4()),
            user_id: goal.user_id.clone(),
            title: goal.title.clone(),
            description: goal.description.clone(),
            created_at: state.next_created_at(),
        };
        state.goals.push(row.clone());
        Ok(row)
    }

    async fn update_goal(
        &self,
        session: &AuthSession,
        id: &GoalId,
        patch: &GoalPatch,
    ) -> DataResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.check("update_goal")?;
        let mut touched = 0;
        for goal in state
            .goals
            .iter_mut()
            .filter(|goal| goal.id == *id && goal.user_id == session.user.id)
        {
            goal.apply(patch);
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete_goal(&self, session: &AuthSession, id: &GoalId) -> DataResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.check("delete_goal")?;
        let before = state.goals.len();
        state
            .goals
            .retain(|goal| !(goal.id == *id && goal.user_id == session.user.id));
        Ok(before - state.goals.len())
    }
}

#[async_trait]
impl HabitsBackend for FakeDataBackend {
    async fn list_habits(
        &self,
        session: &AuthSession,
        goal_id: Option<&GoalId>,
    ) -> DataResult<Vec<Habit>> {
        let state = self.state.lock().unwrap();
        state.check("list_habits")?;
        let mut habits: Vec<Habit> = state
            .habits
            .iter()
            .filter(|habit| habit.user_id == session.user.id)
            .filter(|habit| goal_id.map_or(true, |goal_id| habit.goal_id == *goal_id))
            .cloned()
            .collect();
        habits.sort_by_key(|habit| habit.created_at);
        Ok(habits)
    }

    async fn insert_habit(&self, _session: &AuthSession, habit: &NewHabit) -> DataResult<Habit> {
        let mut state = self.state.lock().unwrap();
        state.check("insert_habit")?;
        let row = Habit {
            id: HabitId::from_uuid(Uuid::new_v4()),
            goal_id: habit.goal_id,
            user_id: habit.user_id.clone(),
            name: habit.name.clone(),
            created_at: state.next_created_at(),
        };
        state.habits.push(row.clone());
        Ok(row)
    }

    async fn update_habit(
        &self,
        session: &AuthSession,
        id: &HabitId,
        patch: &HabitPatch,
    ) -> DataResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.check("update_habit")?;
        let mut touched = 0;
        for habit in state
            .habits
            .iter_mut()
            .filter(|habit| habit.id == *id && habit.user_id == session.user.id)
        {
            habit.name.clone_from(&patch.name);
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete_habit(&self, session: &AuthSession, id: &HabitId) -> DataResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.check("delete_habit")?;
        let before = state.habits.len();
        state
            .habits
            .retain(|habit| !(habit.id == *id && habit.user_id == session.user.id));
        Ok(before - state.habits.len())
    }

    async fn list_habit_logs(
        &self,
        session: &AuthSession,
        habit_id: &HabitId,
        limit: Option<usize>,
    ) -> DataResult<Vec<HabitLog>> {
        let state = self.state.lock().unwrap();
        state.check("list_habit_logs")?;
        let mut logs: Vec<HabitLog> = state
            .logs
            .iter()
            .filter(|log| log.habit_id == *habit_id && log.user_id == session.user.id)
            .cloned()
            .collect();
        logs.sort_by(|left, right| right.date.cmp(&left.date));
        if let Some(limit) = limit {
            logs.truncate(limit);
        }
        Ok(logs)
    }

    async fn list_logs_on(
        &self,
        session: &AuthSession,
        date: NaiveDate,
    ) -> DataResult<Vec<HabitLog>> {
        let state = self.state.lock().unwrap();
        state.check("list_logs_on")?;
        Ok(state
            .logs
            .iter()
            .filter(|log| log.date == date && log.user_id == session.user.id)
            .cloned()
            .collect())
    }

    async fn insert_habit_log(
        &self,
        _session: &AuthSession,
        log: &NewHabitLog,
    ) -> DataResult<HabitLog> {
        let mut state = self.state.lock().unwrap();
        state.check("insert_habit_log")?;
        if state
            .logs
            .iter()
            .any(|existing| existing.habit_id == log.habit_id && existing.date == log.date)
        {
            return Err(DataError::Conflict(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }
        let row = HabitLog {
            id: HabitLogId::from_uuid(Uuid::new_v4()),
            habit_id: log.habit_id,
            user_id: log.user_id.clone(),
            date: log.date,
            created_at: state.next_created_at(),
        };
        state.logs.push(row.clone());
        Ok(row)
    }

    async fn delete_habit_log(
        &self,
        session: &AuthSession,
        habit_id: &HabitId,
        date: NaiveDate,
    ) -> DataResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.check("delete_habit_log")?;
        let before = state.logs.len();
        state.logs.retain(|log| {
            !(log.habit_id == *habit_id && log.date == date && log.user_id == session.user.id)
        });
        Ok(before - state.logs.len())
    }
}

#[async_trait]
impl ProfileBackend for FakeDataBackend {
    async fn fetch_profile(
        &self,
        _session: &AuthSession,
        id: &str,
    ) -> DataResult<Option<Profile>> {
        let mut state = self.state.lock().unwrap();
        state.check("fetch_profile")?;
        state.profile_reads += 1;
        if state.hidden_profile_reads > 0 {
            state.hidden_profile_reads -= 1;
            return Ok(None);
        }
        Ok(state.profiles.iter().find(|profile| profile.id == id).cloned())
    }

    async fn insert_profile(
        &self,
        _session: &AuthSession,
        profile: &NewProfile,
    ) -> DataResult<Profile> {
        let mut state = self.state.lock().unwrap();
        state.check("insert_profile")?;
        if state.profiles.iter().any(|existing| existing.id == profile.id) {
            return Err(DataError::Conflict(
                "duplicate key value violates unique constraint \"profiles_pkey\"".to_string(),
            ));
        }
        let row = Profile {
            id: profile.id.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            created_at: state.next_created_at(),
        };
        state.profiles.push(row.clone());
        Ok(row)
    }

    async fn update_profile(
        &self,
        _session: &AuthSession,
        id: &str,
        update: &ProfileUpdate,
    ) -> DataResult<Option<Profile>> {
        let mut state = self.state.lock().unwrap();
        state.check("update_profile")?;
        Ok(state
            .profiles
            .iter_mut()
            .find(|profile| profile.id == id)
            .map(|profile| {
                profile.name.clone_from(&update.name);
                profile.clone()
            }))
    }
}
