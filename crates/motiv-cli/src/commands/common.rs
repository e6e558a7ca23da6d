use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use motiv_core::auth::{AuthSession, Platform};
use motiv_core::config::ClientConfig;
use motiv_core::data::SupabaseRestClient;
use motiv_core::habits::DashboardHabit;
use motiv_core::session::{AuthBootstrapper, AuthFacade, BootstrapHandle, ProfileResolver};
use motiv_core::{
    AuthState, Goal, GoalId, GoalsStore, Habit, HabitId, HabitsStore, SessionStore,
};

use crate::auth::{CliAuthClient, KeyringSessionStore};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

const SIGN_IN_WAIT: Duration = Duration::from_secs(10);

/// Profile name and client settings for one invocation.
#[derive(Debug, Clone)]
pub struct CliSettings {
    pub profile_name: String,
    pub client: ClientConfig,
}

impl CliSettings {
    pub fn load(global_profile: Option<&str>) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(global_profile);
        let client = config
            .profile(&profile_name)
            .cloned()
            .unwrap_or_default()
            .client_config();
        Ok(Self {
            profile_name,
            client,
        })
    }
}

/// Stores and services wired together once per process.
pub struct AppContext {
    pub profile_name: String,
    pub auth: Arc<CliAuthClient>,
    pub session: SessionStore,
    pub facade: AuthFacade<CliAuthClient, SupabaseRestClient>,
    pub goals: GoalsStore<SupabaseRestClient>,
    pub habits: HabitsStore<SupabaseRestClient>,
    bootstrap: BootstrapHandle,
}

impl AppContext {
    /// Build the clients for the selected profile and wait for the stored
    /// session (if any) to be restored.
    pub async fn connect(settings: CliSettings) -> Result<Self, CliError> {
        let supabase = settings
            .client
            .supabase()
            .map_err(motiv_core::Error::from)?;
        let timeout = settings.client.http_timeout();

        let auth = Arc::new(CliAuthClient::new(
            &supabase,
            KeyringSessionStore::new(&settings.profile_name),
            timeout,
        )?);
        let rest = Arc::new(SupabaseRestClient::new(&supabase, timeout)?);
        let session = SessionStore::new();
        let profiles = ProfileResolver::new(Arc::clone(&rest));
        let platform = Platform::native(settings.client.redirect_target());

        let bootstrap = AuthBootstrapper::new(
            Arc::clone(&auth),
            profiles.clone(),
            session.clone(),
            platform.clone(),
        )
        .spawn();
        bootstrap.ready().await;

        Ok(Self {
            profile_name: settings.profile_name,
            facade: AuthFacade::new(Arc::clone(&auth), session.clone(), profiles, platform),
            goals: GoalsStore::new(Arc::clone(&rest), session.clone()),
            habits: HabitsStore::new(rest, session.clone()),
            auth,
            session,
            bootstrap,
        })
    }

    pub async fn load(global_profile: Option<&str>) -> Result<Self, CliError> {
        Self::connect(CliSettings::load(global_profile)?).await
    }

    pub fn require_session(&self) -> Result<AuthSession, CliError> {
        self.session
            .current_session()
            .ok_or_else(|| CliError::NotSignedIn(self.profile_name.clone()))
    }

    /// Wait for the session-change follower to publish a session other than
    /// the one whose access token is `replacing`.
    pub async fn wait_for_sign_in(&self, replacing: Option<&str>) -> Result<AuthSession, CliError> {
        let mut receiver = self.session.subscribe();
        let waited = tokio::time::timeout(
            SIGN_IN_WAIT,
            receiver.wait_for(|state| is_new_sign_in(state, replacing)),
        )
        .await;
        match waited {
            Ok(Ok(state)) => state
                .session
                .clone()
                .ok_or_else(|| CliError::NotSignedIn(self.profile_name.clone())),
            _ => Err(CliError::Auth(
                "Timed out waiting for the session to be installed".to_string(),
            )),
        }
    }

    pub async fn shutdown(self) {
        self.bootstrap.shutdown().await;
    }
}

/// Settled state carrying a session that is not the `replacing` one.
pub fn is_new_sign_in(state: &AuthState, replacing: Option<&str>) -> bool {
    !state.loading
        && state
            .session
            .as_ref()
            .is_some_and(|session| Some(session.access_token.as_str()) != replacing)
}

/// Turn a store's recorded error into a command failure.
pub fn store_failure(error: Option<String>, fallback: &str) -> CliError {
    CliError::Failed(error.unwrap_or_else(|| fallback.to_string()))
}

pub fn parse_goal_id(value: &str) -> Result<GoalId, CliError> {
    value.parse().map_err(|_| CliError::InvalidId {
        kind: "goal",
        value: value.to_string(),
    })
}

pub fn parse_habit_id(value: &str) -> Result<HabitId, CliError> {
    value.parse().map_err(|_| CliError::InvalidId {
        kind: "habit",
        value: value.to_string(),
    })
}

/// Parse `YYYY-MM-DD`, defaulting to the local calendar day.
pub fn resolve_date(value: Option<&str>) -> Result<NaiveDate, CliError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|_| CliError::InvalidDate(value.to_string())),
        None => Ok(today()),
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub fn format_goal_lines(goals: &[Goal]) -> Vec<String> {
    goals
        .iter()
        .map(|goal| {
            let id = short_id(&goal.id.as_str());
            let created = goal.created_at.format("%Y-%m-%d");
            match goal.description.as_deref() {
                Some(description) => {
                    format!("{id}  {created}  {}  - {description}", goal.title)
                }
                None => format!("{id}  {created}  {}", goal.title),
            }
        })
        .collect()
}

pub fn format_habit_lines(habits: &[Habit]) -> Vec<String> {
    habits
        .iter()
        .map(|habit| {
            format!(
                "{}  goal={}  {}",
                short_id(&habit.id.as_str()),
                short_id(&habit.goal_id.as_str()),
                habit.name
            )
        })
        .collect()
}

pub fn format_dashboard_lines(entries: &[DashboardHabit]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let mark = if entry.habit.is_completed_today {
                "[x]"
            } else {
                "[ ]"
            };
            let days = if entry.habit.streak == 1 { "day" } else { "days" };
            format!(
                "{mark} {:<24}  {:<20}  {} {days}",
                entry.habit.habit.name, entry.goal_title, entry.habit.streak
            )
        })
        .collect()
}
