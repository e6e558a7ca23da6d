//! PostgREST client for the Supabase `rest/v1` API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{DataError, DataResult, GoalsBackend, HabitsBackend, ProfileBackend};
use crate::auth::AuthSession;
use crate::config::SupabaseConfig;
use crate::models::{
    Goal, GoalId, GoalPatch, Habit, HabitId, HabitLog, HabitPatch, NewGoal, NewHabit,
    NewHabitLog, NewProfile, Profile, ProfileUpdate,
};
use crate::util::{compact_text, is_http_url};

const GOALS_TABLE: &str = "goals";
const HABITS_TABLE: &str = "habits";
const HABIT_LOGS_TABLE: &str = "habit_logs";
const PROFILES_TABLE: &str = "profiles";

const PREFER_REPRESENTATION: &str = "return=representation";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct SupabaseRestClient {
    rest_url: String,
    anon_key: String,
    client: Client,
}

impl SupabaseRestClient {
    pub fn new(config: &SupabaseConfig, timeout: Duration) -> DataResult<Self> {
        Ok(Self {
            rest_url: normalize_rest_url(&config.url)?,
            anon_key: config.anon_key.clone(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        table: &str,
        session: &AuthSession,
    ) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.anon_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(&session.access_token)
    }

    fn select(&self, table: &str, session: &AuthSession) -> RequestBuilder {
        self.request(reqwest::Method::GET, table, session)
            .query(&[("select", "*")])
    }

    fn write(&self, method: reqwest::Method, table: &str, session: &AuthSession) -> RequestBuilder {
        self.request(method, table, session)
            .header("Prefer", PREFER_REPRESENTATION)
    }

    async fn insert_row<B, T>(&self, session: &AuthSession, table: &str, body: &B) -> DataResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.write(reqwest::Method::POST, table, session).json(body);
        single_row(fetch_rows(request).await?, table)
    }

    async fn update_rows<B, T>(&self, request: RequestBuilder, body: &B) -> DataResult<Vec<T>>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        fetch_rows(request.json(body)).await
    }

    async fn delete_rows(&self, request: RequestBuilder) -> DataResult<usize> {
        let rows: Vec<serde_json::Value> = fetch_rows(request).await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl GoalsBackend for SupabaseRestClient {
    async fn list_goals(&self, session: &AuthSession) -> DataResult<Vec<Goal>> {
        let request = self
            .select(GOALS_TABLE, session)
            .query(&[("order", "created_at.desc")]);
        fetch_rows(request).await
    }

    async fn insert_goal(&self, session: &AuthSession, goal: &NewGoal) -> DataResult<Goal> {
        self.insert_row(session, GOALS_TABLE, goal).await
    }

    async fn update_goal(
        &self,
        session: &AuthSession,
        id: &GoalId,
        patch: &GoalPatch,
    ) -> DataResult<usize> {
        let request = self
            .write(reqwest::Method::PATCH, GOALS_TABLE, session)
            .query(&[("id", eq(id))]);
        let rows: Vec<Goal> = self.update_rows(request, patch).await?;
        Ok(rows.len())
    }

    async fn delete_goal(&self, session: &AuthSession, id: &GoalId) -> DataResult<usize> {
        let request = self
            .write(reqwest::Method::DELETE, GOALS_TABLE, session)
            .query(&[("id", eq(id))]);
        self.delete_rows(request).await
    }
}

#[async_trait]
impl HabitsBackend for SupabaseRestClient {
    async fn list_habits(
        &self,
        session: &AuthSession,
        goal_id: Option<&GoalId>,
    ) -> DataResult<Vec<Habit>> {
        let mut request = self
            .select(HABITS_TABLE, session)
            .query(&[("order", "created_at.asc")]);
        if let Some(goal_id) = goal_id {
            request = request.query(&[("goal_id", eq(goal_id))]);
        }
        fetch_rows(request).await
    }

    async fn insert_habit(&self, session: &AuthSession, habit: &NewHabit) -> DataResult<Habit> {
        self.insert_row(session, HABITS_TABLE, habit).await
    }

    async fn update_habit(
        &self,
        session: &AuthSession,
        id: &HabitId,
        patch: &HabitPatch,
    ) -> DataResult<usize> {
        let request = self
            .write(reqwest::Method::PATCH, HABITS_TABLE, session)
            .query(&[("id", eq(id))]);
        let rows: Vec<Habit> = self.update_rows(request, patch).await?;
        Ok(rows.len())
    }

    async fn delete_habit(&self, session: &AuthSession, id: &HabitId) -> DataResult<usize> {
        let request = self
            .write(reqwest::Method::DELETE, HABITS_TABLE, session)
            .query(&[("id", eq(id))]);
        self.delete_rows(request).await
    }

    async fn list_habit_logs(
        &self,
        session: &AuthSession,
        habit_id: &HabitId,
        limit: Option<usize>,
    ) -> DataResult<Vec<HabitLog>> {
        let mut request = self
            .select(HABIT_LOGS_TABLE, session)
            .query(&[("habit_id", eq(habit_id)), ("order", "date.desc".to_string())]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        fetch_rows(request).await
    }

    async fn list_logs_on(
        &self,
        session: &AuthSession,
        date: NaiveDate,
    ) -> DataResult<Vec<HabitLog>> {
        let request = self
            .select(HABIT_LOGS_TABLE, session)
            .query(&[("date", eq(date))]);
        fetch_rows(request).await
    }

    async fn insert_habit_log(
        &self,
        session: &AuthSession,
        log: &NewHabitLog,
    ) -> DataResult<HabitLog> {
        self.insert_row(session, HABIT_LOGS_TABLE, log).await
    }

    async fn delete_habit_log(
        &self,
        session: &AuthSession,
        habit_id: &HabitId,
        date: NaiveDate,
    ) -> DataResult<usize> {
        let request = self
            .write(reqwest::Method::DELETE, HABIT_LOGS_TABLE, session)
            .query(&[("habit_id", eq(habit_id)), ("date", eq(date))]);
        self.delete_rows(request).await
    }
}

#[async_trait]
impl ProfileBackend for SupabaseRestClient {
    async fn fetch_profile(
        &self,
        session: &AuthSession,
        id: &str,
    ) -> DataResult<Option<Profile>> {
        let request = self
            .select(PROFILES_TABLE, session)
            .query(&[("id", eq(id))]);
        let rows: Vec<Profile> = fetch_rows(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(
        &self,
        session: &AuthSession,
        profile: &NewProfile,
    ) -> DataResult<Profile> {
        self.insert_row(session, PROFILES_TABLE, profile).await
    }

    async fn update_profile(
        &self,
        session: &AuthSession,
        id: &str,
        update: &ProfileUpdate,
    ) -> DataResult<Option<Profile>> {
        let request = self
            .write(reqwest::Method::PATCH, PROFILES_TABLE, session)
            .query(&[("id", eq(id))]);
        let rows: Vec<Profile> = self.update_rows(request, update).await?;
        Ok(rows.into_iter().next())
    }
}

pub fn normalize_rest_url(url: &str) -> DataResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !is_http_url(trimmed) {
        return Err(DataError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

async fn fetch_rows<T: DeserializeOwned>(request: RequestBuilder) -> DataResult<Vec<T>> {
    let response = check_status(request.send().await?).await?;
    Ok(response.json::<Vec<T>>().await?)
}

async fn check_status(response: Response) -> DataResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(map_api_error(status, &body))
}

fn single_row<T>(rows: Vec<T>, table: &str) -> DataResult<T> {
    rows.into_iter().next().ok_or_else(|| {
        DataError::InvalidPayload(format!("insert into {table} returned no row"))
    })
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn map_api_error(status: StatusCode, body: &str) -> DataError {
    let parsed = serde_json::from_str::<PostgrestErrorBody>(body).ok();
    let code = parsed.as_ref().and_then(|payload| payload.code.clone());
    let message = parsed
        .and_then(|payload| payload.message.or(payload.details).or(payload.hint))
        .map(|message| compact_text(&message))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            let body = compact_text(body);
            if body.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body
            }
        });

    if status == StatusCode::UNAUTHORIZED {
        return DataError::Unauthorized(message);
    }
    if code.as_deref() == Some(UNIQUE_VIOLATION) || status == StatusCode::CONFLICT {
        return DataError::Conflict(message);
    }
    DataError::Api(format!("{} ({})", message, status.as_u16()))
}
