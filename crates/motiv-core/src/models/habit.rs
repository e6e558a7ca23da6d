//! Habit and check-in models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{row_id, GoalId};

row_id!(
    /// Identifier of a row in the `habits` table
    HabitId
);

row_id!(
    /// Identifier of a row in the `habit_logs` table
    HabitLogId
);

/// A daily habit attached to a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub goal_id: GoalId,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A single check-in of a habit on a calendar day.
///
/// Logs are never updated, only created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitLog {
    pub id: HabitLogId,
    pub habit_id: HabitId,
    pub user_id: String,
    /// Calendar day of the check-in (`YYYY-MM-DD`)
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewHabit {
    pub goal_id: GoalId,
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitPatch {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewHabitLog {
    pub habit_id: HabitId,
    pub user_id: String,
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn habit_log_date_uses_calendar_format() {
        let log: HabitLog = serde_json::from_str(
            r#"{
                "id": "1d0b9a3c-0000-4c4c-8c8c-000000000001",
                "habit_id": "1d0b9a3c-0000-4c4c-8c8c-000000000002",
                "user_id": "user-1",
                "date": "2025-04-12",
                "created_at": "2025-04-12T21:04:00+00:00"
            }"#,
        )
        .unwrap();
        assert_eq!(log.date, NaiveDate::from_ymd_opt(2025, 4, 12).unwrap());

        let insert = NewHabitLog {
            habit_id: log.habit_id,
            user_id: log.user_id.clone(),
            date: log.date,
        };
        let value = serde_json::to_value(&insert).unwrap();
        assert_eq!(value["date"], "2025-04-12");
        assert_eq!(value["habit_id"], "1d0b9a3c-0000-4c4c-8c8c-000000000002");
    }
}
