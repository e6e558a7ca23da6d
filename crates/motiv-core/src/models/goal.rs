//! Goal model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::row_id;

row_id!(
    /// Identifier of a row in the `goals` table
    GoalId
);

/// A goal owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    /// Owning user (`auth.users.id`); immutable
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Apply a confirmed update to the mutable fields.
    pub fn apply(&mut self, patch: &GoalPatch) {
        self.title.clone_from(&patch.title);
        self.description.clone_from(&patch.description);
    }
}

/// Insert payload for the `goals` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGoal {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
}

/// Update payload for the `goals` table.
///
/// `description: None` is sent as `null` so the column is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalPatch {
    pub title: String,
    pub description: Option<String>,
}
