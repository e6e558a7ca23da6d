//! Streaks and the daily dashboard, computed from check-in logs.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Goal, GoalId, Habit, HabitId, HabitLog};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakData {
    pub habit_id: HabitId,
    /// Consecutive checked-in days ending today, or yesterday when today is
    /// still open
    pub streak: u32,
    pub last_check_in: Option<NaiveDate>,
    pub is_completed_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitWithStreak {
    #[serde(flatten)]
    pub habit: Habit,
    pub streak: u32,
    pub is_completed_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardHabit {
    #[serde(flatten)]
    pub habit: HabitWithStreak,
    pub goal_title: String,
}

pub fn compute_streak(habit_id: &HabitId, logs: &[HabitLog], today: NaiveDate) -> StreakData {
    let dates: BTreeSet<NaiveDate> = logs
        .iter()
        .filter(|log| log.habit_id == *habit_id && log.date <= today)
        .map(|log| log.date)
        .collect();

    let is_completed_today = dates.contains(&today);
    let mut cursor = if is_completed_today {
        Some(today)
    } else {
        today.pred_opt()
    };

    let mut streak = 0;
    while let Some(day) = cursor.filter(|day| dates.contains(day)) {
        streak += 1;
        cursor = day.pred_opt();
    }

    StreakData {
        habit_id: *habit_id,
        streak,
        last_check_in: dates.last().copied(),
        is_completed_today,
    }
}

pub fn with_streak(habit: &Habit, logs: &[HabitLog], today: NaiveDate) -> HabitWithStreak {
    let streak = compute_streak(&habit.id, logs, today);
    HabitWithStreak {
        habit: habit.clone(),
        streak: streak.streak,
        is_completed_today: streak.is_completed_today,
    }
}

/// One entry per habit whose goal is known, in the order habits are given.
pub fn build_dashboard(
    goals: &[Goal],
    habits: &[Habit],
    logs: &[HabitLog],
    today: NaiveDate,
) -> Vec<DashboardHabit> {
    let titles: HashMap<GoalId, &str> = goals
        .iter()
        .map(|goal| (goal.id, goal.title.as_str()))
        .collect();

    habits
        .iter()
        .filter_map(|habit| {
            let Some(goal_title) = titles.get(&habit.goal_id) else {
                tracing::debug!("Habit {} has no loaded goal; leaving it off the dashboard", habit.id);
                return None;
            };
            Some(DashboardHabit {
                habit: with_streak(habit, logs, today),
                goal_title: (*goal_title).to_string(),
            })
        })
        .collect()
}
