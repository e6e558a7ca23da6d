use chrono::NaiveDate;
use motiv_core::habits::{build_dashboard, DashboardHabit};

use crate::cli::HabitCommands;
use crate::commands::common::{
    format_dashboard_lines, format_habit_lines, parse_goal_id, parse_habit_id, resolve_date,
    short_id, store_failure, today, AppContext,
};
use crate::error::CliError;

pub async fn run_habits(command: HabitCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let context = AppContext::load(global_profile).await?;
    let result = match context.require_session() {
        Ok(_) => dispatch(&context, command).await,
        Err(error) => Err(error),
    };
    context.shutdown().await;
    result
}

async fn dispatch(context: &AppContext, command: HabitCommands) -> Result<(), CliError> {
    match command {
        HabitCommands::List { goal, json } => list(context, goal.as_deref(), json).await,
        HabitCommands::Add { goal, name } => add(context, &goal, &name).await,
        HabitCommands::Rename { id, name } => rename(context, &id, &name).await,
        HabitCommands::Delete { id } => delete(context, &id).await,
        HabitCommands::Check { id, date } => {
            check(context, &id, resolve_date(date.as_deref())?).await
        }
        HabitCommands::Uncheck { id, date } => {
            uncheck(context, &id, resolve_date(date.as_deref())?).await
        }
        HabitCommands::Today { json } => dashboard(context, today(), json).await,
    }
}

async fn list(context: &AppContext, goal: Option<&str>, json: bool) -> Result<(), CliError> {
    let goal = goal.map(parse_goal_id).transpose()?;
    context.habits.fetch(goal.as_ref()).await;
    let state = context.habits.state();
    if let Some(error) = state.error {
        return Err(store_failure(Some(error), "Failed to load habits"));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state.habits)?);
    } else if state.habits.is_empty() {
        println!("No habits yet. Add one with `motiv habits add <goal-id> <name>`.");
    } else {
        for line in format_habit_lines(&state.habits) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn add(context: &AppContext, goal: &str, name: &str) -> Result<(), CliError> {
    let goal = parse_goal_id(goal)?;
    let Some(habit) = context.habits.create(&goal, name).await else {
        return Err(store_failure(context.habits.state().error, "Failed to create habit"));
    };
    println!("Created habit {} ({})", habit.name, habit.id);
    Ok(())
}

async fn rename(context: &AppContext, id: &str, name: &str) -> Result<(), CliError> {
    let id = parse_habit_id(id)?;
    if !context.habits.update(&id, name).await {
        return Err(store_failure(context.habits.state().error, "Failed to rename habit"));
    }
    println!("Renamed habit {}", short_id(&id.as_str()));
    Ok(())
}

async fn delete(context: &AppContext, id: &str) -> Result<(), CliError> {
    let id = parse_habit_id(id)?;
    if !context.habits.delete(&id).await {
        return Err(store_failure(context.habits.state().error, "Failed to delete habit"));
    }
    println!("Deleted habit {}", short_id(&id.as_str()));
    Ok(())
}

async fn check(context: &AppContext, id: &str, date: NaiveDate) -> Result<(), CliError> {
    let id = parse_habit_id(id)?;
    if !context.habits.check_in(&id, date).await {
        return Err(store_failure(context.habits.state().error, "Failed to check in"));
    }

    let streak = context.habits.streak(&id, today()).await;
    println!(
        "Checked in {} on {date} (streak: {})",
        short_id(&id.as_str()),
        streak.streak
    );
    Ok(())
}

async fn uncheck(context: &AppContext, id: &str, date: NaiveDate) -> Result<(), CliError> {
    let id = parse_habit_id(id)?;
    if !context.habits.uncheck(&id, date).await {
        return Err(store_failure(context.habits.state().error, "Failed to remove check-in"));
    }
    println!("Cleared check-in of {} on {date}", short_id(&id.as_str()));
    Ok(())
}

/// Load goals, habits and each habit's history, then join them for `today`.
pub async fn load_dashboard(
    context: &AppContext,
    today: NaiveDate,
) -> Result<Vec<DashboardHabit>, CliError> {
    context.goals.fetch().await;
    let goals = context.goals.state();
    if let Some(error) = goals.error {
        return Err(store_failure(Some(error), "Failed to load goals"));
    }

    context.habits.fetch(None).await;
    let habits = context.habits.state();
    if let Some(error) = habits.error {
        return Err(store_failure(Some(error), "Failed to load habits"));
    }

    let mut logs = Vec::new();
    for habit in &habits.habits {
        logs.extend(context.habits.logs(&habit.id).await);
    }
    if let Some(error) = context.habits.state().error {
        return Err(store_failure(Some(error), "Failed to load check-ins"));
    }

    Ok(build_dashboard(&goals.goals, &habits.habits, &logs, today))
}

async fn dashboard(context: &AppContext, today: NaiveDate, json: bool) -> Result<(), CliError> {
    let entries = load_dashboard(context, today).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", today.format("%A, %B %-d"));
    if entries.is_empty() {
        println!("Nothing to track yet. Create a goal, then add habits to it.");
        return Ok(());
    }
    let done = entries
        .iter()
        .filter(|entry| entry.habit.is_completed_today)
        .count();
    for line in format_dashboard_lines(&entries) {
        println!("{line}");
    }
    println!("{done}/{} done today", entries.len());
    Ok(())
}
