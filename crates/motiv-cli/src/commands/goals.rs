use motiv_core::{GoalId, GoalsState};

use crate::cli::GoalCommands;
use crate::commands::common::{format_goal_lines, parse_goal_id, short_id, store_failure, AppContext};
use crate::error::CliError;

pub async fn run_goals(command: GoalCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let context = AppContext::load(global_profile).await?;
    let result = match context.require_session() {
        Ok(_) => dispatch(&context, command).await,
        Err(error) => Err(error),
    };
    context.shutdown().await;
    result
}

async fn dispatch(context: &AppContext, command: GoalCommands) -> Result<(), CliError> {
    match command {
        GoalCommands::List { json } => list(context, json).await,
        GoalCommands::Add { title, description } => {
            add(context, &title, description.as_deref()).await
        }
        GoalCommands::Edit {
            id,
            title,
            description,
        } => edit(context, &id, &title, description.as_deref()).await,
        GoalCommands::Delete { id } => delete(context, &id).await,
    }
}

async fn list(context: &AppContext, json: bool) -> Result<(), CliError> {
    context.goals.fetch().await;
    let state = context.goals.state();
    if let Some(error) = state.error {
        return Err(store_failure(Some(error), "Failed to load goals"));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state.goals)?);
    } else if state.goals.is_empty() {
        println!("No goals yet. Add one with `motiv goals add <title>`.");
    } else {
        for line in format_goal_lines(&state.goals) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn add(context: &AppContext, title: &str, description: Option<&str>) -> Result<(), CliError> {
    let Some(goal) = context.goals.create(title, description).await else {
        return Err(store_failure(context.goals.state().error, "Failed to create goal"));
    };
    println!("Created goal {} ({})", goal.title, goal.id);
    Ok(())
}

async fn edit(
    context: &AppContext,
    id: &str,
    title: &str,
    description: Option<&str>,
) -> Result<(), CliError> {
    let id = parse_goal_id(id)?;

    // Omitting --description keeps what the goal already has.
    let existing = match description {
        Some(_) => None,
        None => {
            context.goals.fetch().await;
            existing_description(&context.goals.state(), &id)?
        }
    };
    let description = description.or(existing.as_deref());

    if !context.goals.update(&id, title, description).await {
        return Err(store_failure(context.goals.state().error, "Failed to update goal"));
    }
    println!("Updated goal {}", short_id(&id.as_str()));
    Ok(())
}

/// Current description of `id` from a freshly fetched list.
///
/// A failed fetch or a missing goal is an error, so an edit never clears a
/// description it could not read.
pub fn existing_description(state: &GoalsState, id: &GoalId) -> Result<Option<String>, CliError> {
    if state.error.is_some() {
        return Err(store_failure(state.error.clone(), "Failed to load goals"));
    }
    state
        .goals
        .iter()
        .find(|goal| goal.id == *id)
        .map(|goal| goal.description.clone())
        .ok_or_else(|| CliError::Failed(format!("Goal not found: {id}")))
}

async fn delete(context: &AppContext, id: &str) -> Result<(), CliError> {
    let id = parse_goal_id(id)?;
    if !context.goals.delete(&id).await {
        return Err(store_failure(context.goals.state().error, "Failed to delete goal"));
    }
    println!("Deleted goal {}", short_id(&id.as_str()));
    Ok(())
}
