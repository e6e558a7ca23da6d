use crate::cli::ProfileCommands;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_profile(
    command: ProfileCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let context = AppContext::load(global_profile).await?;
    let result = match command {
        ProfileCommands::Show { json } => show(&context, json),
        ProfileCommands::SetName { name } => set_name(&context, &name).await,
    };
    context.shutdown().await;
    result
}

fn show(context: &AppContext, json: bool) -> Result<(), CliError> {
    context.require_session()?;
    let Some(profile) = context.session.snapshot().user else {
        return Err(CliError::Failed(
            "Signed in, but the profile could not be loaded".to_string(),
        ));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }
    println!("name:    {}", profile.name.as_deref().unwrap_or("(not set)"));
    println!("email:   {}", profile.email.as_deref().unwrap_or("(not set)"));
    println!("id:      {}", profile.id);
    println!("since:   {}", profile.created_at.format("%Y-%m-%d"));
    Ok(())
}

async fn set_name(context: &AppContext, name: &str) -> Result<(), CliError> {
    context.require_session()?;
    let profile = context.facade.update_profile_name(Some(name)).await?;
    match profile.name.as_deref() {
        Some(name) => println!("Display name set to {name}"),
        None => println!("Display name cleared"),
    }
    Ok(())
}
