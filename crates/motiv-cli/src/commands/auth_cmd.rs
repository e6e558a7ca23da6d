use std::sync::Arc;

use motiv_core::auth::{DeepLinkHandler, DeepLinkOutcome};
use motiv_core::session::validate_email;

use crate::auth::{clear_stored_session, load_stored_session};
use crate::cli::AuthCommands;
use crate::commands::common::{AppContext, CliSettings};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email } => run_login(&email, global_profile).await,
        AuthCommands::Callback { url } => run_callback(&url, global_profile).await,
        AuthCommands::Status => run_status(global_profile).await,
        AuthCommands::Logout => run_logout(global_profile).await,
    }
}

async fn run_login(email: &str, global_profile: Option<&str>) -> Result<(), CliError> {
    let email = validate_email(email)?;
    let context = AppContext::load(global_profile).await?;
    let result = context.facade.sign_in(&email).await;
    let profile_name = context.profile_name.clone();
    context.shutdown().await;
    result?;

    println!("Magic link sent to {email} for profile '{profile_name}'.");
    println!("Open it, then run `motiv auth callback '<url>'` with the address it opened.");
    Ok(())
}

async fn run_callback(url: &str, global_profile: Option<&str>) -> Result<(), CliError> {
    let context = AppContext::load(global_profile).await?;
    let handler = DeepLinkHandler::new(Arc::clone(&context.auth));
    let previous = context
        .session
        .current_session()
        .map(|session| session.access_token);

    let result = match handler.handle_url(url).await {
        DeepLinkOutcome::Installed => context
            .wait_for_sign_in(previous.as_deref())
            .await
            .map(|session| {
                let label = context
                    .session
                    .snapshot()
                    .user
                    .map_or_else(|| session.user.id.clone(), |user| user.display_name().to_string());
                println!("Signed in profile '{}' as {label}", context.profile_name);
            }),
        DeepLinkOutcome::Ignored => Err(CliError::Auth(
            "The URL does not carry an access_token and refresh_token".to_string(),
        )),
        DeepLinkOutcome::Rejected => Err(CliError::Auth(
            "The sign-in link was rejected; it may have expired. Request a new one.".to_string(),
        )),
    };
    context.shutdown().await;
    result
}

async fn run_status(global_profile: Option<&str>) -> Result<(), CliError> {
    let settings = CliSettings::load(global_profile)?;
    if settings.client.supabase().is_err() {
        let stored = load_stored_session(&settings.profile_name)?;
        println!(
            "Profile '{}' is not configured{}.",
            settings.profile_name,
            if stored.is_some() {
                " (a stored session exists)"
            } else {
                ""
            }
        );
        return Ok(());
    }

    let context = AppContext::connect(settings).await?;
    let state = context.session.snapshot();
    match (&state.session, &state.user) {
        (Some(session), user) => {
            let label = user.as_ref().map_or_else(
                || session.user.email.as_deref().unwrap_or("(no email)").to_string(),
                |user| user.display_name().to_string(),
            );
            println!(
                "Profile '{}' is signed in as {} (expires_at={})",
                context.profile_name, label, session.expires_at
            );
        }
        (None, _) => println!("Profile '{}' is not signed in.", context.profile_name),
    }
    context.shutdown().await;
    Ok(())
}

async fn run_logout(global_profile: Option<&str>) -> Result<(), CliError> {
    let settings = CliSettings::load(global_profile)?;
    let profile_name = settings.profile_name.clone();

    if settings.client.supabase().is_ok() {
        let context = AppContext::connect(settings).await?;
        let result = if context.session.current_session().is_some() {
            context.facade.sign_out().await
        } else {
            Ok(())
        };
        context.shutdown().await;
        result?;
    }
    clear_stored_session(&profile_name)?;

    println!("Signed out profile '{profile_name}'");
    Ok(())
}
