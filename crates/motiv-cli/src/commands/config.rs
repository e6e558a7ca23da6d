use std::env;

use motiv_core::auth::SupabaseAuthClient;
use motiv_core::config::{SupabaseConfig, ENV_REDIRECT_URL, ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL};
use serde::Serialize;

use crate::auth::KeyringSessionStore;
use crate::cli::ConfigCommands;
use crate::commands::common::CliSettings;
use crate::config_profiles::{mask_secret, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub async fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            redirect_url,
            no_activate,
        } => run_config_init(
            global_profile,
            ProfileValues {
                supabase_url,
                supabase_anon_key,
                redirect_url,
            },
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(global_profile, json),
        ConfigCommands::Check => run_config_check(global_profile).await,
    }
}

/// Values supplied for a profile from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileValues {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub redirect_url: Option<String>,
}

impl ProfileValues {
    fn from_env() -> Self {
        Self {
            supabase_url: env::var(ENV_SUPABASE_URL).ok(),
            supabase_anon_key: env::var(ENV_SUPABASE_ANON_KEY).ok(),
            redirect_url: env::var(ENV_REDIRECT_URL).ok(),
        }
    }
}

/// Explicit flags win over the environment, which wins over what the profile
/// already had.
pub fn merge_profile(
    existing: &CliProfile,
    explicit: ProfileValues,
    from_env: ProfileValues,
) -> Result<CliProfile, CliError> {
    let supabase_url = normalize_text_option(explicit.supabase_url)
        .or_else(|| normalize_text_option(from_env.supabase_url))
        .or_else(|| existing.supabase_url());
    let supabase_anon_key = normalize_text_option(explicit.supabase_anon_key)
        .or_else(|| normalize_text_option(from_env.supabase_anon_key))
        .or_else(|| existing.supabase_anon_key());
    let redirect_url = normalize_text_option(explicit.redirect_url)
        .or_else(|| normalize_text_option(from_env.redirect_url))
        .or_else(|| existing.redirect_url());

    // Validates the pair (both or neither, http(s) URL, non-empty key).
    let supabase = SupabaseConfig::resolve(supabase_url, supabase_anon_key)
        .map_err(|error| CliError::Config(error.to_string()))?;

    Ok(CliProfile {
        supabase_url: supabase.as_ref().map(|config| config.url.clone()),
        supabase_anon_key: supabase.map(|config| config.anon_key),
        redirect_url,
    })
}

pub fn run_config_init(
    profile_name: Option<&str>,
    explicit: ProfileValues,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(&existing, explicit, ProfileValues::from_env())?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    if merged.supabase_url.is_some() {
        println!(
            "Profile '{profile_name}' is ready. Run `motiv auth login --email <email>`."
        );
    } else {
        println!("Profile '{profile_name}' is missing: supabase_url, supabase_anon_key");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub profile: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub redirect_url: String,
    pub http_timeout_secs: u64,
}

pub fn profile_summary(settings: &CliSettings) -> ProfileSummary {
    ProfileSummary {
        profile: settings.profile_name.clone(),
        supabase_url: settings.client.supabase_url.clone(),
        supabase_anon_key: settings
            .client
            .supabase_anon_key
            .as_deref()
            .map(mask_secret),
        redirect_url: settings.client.redirect_target(),
        http_timeout_secs: settings.client.http_timeout().as_secs(),
    }
}

fn run_config_show(global_profile: Option<&str>, json: bool) -> Result<(), CliError> {
    let summary = profile_summary(&CliSettings::load(global_profile)?);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let unset = "(not set)";
    println!("profile:           {}", summary.profile);
    println!(
        "supabase_url:      {}",
        summary.supabase_url.as_deref().unwrap_or(unset)
    );
    println!(
        "supabase_anon_key: {}",
        summary.supabase_anon_key.as_deref().unwrap_or(unset)
    );
    println!("redirect_url:      {}", summary.redirect_url);
    println!("http_timeout:      {}s", summary.http_timeout_secs);
    Ok(())
}

async fn run_config_check(global_profile: Option<&str>) -> Result<(), CliError> {
    let settings = CliSettings::load(global_profile)?;
    let supabase = settings
        .client
        .supabase()
        .map_err(motiv_core::Error::from)?;
    let client = SupabaseAuthClient::new(
        &supabase,
        KeyringSessionStore::new(&settings.profile_name),
        settings.client.http_timeout(),
    )?;
    let status = client.verify_configuration().await?;

    println!("email provider:  {}", enabled(status.email_enabled));
    println!("sign-ups:        {}", enabled(status.signup_enabled));
    println!("smtp:            {}", enabled(status.smtp_configured));
    if let Some(limit) = status.rate_limit_email_sent {
        println!("email rate:      {limit} per hour");
    }

    if status.supports_magic_links() {
        println!("Magic-link sign-in is available for profile '{}'.", settings.profile_name);
        Ok(())
    } else {
        Err(CliError::Config(
            "Magic-link sign-in is unavailable: enable the email provider and configure SMTP"
                .to_string(),
        ))
    }
}

const fn enabled(value: bool) -> &'static str {
    if value {
        "enabled"
    } else {
        "disabled"
    }
}
