use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "motiv")]
#[command(about = "Track goals and daily habits from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name (Supabase project + stored session)
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign in with a magic link and manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage goals
    Goals {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Manage habits and daily check-ins
    Habits {
        #[command(subcommand)]
        command: HabitCommands,
    },
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Where magic links send you back (defaults to motiv://)
        #[arg(long, value_name = "URL")]
        redirect_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the Supabase project whether magic-link sign-in is available
    Check,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Email a magic link for signing in
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Finish signing in with the URL the magic link opened
    Callback {
        /// Redirect URL including the #access_token fragment
        url: String,
    },
    /// Show auth status for profile
    Status,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// List goals, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a goal
    Add {
        /// Goal title
        title: String,
        /// Optional longer description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Change a goal's title and description
    Edit {
        /// Goal ID
        id: String,
        /// New title
        #[arg(long)]
        title: String,
        /// New description (kept when omitted, cleared when empty)
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a goal
    Delete {
        /// Goal ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum HabitCommands {
    /// List habits, oldest first
    List {
        /// Only habits of this goal
        #[arg(long, value_name = "GOAL_ID")]
        goal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a habit to a goal
    Add {
        /// Goal ID
        goal: String,
        /// Habit name
        name: String,
    },
    /// Rename a habit
    Rename {
        /// Habit ID
        id: String,
        /// New name
        name: String,
    },
    /// Delete a habit
    Delete {
        /// Habit ID
        id: String,
    },
    /// Check a habit in
    Check {
        /// Habit ID
        id: String,
        /// Day to check in (YYYY-MM-DD, defaults to today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// Remove a check-in
    Uncheck {
        /// Habit ID
        id: String,
        /// Day to clear (YYYY-MM-DD, defaults to today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// Daily dashboard with streaks
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the signed-in profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the display name (empty clears it)
    SetName {
        /// Display name
        name: String,
    },
}
