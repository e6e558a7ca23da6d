pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod goals;
pub mod habits;
pub mod profile;
