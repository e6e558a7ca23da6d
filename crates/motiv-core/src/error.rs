//! Error types for motiv-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::data::DataError;

/// Result type alias using motiv-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by motiv-core, for callers that want a single type
#[derive(Error, Debug)]
pub enum Error {
    /// Sign-in, sign-out, or session restore failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Goal, habit, or profile row access failed
    #[error(transparent)]
    Data(#[from] DataError),

    /// Supabase settings missing or malformed
    #[error(transparent)]
    Config(#[from] ConfigError),
}
