//! motiv-core - Core library for Motiv
//!
//! This crate holds the client side of Motiv: the authentication session
//! lifecycle, the Supabase auth and REST clients, and the goal and habit
//! stores that the CLI (or any other UI) drives.

pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod goals;
pub mod habits;
pub mod models;
pub mod session;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use goals::{GoalsState, GoalsStore};
pub use habits::{HabitsState, HabitsStore};
pub use models::{Goal, GoalId, Habit, HabitId, HabitLog, Profile};
pub use session::{AuthBootstrapper, AuthFacade, AuthState, BootstrapHandle, SessionStore};
