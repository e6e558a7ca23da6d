//! Row models for the Motiv backend tables.

/// Declares a UUID-backed row identifier.
///
/// Row ids are issued by the backend (`gen_random_uuid()`), so these types
/// only parse and display; they never mint new values.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(value: uuid::Uuid) -> Self {
                Self(value)
            }

            /// Get the string representation of this ID
            #[must_use]
            pub fn as_str(&self) -> String {
                self.0.to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(uuid::Uuid::parse_str(s.trim())?))
            }
        }
    };
}

pub(crate) use row_id;

mod goal;
mod habit;
mod profile;

pub use goal::{Goal, GoalId, GoalPatch, NewGoal};
pub use habit::{Habit, HabitId, HabitLog, HabitLogId, HabitPatch, NewHabit, NewHabitLog};
pub use profile::{NewProfile, Profile, ProfileUpdate};
