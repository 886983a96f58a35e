//! Error types.
//!
//! Only two things in this crate can fail in a way the caller must see:
//! placing a mission (on a craft whose physical state forbids it, or on one
//! the airspace doesn't know), and loading a tuning file. Everything else
//! degrades locally (see the craft and mover modules).

use thiserror::Error;

use crate::entity::CraftId;
use crate::mission::{Blockers, MissionType};

/// A mission was refused by the craft's current physical state.
///
/// The mission itself is dropped. Callers should treat this as a no-op and
/// not retry the same kind until the craft's state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The mission kind is blocked by one or more active conditions.
    #[error("{mission} mission blocked while craft is {blockers:?}")]
    Blocked {
        /// Kind of the rejected mission
        mission: MissionType,
        /// Conditions that blocked it
        blockers: Blockers,
    },
    /// The addressed craft does not exist (or has already been removed).
    #[error("no craft {0} in airspace")]
    UnknownCraft(CraftId),
}

impl PlacementError {
    /// Returns the kind of the rejected mission, if it got as far as a
    /// craft.
    #[must_use]
    pub const fn mission(&self) -> Option<MissionType> {
        match self {
            Self::Blocked { mission, .. } => Some(*mission),
            Self::UnknownCraft(_) => None,
        }
    }
}

/// Failure to load or validate a [`MoverConfig`](crate::config::MoverConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document was not valid JSON for the config schema.
    #[error("malformed mover config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value was outside its usable range.
    #[error("invalid mover config value `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_display_names_mission() {
        let err = PlacementError::Blocked {
            mission: MissionType::GotoLocation,
            blockers: Blockers::CRASHED,
        };
        let text = err.to_string();
        assert!(text.contains("GotoLocation"));
        assert_eq!(err.mission(), Some(MissionType::GotoLocation));
    }

    #[test]
    fn unknown_craft_has_no_mission() {
        let err = PlacementError::UnknownCraft(CraftId::new(9));
        assert_eq!(err.to_string(), "no craft 9 in airspace");
        assert_eq!(err.mission(), None);
    }

    #[test]
    fn invalid_display_names_field() {
        let err = ConfigError::Invalid {
            field: "ticks_per_second",
            reason: "must be positive",
        };
        assert!(err.to_string().contains("ticks_per_second"));
    }
}
