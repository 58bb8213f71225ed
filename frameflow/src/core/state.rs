//! Concurrent group lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of one invocation of a concurrent group.
///
/// `Pending → Dispatched → Waiting → Merging → Done`, or
/// `Pending → Dispatched → Waiting → Aborted` when a member fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    /// Invocation accepted, no member started yet.
    #[default]
    Pending,
    /// Every member has been handed the input context.
    Dispatched,
    /// Waiting at the barrier for all members to settle.
    Waiting,
    /// All members succeeded; folding partial contexts.
    Merging,
    /// Merged context handed to the continuation.
    Done,
    /// A member failed; partial contexts discarded.
    Aborted,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Dispatched => write!(f, "dispatched"),
            Self::Waiting => write!(f, "waiting"),
            Self::Merging => write!(f, "merging"),
            Self::Done => write!(f, "done"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl GroupState {
    /// Returns true if the state represents a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Dispatched)
                | (Self::Dispatched, Self::Waiting)
                | (Self::Waiting, Self::Merging | Self::Aborted)
                | (Self::Merging, Self::Done)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_state_display() {
        assert_eq!(GroupState::Pending.to_string(), "pending");
        assert_eq!(GroupState::Merging.to_string(), "merging");
        assert_eq!(GroupState::Aborted.to_string(), "aborted");
    }

    #[test]
    fn test_group_state_terminal() {
        assert!(GroupState::Done.is_terminal());
        assert!(GroupState::Aborted.is_terminal());
        assert!(!GroupState::Waiting.is_terminal());
        assert!(!GroupState::default().is_terminal());
        assert_eq!(GroupState::default(), GroupState::Pending);
    }

    #[test]
    fn test_group_state_transitions() {
        assert!(GroupState::Pending.can_transition_to(GroupState::Dispatched));
        assert!(GroupState::Waiting.can_transition_to(GroupState::Aborted));
        assert!(GroupState::Merging.can_transition_to(GroupState::Done));
        assert!(!GroupState::Dispatched.can_transition_to(GroupState::Done));
        assert!(!GroupState::Done.can_transition_to(GroupState::Pending));
    }

    #[test]
    fn test_group_state_serialize() {
        let json = serde_json::to_string(&GroupState::Waiting).unwrap();
        assert_eq!(json, r#""waiting""#);
    }
}
