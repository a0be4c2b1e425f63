//! Status enums for cart actions.

use serde::{Deserialize, Serialize};

/// Lifecycle of a pending cart action.
///
/// ```text
/// Submitted -> Confirmed
/// Submitted -> Failed
/// ```
///
/// `Confirmed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Enqueued locally; the backend has not answered yet.
    #[default]
    Submitted,
    /// The backend accepted the mutation and returned the authoritative cart.
    Confirmed,
    /// The backend call failed, timed out, or returned user errors.
    Failed,
}

impl ActionStatus {
    /// Whether the action has left the queue for good.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::Confirmed | Self::Failed)
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid action status: {s}")),
        }
    }
}
