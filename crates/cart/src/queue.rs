//! Pending action queue.
//!
//! Records in-flight actions in submission order. Enqueue is synchronous and
//! never touches the network. Conflict policy: a new `UpdateLines` or
//! `RemoveLines` that touches a line which already has a pending
//! `UpdateLines`/`RemoveLines` is rejected; everything else is accepted.

use std::fmt;

use chrono::{DateTime, Utc};
use naked_pineapple_core::{ActionStatus, CartLineId};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::action::CartAction;
use crate::error::{CartError, ConflictError};
use crate::identity::LineTarget;

/// Opaque handle returned when an action is enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionHandle(Uuid);

impl ActionHandle {
    /// Generate a fresh handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An action waiting on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Handle given to the submitter.
    pub handle: ActionHandle,
    /// The validated action.
    pub action: CartAction,
    /// Current status. `Submitted` while queued; terminal once taken.
    pub status: ActionStatus,
    /// When the action was enqueued.
    pub submitted_at: DateTime<Utc>,
}

impl PendingEntry {
    /// A copy with gift card codes masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            action: self.action.redacted(),
            ..self.clone()
        }
    }
}

/// In-flight actions, in submission order.
#[derive(Debug, Clone, Default)]
pub struct PendingActionQueue {
    entries: Vec<PendingEntry>,
}

impl PendingActionQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Validate and insert an action.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Validation`] for a malformed payload, or
    /// [`CartError::Conflict`] if a line edit collides with one already in
    /// flight. The queue is unchanged on error.
    pub fn enqueue(&mut self, action: CartAction) -> Result<ActionHandle, CartError> {
        let action = action.validate()?;
        self.check_conflicts(&action)?;

        let handle = ActionHandle::new();
        debug!(handle = %handle, kind = %action.kind(), "Enqueued cart action");
        self.entries.push(PendingEntry {
            handle,
            action,
            status: ActionStatus::Submitted,
            submitted_at: Utc::now(),
        });
        Ok(handle)
    }

    fn check_conflicts(&self, action: &CartAction) -> Result<(), ConflictError> {
        if !action.kind().edits_lines() {
            return Ok(());
        }
        for target in action.line_targets() {
            if let Some(entry) = self.holder_of(&target) {
                let LineTarget::Line(line_id) = target;
                return Err(ConflictError {
                    line_id,
                    pending: entry.handle,
                });
            }
        }
        Ok(())
    }

    fn holder_of(&self, target: &LineTarget) -> Option<&PendingEntry> {
        self.entries.iter().find(|entry| {
            entry.action.kind().edits_lines() && entry.action.line_targets().contains(target)
        })
    }

    /// Remove an entry, marking it with the terminal `status`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownAction`] if no entry has this handle.
    pub fn take(
        &mut self,
        handle: ActionHandle,
        status: ActionStatus,
    ) -> Result<PendingEntry, CartError> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.handle == handle)
            .ok_or(CartError::UnknownAction(handle))?;
        let mut entry = self.entries.remove(position);
        debug_assert!(entry.status.can_transition_to(status));
        entry.status = status;
        Ok(entry)
    }

    /// Look up a pending entry.
    #[must_use]
    pub fn get(&self, handle: ActionHandle) -> Option<&PendingEntry> {
        self.entries.iter().find(|entry| entry.handle == handle)
    }

    /// Pending entries in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingEntry> {
        self.entries.iter()
    }

    /// Pending actions in submission order.
    pub fn actions(&self) -> impl Iterator<Item = &CartAction> {
        self.entries.iter().map(|entry| &entry.action)
    }

    /// Lines locked by an in-flight update or removal.
    #[must_use]
    pub fn pending_lines(&self) -> Vec<CartLineId> {
        let mut lines: Vec<CartLineId> = self
            .entries
            .iter()
            .flat_map(|entry| entry.action.line_targets())
            .map(|LineTarget::Line(id)| id)
            .collect();
        lines.sort();
        lines.dedup();
        lines
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
