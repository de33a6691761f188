use std::fmt;

use crate::error::CoreError;

/// Key state of an identity held in a keyring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RotationState {
    /// A single current key signs everything.
    Active,
    /// A replacement key exists but the ledger has not confirmed it yet.
    /// The current key keeps signing until the rotation is committed.
    RotationPending,
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::RotationPending => write!(f, "RotationPending"),
        }
    }
}

/// Events that move an identity between rotation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationEvent {
    /// A replacement key was generated.
    Begin,
    /// The ledger confirmed the replacement key.
    Commit,
    /// The ledger update failed or was abandoned.
    Discard,
}

/// Two-phase key rotation.
///
/// Valid transitions:
/// - Active → RotationPending (Begin)
/// - RotationPending → Active (Commit)
/// - RotationPending → Active (Discard)
pub struct RotationStateMachine;

impl RotationStateMachine {
    pub fn transition(
        current: RotationState,
        event: RotationEvent,
    ) -> Result<RotationState, CoreError> {
        let new_state = match (current, event) {
            (RotationState::Active, RotationEvent::Begin) => RotationState::RotationPending,
            (RotationState::RotationPending, RotationEvent::Commit) => RotationState::Active,
            (RotationState::RotationPending, RotationEvent::Discard) => RotationState::Active,
            _ => {
                let target = match event {
                    RotationEvent::Begin => RotationState::RotationPending,
                    RotationEvent::Commit | RotationEvent::Discard => RotationState::Active,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "key rotation transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: RotationState, event: RotationEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
