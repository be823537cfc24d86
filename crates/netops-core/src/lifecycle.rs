use crate::CoreError;
use std::fmt;

/// Provisioning state of a slice's class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceState {
    Unknown,
    /// Known to the store, parent class not created yet.
    Provisioned,
    /// Parent class exists on the interface.
    Initialized,
    Deleted,
}

impl fmt::Display for SliceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceState::Unknown => write!(f, "unknown"),
            SliceState::Provisioned => write!(f, "provisioned"),
            SliceState::Initialized => write!(f, "initialized"),
            SliceState::Deleted => write!(f, "deleted"),
        }
    }
}

pub fn validate_transition(from: SliceState, to: SliceState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (SliceState::Unknown, SliceState::Provisioned)
            | (SliceState::Provisioned, SliceState::Initialized)
            | (
                SliceState::Provisioned | SliceState::Initialized,
                SliceState::Deleted
            )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
