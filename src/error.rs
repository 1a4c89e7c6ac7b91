//! Error types for the battery passport core.

use thiserror::Error;

use crate::domain::battery::{BatteryId, BatteryStatus};
use crate::domain::module::ModuleId;

/// Result type alias using the passport error type.
pub type Result<T> = std::result::Result<T, PassportError>;

/// Main error type for the status and decision engines.
#[derive(Error, Debug)]
pub enum PassportError {
    /// Battery not found in the store
    #[error("Battery not found: {0}")]
    BatteryNotFound(BatteryId),

    /// Module not found on the given battery
    #[error("Module {1} not found on battery {0}")]
    ModuleNotFound(BatteryId, ModuleId),

    /// Battery exists but has no modules to aggregate
    #[error("No modules found for battery {0}")]
    NoModules(BatteryId),

    /// The transition policy does not allow the requested status change
    #[error("Transition rejected: battery {battery_id} cannot move from '{from}' to '{to}'")]
    TransitionRejected {
        battery_id: BatteryId,
        from: BatteryStatus,
        to: BatteryStatus,
    },

    /// The battery is not in the status the operation requires
    #[error("Unexpected status for battery {battery_id}: '{actual}', expected '{expected}'")]
    UnexpectedStatus {
        battery_id: BatteryId,
        actual: BatteryStatus,
        expected: BatteryStatus,
    },

    /// Inputs outside their documented ranges
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The storage collaborator could not complete the operation
    #[error("Persistence error: {0}")]
    Persistence(anyhow::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`PassportError`], for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Persistence,
    InvalidInput,
    Rejected,
    Internal,
}

impl PassportError {
    /// Wrap a storage failure.
    pub fn persistence(error: impl Into<anyhow::Error>) -> Self {
        PassportError::Persistence(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PassportError::BatteryNotFound(_)
            | PassportError::ModuleNotFound(..)
            | PassportError::NoModules(_) => ErrorKind::NotFound,
            PassportError::TransitionRejected { .. } | PassportError::UnexpectedStatus { .. } => {
                ErrorKind::Rejected
            }
            PassportError::InvalidInput(_) => ErrorKind::InvalidInput,
            PassportError::Persistence(_) => ErrorKind::Persistence,
            PassportError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Only storage failures are worth retrying; the caller owns the backoff policy.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Persistence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_kinds() {
        let id = BatteryId::from("BP-2024-LG-002");
        assert_eq!(
            PassportError::BatteryNotFound(id.clone()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            PassportError::ModuleNotFound(id.clone(), ModuleId::from("M9")).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(PassportError::NoModules(id).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_only_persistence_is_retriable() {
        let err = PassportError::persistence(anyhow::anyhow!("connection reset"));
        assert!(err.is_retriable());
        assert!(err.to_string().contains("connection reset"));

        let err = PassportError::InvalidInput("avgStateOfHealth out of range".into());
        assert!(!err.is_retriable());

        let err = PassportError::TransitionRejected {
            battery_id: BatteryId::from("BP-1"),
            from: BatteryStatus::Original,
            to: BatteryStatus::SignaledAsWaste,
        };
        assert!(!err.is_retriable());
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(
            err.to_string(),
            "Transition rejected: battery BP-1 cannot move from 'Original' to 'Signaled As Waste'"
        );
    }

    #[test]
    fn test_unexpected_status_names_current_status() {
        let err = PassportError::UnexpectedStatus {
            battery_id: BatteryId::from("BP-1"),
            actual: BatteryStatus::Reused,
            expected: BatteryStatus::Waste,
        };
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(!err.is_retriable());
        assert_eq!(
            err.to_string(),
            "Unexpected status for battery BP-1: 'Reused', expected 'Waste'"
        );
    }

    #[test]
    fn test_malformed_json_is_internal() {
        let err: PassportError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
