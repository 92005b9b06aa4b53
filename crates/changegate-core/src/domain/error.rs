//! Domain-level error taxonomy for changegate.

use super::status::CrStatus;

/// changegate domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ChangeGateError {
    #[error("change request not found: {0}")]
    ChangeRequestNotFound(String),

    #[error("feature {feature_id} not found on change request {cr_id}")]
    FeatureNotFound { cr_id: String, feature_id: String },

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("notification not found: {0}")]
    NotificationNotFound(String),

    #[error("change request already exists: {0}")]
    DuplicateChangeRequest(String),

    #[error("user already exists: {0}")]
    DuplicateUser(String),

    #[error("illegal transition for {cr_id}: {from} -> {to}")]
    InvalidTransition {
        cr_id: String,
        from: CrStatus,
        to: CrStatus,
    },

    #[error("user {0} is disabled")]
    UserDisabled(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] changegate_state::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for changegate domain operations.
pub type Result<T> = std::result::Result<T, ChangeGateError>;
