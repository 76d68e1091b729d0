use thiserror::Error;

use crate::datastore::DatastoreError;
use crate::models::FieldError;

/// Failure of an action request, each kind maps to one HTTP outcome
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// Payload does not satisfy the action schema
    #[error("{0}")]
    Validation(String),

    /// A business rule rejected the request
    #[error("{0}")]
    Action(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    /// Optimistic lock failure on commit
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ActionError {
    pub fn action(message: impl Into<String>) -> Self {
        ActionError::Action(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ActionError::Internal(message.into())
    }

    pub fn permission_denied(action: &str, missing: impl std::fmt::Display) -> Self {
        ActionError::PermissionDenied(format!(
            "You are not allowed to perform action {}. Missing permission: {}",
            action, missing
        ))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ActionError::Conflict(_))
    }
}

impl From<DatastoreError> for ActionError {
    fn from(err: DatastoreError) -> Self {
        match err {
            DatastoreError::NotFound(_) => ActionError::NotFound(err.to_string()),
            DatastoreError::Conflict(msg) => ActionError::Conflict(msg),
            other => ActionError::Internal(other.to_string()),
        }
    }
}

impl From<FieldError> for ActionError {
    fn from(err: FieldError) -> Self {
        ActionError::Action(err.to_string())
    }
}

pub type ActionResult<T> = Result<T, ActionError>;
