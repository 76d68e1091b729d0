use thiserror::Error;

use crate::models::{Fqid, FqidError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatastoreError {
    #[error("Model '{0}' does not exist.")]
    NotFound(Fqid),

    #[error("Datastore conflict: {0}")]
    Conflict(String),

    #[error("Datastore service {url} is unreachable: {message}")]
    Connection { url: String, message: String },

    #[error("Invalid datastore response: {0}")]
    InvalidResponse(String),

    #[error("Invalid write request: {0}")]
    InvalidWrite(String),

    #[error("Invalid initial data: {0}")]
    InvalidData(String),
}

impl From<FqidError> for DatastoreError {
    fn from(err: FqidError) -> Self {
        DatastoreError::InvalidData(err.to_string())
    }
}

pub type DatastoreResult<T> = Result<T, DatastoreError>;
