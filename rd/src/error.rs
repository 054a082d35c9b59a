//! Error types for collaborator calls and transitions

use thiserror::Error;

use crate::state::StateError;

/// Failure of an external collaborator
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Collaborator rejected request: {0}")]
    Rejected(String),
}

/// Failure of a single transition; caught at the dispatch boundary
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Collaborator failure: {0}")]
    Collab(#[from] CollabError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StateError> for EngineError {
    fn from(err: StateError) -> Self {
        Self::Collab(CollabError::State(err))
    }
}
