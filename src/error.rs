use thiserror::Error;

use crate::extract::ExtractError;

/// Failures surfaced by [`crate::assistant::Assistant`] operations.
///
/// The HTTP layer maps each variant to a status code; the CLI prints the
/// message.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("no contract uploaded for session {0}")]
    NoContract(String),

    #[error("session {0} already has a contract")]
    ContractExists(String),

    #[error("no text could be extracted from {0}")]
    EmptyDocument(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embeddings are disabled; set [embedding] provider in config")]
    EmbeddingsDisabled,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("model provider error: {0:#}")]
    Provider(anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssistantError {
    pub fn provider(err: anyhow::Error) -> Self {
        AssistantError::Provider(err)
    }
}
