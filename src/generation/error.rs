use thiserror::Error;

use crate::inference::InferenceError;

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("{stage} returned an empty response")]
    EmptyResponse { stage: &'static str },

    #[error("{stage} output violates the {contract} contract: {message}")]
    SchemaViolation {
        stage: &'static str,
        contract: &'static str,
        message: String,
    },

    #[error("{stage} inference call failed: {source}")]
    Inference {
        stage: &'static str,
        #[source]
        source: InferenceError,
    },

    #[error("output contract {contract} is unusable: {message}")]
    InvalidContract {
        contract: &'static str,
        message: String,
    },
}

impl GenerationError {
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. })
    }
}
