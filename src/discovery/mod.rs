pub mod confirmation;
pub mod engine;
pub mod evidence;
pub mod generator;
pub mod prompts;
pub mod ranking;
pub mod types;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::DiscoveryConfig,
    generation::{GenerationError, StructuredGenerationClient},
    provider::{DataProvider, ProviderError, SubjectId},
    store::StoreError,
};

pub use confirmation::{ConfirmationRejected, validate_confirmation};
pub use engine::CausalDiscoveryEngine;
pub use ranking::rank;
pub use types::{
    AcceptedFindings, Confirmation, EvidenceScore, FindingsBasis, Hypothesis, InvestigationRecord,
    InvestigationSummary, RankedHypothesis, Ranking, Verdict,
};

#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("data provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("session store failed: {0}")]
    Store(#[from] StoreError),
    #[error("subject {0} not found")]
    SubjectNotFound(SubjectId),
    #[error("hypotheses are not distinguishable: duplicate title '{0}'")]
    IndistinguishableHypotheses(String),
    #[error("evaluation of {hypothesis_id} timed out after {timeout_ms} ms")]
    EvaluationTimeout {
        hypothesis_id: String,
        timeout_ms: u64,
    },
    #[error("evidence unavailable for all hypotheses")]
    EvidenceUnavailable,
    #[error("cancelled")]
    Cancelled,
}

/// Collaborators for one investigation.
#[derive(Clone)]
pub struct DiscoveryContext {
    pub generation: StructuredGenerationClient,
    pub provider: Arc<dyn DataProvider>,
    pub config: DiscoveryConfig,
}

impl DiscoveryContext {
    pub fn new(
        generation: StructuredGenerationClient,
        provider: Arc<dyn DataProvider>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            generation,
            provider,
            config,
        }
    }
}
