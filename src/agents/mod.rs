pub mod analyst;
pub mod planner;
pub mod prompts;
pub mod reflector;
pub mod synthesizer;
pub mod types;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::PhaseTokenBudgets,
    discovery::types::AcceptedFindings,
    generation::{GenerationError, StructuredGenerationClient},
    provider::{DataProvider, ProviderError, SubjectId},
    store::StoreError,
};

pub use types::{
    ActionCategory, EvidenceOutcome, EvidenceOutput, PlanOutcome, PlanOutput, Priority,
    RecommendationOutput, ReflectionOutcome, ReflectionOutput, SynthesisOutcome,
};

#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("data provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("session store failed: {0}")]
    Store(#[from] StoreError),
    #[error("subject {0} not found")]
    SubjectNotFound(SubjectId),
}

/// Collaborators shared by every phase agent of one run.
#[derive(Clone)]
pub struct AgentContext {
    pub generation: StructuredGenerationClient,
    pub provider: Arc<dyn DataProvider>,
    pub budgets: PhaseTokenBudgets,
}

impl AgentContext {
    pub fn new(
        generation: StructuredGenerationClient,
        provider: Arc<dyn DataProvider>,
        budgets: PhaseTokenBudgets,
    ) -> Self {
        Self {
            generation,
            provider,
            budgets,
        }
    }
}

/// Latest investigation findings for the subject; confirmed ones win.
pub(crate) async fn accepted_findings(
    recorder: &crate::session::SessionRecorder,
    subject_id: &str,
) -> Result<AcceptedFindings, StoreError> {
    let latest = recorder.store().latest_investigation(subject_id).await?;
    Ok(AcceptedFindings::from_record(latest.as_ref()))
}
