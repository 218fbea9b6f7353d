pub mod controller;
pub mod state;

use thiserror::Error;

use crate::{agents::AgentError, store::StoreError};

pub use controller::{IterationController, LoopOutcome};
pub use state::{IterationSnapshot, LoopPolicy, Phase};

#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("session store failed: {0}")]
    Store(#[from] StoreError),
    #[error("phase {phase} timed out after {timeout_ms} ms")]
    PhaseTimeout {
        phase: &'static str,
        timeout_ms: u64,
    },
    #[error("cancelled")]
    Cancelled,
    #[error("no result produced within {max_iterations} iterations")]
    IterationBoundExceeded { max_iterations: u32 },
}
