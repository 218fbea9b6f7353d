pub mod client;
pub mod contract;
pub mod decode;
pub mod error;

pub use client::{GenerationRequest, StructuredGenerationClient};
pub use contract::OutputContract;
pub use error::GenerationError;

pub const STAGE_PLANNER: &str = "planner";
pub const STAGE_EVIDENCE_ANALYST: &str = "evidence_analyst";
pub const STAGE_SYNTHESIZER: &str = "synthesizer";
pub const STAGE_REFLECTOR: &str = "reflector";
pub const STAGE_HYPOTHESIS_GENERATOR: &str = "hypothesis_generator";
pub const STAGE_EVIDENCE_GATHERER: &str = "evidence_gatherer";
