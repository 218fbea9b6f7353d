use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    discovery::types::AcceptedFindings,
    generation::OutputContract,
    provider::{SubjectContext, SubjectProfile},
    store::{Feedback, RecommendationRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Meeting,
    Email,
    Call,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct PlanOutput {
    pub rationale: String,
    #[validate(length(min = 1))]
    pub goals: Vec<String>,
    pub strategy: String,
    #[serde(default)]
    pub required_data: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

impl OutputContract for PlanOutput {
    const NAME: &'static str = "plan";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct EvidenceOutput {
    pub rationale: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Informal hypotheses, distinct from the scored ones produced by discovery.
    #[serde(default)]
    pub hypotheses: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
}

impl EvidenceOutput {
    pub fn is_substantive(&self) -> bool {
        !self.key_findings.is_empty() && !self.hypotheses.is_empty()
    }
}

impl OutputContract for EvidenceOutput {
    const NAME: &'static str = "evidence";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct RecommendationOutput {
    pub rationale: String,
    #[validate(length(min = 1))]
    pub action: String,
    pub category: ActionCategory,
    pub priority: Priority,
    pub business_reason: String,
    pub narrative_insight: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub confidence: f64,
    pub expected_outcome: String,
    pub timeframe: String,
}

impl OutputContract for RecommendationOutput {
    const NAME: &'static str = "recommendation";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ReflectionOutput {
    pub rationale: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub confidence: f64,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub lessons_learned: Vec<String>,
    pub overall_assessment: String,
}

impl OutputContract for ReflectionOutput {
    const NAME: &'static str = "reflection";
}

/// Planner result plus the inputs it read.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub output: PlanOutput,
    pub profile: SubjectProfile,
    pub findings: AcceptedFindings,
}

/// Evidence Analyst result plus the full subject context it assembled, so the
/// later phases of the same iteration never re-query the provider.
#[derive(Debug, Clone)]
pub struct EvidenceOutcome {
    pub output: EvidenceOutput,
    pub context: SubjectContext,
    pub findings: AcceptedFindings,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub output: RecommendationOutput,
    pub record: RecommendationRecord,
}

#[derive(Debug, Clone)]
pub struct ReflectionOutcome {
    pub output: ReflectionOutput,
    pub feedback: Feedback,
}
