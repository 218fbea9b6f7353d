use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    agents::types::{EvidenceOutput, PlanOutput},
    config::{MAX_ITERATIONS_CAP, OrchestratorConfig},
    store::Feedback,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    EvidenceGathering,
    ReadinessCheck,
    Synthesizing,
    Reflecting,
    TerminationCheck,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::EvidenceGathering => "evidence_gathering",
            Self::ReadinessCheck => "readiness_check",
            Self::Synthesizing => "synthesizing",
            Self::Reflecting => "reflecting",
            Self::TerminationCheck => "termination_check",
        }
    }
}

/// Loop thresholds, resolved once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopPolicy {
    pub max_iterations: u32,
    pub readiness_forced_iteration: u32,
    pub success_confidence: f64,
    pub phase_timeout: Option<Duration>,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

impl LoopPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            max_iterations: config.max_iterations.clamp(1, MAX_ITERATIONS_CAP),
            readiness_forced_iteration: config.readiness_forced_iteration.max(1),
            success_confidence: config.success_confidence.clamp(0.0, 100.0),
            phase_timeout: (config.phase_timeout_ms > 0)
                .then(|| Duration::from_millis(config.phase_timeout_ms)),
        }
    }

    /// Synthesis needs both findings and informal hypotheses, unless the loop
    /// has already spun long enough to force it.
    pub fn is_ready(&self, iteration: u32, evidence: &EvidenceOutput) -> bool {
        evidence.is_substantive() || iteration >= self.readiness_forced_iteration
    }

    pub fn should_terminate(&self, iteration: u32, reflection_confidence: f64) -> bool {
        reflection_confidence >= self.success_confidence
            || iteration >= self.max_iterations.saturating_sub(1)
    }
}

/// Input to one loop turn. Built fresh each iteration; never mutated.
#[derive(Debug, Clone, Default)]
pub struct IterationSnapshot {
    iteration: u32,
    previous_plan: Option<Arc<PlanOutput>>,
    previous_evidence: Option<Arc<EvidenceOutput>>,
    prior_critique: Option<Arc<Feedback>>,
}

impl IterationSnapshot {
    pub fn first() -> Self {
        Self {
            iteration: 1,
            ..Self::default()
        }
    }

    /// Carries the latest plan and evidence forward. The critique is replaced
    /// only when this turn produced one.
    pub fn advance(
        &self,
        plan: PlanOutput,
        evidence: EvidenceOutput,
        critique: Option<Feedback>,
    ) -> Self {
        Self {
            iteration: self.iteration + 1,
            previous_plan: Some(Arc::new(plan)),
            previous_evidence: Some(Arc::new(evidence)),
            prior_critique: critique.map(Arc::new).or_else(|| self.prior_critique.clone()),
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn previous_plan(&self) -> Option<&PlanOutput> {
        self.previous_plan.as_deref()
    }

    pub fn previous_evidence(&self) -> Option<&EvidenceOutput> {
        self.previous_evidence.as_deref()
    }

    pub fn prior_critique(&self) -> Option<&Feedback> {
        self.prior_critique.as_deref()
    }
}
