use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::{generation::OutputContract, provider::SubjectId, store::SessionId};

pub type HypothesisId = String;

pub const PROVEN_MIN_CONFIDENCE: f64 = 70.0;
pub const RULED_OUT_BELOW_CONFIDENCE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Proven,
    Likely,
    Possible,
    Unlikely,
    Disproven,
}

impl Verdict {
    pub fn is_affirmative(self) -> bool {
        matches!(self, Self::Proven | Self::Likely)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Derived from the subject's own activity, segment or event records.
    Internal,
    /// Model-authored reference-style citation, never independently verified.
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GeneratedHypothesis {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: String,
    #[validate(length(min = 1))]
    pub causal_chain: Vec<String>,
    #[serde(default)]
    pub predicted_patterns: Vec<String>,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub initial_confidence: f64,
    /// Segment id when the hypothesis is scoped to one sub-population.
    #[serde(default)]
    pub segment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct HypothesisSet {
    #[validate(length(min = 3, max = 5), nested)]
    pub hypotheses: Vec<GeneratedHypothesis>,
}

impl OutputContract for HypothesisSet {
    const NAME: &'static str = "hypothesis_set";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,
    pub title: String,
    pub description: String,
    pub causal_chain: Vec<String>,
    pub predicted_patterns: Vec<String>,
    pub data_sources: Vec<String>,
    pub initial_confidence: f64,
    #[serde(default)]
    pub segment: Option<String>,
}

impl Hypothesis {
    pub fn from_generated(index: usize, generated: GeneratedHypothesis) -> Self {
        Self {
            id: format!("H{}", index + 1),
            title: generated.title.trim().to_string(),
            description: generated.description,
            causal_chain: generated.causal_chain,
            predicted_patterns: generated.predicted_patterns,
            data_sources: generated.data_sources,
            initial_confidence: generated.initial_confidence,
            segment: generated.segment.filter(|segment| !segment.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct EvidenceItem {
    #[validate(length(min = 1))]
    pub source: String,
    pub source_kind: SourceKind,
    #[validate(length(min = 1))]
    pub finding: String,
    pub supports: bool,
    pub strength: Strength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct EvidenceAssessment {
    #[validate(length(min = 6, max = 10), nested)]
    pub evidence: Vec<EvidenceItem>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub final_confidence: f64,
    pub verdict: Verdict,
    pub reasoning: String,
}

impl OutputContract for EvidenceAssessment {
    const NAME: &'static str = "evidence_assessment";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceScore {
    pub hypothesis_id: HypothesisId,
    pub evidence: Vec<EvidenceItem>,
    pub final_confidence: f64,
    pub verdict: Verdict,
    pub reasoning: String,
}

impl EvidenceScore {
    pub fn from_assessment(hypothesis_id: &str, assessment: EvidenceAssessment) -> Self {
        Self {
            hypothesis_id: hypothesis_id.to_string(),
            evidence: assessment.evidence,
            final_confidence: assessment.final_confidence.clamp(0.0, 100.0),
            verdict: assessment.verdict,
            reasoning: assessment.reasoning,
        }
    }

    pub fn external_item_count(&self) -> usize {
        self.evidence
            .iter()
            .filter(|item| item.source_kind == SourceKind::External)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHypothesis {
    pub hypothesis: Hypothesis,
    pub score: EvidenceScore,
}

impl RankedHypothesis {
    pub fn id(&self) -> &str {
        &self.hypothesis.id
    }

    pub fn confidence(&self) -> f64 {
        self.score.final_confidence
    }

    pub fn is_proven(&self) -> bool {
        self.confidence() >= PROVEN_MIN_CONFIDENCE && self.score.verdict.is_affirmative()
    }

    pub fn is_ruled_out(&self) -> bool {
        self.confidence() < RULED_OUT_BELOW_CONFIDENCE
    }
}

/// A hypothesis whose evidence evaluation failed. Never ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableHypothesis {
    pub hypothesis: Hypothesis,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub ranked: Vec<RankedHypothesis>,
    pub proven: Vec<RankedHypothesis>,
    pub ruled_out: Vec<RankedHypothesis>,
    pub under_review: Vec<RankedHypothesis>,
}

impl Ranking {
    pub fn headline(&self) -> Option<&RankedHypothesis> {
        self.proven.first()
    }

    pub fn find_proven(&self, hypothesis_id: &str) -> Option<&RankedHypothesis> {
        self.proven
            .iter()
            .find(|ranked| ranked.id() == hypothesis_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub session_id: SessionId,
    pub hypothesis_ids: Vec<HypothesisId>,
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub confirmed_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationRecord {
    pub session_id: SessionId,
    pub subject_id: SubjectId,
    pub hypotheses: Vec<Hypothesis>,
    pub ranking: Ranking,
    #[serde(default)]
    pub unavailable: Vec<UnavailableHypothesis>,
    #[serde(default)]
    pub headline: Option<HypothesisId>,
    #[serde(default)]
    pub external_evidence_items: usize,
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl InvestigationRecord {
    pub fn is_confirmed(&self) -> bool {
        self.confirmation.is_some()
    }

    pub fn confirmed(&self) -> Vec<RankedHypothesis> {
        let Some(confirmation) = &self.confirmation else {
            return Vec::new();
        };
        confirmation
            .hypothesis_ids
            .iter()
            .filter_map(|id| self.ranking.find_proven(id).cloned())
            .collect()
    }

    /// Confidence reported on the owning session when the investigation completes.
    pub fn session_confidence(&self) -> f64 {
        self.ranking
            .headline()
            .or_else(|| self.ranking.ranked.first())
            .map(RankedHypothesis::confidence)
            .unwrap_or(0.0)
    }
}

/// Which hypotheses downstream recommendation phases should build on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingsBasis {
    HumanConfirmed,
    MachineProven,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedFindings {
    pub basis: FindingsBasis,
    pub hypotheses: Vec<RankedHypothesis>,
}

impl AcceptedFindings {
    pub fn none() -> Self {
        Self {
            basis: FindingsBasis::None,
            hypotheses: Vec::new(),
        }
    }

    /// Confirmed hypotheses win over merely proven ones.
    pub fn from_record(record: Option<&InvestigationRecord>) -> Self {
        let Some(record) = record else {
            return Self::none();
        };
        let confirmed = record.confirmed();
        if !confirmed.is_empty() {
            return Self {
                basis: FindingsBasis::HumanConfirmed,
                hypotheses: confirmed,
            };
        }
        if record.ranking.proven.is_empty() {
            return Self::none();
        }
        Self {
            basis: FindingsBasis::MachineProven,
            hypotheses: record.ranking.proven.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationSummary {
    pub session_id: SessionId,
    pub proven: Vec<RankedHypothesis>,
    pub all_ranked: Vec<RankedHypothesis>,
    pub confirmed: Vec<RankedHypothesis>,
    pub is_confirmed: bool,
    pub unavailable: Vec<UnavailableHypothesis>,
}

impl From<&InvestigationRecord> for InvestigationSummary {
    fn from(record: &InvestigationRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            proven: record.ranking.proven.clone(),
            all_ranked: record.ranking.ranked.clone(),
            confirmed: record.confirmed(),
            is_confirmed: record.is_confirmed(),
            unavailable: record.unavailable.clone(),
        }
    }
}
