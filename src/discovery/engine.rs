use serde_json::json;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::{
    discovery::{
        DiscoveryContext, DiscoveryError,
        evidence::gather_evidence,
        generator::generate_hypotheses,
        ranking::rank,
        types::{EvidenceScore, Hypothesis, InvestigationRecord, UnavailableHypothesis},
    },
    provider::{SubjectContext, load_subject_context},
    session::SessionRecorder,
    store::{AgentType, Session, StoreError, ThoughtKind},
};

pub const PHASE_LOADING_CONTEXT: &str = "loading_context";
pub const PHASE_HYPOTHESIS_GENERATION: &str = "hypothesis_generation";
pub const PHASE_EVIDENCE_GATHERING: &str = "evidence_gathering";
pub const PHASE_RANKING: &str = "ranking";

/// One investigation: generate → fan-out evidence → rank → persist.
///
/// The confirmation gate runs later, from the service, against the record
/// this produces.
pub struct CausalDiscoveryEngine {
    ctx: DiscoveryContext,
    recorder: SessionRecorder,
    cancel: CancellationToken,
    subject_id: String,
}

impl CausalDiscoveryEngine {
    pub fn new(
        ctx: DiscoveryContext,
        recorder: SessionRecorder,
        cancel: CancellationToken,
        session: &Session,
    ) -> Self {
        Self {
            ctx,
            recorder,
            cancel,
            subject_id: session.subject_id.clone(),
        }
    }

    /// Runs the investigation and records the terminal state on the session.
    pub async fn drive(self) -> Result<Session, StoreError> {
        match self.investigate().await {
            Ok(record) => {
                let headline = record
                    .headline
                    .as_deref()
                    .and_then(|id| record.ranking.find_proven(id));
                let outcome = match headline {
                    Some(headline) => format!(
                        "{} {} (confidence {:.0})",
                        headline.id(),
                        headline.hypothesis.title,
                        headline.confidence()
                    ),
                    None => "no hypothesis reached the proven threshold".to_string(),
                };
                self.recorder
                    .set_context(json!({
                        "headline": record.headline,
                        "proven": record.ranking.proven.len(),
                        "ruled_out": record.ranking.ruled_out.len(),
                        "under_review": record.ranking.under_review.len(),
                        "unavailable": record.unavailable.len(),
                        "external_evidence_items": record.external_evidence_items,
                    }))
                    .await?;
                self.recorder
                    .complete(record.session_confidence(), outcome)
                    .await
            }
            Err(err) => {
                tracing::warn!(
                    target: "discovery",
                    session_id = self.recorder.session_id(),
                    error = %err,
                    "investigation_failed"
                );
                self.recorder.fail(err.to_string()).await
            }
        }
    }

    pub async fn investigate(&self) -> Result<InvestigationRecord, DiscoveryError> {
        self.checkpoint(PHASE_LOADING_CONTEXT).await?;
        let context = self.load_context().await?;

        self.checkpoint(PHASE_HYPOTHESIS_GENERATION).await?;
        let hypotheses = generate_hypotheses(&self.ctx, &self.recorder, &context).await?;

        self.checkpoint(PHASE_EVIDENCE_GATHERING).await?;
        let evaluations =
            gather_evidence(&self.ctx, &self.recorder, &context, hypotheses.clone()).await;

        let mut scored: Vec<(Hypothesis, EvidenceScore)> = Vec::with_capacity(evaluations.len());
        let mut unavailable = Vec::new();
        for (hypothesis, outcome) in evaluations {
            match outcome {
                Ok(score) => scored.push((hypothesis, score)),
                Err(err) => {
                    self.recorder
                        .record_thought(
                            AgentType::EvidenceGatherer,
                            ThoughtKind::Observation,
                            format!("Evidence unavailable for {}: {err}", hypothesis.id),
                            Some(json!({
                                "hypothesis_id": hypothesis.id,
                                "evidence_unavailable": true,
                            })),
                        )
                        .await?;
                    unavailable.push(UnavailableHypothesis {
                        hypothesis,
                        reason: err.to_string(),
                    });
                }
            }
        }
        if scored.is_empty() {
            return Err(DiscoveryError::EvidenceUnavailable);
        }

        self.checkpoint(PHASE_RANKING).await?;
        let external_evidence_items = scored
            .iter()
            .map(|(_, score)| score.external_item_count())
            .sum();
        let ranking = rank(scored);
        let headline = ranking.headline().map(|entry| entry.id().to_string());

        self.recorder
            .record_thought(
                AgentType::Ranker,
                ThoughtKind::Observation,
                format!(
                    "{} proven, {} under review, {} ruled out, {} without evidence",
                    ranking.proven.len(),
                    ranking.under_review.len(),
                    ranking.ruled_out.len(),
                    unavailable.len()
                ),
                Some(json!({
                    "headline": headline,
                    "order": ranking.ranked.iter().map(|entry| entry.id()).collect::<Vec<_>>(),
                })),
            )
            .await?;

        let record = InvestigationRecord {
            session_id: self.recorder.session_id().to_string(),
            subject_id: self.subject_id.clone(),
            hypotheses,
            ranking,
            unavailable,
            headline,
            external_evidence_items,
            confirmation: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.recorder
            .store()
            .save_investigation(record.clone())
            .await?;

        tracing::info!(
            target: "discovery",
            session_id = self.recorder.session_id(),
            subject_id = %self.subject_id,
            proven = record.ranking.proven.len(),
            unavailable = record.unavailable.len(),
            headline = ?record.headline,
            "investigation_recorded"
        );
        Ok(record)
    }

    async fn load_context(&self) -> Result<SubjectContext, DiscoveryError> {
        let context = load_subject_context(self.ctx.provider.as_ref(), &self.subject_id)
            .await?
            .ok_or_else(|| DiscoveryError::SubjectNotFound(self.subject_id.clone()))?;
        self.recorder
            .record_action(
                AgentType::HypothesisGenerator,
                "data_query",
                format!("read subject context for {}", self.subject_id),
                json!({ "accessor": "subject_context", "subject_id": self.subject_id }),
                Some(json!({
                    "activity": context.activity.len(),
                    "sub_populations": context.sub_populations.len(),
                    "events": context.events.len(),
                })),
                true,
            )
            .await?;
        Ok(context)
    }

    async fn checkpoint(&self, phase: &str) -> Result<(), DiscoveryError> {
        if self.cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        self.recorder.enter_phase(phase, None).await?;
        Ok(())
    }
}
