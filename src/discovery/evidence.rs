use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;

use crate::{
    discovery::{
        DiscoveryContext, DiscoveryError,
        prompts::build_evidence_prompt,
        types::{EvidenceAssessment, EvidenceScore, Hypothesis},
    },
    generation::{GenerationRequest, STAGE_EVIDENCE_GATHERER},
    provider::SubjectContext,
    session::SessionRecorder,
    store::{AgentType, ThoughtKind},
};

/// Settled result of one hypothesis evaluation.
pub type Evaluation = (Hypothesis, Result<EvidenceScore, DiscoveryError>);

/// Stage 2: evaluates every hypothesis concurrently and waits for all of them.
///
/// A failing evaluation never cancels its siblings; the returned list has one
/// entry per hypothesis, in input order.
pub async fn gather_evidence(
    ctx: &DiscoveryContext,
    recorder: &SessionRecorder,
    context: &SubjectContext,
    hypotheses: Vec<Hypothesis>,
) -> Vec<Evaluation> {
    let evaluations = hypotheses
        .iter()
        .map(|hypothesis| evaluate(ctx, recorder, context, hypothesis));
    let outcomes = join_all(evaluations).await;
    hypotheses.into_iter().zip(outcomes).collect()
}

async fn evaluate(
    ctx: &DiscoveryContext,
    recorder: &SessionRecorder,
    context: &SubjectContext,
    hypothesis: &Hypothesis,
) -> Result<EvidenceScore, DiscoveryError> {
    let prompt = build_evidence_prompt(hypothesis, context);
    let request = GenerationRequest::new(
        STAGE_EVIDENCE_GATHERER,
        prompt,
        ctx.config.evidence_max_tokens,
    )
    .for_session(recorder.session_id());

    let call = ctx.generation.generate::<EvidenceAssessment>(request);
    let assessment = match ctx.config.evaluation_timeout_ms {
        0 => call.await?,
        timeout_ms => tokio::time::timeout(Duration::from_millis(timeout_ms), call)
            .await
            .map_err(|_| DiscoveryError::EvaluationTimeout {
                hypothesis_id: hypothesis.id.clone(),
                timeout_ms,
            })??,
    };
    let score = EvidenceScore::from_assessment(&hypothesis.id, assessment);

    recorder
        .record_thought(
            AgentType::EvidenceGatherer,
            ThoughtKind::Reasoning,
            score.reasoning.clone(),
            Some(json!({
                "hypothesis_id": hypothesis.id,
                "verdict": score.verdict,
                "final_confidence": score.final_confidence,
                "evidence_items": score.evidence.len(),
                "supporting_items": score.evidence.iter().filter(|item| item.supports).count(),
                "external_items": score.external_item_count(),
            })),
        )
        .await?;

    tracing::debug!(
        target: "discovery",
        session_id = recorder.session_id(),
        hypothesis_id = %hypothesis.id,
        final_confidence = score.final_confidence,
        verdict = ?score.verdict,
        "hypothesis_evaluated"
    );
    Ok(score)
}
