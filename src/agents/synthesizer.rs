use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    agents::{
        AgentContext, AgentError, prompts::build_synthesizer_prompt,
        types::{EvidenceOutcome, PlanOutcome, RecommendationOutput, SynthesisOutcome},
    },
    generation::{GenerationRequest, STAGE_SYNTHESIZER},
    session::SessionRecorder,
    store::{AgentType, RecommendationRecord, ThoughtKind},
};

pub async fn synthesize(
    ctx: &AgentContext,
    recorder: &SessionRecorder,
    plan: &PlanOutcome,
    evidence: &EvidenceOutcome,
    iteration: u32,
) -> Result<SynthesisOutcome, AgentError> {
    let prompt = build_synthesizer_prompt(
        &plan.output,
        &evidence.output,
        &evidence.context,
        &evidence.findings,
    );
    let output: RecommendationOutput = ctx
        .generation
        .generate(
            GenerationRequest::new(STAGE_SYNTHESIZER, prompt, ctx.budgets.synthesizer)
                .for_session(recorder.session_id()),
        )
        .await?;

    recorder
        .record_thought(
            AgentType::Synthesizer,
            ThoughtKind::Reasoning,
            output.rationale.clone(),
            Some(json!({
                "iteration": iteration,
                "action": output.action,
                "category": output.category,
                "priority": output.priority,
                "confidence": output.confidence,
            })),
        )
        .await?;

    let record = RecommendationRecord {
        id: Uuid::now_v7().to_string(),
        session_id: recorder.session_id().to_string(),
        subject_id: evidence.context.subject_id().to_string(),
        iteration,
        action: output.action.clone(),
        category: output.category,
        priority: output.priority,
        business_reason: output.business_reason.clone(),
        narrative_insight: output.narrative_insight.clone(),
        confidence: output.confidence,
        expected_outcome: output.expected_outcome.clone(),
        timeframe: output.timeframe.clone(),
        created_at: OffsetDateTime::now_utc(),
    };
    recorder.store().save_recommendation(record.clone()).await?;
    recorder
        .record_action(
            AgentType::Synthesizer,
            "create_recommendation",
            output.action.clone(),
            json!({
                "category": record.category,
                "priority": record.priority,
                "timeframe": record.timeframe,
            }),
            Some(json!({ "recommendation_id": record.id })),
            true,
        )
        .await?;

    tracing::info!(
        target: "agents",
        session_id = recorder.session_id(),
        recommendation_id = %record.id,
        iteration = iteration,
        confidence = record.confidence,
        "recommendation_created"
    );

    Ok(SynthesisOutcome { output, record })
}
