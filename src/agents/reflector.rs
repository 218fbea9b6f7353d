use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    agents::{
        AgentContext, AgentError, prompts::build_reflector_prompt,
        types::{EvidenceOutcome, PlanOutcome, ReflectionOutcome, ReflectionOutput, SynthesisOutcome},
    },
    generation::{GenerationRequest, STAGE_REFLECTOR},
    session::SessionRecorder,
    store::{AgentType, Feedback, ThoughtKind},
};

pub async fn reflect(
    ctx: &AgentContext,
    recorder: &SessionRecorder,
    plan: &PlanOutcome,
    evidence: &EvidenceOutcome,
    synthesis: &SynthesisOutcome,
    iteration: u32,
) -> Result<ReflectionOutcome, AgentError> {
    let prompt = build_reflector_prompt(&plan.output, &evidence.output, &synthesis.output);
    let output: ReflectionOutput = ctx
        .generation
        .generate(
            GenerationRequest::new(STAGE_REFLECTOR, prompt, ctx.budgets.reflector)
                .for_session(recorder.session_id()),
        )
        .await?;

    recorder
        .record_thought(
            AgentType::Reflector,
            ThoughtKind::Reasoning,
            output.rationale.clone(),
            Some(json!({
                "iteration": iteration,
                "confidence": output.confidence,
                "strengths": output.strengths,
                "weaknesses": output.weaknesses,
            })),
        )
        .await?;

    let feedback = Feedback {
        id: Uuid::now_v7().to_string(),
        session_id: recorder.session_id().to_string(),
        critique: output.overall_assessment.clone(),
        improvements: output.improvements.clone(),
        lessons_learned: output.lessons_learned.clone(),
        created_at: OffsetDateTime::now_utc(),
    };
    recorder.store().append_feedback(feedback.clone()).await?;

    Ok(ReflectionOutcome { output, feedback })
}
