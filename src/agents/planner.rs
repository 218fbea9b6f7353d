use serde_json::json;

use crate::{
    agents::{
        AgentContext, AgentError, accepted_findings, prompts::build_planner_prompt,
        types::{PlanOutcome, PlanOutput},
    },
    generation::{GenerationRequest, STAGE_PLANNER},
    orchestrator::IterationSnapshot,
    session::SessionRecorder,
    store::{AgentType, ThoughtKind},
};

pub async fn plan(
    ctx: &AgentContext,
    recorder: &SessionRecorder,
    subject_id: &str,
    goal: &str,
    snapshot: &IterationSnapshot,
) -> Result<PlanOutcome, AgentError> {
    let profile = ctx
        .provider
        .profile(subject_id)
        .await?
        .ok_or_else(|| AgentError::SubjectNotFound(subject_id.to_string()))?;
    let findings = accepted_findings(recorder, subject_id).await?;

    let prompt = build_planner_prompt(goal, &profile, &findings, snapshot);
    let output: PlanOutput = ctx
        .generation
        .generate(
            GenerationRequest::new(STAGE_PLANNER, prompt, ctx.budgets.planner)
                .for_session(recorder.session_id()),
        )
        .await?;

    recorder
        .record_thought(
            AgentType::Planner,
            ThoughtKind::Reasoning,
            output.rationale.clone(),
            Some(json!({
                "iteration": snapshot.iteration(),
                "goals": output.goals,
                "strategy": output.strategy,
                "required_data": output.required_data,
                "success_criteria": output.success_criteria,
                "findings_basis": findings.basis,
            })),
        )
        .await?;

    Ok(PlanOutcome {
        output,
        profile,
        findings,
    })
}
