use std::future::Future;

use serde_json::json;

use crate::{
    agents::{
        AgentContext, AgentError, prompts::build_analyst_prompt,
        types::{EvidenceOutcome, EvidenceOutput, PlanOutcome},
    },
    generation::{GenerationRequest, STAGE_EVIDENCE_ANALYST},
    provider::{ProviderError, SubjectContext},
    session::SessionRecorder,
    store::{AgentType, ThoughtKind},
};

const DATA_QUERY: &str = "data_query";

/// Runs one provider accessor and logs it as a `data_query` action, whether
/// or not it succeeds.
async fn query<T, F>(
    recorder: &SessionRecorder,
    subject_id: &str,
    accessor: &str,
    fetch: F,
) -> Result<Vec<T>, AgentError>
where
    F: Future<Output = Result<Vec<T>, ProviderError>>,
{
    let params = json!({ "accessor": accessor, "subject_id": subject_id });
    match fetch.await {
        Ok(rows) => {
            recorder
                .record_action(
                    AgentType::EvidenceAnalyst,
                    DATA_QUERY,
                    format!("read {accessor} for {subject_id}"),
                    params,
                    Some(json!({ "rows": rows.len() })),
                    true,
                )
                .await?;
            Ok(rows)
        }
        Err(err) => {
            recorder
                .record_action(
                    AgentType::EvidenceAnalyst,
                    DATA_QUERY,
                    format!("read {accessor} for {subject_id}"),
                    params,
                    Some(json!({ "error": err.to_string() })),
                    false,
                )
                .await?;
            Err(err.into())
        }
    }
}

pub async fn analyze(
    ctx: &AgentContext,
    recorder: &SessionRecorder,
    plan: &PlanOutcome,
    iteration: u32,
) -> Result<EvidenceOutcome, AgentError> {
    let subject_id = plan.profile.subject_id.as_str();
    let activity = query(
        recorder,
        subject_id,
        "activity",
        ctx.provider.activity(subject_id),
    )
    .await?;
    let sub_populations = query(
        recorder,
        subject_id,
        "sub_populations",
        ctx.provider.sub_populations(subject_id),
    )
    .await?;
    let events = query(recorder, subject_id, "events", ctx.provider.events(subject_id)).await?;

    let context = SubjectContext {
        profile: plan.profile.clone(),
        activity,
        sub_populations,
        events,
    };

    let prompt = build_analyst_prompt(&plan.output, &context, &plan.findings);
    let output: EvidenceOutput = ctx
        .generation
        .generate(
            GenerationRequest::new(
                STAGE_EVIDENCE_ANALYST,
                prompt,
                ctx.budgets.evidence_analyst,
            )
            .for_session(recorder.session_id()),
        )
        .await?;

    recorder
        .record_thought(
            AgentType::EvidenceAnalyst,
            ThoughtKind::Reasoning,
            output.rationale.clone(),
            Some(json!({
                "iteration": iteration,
                "key_findings": output.key_findings,
                "hypotheses": output.hypotheses,
                "risk_factors": output.risk_factors,
                "opportunities": output.opportunities,
            })),
        )
        .await?;

    Ok(EvidenceOutcome {
        output,
        context,
        findings: plan.findings.clone(),
    })
}
