use std::collections::HashSet;

use serde_json::json;

use crate::{
    discovery::{
        DiscoveryContext, DiscoveryError,
        prompts::build_hypothesis_prompt,
        types::{Hypothesis, HypothesisSet},
    },
    generation::{GenerationRequest, STAGE_HYPOTHESIS_GENERATOR},
    provider::SubjectContext,
    session::SessionRecorder,
    store::{AgentType, ThoughtKind},
};

/// Stage 1: one call, 3 to 5 hypotheses with ids `H1..Hn` in generation order.
pub async fn generate_hypotheses(
    ctx: &DiscoveryContext,
    recorder: &SessionRecorder,
    context: &SubjectContext,
) -> Result<Vec<Hypothesis>, DiscoveryError> {
    let prefer_segments = context.has_distinct_sub_populations();
    let prompt = build_hypothesis_prompt(context, prefer_segments);
    let set: HypothesisSet = ctx
        .generation
        .generate(
            GenerationRequest::new(
                STAGE_HYPOTHESIS_GENERATOR,
                prompt,
                ctx.config.hypothesis_max_tokens,
            )
            .for_session(recorder.session_id()),
        )
        .await?;

    let hypotheses: Vec<Hypothesis> = set
        .hypotheses
        .into_iter()
        .enumerate()
        .map(|(index, generated)| Hypothesis::from_generated(index, generated))
        .collect();
    ensure_distinguishable(&hypotheses)?;

    recorder
        .record_thought(
            AgentType::HypothesisGenerator,
            ThoughtKind::Reasoning,
            format!(
                "Proposed {} candidate explanations: {}",
                hypotheses.len(),
                hypotheses
                    .iter()
                    .map(|hypothesis| format!("{} {}", hypothesis.id, hypothesis.title))
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            Some(json!({
                "hypothesis_ids": hypotheses.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(),
                "segment_biased": prefer_segments,
                "segment_scoped": hypotheses.iter().filter(|h| h.segment.is_some()).count(),
            })),
        )
        .await?;

    Ok(hypotheses)
}

fn ensure_distinguishable(hypotheses: &[Hypothesis]) -> Result<(), DiscoveryError> {
    let mut seen = HashSet::new();
    for hypothesis in hypotheses {
        if !seen.insert(hypothesis.title.to_lowercase()) {
            return Err(DiscoveryError::IndistinguishableHypotheses(
                hypothesis.title.clone(),
            ));
        }
    }
    Ok(())
}
