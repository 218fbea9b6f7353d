use serde::Serialize;

use crate::{
    agents::types::{EvidenceOutput, PlanOutput, RecommendationOutput},
    discovery::types::{AcceptedFindings, FindingsBasis},
    orchestrator::IterationSnapshot,
    provider::{SubjectContext, SubjectProfile},
};

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders investigation findings for embedding. Human-confirmed findings are
/// labelled as such so the model weighs them above machine-proven ones.
pub fn render_findings(findings: &AcceptedFindings) -> String {
    let heading = match findings.basis {
        FindingsBasis::HumanConfirmed => "confirmed by the field team",
        FindingsBasis::MachineProven => "machine-proven, not yet confirmed by a human",
        FindingsBasis::None => return "No causal investigation findings are available.".to_string(),
    };
    let lines: Vec<String> = findings
        .hypotheses
        .iter()
        .map(|ranked| {
            format!(
                "- [{}] {} (confidence {:.0}, verdict {:?}): {}",
                ranked.id(),
                ranked.hypothesis.title,
                ranked.confidence(),
                ranked.score.verdict,
                ranked.hypothesis.description
            )
        })
        .collect();
    format!("Causal findings ({heading}):\n{}", lines.join("\n"))
}

pub fn build_planner_prompt(
    goal: &str,
    profile: &SubjectProfile,
    findings: &AcceptedFindings,
    snapshot: &IterationSnapshot,
) -> String {
    let previous_plan = snapshot
        .previous_plan()
        .map(pretty)
        .unwrap_or_else(|| "(first iteration)".to_string());
    let prior_critique = snapshot
        .prior_critique()
        .map(|feedback| {
            format!(
                "{}\nImprovements:\n{}",
                feedback.critique,
                bullet_list(&feedback.improvements)
            )
        })
        .unwrap_or_else(|| "(none)".to_string());
    let previous_evidence = snapshot
        .previous_evidence()
        .map(|evidence| {
            format!(
                "Key findings:\n{}\nOpen hypotheses:\n{}",
                bullet_list(&evidence.key_findings),
                bullet_list(&evidence.hypotheses)
            )
        })
        .unwrap_or_else(|| "(first iteration)".to_string());

    format!(
        concat!(
            "You are the planning phase of a field-team recommendation loop.\n",
            "Decide what this iteration should investigate about the prescriber and how.\n\n",
            "<goal>\n{}\n</goal>\n\n",
            "<iteration>{}</iteration>\n\n",
            "<prescriber-profile>\n{}\n</prescriber-profile>\n\n",
            "<investigation-findings>\n{}\n</investigation-findings>\n\n",
            "<previous-plan>\n{}\n</previous-plan>\n\n",
            "<previous-evidence>\n{}\n</previous-evidence>\n\n",
            "<prior-critique>\n{}\n</prior-critique>"
        ),
        goal,
        snapshot.iteration(),
        pretty(profile),
        render_findings(findings),
        previous_plan,
        previous_evidence,
        prior_critique
    )
}

pub fn build_analyst_prompt(
    plan: &PlanOutput,
    context: &SubjectContext,
    findings: &AcceptedFindings,
) -> String {
    format!(
        concat!(
            "You are the evidence analysis phase. Study the prescriber data below against the plan.\n",
            "List concrete key findings and informal hypotheses that explain them.\n",
            "Return empty lists when the data does not support any finding.\n\n",
            "<plan>\n{}\n</plan>\n\n",
            "<activity>\n{}\n</activity>\n\n",
            "<sub-populations>\n{}\n</sub-populations>\n\n",
            "<events>\n{}\n</events>\n\n",
            "<investigation-findings>\n{}\n</investigation-findings>"
        ),
        pretty(plan),
        pretty(&context.activity),
        pretty(&context.sub_populations),
        pretty(&context.events),
        render_findings(findings)
    )
}

pub fn build_synthesizer_prompt(
    plan: &PlanOutput,
    evidence: &EvidenceOutput,
    context: &SubjectContext,
    findings: &AcceptedFindings,
) -> String {
    format!(
        concat!(
            "You are the synthesis phase. Recommend exactly one next action for the field rep.\n",
            "category is one of meeting, email, call, event. priority is High, Medium or Low.\n",
            "confidence is 0 to 100.\n\n",
            "<prescriber-profile>\n{}\n</prescriber-profile>\n\n",
            "<plan>\n{}\n</plan>\n\n",
            "<evidence>\n{}\n</evidence>\n\n",
            "<investigation-findings>\n{}\n</investigation-findings>"
        ),
        pretty(&context.profile),
        pretty(plan),
        pretty(evidence),
        render_findings(findings)
    )
}

pub fn build_reflector_prompt(
    plan: &PlanOutput,
    evidence: &EvidenceOutput,
    recommendation: &RecommendationOutput,
) -> String {
    format!(
        concat!(
            "You are the reflection phase. Critique the recommendation below honestly.\n",
            "confidence is how sure you are, 0 to 100, that it is the right next action.\n\n",
            "<plan>\n{}\n</plan>\n\n",
            "<evidence>\n{}\n</evidence>\n\n",
            "<recommendation>\n{}\n</recommendation>"
        ),
        pretty(plan),
        pretty(evidence),
        pretty(recommendation)
    )
}
