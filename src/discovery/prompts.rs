use serde::Serialize;

use crate::{discovery::types::Hypothesis, provider::SubjectContext};

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

pub fn build_hypothesis_prompt(context: &SubjectContext, prefer_segments: bool) -> String {
    let segment_rule = if prefer_segments {
        concat!(
            "This prescriber's patients fall into several distinguishable sub-populations.\n",
            "Prefer hypotheses scoped to one sub-population over prescriber-wide ones, and set ",
            "`segment` to that sub-population's segment_id. Do not merge causally distinct groups ",
            "into one explanation.\n"
        )
    } else {
        "Set `segment` only when a hypothesis clearly applies to a single sub-population.\n"
    };

    format!(
        concat!(
            "You are a causal analyst. Propose between 3 and 5 mutually distinguishable ",
            "hypotheses explaining the prescriber's recent behaviour.\n",
            "Each hypothesis needs an ordered causal chain, the observable patterns it predicts, ",
            "the data sources that would confirm it, and an initial confidence from 0 to 100.\n",
            "No two hypotheses may share a title.\n",
            "{}\n",
            "<prescriber-profile>\n{}\n</prescriber-profile>\n\n",
            "<activity>\n{}\n</activity>\n\n",
            "<sub-populations>\n{}\n</sub-populations>\n\n",
            "<events>\n{}\n</events>"
        ),
        segment_rule,
        pretty(&context.profile),
        pretty(&context.activity),
        pretty(&context.sub_populations),
        pretty(&context.events)
    )
}

pub fn build_evidence_prompt(hypothesis: &Hypothesis, context: &SubjectContext) -> String {
    format!(
        concat!(
            "You are an evidence gatherer evaluating exactly one causal hypothesis.\n",
            "List between 6 and 10 discrete evidence items. Mix items drawn from the prescriber ",
            "records below (source_kind `internal`) with external reference-style sources such as ",
            "literature, guidelines or market reports (source_kind `external`).\n",
            "Tag each item as supporting or refuting and give its strength (weak, moderate, strong).\n",
            "Finish with one final confidence from 0 to 100 and a verdict: proven, likely, possible, ",
            "unlikely or disproven.\n\n",
            "<hypothesis>\n{}\n</hypothesis>\n\n",
            "<prescriber-profile>\n{}\n</prescriber-profile>\n\n",
            "<activity>\n{}\n</activity>\n\n",
            "<sub-populations>\n{}\n</sub-populations>\n\n",
            "<events>\n{}\n</events>"
        ),
        pretty(hypothesis),
        pretty(&context.profile),
        pretty(&context.activity),
        pretty(&context.sub_populations),
        pretty(&context.events)
    )
}
