use crate::discovery::types::{EvidenceScore, Hypothesis, RankedHypothesis, Ranking};

/// Sorts by final confidence, highest first, then partitions.
///
/// The sort is stable, so equal confidences keep generation order.
pub fn rank(scored: Vec<(Hypothesis, EvidenceScore)>) -> Ranking {
    let mut ranked: Vec<RankedHypothesis> = scored
        .into_iter()
        .map(|(hypothesis, score)| RankedHypothesis { hypothesis, score })
        .collect();
    ranked.sort_by(|left, right| right.confidence().total_cmp(&left.confidence()));

    let mut ranking = Ranking {
        ranked: ranked.clone(),
        ..Ranking::default()
    };
    for entry in ranked {
        if entry.is_proven() {
            ranking.proven.push(entry);
        } else if entry.is_ruled_out() {
            ranking.ruled_out.push(entry);
        } else {
            ranking.under_review.push(entry);
        }
    }
    ranking
}
