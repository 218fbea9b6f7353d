use thiserror::Error;

use crate::discovery::types::{HypothesisId, InvestigationRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationRejected {
    #[error("confirmation must name at least one hypothesis")]
    EmptySubset,
    #[error("hypothesis {0} is not in the proven partition")]
    NotProven(HypothesisId),
    #[error("investigation {0} is already confirmed")]
    AlreadyConfirmed(String),
}

/// Checks a proposed subset against the proven partition recorded at
/// investigation time. Pure; the caller persists only on `Ok`.
///
/// Duplicate ids collapse to their first occurrence.
pub fn validate_confirmation(
    record: &InvestigationRecord,
    hypothesis_ids: &[HypothesisId],
) -> Result<Vec<HypothesisId>, ConfirmationRejected> {
    if record.is_confirmed() {
        return Err(ConfirmationRejected::AlreadyConfirmed(
            record.session_id.clone(),
        ));
    }
    let mut accepted: Vec<HypothesisId> = Vec::with_capacity(hypothesis_ids.len());
    for id in hypothesis_ids {
        let id = id.trim();
        if record.ranking.find_proven(id).is_none() {
            return Err(ConfirmationRejected::NotProven(id.to_string()));
        }
        if !accepted.iter().any(|existing| existing == id) {
            accepted.push(id.to_string());
        }
    }
    if accepted.is_empty() {
        return Err(ConfirmationRejected::EmptySubset);
    }
    Ok(accepted)
}
