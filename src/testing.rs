//! Scripted collaborators for driving sessions without a live model.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    inference::{
        InferenceBackend, InferenceError, InferenceRequest, InferenceResponse,
        error::internal_error,
        types::FinishReason,
    },
    provider::{ActivityPoint, EventRecord, SubPopulation, SubjectContext, SubjectProfile},
};

type ResponderFuture = Pin<Box<dyn Future<Output = Result<String, InferenceError>> + Send>>;

pub type StageResponder = Arc<dyn Fn(InferenceRequest) -> ResponderFuture + Send + Sync>;

pub fn boxed<T>(
    future: impl Future<Output = T> + Send + 'static,
) -> Pin<Box<dyn Future<Output = T> + Send>>
where
    T: Send + 'static,
{
    Box::pin(future)
}

#[derive(Default)]
struct ScriptState {
    queues: HashMap<String, VecDeque<Result<String, InferenceError>>>,
    responders: HashMap<String, StageResponder>,
    requests: Vec<InferenceRequest>,
}

/// Inference backend answering from per-stage scripts.
///
/// A stage responder, when set, wins over the queue. An empty queue with no
/// responder is an internal error, which surfaces like any transport failure.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ScriptState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn push(&self, stage: &str, output: impl Into<String>) -> &Self {
        let output = output.into();
        self.with_state(|state| {
            state
                .queues
                .entry(stage.to_string())
                .or_default()
                .push_back(Ok(output))
        });
        self
    }

    pub fn push_json(&self, stage: &str, value: Value) -> &Self {
        self.push(stage, value.to_string())
    }

    pub fn push_error(&self, stage: &str, error: InferenceError) -> &Self {
        self.with_state(|state| {
            state
                .queues
                .entry(stage.to_string())
                .or_default()
                .push_back(Err(error))
        });
        self
    }

    pub fn respond_with(&self, stage: &str, responder: StageResponder) -> &Self {
        self.with_state(|state| {
            state.responders.insert(stage.to_string(), responder);
        });
        self
    }

    pub fn calls(&self, stage: &str) -> usize {
        self.with_state(|state| {
            state
                .requests
                .iter()
                .filter(|request| request.stage == stage)
                .count()
        })
    }

    pub fn requests(&self, stage: &str) -> Vec<InferenceRequest> {
        self.with_state(|state| {
            state
                .requests
                .iter()
                .filter(|request| request.stage == stage)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let (responder, queued) = self.with_state(|state| {
            state.requests.push(request.clone());
            match state.responders.get(&request.stage) {
                Some(responder) => (Some(Arc::clone(responder)), None),
                None => (
                    None,
                    state
                        .queues
                        .get_mut(&request.stage)
                        .and_then(VecDeque::pop_front),
                ),
            }
        });

        let output = match (responder, queued) {
            (Some(responder), _) => responder(request.clone()).await?,
            (None, Some(queued)) => queued?,
            (None, None) => {
                return Err(internal_error(format!(
                    "no scripted response left for stage {}",
                    request.stage
                )));
            }
        };
        Ok(InferenceResponse {
            request_id: request.request_id,
            output_text: output,
            usage: None,
            finish_reason: FinishReason::Stop,
        })
    }
}

/// Answers every request for a stage with the same JSON.
pub fn respond_always(value: Value) -> StageResponder {
    let output = value.to_string();
    Arc::new(move |_request| {
        let output = output.clone();
        boxed(async move { Ok(output) })
    })
}

/// Pulls the first `"id": "H<n>"` out of an evidence prompt.
pub fn hypothesis_id_in(prompt: &str) -> Option<String> {
    let start = prompt.find("\"id\": \"H")? + "\"id\": \"".len();
    let rest = &prompt[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

pub fn plan_json() -> Value {
    json!({
        "rationale": "Check whether recent volume changes follow the formulary event.",
        "goals": ["explain the volume change"],
        "strategy": "compare activity before and after the event",
        "required_data": ["activity", "events"],
        "success_criteria": ["one actionable next step"]
    })
}

pub fn evidence_json(findings: usize, hypotheses: usize) -> Value {
    json!({
        "rationale": "Looked at the last two quarters of activity.",
        "key_findings": (0..findings).map(|i| format!("finding {}", i + 1)).collect::<Vec<_>>(),
        "hypotheses": (0..hypotheses).map(|i| format!("hypothesis {}", i + 1)).collect::<Vec<_>>(),
        "risk_factors": ["competitor detailing"],
        "opportunities": ["peer education event"]
    })
}

pub fn recommendation_json(confidence: f64) -> Value {
    json!({
        "rationale": "The event created an opening for a clinical discussion.",
        "action": "Schedule a lunch meeting to review the new formulary tier",
        "category": "meeting",
        "priority": "High",
        "business_reason": "Volume fell after the tier change",
        "narrative_insight": "Access friction, not efficacy doubts, explains the dip",
        "confidence": confidence,
        "expected_outcome": "Recovered share within a quarter",
        "timeframe": "next 2 weeks"
    })
}

pub fn reflection_json(confidence: f64) -> Value {
    json!({
        "rationale": "The recommendation follows from the evidence.",
        "strengths": ["grounded in activity data"],
        "weaknesses": ["single data source"],
        "confidence": confidence,
        "improvements": ["check payer mix"],
        "lessons_learned": ["formulary events dominate"],
        "overall_assessment": "Sound but narrow."
    })
}

pub fn hypotheses_json(titles: &[&str]) -> Value {
    json!({
        "hypotheses": titles
            .iter()
            .map(|title| json!({
                "title": title,
                "description": format!("{title} explains the change"),
                "causal_chain": ["trigger", "mechanism", "observed change"],
                "predicted_patterns": ["drop after trigger"],
                "data_sources": ["activity"],
                "initial_confidence": 50
            }))
            .collect::<Vec<_>>()
    })
}

pub fn assessment_json(final_confidence: f64, verdict: &str) -> Value {
    let evidence: Vec<Value> = (0..6)
        .map(|i| {
            json!({
                "source": if i % 2 == 0 { "activity records" } else { "published outcomes study" },
                "source_kind": if i % 2 == 0 { "internal" } else { "external" },
                "finding": format!("observation {}", i + 1),
                "supports": i != 5,
                "strength": "moderate"
            })
        })
        .collect();
    json!({
        "evidence": evidence,
        "final_confidence": final_confidence,
        "verdict": verdict,
        "reasoning": format!("weighed the evidence to {final_confidence}")
    })
}

/// A prescriber with activity, one event and the given segments.
pub fn sample_subject(subject_id: &str, segments: &[(&str, u64)]) -> SubjectContext {
    SubjectContext {
        profile: SubjectProfile {
            subject_id: subject_id.to_string(),
            name: format!("Dr. {subject_id}"),
            specialty: Some("cardiology".to_string()),
            territory: Some("north".to_string()),
            risk_score: Some(72.0),
            risk_flags: vec!["volume_drop".to_string()],
            attributes: Default::default(),
        },
        activity: vec![
            ActivityPoint {
                period: "2026-Q1".to_string(),
                metric: "trx".to_string(),
                value: 120.0,
            },
            ActivityPoint {
                period: "2026-Q2".to_string(),
                metric: "trx".to_string(),
                value: 84.0,
            },
        ],
        sub_populations: segments
            .iter()
            .map(|(segment_id, members)| SubPopulation {
                segment_id: segment_id.to_string(),
                label: segment_id.replace('_', " "),
                member_count: *members,
                share: None,
                trend: None,
            })
            .collect(),
        events: vec![EventRecord {
            event_id: "E1".to_string(),
            occurred_on: "2026-04-02".to_string(),
            kind: "formulary_change".to_string(),
            description: "Moved to tier 3".to_string(),
            attributes: Default::default(),
        }],
    }
}
