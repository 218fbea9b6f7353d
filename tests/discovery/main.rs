mod ranking;

use std::{collections::HashMap, sync::Arc};

use fieldpilot::{
    config::DiscoveryConfig,
    inference::{InferenceErrorKind, InferenceError},
    provider::FixtureDataProvider,
    service::{OrchestrationService, ServiceSettings},
    store::{InMemorySessionStore, Session, SessionStore},
    testing::{
        ScriptedBackend, StageResponder, assessment_json, boxed, hypothesis_id_in, sample_subject,
    },
};

pub const SEGMENTED: &str = "P-SEG";
pub const FLAT: &str = "P-FLAT";

pub struct Harness {
    pub service: OrchestrationService,
    pub store: Arc<dyn SessionStore>,
    pub backend: ScriptedBackend,
}

pub fn harness(discovery: DiscoveryConfig) -> Harness {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let backend = ScriptedBackend::new();
    let provider = FixtureDataProvider::from_contexts([
        sample_subject(
            SEGMENTED,
            &[("medicare_65_plus", 410), ("commercial_under_65", 380)],
        ),
        sample_subject(FLAT, &[]),
    ]);
    let service = OrchestrationService::new(
        Arc::clone(&store),
        Arc::new(provider),
        Arc::new(backend.clone()),
        ServiceSettings {
            discovery,
            ..ServiceSettings::default()
        },
    );
    Harness {
        service,
        store,
        backend,
    }
}

/// How the evidence gatherer should answer for one hypothesis id.
#[derive(Clone)]
pub enum Scripted {
    Score(f64, &'static str),
    Fail(&'static str),
    Stall,
}

/// Routes each evaluation by the hypothesis id embedded in its prompt.
pub fn evidence_by_hypothesis(script: &[(&str, Scripted)]) -> StageResponder {
    let script: Arc<HashMap<String, Scripted>> = Arc::new(
        script
            .iter()
            .map(|(id, scripted)| (id.to_string(), scripted.clone()))
            .collect(),
    );
    Arc::new(move |request| {
        let scripted = hypothesis_id_in(&request.prompt)
            .and_then(|id| script.get(&id).cloned())
            .unwrap_or(Scripted::Fail("unscripted hypothesis"));
        boxed(async move {
            match scripted {
                Scripted::Score(confidence, verdict) => {
                    Ok(assessment_json(confidence, verdict).to_string())
                }
                Scripted::Fail(message) => Err(InferenceError::new(
                    InferenceErrorKind::BackendTransient,
                    message,
                )),
                Scripted::Stall => {
                    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                    Ok(assessment_json(99.0, "proven").to_string())
                }
            }
        })
    })
}

pub async fn run_investigation(h: &Harness, subject_id: &str) -> Session {
    let session_id = h
        .service
        .start_investigation(subject_id)
        .await
        .expect("start should succeed");
    h.service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish")
}
