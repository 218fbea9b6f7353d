mod sessions;

use std::sync::Arc;

use fieldpilot::{
    generation::{
        STAGE_EVIDENCE_ANALYST, STAGE_EVIDENCE_GATHERER, STAGE_HYPOTHESIS_GENERATOR,
        STAGE_PLANNER, STAGE_REFLECTOR, STAGE_SYNTHESIZER,
    },
    provider::FixtureDataProvider,
    service::{OrchestrationService, ServiceSettings},
    store::{InMemorySessionStore, Session, SessionStore},
    testing::{
        ScriptedBackend, assessment_json, boxed, evidence_json, hypotheses_json,
        hypothesis_id_in, plan_json, recommendation_json, reflection_json, respond_always,
        sample_subject,
    },
};

pub const SUBJECT: &str = "P-1";
pub const OTHER_SUBJECT: &str = "P-2";

pub struct Harness {
    pub service: OrchestrationService,
    pub store: Arc<dyn SessionStore>,
    pub backend: ScriptedBackend,
}

/// Scripts every stage: investigations prove H1 (85) and H2 (72); the
/// recommendation loop finishes on its first turn.
pub fn scripted_backend() -> ScriptedBackend {
    let backend = ScriptedBackend::new();
    backend
        .respond_with(STAGE_PLANNER, respond_always(plan_json()))
        .respond_with(STAGE_EVIDENCE_ANALYST, respond_always(evidence_json(2, 1)))
        .respond_with(STAGE_SYNTHESIZER, respond_always(recommendation_json(70.0)))
        .respond_with(STAGE_REFLECTOR, respond_always(reflection_json(82.0)))
        .respond_with(
            STAGE_HYPOTHESIS_GENERATOR,
            respond_always(hypotheses_json(&[
                "Formulary tier change",
                "Competitor detailing",
                "Fewer rep visits",
            ])),
        )
        .respond_with(
            STAGE_EVIDENCE_GATHERER,
            Arc::new(|request| {
                let (confidence, verdict) = match hypothesis_id_in(&request.prompt).as_deref() {
                    Some("H1") => (85.0, "proven"),
                    Some("H2") => (72.0, "likely"),
                    _ => (30.0, "unlikely"),
                };
                boxed(async move { Ok(assessment_json(confidence, verdict).to_string()) })
            }),
        );
    backend
}

pub fn harness_with_store(store: Arc<dyn SessionStore>) -> Harness {
    let backend = scripted_backend();
    let provider = FixtureDataProvider::from_contexts([
        sample_subject(SUBJECT, &[("medicare_65_plus", 410), ("new_starts", 95)]),
        sample_subject(OTHER_SUBJECT, &[]),
    ]);
    let service = OrchestrationService::new(
        Arc::clone(&store),
        Arc::new(provider),
        Arc::new(backend.clone()),
        ServiceSettings::default(),
    );
    Harness {
        service,
        store,
        backend,
    }
}

pub fn harness() -> Harness {
    harness_with_store(Arc::new(InMemorySessionStore::new()))
}

pub async fn finish(h: &Harness, session_id: &str) -> Session {
    h.service
        .wait_for_completion(session_id)
        .await
        .expect("session should finish")
}
