mod loop_rules;
mod session_log;

use std::sync::Arc;

use fieldpilot::{
    config::OrchestratorConfig,
    provider::FixtureDataProvider,
    service::{OrchestrationService, ServiceSettings},
    store::{InMemorySessionStore, SessionStore},
    testing::{ScriptedBackend, sample_subject},
};

pub const SUBJECT: &str = "P-1";

pub struct Harness {
    pub service: OrchestrationService,
    pub store: Arc<dyn SessionStore>,
    pub backend: ScriptedBackend,
}

pub fn harness(orchestrator: OrchestratorConfig) -> Harness {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let backend = ScriptedBackend::new();
    let provider = FixtureDataProvider::from_contexts([sample_subject(
        SUBJECT,
        &[("medicare_65_plus", 410), ("commercial_under_65", 380)],
    )]);
    let service = OrchestrationService::new(
        Arc::clone(&store),
        Arc::new(provider),
        Arc::new(backend.clone()),
        ServiceSettings {
            orchestrator,
            ..ServiceSettings::default()
        },
    );
    Harness {
        service,
        store,
        backend,
    }
}
