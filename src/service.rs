use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::Context;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    agents::AgentContext,
    config::{Config, DiscoveryConfig, OrchestratorConfig, StoreConfig},
    discovery::{
        CausalDiscoveryEngine, Confirmation, ConfirmationRejected, DiscoveryContext,
        InvestigationSummary, types::HypothesisId, validate_confirmation,
    },
    events::{EventNotifier, EventSubscription},
    generation::StructuredGenerationClient,
    inference::{
        InferenceBackend, credentials::EnvCredentialProvider,
        openai_compatible::OpenAiCompatibleBackend,
    },
    orchestrator::{IterationController, LoopPolicy},
    provider::{DataProvider, FixtureDataProvider, ProviderError, SubjectId},
    session::SessionRecorder,
    store::{
        GoalType, InMemorySessionStore, JsonFileSessionStore, RecommendationRecord, Session,
        SessionDetails, SessionId, SessionStatus, SessionStore, StoreError,
    },
};

/// Phase label of a claimed session whose controller has not started yet.
pub const QUEUED_PHASE: &str = "queued";

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("subject {0} not found")]
    SubjectNotFound(SubjectId),
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("session {0} is not pending and cannot be started")]
    SessionNotPending(SessionId),
    #[error("session {session_id} belongs to subject {owner}, not {requested}")]
    SubjectMismatch {
        session_id: SessionId,
        owner: SubjectId,
        requested: SubjectId,
    },
    #[error("no investigation recorded for subject {0}")]
    InvestigationNotFound(SubjectId),
    #[error("confirmation rejected: {0}")]
    ConfirmationRejected(#[from] ConfirmationRejected),
    #[error("data provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("session store failed: {0}")]
    Store(#[from] StoreError),
}

/// Loop and discovery settings applied to every session the service starts.
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    pub orchestrator: OrchestratorConfig,
    pub discovery: DiscoveryConfig,
}

struct RunningSession {
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

/// The operations exposed to callers. Start calls return a session id right
/// away; the work itself runs on a spawned task per session.
#[derive(Clone)]
pub struct OrchestrationService {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn DataProvider>,
    generation: StructuredGenerationClient,
    notifier: EventNotifier,
    settings: ServiceSettings,
    running: Arc<Mutex<HashMap<SessionId, RunningSession>>>,
    claim_gate: Arc<tokio::sync::Mutex<()>>,
    confirm_gate: Arc<tokio::sync::Mutex<()>>,
}

impl OrchestrationService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn DataProvider>,
        backend: Arc<dyn InferenceBackend>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            provider,
            generation: StructuredGenerationClient::new(backend),
            notifier: EventNotifier::new(),
            settings,
            running: Arc::new(Mutex::new(HashMap::new())),
            claim_gate: Arc::new(tokio::sync::Mutex::new(())),
            confirm_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Wires the HTTP inference backend, fixture provider and configured store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = OpenAiCompatibleBackend::new(
            config.inference.clone(),
            Arc::new(EnvCredentialProvider),
        )
        .context("failed to build inference backend")?;
        let provider = FixtureDataProvider::load(&config.data.fixture_path)
            .context("failed to load subject fixtures")?;
        let store: Arc<dyn SessionStore> = match &config.store {
            StoreConfig::Memory => Arc::new(InMemorySessionStore::new()),
            StoreConfig::JsonFile { state_dir } => Arc::new(
                JsonFileSessionStore::open(state_dir).context("failed to open session store")?,
            ),
        };
        Ok(Self::new(
            store,
            Arc::new(provider),
            Arc::new(backend),
            ServiceSettings {
                orchestrator: config.orchestrator.clone(),
                discovery: config.discovery.clone(),
            },
        ))
    }

    pub async fn start_investigation(&self, subject_id: &str) -> Result<SessionId, ServiceError> {
        let profile = self
            .provider
            .profile(subject_id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(subject_id.to_string()))?;
        let session = Session::new(
            Uuid::now_v7().to_string(),
            subject_id,
            GoalType::Investigation,
            format!(
                "Explain what is driving the prescribing behaviour of {}",
                profile.name
            ),
        );
        self.store.create_session(session.clone()).await?;
        self.notifier.open(&session.id);

        let cancel = CancellationToken::new();
        let recorder = SessionRecorder::new(&session.id, Arc::clone(&self.store), self.notifier.clone());
        let engine = CausalDiscoveryEngine::new(
            DiscoveryContext::new(
                self.generation.clone(),
                Arc::clone(&self.provider),
                self.settings.discovery.clone(),
            ),
            recorder,
            cancel.clone(),
            &session,
        );
        tracing::info!(
            target: "service",
            session_id = %session.id,
            subject_id = subject_id,
            "investigation_started"
        );
        self.spawn(&session.id, cancel, engine.drive());
        Ok(session.id)
    }

    /// Starts the recommendation loop, reusing `existing_session_id` when it
    /// names a pending session for the same subject.
    pub async fn start_recommendation(
        &self,
        subject_id: &str,
        existing_session_id: Option<&str>,
    ) -> Result<SessionId, ServiceError> {
        let profile = self
            .provider
            .profile(subject_id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(subject_id.to_string()))?;
        let goal = format!(
            "Recommend the next best field action for {}",
            profile.name
        );

        let (session, recorder) = match existing_session_id {
            Some(session_id) => {
                let session = self.claim_pending(subject_id, session_id, goal).await?;
                self.notifier.open(&session.id);
                let recorder = SessionRecorder::resume(
                    &session.id,
                    Arc::clone(&self.store),
                    self.notifier.clone(),
                )
                .await?;
                (session, recorder)
            }
            None => {
                let session = Session::new(
                    Uuid::now_v7().to_string(),
                    subject_id,
                    GoalType::Recommendation,
                    goal,
                );
                self.store.create_session(session.clone()).await?;
                self.notifier.open(&session.id);
                let recorder =
                    SessionRecorder::new(&session.id, Arc::clone(&self.store), self.notifier.clone());
                (session, recorder)
            }
        };

        let cancel = CancellationToken::new();
        let controller = IterationController::new(
            AgentContext::new(
                self.generation.clone(),
                Arc::clone(&self.provider),
                self.settings.orchestrator.token_budgets.clone(),
            ),
            recorder,
            LoopPolicy::from_config(&self.settings.orchestrator),
            cancel.clone(),
            &session,
        );
        tracing::info!(
            target: "service",
            session_id = %session.id,
            subject_id = subject_id,
            reused = existing_session_id.is_some(),
            "recommendation_started"
        );
        self.spawn(&session.id, cancel, controller.drive());
        Ok(session.id)
    }

    pub async fn get_session_details(
        &self,
        session_id: &str,
    ) -> Result<SessionDetails, ServiceError> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;
        Ok(SessionDetails {
            session,
            thoughts: self.store.list_thoughts(session_id).await?,
            actions: self.store.list_actions(session_id).await?,
            feedback: self.store.list_feedback(session_id).await?,
        })
    }

    pub async fn get_recommendations(
        &self,
        session_id: &str,
    ) -> Result<Vec<RecommendationRecord>, ServiceError> {
        Ok(self.store.list_recommendations(session_id).await?)
    }

    pub async fn get_latest_investigation(
        &self,
        subject_id: &str,
    ) -> Result<InvestigationSummary, ServiceError> {
        let record = self
            .store
            .latest_investigation(subject_id)
            .await?
            .ok_or_else(|| ServiceError::InvestigationNotFound(subject_id.to_string()))?;
        Ok(InvestigationSummary::from(&record))
    }

    /// Accepts a subset of the latest investigation's proven hypotheses.
    /// Rejections leave every record untouched.
    pub async fn confirm_investigation(
        &self,
        subject_id: &str,
        hypothesis_ids: &[HypothesisId],
        notes: &str,
    ) -> Result<InvestigationSummary, ServiceError> {
        let _gate = self.confirm_gate.lock().await;
        let mut record = self
            .store
            .latest_investigation(subject_id)
            .await?
            .ok_or_else(|| ServiceError::InvestigationNotFound(subject_id.to_string()))?;

        let accepted = match validate_confirmation(&record, hypothesis_ids) {
            Ok(accepted) => accepted,
            Err(rejected) => {
                tracing::warn!(
                    target: "service",
                    subject_id = subject_id,
                    session_id = %record.session_id,
                    reason = %rejected,
                    "confirmation_rejected"
                );
                return Err(rejected.into());
            }
        };

        record.confirmation = Some(Confirmation {
            session_id: record.session_id.clone(),
            hypothesis_ids: accepted,
            notes: notes.to_string(),
            confirmed_at: OffsetDateTime::now_utc(),
        });
        self.store.update_investigation(record.clone()).await?;

        match self
            .store
            .modify_session(
                &record.session_id,
                Box::new(|session| session.human_confirmed = true),
            )
            .await
        {
            Ok(_) | Err(StoreError::SessionNotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            target: "service",
            subject_id = subject_id,
            session_id = %record.session_id,
            confirmed = ?record.confirmation.as_ref().map(|c| &c.hypothesis_ids),
            "investigation_confirmed"
        );
        Ok(InvestigationSummary::from(&record))
    }

    /// Live feed for one session. Ends when the session finishes, or at once
    /// when the session is unknown or already finished.
    pub fn subscribe(&self, session_id: &str) -> EventSubscription {
        self.notifier.subscribe(session_id)
    }

    /// Stops scheduling further phases. Returns `false` when the session is
    /// not running.
    pub async fn cancel_session(&self, session_id: &str) -> Result<bool, ServiceError> {
        if let Some(running) = self.running().get(session_id) {
            running.cancel.cancel();
            tracing::info!(target: "service", session_id = session_id, "session_cancel_requested");
            return Ok(true);
        }
        match self.store.get_session(session_id).await? {
            Some(_) => Ok(false),
            None => Err(ServiceError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Waits for the session's task to finish, then returns the stored row.
    pub async fn wait_for_completion(&self, session_id: &str) -> Result<Session, ServiceError> {
        let finished = self
            .running()
            .get(session_id)
            .map(|running| running.finished.clone());
        if let Some(mut finished) = finished {
            let _ = finished.wait_for(|done| *done).await;
        }
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))
    }

    /// Moves a pending session to `in_progress` before any task is spawned
    /// for it, so a second start on the same id is refused.
    async fn claim_pending(
        &self,
        subject_id: &str,
        session_id: &str,
        goal: String,
    ) -> Result<Session, ServiceError> {
        let _gate = self.claim_gate.lock().await;
        if self.running().contains_key(session_id) {
            return Err(ServiceError::SessionNotPending(session_id.to_string()));
        }
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;
        if session.status != SessionStatus::Pending {
            return Err(ServiceError::SessionNotPending(session.id));
        }
        if session.subject_id != subject_id {
            return Err(ServiceError::SubjectMismatch {
                session_id: session.id,
                owner: session.subject_id,
                requested: subject_id.to_string(),
            });
        }
        Ok(self
            .store
            .modify_session(
                session_id,
                Box::new(move |session| {
                    session.status = SessionStatus::InProgress;
                    session.current_phase = Some(QUEUED_PHASE.to_string());
                    session.goal_type = GoalType::Recommendation;
                    if session.goal_description.trim().is_empty() {
                        session.goal_description = goal;
                    }
                }),
            )
            .await?)
    }

    fn running(&self) -> MutexGuard<'_, HashMap<SessionId, RunningSession>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<F>(&self, session_id: &str, cancel: CancellationToken, work: F)
    where
        F: std::future::Future<Output = Result<Session, StoreError>> + Send + 'static,
    {
        let (finished_tx, finished_rx) = watch::channel(false);
        self.running().insert(
            session_id.to_string(),
            RunningSession {
                cancel,
                finished: finished_rx,
            },
        );

        let running = Arc::clone(&self.running);
        let notifier = self.notifier.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            match work.await {
                Ok(session) => tracing::debug!(
                    target: "service",
                    session_id = %session_id,
                    status = ?session.status,
                    "session_task_finished"
                ),
                Err(err) => {
                    tracing::error!(
                        target: "service",
                        session_id = %session_id,
                        error = %err,
                        "session_task_store_failure"
                    );
                    notifier.close(&session_id);
                }
            }
            running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&session_id);
            let _ = finished_tx.send(true);
        });
    }
}
