use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    events::{EventNotifier, SessionEvent},
    store::{
        Action, AgentType, Session, SessionId, SessionStatus, SessionStore, StoreError, Thought,
        ThoughtKind,
    },
};

/// Bookkeeping for exactly one session: thought numbering, the append-only
/// logs, phase labels and the terminal transition.
///
/// A fresh recorder is built for every run, so nothing here is shared between
/// sessions.
pub struct SessionRecorder {
    session_id: SessionId,
    store: Arc<dyn SessionStore>,
    notifier: EventNotifier,
    next_sequence: AtomicU64,
}

impl SessionRecorder {
    pub fn new(session_id: &str, store: Arc<dyn SessionStore>, notifier: EventNotifier) -> Self {
        Self {
            session_id: session_id.to_string(),
            store,
            notifier,
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Continues numbering after any thoughts already stored for the session.
    pub async fn resume(
        session_id: &str,
        store: Arc<dyn SessionStore>,
        notifier: EventNotifier,
    ) -> Result<Self, StoreError> {
        let last = store
            .list_thoughts(session_id)
            .await?
            .last()
            .map(|thought| thought.sequence)
            .unwrap_or(0);
        let recorder = Self::new(session_id, store, notifier);
        recorder.next_sequence.store(last + 1, Ordering::SeqCst);
        Ok(recorder)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub async fn record_thought(
        &self,
        agent_type: AgentType,
        kind: ThoughtKind,
        content: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Thought, StoreError> {
        let thought = Thought {
            session_id: self.session_id.clone(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            agent_type,
            kind,
            content: content.into(),
            metadata,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.append_thought(thought.clone()).await?;
        self.notifier.publish(SessionEvent::Thought(thought.clone()));
        Ok(thought)
    }

    pub async fn record_action(
        &self,
        agent_type: AgentType,
        action_type: &str,
        description: impl Into<String>,
        params: Value,
        result: Option<Value>,
        success: bool,
    ) -> Result<Action, StoreError> {
        let action = Action {
            id: Uuid::now_v7().to_string(),
            session_id: self.session_id.clone(),
            agent_type,
            action_type: action_type.to_string(),
            description: description.into(),
            params,
            result,
            success,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.append_action(action.clone()).await?;
        self.notifier.publish(SessionEvent::Action(action.clone()));
        Ok(action)
    }

    pub async fn enter_phase(&self, phase: &str, iteration: Option<u32>) -> Result<(), StoreError> {
        let label = phase.to_string();
        self.update(move |session| {
            session.status = SessionStatus::InProgress;
            session.current_phase = Some(label);
        })
        .await?;
        tracing::debug!(
            target: "session",
            session_id = %self.session_id,
            phase = phase,
            iteration = ?iteration,
            "phase_entered"
        );
        self.notifier.publish(SessionEvent::PhaseChanged {
            session_id: self.session_id.clone(),
            phase: phase.to_string(),
            iteration,
        });
        Ok(())
    }

    pub async fn set_context(&self, context: Value) -> Result<(), StoreError> {
        self.update(move |session| session.context = context)
            .await
            .map(|_| ())
    }

    pub async fn complete(
        &self,
        confidence: f64,
        outcome: impl Into<String>,
    ) -> Result<Session, StoreError> {
        let confidence = confidence.clamp(0.0, 100.0);
        let outcome = outcome.into();
        self.finish(SessionStatus::Completed, confidence, outcome)
            .await
    }

    /// Marks the session failed. Failed sessions report zero confidence.
    pub async fn fail(&self, message: impl Into<String>) -> Result<Session, StoreError> {
        self.finish(SessionStatus::Failed, 0.0, message.into()).await
    }

    async fn finish(
        &self,
        status: SessionStatus,
        confidence: f64,
        outcome: String,
    ) -> Result<Session, StoreError> {
        let terminal_outcome = outcome.clone();
        let updated = self
            .update(move |session| {
                session.status = status;
                session.confidence = Some(confidence);
                session.final_outcome = Some(terminal_outcome);
                session.current_phase = Some(
                    match status {
                        SessionStatus::Failed => "failed",
                        _ => "done",
                    }
                    .to_string(),
                );
                session.completed_at = Some(OffsetDateTime::now_utc());
            })
            .await;

        let session = match updated {
            Ok(session) => session,
            Err(err) => {
                self.notifier.close(&self.session_id);
                return Err(err);
            }
        };

        tracing::info!(
            target: "session",
            session_id = %self.session_id,
            status = ?status,
            confidence = confidence,
            "session_finished"
        );
        self.notifier.complete(SessionEvent::Completed {
            session_id: self.session_id.clone(),
            status,
            confidence: Some(confidence),
            outcome: Some(outcome),
        });
        Ok(session)
    }

    /// Touches only the fields named in `mutate`, so a concurrent
    /// confirmation on the same row is kept.
    async fn update(
        &self,
        mutate: impl FnOnce(&mut Session) + Send + 'static,
    ) -> Result<Session, StoreError> {
        self.store
            .modify_session(&self.session_id, Box::new(mutate))
            .await
    }
}
