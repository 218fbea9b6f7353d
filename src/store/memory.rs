use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    discovery::types::InvestigationRecord,
    store::{
        SessionMutation, SessionStore, StoreError,
        types::{Action, Feedback, RecommendationRecord, Session, SessionId, Thought},
    },
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    sessions: HashMap<SessionId, Session>,
    #[serde(default)]
    thoughts: HashMap<SessionId, BTreeMap<u64, Thought>>,
    #[serde(default)]
    actions: HashMap<SessionId, Vec<Action>>,
    #[serde(default)]
    feedback: HashMap<SessionId, Vec<Feedback>>,
    #[serde(default)]
    recommendations: HashMap<SessionId, Vec<RecommendationRecord>>,
    /// Append order is creation order, so the last matching row is the latest.
    #[serde(default)]
    investigations: Vec<InvestigationRecord>,
}

impl StoreState {
    fn require_session(&self, session_id: &str) -> Result<(), StoreError> {
        if self.sessions.contains_key(session_id) {
            Ok(())
        } else {
            Err(StoreError::SessionNotFound(session_id.to_string()))
        }
    }

    pub(crate) fn create_session(&mut self, session: Session) {
        self.sessions.entry(session.id.clone()).or_insert(session);
    }

    pub(crate) fn modify_session(
        &mut self,
        session_id: &str,
        mutate: SessionMutation,
    ) -> Result<Session, StoreError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        mutate(session);
        session.updated_at = OffsetDateTime::now_utc();
        Ok(session.clone())
    }

    pub(crate) fn append_thought(&mut self, thought: Thought) -> Result<(), StoreError> {
        self.require_session(&thought.session_id)?;
        self.thoughts
            .entry(thought.session_id.clone())
            .or_default()
            .entry(thought.sequence)
            .or_insert(thought);
        Ok(())
    }

    pub(crate) fn append_action(&mut self, action: Action) -> Result<(), StoreError> {
        self.require_session(&action.session_id)?;
        let actions = self.actions.entry(action.session_id.clone()).or_default();
        if !actions.iter().any(|existing| existing.id == action.id) {
            actions.push(action);
        }
        Ok(())
    }

    pub(crate) fn append_feedback(&mut self, feedback: Feedback) -> Result<(), StoreError> {
        self.require_session(&feedback.session_id)?;
        let rows = self
            .feedback
            .entry(feedback.session_id.clone())
            .or_default();
        if !rows.iter().any(|existing| existing.id == feedback.id) {
            rows.push(feedback);
        }
        Ok(())
    }

    pub(crate) fn save_recommendation(
        &mut self,
        record: RecommendationRecord,
    ) -> Result<(), StoreError> {
        self.require_session(&record.session_id)?;
        let rows = self
            .recommendations
            .entry(record.session_id.clone())
            .or_default();
        if !rows.iter().any(|existing| existing.id == record.id) {
            rows.push(record);
        }
        Ok(())
    }

    pub(crate) fn save_investigation(
        &mut self,
        record: InvestigationRecord,
    ) -> Result<(), StoreError> {
        self.require_session(&record.session_id)?;
        if !self
            .investigations
            .iter()
            .any(|existing| existing.session_id == record.session_id)
        {
            self.investigations.push(record);
        }
        Ok(())
    }

    pub(crate) fn update_investigation(
        &mut self,
        record: InvestigationRecord,
    ) -> Result<(), StoreError> {
        let slot = self
            .investigations
            .iter_mut()
            .find(|existing| existing.session_id == record.session_id)
            .ok_or_else(|| StoreError::InvestigationNotFound(record.session_id.clone()))?;
        *slot = record;
        Ok(())
    }
}

/// Process-local store. Reads return clones, so repeated reads of a finished
/// session are identical.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    state: RwLock<StoreState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub(crate) fn state(&self) -> &RwLock<StoreState> {
        &self.state
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        self.state.write().await.create_session(session);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.state.read().await.sessions.get(session_id).cloned())
    }

    async fn modify_session(
        &self,
        session_id: &str,
        mutate: SessionMutation,
    ) -> Result<Session, StoreError> {
        self.state.write().await.modify_session(session_id, mutate)
    }

    async fn append_thought(&self, thought: Thought) -> Result<(), StoreError> {
        self.state.write().await.append_thought(thought)
    }

    async fn append_action(&self, action: Action) -> Result<(), StoreError> {
        self.state.write().await.append_action(action)
    }

    async fn append_feedback(&self, feedback: Feedback) -> Result<(), StoreError> {
        self.state.write().await.append_feedback(feedback)
    }

    async fn list_thoughts(&self, session_id: &str) -> Result<Vec<Thought>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .thoughts
            .get(session_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_actions(&self, session_id: &str) -> Result<Vec<Action>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .actions
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_feedback(&self, session_id: &str) -> Result<Vec<Feedback>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .feedback
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_recommendation(&self, record: RecommendationRecord) -> Result<(), StoreError> {
        self.state.write().await.save_recommendation(record)
    }

    async fn list_recommendations(
        &self,
        session_id: &str,
    ) -> Result<Vec<RecommendationRecord>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .recommendations
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_investigation(&self, record: InvestigationRecord) -> Result<(), StoreError> {
        self.state.write().await.save_investigation(record)
    }

    async fn update_investigation(&self, record: InvestigationRecord) -> Result<(), StoreError> {
        self.state.write().await.update_investigation(record)
    }

    async fn latest_investigation(
        &self,
        subject_id: &str,
    ) -> Result<Option<InvestigationRecord>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .investigations
            .iter()
            .rev()
            .find(|record| record.subject_id == subject_id)
            .cloned())
    }
}
