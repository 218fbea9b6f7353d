pub mod json_file;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::discovery::types::InvestigationRecord;

pub use json_file::JsonFileSessionStore;
pub use memory::InMemorySessionStore;
pub use types::{
    Action, AgentType, Feedback, GoalType, RecommendationRecord, Session, SessionDetails,
    SessionId, SessionStatus, Thought, ThoughtKind,
};

/// In-place edit applied to one session row while the store holds it.
pub type SessionMutation = Box<dyn FnOnce(&mut Session) + Send>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("session {0} does not exist")]
    SessionNotFound(SessionId),
    #[error("no investigation recorded for session {0}")]
    InvestigationNotFound(SessionId),
    #[error("session store persistence failed: {0}")]
    Persistence(String),
}

/// Durable home for sessions and their append-only logs.
///
/// Creates are idempotent: writing a row whose key already exists leaves the
/// stored row untouched. Session rows change only through `modify_session`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<(), StoreError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Applies `mutate` to the stored row under the store's write lock and
    /// returns the result. Writers that touch different fields of the same
    /// session never overwrite each other through this path.
    async fn modify_session(
        &self,
        session_id: &str,
        mutate: SessionMutation,
    ) -> Result<Session, StoreError>;

    async fn append_thought(&self, thought: Thought) -> Result<(), StoreError>;

    async fn append_action(&self, action: Action) -> Result<(), StoreError>;

    async fn append_feedback(&self, feedback: Feedback) -> Result<(), StoreError>;

    /// Ordered by sequence number.
    async fn list_thoughts(&self, session_id: &str) -> Result<Vec<Thought>, StoreError>;

    async fn list_actions(&self, session_id: &str) -> Result<Vec<Action>, StoreError>;

    async fn list_feedback(&self, session_id: &str) -> Result<Vec<Feedback>, StoreError>;

    async fn save_recommendation(&self, record: RecommendationRecord) -> Result<(), StoreError>;

    async fn list_recommendations(
        &self,
        session_id: &str,
    ) -> Result<Vec<RecommendationRecord>, StoreError>;

    async fn save_investigation(&self, record: InvestigationRecord) -> Result<(), StoreError>;

    /// Replaces the investigation row keyed by `record.session_id`.
    async fn update_investigation(&self, record: InvestigationRecord) -> Result<(), StoreError>;

    async fn latest_investigation(
        &self,
        subject_id: &str,
    ) -> Result<Option<InvestigationRecord>, StoreError>;
}
