use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    agents::types::{ActionCategory, Priority},
    provider::SubjectId,
};

pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Investigation,
    Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub subject_id: SubjectId,
    pub goal_description: String,
    pub goal_type: GoalType,
    pub status: SessionStatus,
    #[serde(default)]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub final_outcome: Option<String>,
    #[serde(default)]
    pub human_confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl Session {
    pub fn new(
        id: SessionId,
        subject_id: &str,
        goal_type: GoalType,
        goal_description: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            subject_id: subject_id.to_string(),
            goal_description: goal_description.into(),
            goal_type,
            status: SessionStatus::Pending,
            current_phase: None,
            context: serde_json::Value::Null,
            confidence: None,
            final_outcome: None,
            human_confirmed: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Orchestrator,
    Planner,
    EvidenceAnalyst,
    Synthesizer,
    Reflector,
    HypothesisGenerator,
    EvidenceGatherer,
    Ranker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    Observation,
    Reasoning,
    Critique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub session_id: SessionId,
    pub sequence: u64,
    pub agent_type: AgentType,
    pub kind: ThoughtKind,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub session_id: SessionId,
    pub agent_type: AgentType,
    pub action_type: String,
    pub description: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    pub success: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub session_id: SessionId,
    pub critique: String,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub lessons_learned: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub id: String,
    pub session_id: SessionId,
    pub subject_id: SubjectId,
    pub iteration: u32,
    pub action: String,
    pub category: ActionCategory,
    pub priority: Priority,
    pub business_reason: String,
    pub narrative_insight: String,
    pub confidence: f64,
    pub expected_outcome: String,
    pub timeframe: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub session: Session,
    pub thoughts: Vec<Thought>,
    pub actions: Vec<Action>,
    pub feedback: Vec<Feedback>,
}
