mod notifier;

pub use notifier::{EventNotifier, EventSubscription};

use serde::{Deserialize, Serialize};

use crate::store::{Action, SessionId, SessionStatus, Thought};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Thought(Thought),
    Action(Action),
    PhaseChanged {
        session_id: SessionId,
        phase: String,
        #[serde(default)]
        iteration: Option<u32>,
    },
    Completed {
        session_id: SessionId,
        status: SessionStatus,
        #[serde(default)]
        confidence: Option<f64>,
        #[serde(default)]
        outcome: Option<String>,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Thought(thought) => &thought.session_id,
            Self::Action(action) => &action.session_id,
            Self::PhaseChanged { session_id, .. } | Self::Completed { session_id, .. } => {
                session_id
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
