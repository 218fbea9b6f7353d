use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type SubjectId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub subject_id: SubjectId,
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub territory: Option<String>,
    /// Output of the upstream rule-based scorer, if it flagged this subject.
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPoint {
    pub period: String,
    pub metric: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPopulation {
    pub segment_id: String,
    pub label: String,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub share: Option<f64>,
    #[serde(default)]
    pub trend: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub occurred_on: String,
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Everything the data provider knows about one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectContext {
    pub profile: SubjectProfile,
    #[serde(default)]
    pub activity: Vec<ActivityPoint>,
    #[serde(default)]
    pub sub_populations: Vec<SubPopulation>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl SubjectContext {
    pub fn subject_id(&self) -> &str {
        &self.profile.subject_id
    }

    /// Two or more non-empty segments count as causally distinguishable groups.
    pub fn has_distinct_sub_populations(&self) -> bool {
        self.sub_populations
            .iter()
            .filter(|segment| segment.member_count > 0)
            .count()
            >= 2
    }
}
