use std::{collections::HashMap, fs, path::Path};

use async_trait::async_trait;
use serde::Deserialize;

use crate::provider::{
    DataProvider, ProviderError,
    types::{ActivityPoint, EventRecord, SubPopulation, SubjectContext, SubjectProfile},
};

#[derive(Debug, Deserialize)]
struct FixtureFile {
    subjects: Vec<SubjectContext>,
}

/// Serves subject data from a JSON5 file loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct FixtureDataProvider {
    subjects: HashMap<String, SubjectContext>,
}

impl FixtureDataProvider {
    pub fn from_contexts(contexts: impl IntoIterator<Item = SubjectContext>) -> Self {
        Self {
            subjects: contexts
                .into_iter()
                .map(|context| (context.profile.subject_id.clone(), context))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = fs::read_to_string(path).map_err(|err| ProviderError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let file: FixtureFile = json5::from_str(&content).map_err(|err| ProviderError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        tracing::info!(
            target: "provider",
            path = %path.display(),
            subjects = file.subjects.len(),
            "fixture_subjects_loaded"
        );
        Ok(Self::from_contexts(file.subjects))
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

#[async_trait]
impl DataProvider for FixtureDataProvider {
    async fn profile(&self, subject_id: &str) -> Result<Option<SubjectProfile>, ProviderError> {
        Ok(self
            .subjects
            .get(subject_id)
            .map(|context| context.profile.clone()))
    }

    async fn activity(&self, subject_id: &str) -> Result<Vec<ActivityPoint>, ProviderError> {
        Ok(self
            .subjects
            .get(subject_id)
            .map(|context| context.activity.clone())
            .unwrap_or_default())
    }

    async fn sub_populations(
        &self,
        subject_id: &str,
    ) -> Result<Vec<SubPopulation>, ProviderError> {
        Ok(self
            .subjects
            .get(subject_id)
            .map(|context| context.sub_populations.clone())
            .unwrap_or_default())
    }

    async fn events(&self, subject_id: &str) -> Result<Vec<EventRecord>, ProviderError> {
        Ok(self
            .subjects
            .get(subject_id)
            .map(|context| context.events.clone())
            .unwrap_or_default())
    }
}
