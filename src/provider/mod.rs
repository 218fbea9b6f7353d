pub mod fixture;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use fixture::FixtureDataProvider;
pub use types::{
    ActivityPoint, EventRecord, SubPopulation, SubjectContext, SubjectId, SubjectProfile,
};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("failed to read subject data from {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse subject data from {path}: {message}")]
    Parse { path: String, message: String },
    #[error("data provider backend failed: {0}")]
    Backend(String),
}

/// Read-only accessors over prescriber data, keyed by subject id.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn profile(&self, subject_id: &str) -> Result<Option<SubjectProfile>, ProviderError>;

    async fn activity(&self, subject_id: &str) -> Result<Vec<ActivityPoint>, ProviderError>;

    async fn sub_populations(&self, subject_id: &str)
    -> Result<Vec<SubPopulation>, ProviderError>;

    async fn events(&self, subject_id: &str) -> Result<Vec<EventRecord>, ProviderError>;
}

/// Loads the full context concurrently. `Ok(None)` when the subject is unknown.
pub async fn load_subject_context(
    provider: &dyn DataProvider,
    subject_id: &str,
) -> Result<Option<SubjectContext>, ProviderError> {
    let Some(profile) = provider.profile(subject_id).await? else {
        return Ok(None);
    };
    let (activity, sub_populations, events) = tokio::try_join!(
        provider.activity(subject_id),
        provider.sub_populations(subject_id),
        provider.events(subject_id)
    )?;
    Ok(Some(SubjectContext {
        profile,
        activity,
        sub_populations,
        events,
    }))
}
