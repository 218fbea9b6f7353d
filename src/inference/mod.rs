pub mod credentials;
pub mod error;
pub mod http_common;
pub mod openai_compatible;
pub mod types;

use async_trait::async_trait;

pub use error::{InferenceError, InferenceErrorKind};
pub use types::{InferenceConfig, InferenceRequest, InferenceResponse};

/// Transport to the language-model inference service.
///
/// One call, one completion. Retries are the caller's business.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError>;
}
