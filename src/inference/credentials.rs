use std::env;

use async_trait::async_trait;

use crate::inference::{
    error::{InferenceError, InferenceErrorKind, invalid_request},
    types::{CredentialRef, ResolvedCredential},
};

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, reference: &CredentialRef)
    -> Result<ResolvedCredential, InferenceError>;
}

#[derive(Default)]
pub struct EnvCredentialProvider;

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn resolve(
        &self,
        reference: &CredentialRef,
    ) -> Result<ResolvedCredential, InferenceError> {
        match reference {
            CredentialRef::Env { var } => {
                let token = env::var(var).map_err(|_| {
                    InferenceError::new(
                        InferenceErrorKind::Authentication,
                        format!("missing credential environment variable {var}"),
                    )
                    .with_retryable(false)
                })?;
                Ok(bearer(&token))
            }
            CredentialRef::InlineToken { token } => {
                if token.trim().is_empty() {
                    return Err(invalid_request("inline credential token cannot be empty"));
                }
                Ok(bearer(token))
            }
            CredentialRef::None => Ok(ResolvedCredential::none()),
        }
    }
}

fn bearer(token: &str) -> ResolvedCredential {
    ResolvedCredential {
        auth_header: Some(format!("Bearer {token}")),
        extra_headers: Vec::new(),
    }
}
