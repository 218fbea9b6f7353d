use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::{Value, json};

use crate::inference::{
    InferenceBackend,
    credentials::CredentialProvider,
    error::{InferenceError, InferenceErrorKind, internal_error, invalid_request, protocol_violation},
    http_common,
    types::{InferenceConfig, InferenceRequest, InferenceResponse},
};

/// Non-streaming `/chat/completions` client for OpenAI-compatible servers.
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    client: Client,
    config: InferenceConfig,
    credential_provider: Arc<dyn CredentialProvider>,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        config: InferenceConfig,
        credential_provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, InferenceError> {
        if config.endpoint.trim().is_empty() {
            return Err(invalid_request("inference.endpoint cannot be empty"));
        }
        if config.model.trim().is_empty() {
            return Err(invalid_request("inference.model cannot be empty"));
        }
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| internal_error(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            config,
            credential_provider,
        })
    }

    fn build_body(&self, request: &InferenceRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": http_common::request_messages(request),
            "stream": false,
            "max_tokens": request.max_output_tokens,
        });
        if self.config.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatibleBackend {
    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let credential = self
            .credential_provider
            .resolve(&self.config.credential)
            .await?;

        let mut builder = self
            .client
            .post(url)
            .timeout(Duration::from_millis(self.config.request_timeout_ms.max(1)))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-request-id", request.request_id.clone())
            .json(&self.build_body(&request));
        if let Some(auth_header) = credential.auth_header {
            builder = builder.header(header::AUTHORIZATION, auth_header);
        }
        for (key, value) in credential.extra_headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|err| {
            let kind = if err.is_timeout() {
                InferenceErrorKind::Timeout
            } else {
                InferenceErrorKind::BackendTransient
            };
            InferenceError::new(kind, format!("openai-compatible request failed: {err}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_common::map_http_error(status.as_u16(), &body));
        }

        let body: Value = response.json().await.map_err(|err| {
            protocol_violation(format!("failed to decode openai-compatible response: {err}"))
        })?;
        let output_text = http_common::extract_message_text(&body).ok_or_else(|| {
            protocol_violation("openai-compatible response has no choices[0].message.content")
        })?;
        let finish_reason = http_common::parse_finish_reason(
            body.get("choices")
                .and_then(|choices| choices.get(0))
                .and_then(|choice| choice.get("finish_reason"))
                .and_then(Value::as_str),
        );

        tracing::debug!(
            target: "inference",
            request_id = %request.request_id,
            stage = %request.stage,
            status = status.as_u16(),
            finish_reason = ?finish_reason,
            output_chars = output_text.len(),
            "chat_completion_received"
        );

        Ok(InferenceResponse {
            request_id: request.request_id,
            output_text,
            usage: http_common::parse_usage(body.get("usage")),
            finish_reason,
        })
    }
}
