use serde::{Deserialize, Serialize};

pub type RequestId = String;

fn default_request_timeout_ms() -> u64 {
    120_000
}

fn default_json_mode() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialRef {
    Env {
        var: String,
    },
    InlineToken {
        token: String,
    },
    #[default]
    None,
}

#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub auth_header: Option<String>,
    pub extra_headers: Vec<(String, String)>,
}

impl ResolvedCredential {
    pub fn none() -> Self {
        Self {
            auth_header: None,
            extra_headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub credential: CredentialRef,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Asks the backend for `response_format: json_object` when it supports it.
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub request_id: RequestId,
    pub stage: String,
    pub system_prompt: String,
    pub prompt: String,
    pub max_output_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub request_id: RequestId,
    pub output_text: String,
    pub usage: Option<UsageStats>,
    pub finish_reason: FinishReason,
}
