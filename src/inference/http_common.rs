use serde_json::{Value, json};

use crate::inference::{
    error::{InferenceError, InferenceErrorKind},
    types::{FinishReason, InferenceRequest, UsageStats},
};

pub fn request_messages(request: &InferenceRequest) -> Vec<Value> {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.trim().is_empty() {
        messages.push(json!({"role": "system", "content": request.system_prompt}));
    }
    messages.push(json!({"role": "user", "content": request.prompt}));
    messages
}

pub fn parse_finish_reason(value: Option<&str>) -> FinishReason {
    match value.unwrap_or("stop") {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        other => FinishReason::Other(other.to_string()),
    }
}

pub fn parse_usage(value: Option<&Value>) -> Option<UsageStats> {
    let usage = value?;
    Some(UsageStats {
        input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64),
        output_tokens: usage.get("completion_tokens").and_then(Value::as_u64),
        total_tokens: usage.get("total_tokens").and_then(Value::as_u64),
    })
}

/// Extracts `choices[0].message.content`, accepting both plain strings and
/// the array-of-parts shape some OpenAI-compatible servers return.
pub fn extract_message_text(body: &Value) -> Option<String> {
    let content = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?;
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
        ),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

pub fn map_http_error(status: u16, body: &str) -> InferenceError {
    let normalized_body = body.chars().take(240).collect::<String>();

    let mut err = if status == 401 {
        InferenceError::new(InferenceErrorKind::Authentication, "authentication failed")
            .with_retryable(false)
    } else if status == 403 {
        InferenceError::new(InferenceErrorKind::Authorization, "authorization failed")
            .with_retryable(false)
    } else if status == 408 || status == 429 {
        InferenceError::new(
            InferenceErrorKind::RateLimited,
            format!("backend returned status {status}"),
        )
        .with_retryable(true)
    } else if (400..500).contains(&status) {
        InferenceError::new(
            InferenceErrorKind::InvalidRequest,
            format!("backend returned status {status}"),
        )
        .with_retryable(false)
    } else {
        InferenceError::new(
            InferenceErrorKind::BackendTransient,
            format!("backend returned status {status}"),
        )
        .with_retryable(true)
    };

    err = err.with_provider_http_status(status);
    if !normalized_body.is_empty() {
        err.message = format!("{}: {}", err.message, normalized_body);
    }
    err
}
