use std::{collections::HashMap, sync::Arc, time::Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    generation::{
        contract::{CompiledContract, OutputContract},
        decode::{decode_html_entities, extract_json_object},
        error::GenerationError,
    },
    inference::{InferenceBackend, InferenceRequest},
};

const SYSTEM_PROMPT: &str = "You are an analytical assistant supporting pharmaceutical field teams. \
Answer with exactly one JSON object and nothing else.";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub stage: &'static str,
    pub session_id: Option<String>,
    pub instruction: String,
    pub max_output_tokens: u64,
}

impl GenerationRequest {
    pub fn new(stage: &'static str, instruction: String, max_output_tokens: u64) -> Self {
        Self {
            stage,
            session_id: None,
            instruction,
            max_output_tokens,
        }
    }

    pub fn for_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }
}

/// Turns free-form model text into a validated [`OutputContract`] value.
#[derive(Clone)]
pub struct StructuredGenerationClient {
    backend: Arc<dyn InferenceBackend>,
    contracts: Arc<RwLock<HashMap<&'static str, Arc<CompiledContract>>>>,
}

impl StructuredGenerationClient {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            contracts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn generate<T: OutputContract>(
        &self,
        request: GenerationRequest,
    ) -> Result<T, GenerationError> {
        let contract = self.contract::<T>().await?;
        let stage = request.stage;
        let request_id = format!("{stage}-{}", Uuid::now_v7());
        let prompt = format!(
            "{}\n\nRespond with one JSON object that satisfies this JSON schema:\n{}",
            request.instruction.trim_end(),
            contract.prompt_schema()
        );

        tracing::debug!(
            target: "generation",
            stage = stage,
            contract = contract.name,
            request_id = %request_id,
            session_id = request.session_id.as_deref().unwrap_or("-"),
            max_output_tokens = request.max_output_tokens,
            prompt_chars = prompt.len(),
            "generation_started"
        );

        let started_at = Instant::now();
        let response = self
            .backend
            .complete(InferenceRequest {
                request_id: request_id.clone(),
                stage: stage.to_string(),
                system_prompt: SYSTEM_PROMPT.to_string(),
                prompt,
                max_output_tokens: request.max_output_tokens,
            })
            .await
            .map_err(|source| {
                tracing::warn!(
                    target: "generation",
                    stage = stage,
                    request_id = %request_id,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_kind = ?source.kind,
                    error = %source,
                    "generation_inference_failed"
                );
                GenerationError::Inference { stage, source }
            })?;

        let (input_tokens, output_tokens) = response
            .usage
            .as_ref()
            .map(|usage| (usage.input_tokens, usage.output_tokens))
            .unwrap_or((None, None));
        tracing::debug!(
            target: "generation",
            stage = stage,
            request_id = %request_id,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            finish_reason = ?response.finish_reason,
            usage_input_tokens = ?input_tokens,
            usage_output_tokens = ?output_tokens,
            output_chars = response.output_text.len(),
            "generation_received"
        );

        let parsed = parse_contract::<T>(stage, &contract, &response.output_text);
        if let Err(err) = &parsed {
            tracing::warn!(
                target: "generation",
                stage = stage,
                request_id = %request_id,
                error = %err,
                "generation_rejected"
            );
        }
        parsed
    }

    async fn contract<T: OutputContract>(&self) -> Result<Arc<CompiledContract>, GenerationError> {
        if let Some(compiled) = self.contracts.read().await.get(T::NAME) {
            return Ok(Arc::clone(compiled));
        }
        let compiled = CompiledContract::compile::<T>()?;
        self.contracts
            .write()
            .await
            .insert(T::NAME, Arc::clone(&compiled));
        Ok(compiled)
    }
}

/// Decode, locate, schema-check, deserialize, then range-check.
pub fn parse_contract<T: OutputContract>(
    stage: &'static str,
    contract: &CompiledContract,
    raw: &str,
) -> Result<T, GenerationError> {
    let violation = |message: String| GenerationError::SchemaViolation {
        stage,
        contract: contract.name,
        message,
    };

    if raw.trim().is_empty() {
        return Err(GenerationError::EmptyResponse { stage });
    }

    let decoded = decode_html_entities(raw);
    let payload = extract_json_object(&decoded)
        .ok_or_else(|| violation("no JSON object found in response".to_string()))?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|err| violation(format!("response is not valid JSON: {err}")))?;
    contract.check(&value).map_err(violation)?;
    let output: T = serde_json::from_value(value)
        .map_err(|err| violation(format!("response does not deserialize: {err}")))?;
    output
        .validate()
        .map_err(|err| violation(err.to_string().replace('\n', "; ")))?;
    Ok(output)
}
