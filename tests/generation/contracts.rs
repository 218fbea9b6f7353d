use std::sync::Arc;

use serde_json::json;

use fieldpilot::{
    agents::{ActionCategory, EvidenceOutput, Priority, RecommendationOutput, ReflectionOutput},
    discovery::types::{EvidenceAssessment, HypothesisSet},
    generation::{
        GenerationError, GenerationRequest, STAGE_EVIDENCE_ANALYST, STAGE_EVIDENCE_GATHERER,
        STAGE_HYPOTHESIS_GENERATOR, STAGE_REFLECTOR, STAGE_SYNTHESIZER,
        StructuredGenerationClient,
    },
    inference::{InferenceError, InferenceErrorKind},
    testing::{
        ScriptedBackend, assessment_json, hypotheses_json, recommendation_json, reflection_json,
    },
};

fn client(backend: &ScriptedBackend) -> StructuredGenerationClient {
    StructuredGenerationClient::new(Arc::new(backend.clone()))
}

#[tokio::test]
async fn entity_escaped_recommendation_in_prose_is_accepted() {
    let backend = ScriptedBackend::new();
    let escaped = recommendation_json(64.0)
        .to_string()
        .replace('"', "&quot;");
    backend.push(
        STAGE_SYNTHESIZER,
        format!("Sure! Here is the recommendation:\n{escaped}\nLet me know."),
    );

    let output: RecommendationOutput = client(&backend)
        .generate(GenerationRequest::new(STAGE_SYNTHESIZER, "recommend".to_string(), 800))
        .await
        .expect("escaped payload should parse");
    assert_eq!(output.category, ActionCategory::Meeting);
    assert_eq!(output.priority, Priority::High);
    assert_eq!(output.confidence, 64.0);
}

#[tokio::test]
async fn request_carries_stage_budget_and_schema() {
    let backend = ScriptedBackend::new();
    backend.push(
        STAGE_REFLECTOR,
        format!("```json\n{}\n```", reflection_json(55.0)),
    );

    let output: ReflectionOutput = client(&backend)
        .generate(
            GenerationRequest::new(STAGE_REFLECTOR, "critique this".to_string(), 1_500)
                .for_session("s-1"),
        )
        .await
        .expect("fenced payload should parse");
    assert_eq!(output.confidence, 55.0);

    let requests = backend.requests(STAGE_REFLECTOR);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].max_output_tokens, 1_500);
    assert!(requests[0].request_id.starts_with("reflector-"));
    assert!(requests[0].prompt.starts_with("critique this"));
    assert!(requests[0].prompt.contains("\"overall_assessment\""));
    assert!(!requests[0].system_prompt.is_empty());
}

#[tokio::test]
async fn out_of_range_confidence_is_a_schema_violation() {
    let backend = ScriptedBackend::new();
    backend.push_json(STAGE_REFLECTOR, reflection_json(140.0));

    let err = client(&backend)
        .generate::<ReflectionOutput>(GenerationRequest::new(
            STAGE_REFLECTOR,
            "critique".to_string(),
            100,
        ))
        .await
        .expect_err("confidence above 100 must be rejected");
    assert!(err.is_schema_violation());
    assert!(err.to_string().contains("reflection contract"));
}

#[tokio::test]
async fn unknown_category_is_a_schema_violation() {
    let backend = ScriptedBackend::new();
    let mut value = recommendation_json(60.0);
    value["category"] = json!("dinner");
    backend.push_json(STAGE_SYNTHESIZER, value);

    let err = client(&backend)
        .generate::<RecommendationOutput>(GenerationRequest::new(
            STAGE_SYNTHESIZER,
            "recommend".to_string(),
            100,
        ))
        .await
        .expect_err("category outside the enum must be rejected");
    assert!(err.is_schema_violation());
}

#[tokio::test]
async fn hypothesis_and_evidence_bounds_are_enforced() {
    let backend = ScriptedBackend::new();
    backend
        .push_json(
            STAGE_HYPOTHESIS_GENERATOR,
            hypotheses_json(&["a", "b", "c", "d", "e", "f"]),
        )
        .push_json(
            STAGE_HYPOTHESIS_GENERATOR,
            hypotheses_json(&["a", "b", "c"]),
        );
    let mut short = assessment_json(60.0, "possible");
    if let Some(items) = short["evidence"].as_array_mut() {
        items.truncate(5);
    }
    backend.push_json(STAGE_EVIDENCE_GATHERER, short);

    let client = client(&backend);
    let too_many = client
        .generate::<HypothesisSet>(GenerationRequest::new(
            STAGE_HYPOTHESIS_GENERATOR,
            "propose".to_string(),
            100,
        ))
        .await
        .expect_err("six hypotheses exceed the bound");
    assert!(too_many.is_schema_violation());

    let three = client
        .generate::<HypothesisSet>(GenerationRequest::new(
            STAGE_HYPOTHESIS_GENERATOR,
            "propose".to_string(),
            100,
        ))
        .await
        .expect("three hypotheses are within the bound");
    assert_eq!(three.hypotheses.len(), 3);

    let too_few_items = client
        .generate::<EvidenceAssessment>(GenerationRequest::new(
            STAGE_EVIDENCE_GATHERER,
            "evaluate".to_string(),
            100,
        ))
        .await
        .expect_err("five evidence items are below the bound");
    assert!(too_few_items.is_schema_violation());
}

#[tokio::test]
async fn empty_and_failed_calls_keep_their_stage() {
    let backend = ScriptedBackend::new();
    backend
        .push(STAGE_EVIDENCE_ANALYST, "   ")
        .push_error(
            STAGE_EVIDENCE_ANALYST,
            InferenceError::new(InferenceErrorKind::RateLimited, "slow down"),
        );
    let client = client(&backend);

    let empty = client
        .generate::<EvidenceOutput>(GenerationRequest::new(
            STAGE_EVIDENCE_ANALYST,
            "analyze".to_string(),
            100,
        ))
        .await
        .expect_err("blank output must be rejected");
    assert!(matches!(
        empty,
        GenerationError::EmptyResponse { stage } if stage == STAGE_EVIDENCE_ANALYST
    ));

    let failed = client
        .generate::<EvidenceOutput>(GenerationRequest::new(
            STAGE_EVIDENCE_ANALYST,
            "analyze".to_string(),
            100,
        ))
        .await
        .expect_err("inference failure must surface");
    match failed {
        GenerationError::Inference { stage, source } => {
            assert_eq!(stage, STAGE_EVIDENCE_ANALYST);
            assert_eq!(source.kind, InferenceErrorKind::RateLimited);
            assert!(source.retryable);
        }
        other => panic!("expected inference error, got {other:?}"),
    }
}
