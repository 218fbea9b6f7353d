use std::{sync::Arc, time::Duration};

use fieldpilot::{
    config::OrchestratorConfig,
    generation::{STAGE_EVIDENCE_ANALYST, STAGE_PLANNER, STAGE_REFLECTOR, STAGE_SYNTHESIZER},
    inference::{InferenceErrorKind, InferenceError},
    store::{GoalType, SessionStatus},
    testing::{
        boxed, evidence_json, plan_json, recommendation_json, reflection_json, respond_always,
    },
};

use crate::{SUBJECT, harness};

fn script_phases(h: &crate::Harness, reflection_confidence: f64) {
    h.backend
        .respond_with(STAGE_PLANNER, respond_always(plan_json()))
        .respond_with(STAGE_SYNTHESIZER, respond_always(recommendation_json(78.0)))
        .respond_with(
            STAGE_REFLECTOR,
            respond_always(reflection_json(reflection_confidence)),
        );
}

#[tokio::test]
async fn substantive_first_iteration_completes_after_one_turn() {
    let h = harness(OrchestratorConfig::default());
    script_phases(&h, 80.0);
    h.backend
        .push_json(STAGE_EVIDENCE_ANALYST, evidence_json(2, 1));

    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.goal_type, GoalType::Recommendation);
    assert_eq!(session.confidence, Some(80.0));
    assert_eq!(
        session.final_outcome.as_deref(),
        Some("Schedule a lunch meeting to review the new formulary tier")
    );
    assert_eq!(session.context["iterations"], 1);
    assert!(session.completed_at.is_some());

    let records = h
        .service
        .get_recommendations(&session_id)
        .await
        .expect("recommendations should load");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].iteration, 1);
    assert_eq!(records[0].subject_id, SUBJECT);

    assert_eq!(h.backend.calls(STAGE_PLANNER), 1);
    assert_eq!(h.backend.calls(STAGE_SYNTHESIZER), 1);
    assert_eq!(h.backend.calls(STAGE_REFLECTOR), 1);

    let feedback = h.store.list_feedback(&session_id).await.expect("feedback");
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].critique, "Sound but narrow.");
}

#[tokio::test]
async fn synthesis_first_runs_on_third_iteration_after_empty_evidence() {
    let h = harness(OrchestratorConfig::default());
    script_phases(&h, 80.0);
    h.backend
        .push_json(STAGE_EVIDENCE_ANALYST, evidence_json(0, 0))
        .push_json(STAGE_EVIDENCE_ANALYST, evidence_json(0, 0))
        .push_json(STAGE_EVIDENCE_ANALYST, evidence_json(3, 2));

    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.context["iterations"], 3);
    assert_eq!(h.backend.calls(STAGE_PLANNER), 3);
    assert_eq!(h.backend.calls(STAGE_EVIDENCE_ANALYST), 3);
    assert_eq!(h.backend.calls(STAGE_SYNTHESIZER), 1);

    let records = h
        .service
        .get_recommendations(&session_id)
        .await
        .expect("recommendations should load");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].iteration, 3);
}

#[tokio::test]
async fn low_confidence_keeps_iterating_until_next_to_last_turn() {
    let h = harness(OrchestratorConfig::default());
    script_phases(&h, 30.0);
    h.backend
        .respond_with(STAGE_EVIDENCE_ANALYST, respond_always(evidence_json(0, 0)));

    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    // Forced readiness from iteration 3; forced termination at max - 1.
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.confidence, Some(30.0));
    assert_eq!(session.context["iterations"], 9);
    assert_eq!(h.backend.calls(STAGE_PLANNER), 9);
    assert_eq!(h.backend.calls(STAGE_SYNTHESIZER), 7);
    assert_eq!(h.backend.calls(STAGE_REFLECTOR), 7);

    let planner_prompts = h.backend.requests(STAGE_PLANNER);
    assert!(planner_prompts[0].prompt.contains("<prior-critique>\n(none)"));
    assert!(!planner_prompts[2].prompt.contains("Sound but narrow."));
    assert!(planner_prompts[3].prompt.contains("Sound but narrow."));
    assert!(planner_prompts[1].prompt.contains("<iteration>2</iteration>"));
}

#[tokio::test]
async fn bound_reached_without_synthesis_fails_the_session() {
    let h = harness(OrchestratorConfig {
        max_iterations: 2,
        readiness_forced_iteration: 3,
        ..OrchestratorConfig::default()
    });
    script_phases(&h, 90.0);
    h.backend
        .respond_with(STAGE_EVIDENCE_ANALYST, respond_always(evidence_json(0, 0)));

    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.confidence, Some(0.0));
    assert_eq!(
        session.final_outcome.as_deref(),
        Some("no result produced within 2 iterations")
    );
    assert_eq!(h.backend.calls(STAGE_PLANNER), 2);
    assert_eq!(h.backend.calls(STAGE_SYNTHESIZER), 0);
    assert!(
        h.service
            .get_recommendations(&session_id)
            .await
            .expect("recommendations should load")
            .is_empty()
    );
}

#[tokio::test]
async fn failing_phase_marks_session_failed_with_cause() {
    let h = harness(OrchestratorConfig::default());
    script_phases(&h, 90.0);
    h.backend.push_error(
        STAGE_EVIDENCE_ANALYST,
        InferenceError::new(InferenceErrorKind::BackendPermanent, "upstream refused"),
    );

    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.confidence, Some(0.0));
    assert_eq!(session.current_phase.as_deref(), Some("failed"));
    let outcome = session.final_outcome.expect("failure reason should be stored");
    assert!(outcome.contains("upstream refused"), "outcome: {outcome}");
    assert_eq!(h.backend.calls(STAGE_SYNTHESIZER), 0);
}

#[tokio::test]
async fn schema_violation_fails_the_phase() {
    let h = harness(OrchestratorConfig::default());
    script_phases(&h, 90.0);
    h.backend.push(
        STAGE_EVIDENCE_ANALYST,
        r#"Here you go: {"rationale": "x", "key_findings": "not a list"}"#,
    );

    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    assert_eq!(session.status, SessionStatus::Failed);
    let outcome = session.final_outcome.expect("failure reason should be stored");
    assert!(outcome.contains("evidence contract"), "outcome: {outcome}");
}

#[tokio::test]
async fn slow_phase_times_out() {
    let h = harness(OrchestratorConfig {
        phase_timeout_ms: 50,
        ..OrchestratorConfig::default()
    });
    h.backend.respond_with(
        STAGE_PLANNER,
        Arc::new(|_request| {
            boxed(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(plan_json().to_string())
            })
        }),
    );

    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(
        session.final_outcome.as_deref(),
        Some("phase planning timed out after 50 ms")
    );
}
