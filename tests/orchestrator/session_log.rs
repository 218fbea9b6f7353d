use futures_util::StreamExt;

use fieldpilot::{
    config::OrchestratorConfig,
    events::SessionEvent,
    generation::{STAGE_EVIDENCE_ANALYST, STAGE_PLANNER, STAGE_REFLECTOR, STAGE_SYNTHESIZER},
    store::{AgentType, SessionStatus},
    testing::{evidence_json, plan_json, recommendation_json, reflection_json, respond_always},
};

use crate::{Harness, SUBJECT, harness};

fn scripted_harness() -> Harness {
    let h = harness(OrchestratorConfig::default());
    h.backend
        .respond_with(STAGE_PLANNER, respond_always(plan_json()))
        .respond_with(STAGE_EVIDENCE_ANALYST, respond_always(evidence_json(2, 1)))
        .respond_with(STAGE_SYNTHESIZER, respond_always(recommendation_json(70.0)))
        .respond_with(STAGE_REFLECTOR, respond_always(reflection_json(85.0)));
    h
}

#[tokio::test]
async fn thought_sequences_start_at_one_and_strictly_increase() {
    let h = scripted_harness();
    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    h.service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");

    let details = h
        .service
        .get_session_details(&session_id)
        .await
        .expect("details should load");
    let sequences: Vec<u64> = details.thoughts.iter().map(|t| t.sequence).collect();
    assert_eq!(sequences, (1..=sequences.len() as u64).collect::<Vec<_>>());
    assert_eq!(
        details
            .thoughts
            .iter()
            .map(|t| t.agent_type)
            .collect::<Vec<_>>(),
        vec![
            AgentType::Planner,
            AgentType::EvidenceAnalyst,
            AgentType::Synthesizer,
            AgentType::Reflector,
        ]
    );
    assert!(details.thoughts.iter().all(|t| t.session_id == session_id));

    let query_actions = details
        .actions
        .iter()
        .filter(|action| action.action_type == "data_query")
        .count();
    assert_eq!(query_actions, 3);
    assert!(
        details
            .actions
            .iter()
            .any(|action| action.action_type == "create_recommendation" && action.success)
    );
    assert_eq!(details.feedback.len(), 1);

    let again = h
        .service
        .get_session_details(&session_id)
        .await
        .expect("details should load twice");
    assert_eq!(details, again);
}

#[tokio::test]
async fn subscriber_sees_phases_in_order_then_completion() {
    let h = scripted_harness();
    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    let events: Vec<SessionEvent> = h.service.subscribe(&session_id).collect().await;

    let phases: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::PhaseChanged { phase, .. } => Some(phase.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            "planning",
            "evidence_gathering",
            "readiness_check",
            "synthesizing",
            "reflecting",
            "termination_check",
        ]
    );
    let last = events.last().expect("stream should carry events");
    assert!(last.is_terminal());
    match last {
        SessionEvent::Completed {
            status, confidence, ..
        } => {
            assert_eq!(*status, SessionStatus::Completed);
            assert_eq!(*confidence, Some(85.0));
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(events.iter().all(|event| event.session_id() == session_id));

    // Finished sessions yield an already-ended stream.
    let late: Vec<SessionEvent> = h.service.subscribe(&session_id).collect().await;
    assert!(late.is_empty());
}

#[tokio::test]
async fn cancelled_session_stops_before_the_next_phase() {
    let h = scripted_harness();
    let session_id = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("start should succeed");
    assert!(
        h.service
            .cancel_session(&session_id)
            .await
            .expect("cancel should succeed")
    );

    let session = h
        .service
        .wait_for_completion(&session_id)
        .await
        .expect("session should finish");
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.final_outcome.as_deref(), Some("cancelled"));
    assert_eq!(h.backend.calls(STAGE_PLANNER), 0);

    assert!(
        !h.service
            .cancel_session(&session_id)
            .await
            .expect("finished sessions can be asked again")
    );
}

#[tokio::test]
async fn concurrent_sessions_keep_separate_logs() {
    let h = scripted_harness();
    let first = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("first start");
    let second = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("second start");
    assert_ne!(first, second);

    for session_id in [&first, &second] {
        let session = h
            .service
            .wait_for_completion(session_id)
            .await
            .expect("session should finish");
        assert_eq!(session.status, SessionStatus::Completed);

        let details = h
            .service
            .get_session_details(session_id)
            .await
            .expect("details should load");
        assert_eq!(details.thoughts.len(), 4);
        assert_eq!(details.thoughts[0].sequence, 1);
        assert!(details.thoughts.iter().all(|t| &t.session_id == session_id));
    }
}
