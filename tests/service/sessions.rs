use std::sync::Arc;

use futures_util::StreamExt;
use uuid::Uuid;

use fieldpilot::{
    events::SessionEvent,
    generation::STAGE_PLANNER,
    service::ServiceError,
    store::{GoalType, JsonFileSessionStore, Session, SessionStatus, SessionStore},
};

use crate::{OTHER_SUBJECT, SUBJECT, finish, harness, harness_with_store};

#[tokio::test]
async fn pending_session_is_reused_for_a_recommendation() {
    let h = harness();
    h.store
        .create_session(Session::new(
            "pending-1".to_string(),
            SUBJECT,
            GoalType::Recommendation,
            "Prepare for next week's visit",
        ))
        .await
        .expect("create");

    let session_id = h
        .service
        .start_recommendation(SUBJECT, Some("pending-1"))
        .await
        .expect("start should succeed");
    assert_eq!(session_id, "pending-1");

    let session = finish(&h, &session_id).await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.goal_description, "Prepare for next week's visit");

    let err = h
        .service
        .start_recommendation(SUBJECT, Some("pending-1"))
        .await
        .expect_err("completed sessions cannot restart");
    assert!(matches!(err, ServiceError::SessionNotPending(_)));
}

#[tokio::test]
async fn pending_session_is_driven_by_one_controller_only() {
    let h = harness();
    h.store
        .create_session(Session::new(
            "pending-twice".to_string(),
            SUBJECT,
            GoalType::Recommendation,
            "Prepare for next week's visit",
        ))
        .await
        .expect("create");

    let (first, second) = tokio::join!(
        h.service.start_recommendation(SUBJECT, Some("pending-twice")),
        h.service.start_recommendation(SUBJECT, Some("pending-twice"))
    );
    assert_eq!(
        [first.is_ok(), second.is_ok()]
            .into_iter()
            .filter(|started| *started)
            .count(),
        1
    );
    let refused = if first.is_ok() { second } else { first };
    assert!(matches!(
        refused,
        Err(ServiceError::SessionNotPending(ref id)) if id == "pending-twice"
    ));

    let sequential = h
        .service
        .start_recommendation(SUBJECT, Some("pending-twice"))
        .await
        .expect_err("claimed session cannot start again");
    assert!(matches!(sequential, ServiceError::SessionNotPending(_)));

    let session = finish(&h, "pending-twice").await;
    assert_eq!(session.status, SessionStatus::Completed);

    let details = h
        .service
        .get_session_details("pending-twice")
        .await
        .expect("details");
    let sequences: Vec<u64> = details.thoughts.iter().map(|thought| thought.sequence).collect();
    let expected: Vec<u64> = (1..=sequences.len() as u64).collect();
    assert_eq!(sequences, expected);
    assert_eq!(details.feedback.len(), 1);
    assert_eq!(
        h.service
            .get_recommendations("pending-twice")
            .await
            .expect("recommendations")
            .len(),
        1
    );
    assert_eq!(h.backend.calls(STAGE_PLANNER), 1);
}

#[tokio::test]
async fn existing_session_must_belong_to_the_subject() {
    let h = harness();
    h.store
        .create_session(Session::new(
            "pending-2".to_string(),
            OTHER_SUBJECT,
            GoalType::Recommendation,
            "goal",
        ))
        .await
        .expect("create");

    let err = h
        .service
        .start_recommendation(SUBJECT, Some("pending-2"))
        .await
        .expect_err("subject mismatch");
    assert!(matches!(err, ServiceError::SubjectMismatch { .. }));

    let err = h
        .service
        .start_recommendation(SUBJECT, Some("missing"))
        .await
        .expect_err("unknown session");
    assert!(matches!(err, ServiceError::SessionNotFound(_)));
}

#[tokio::test]
async fn reads_are_idempotent_and_unknown_sessions_are_not_found() {
    let h = harness();
    let session_id = h
        .service
        .start_investigation(SUBJECT)
        .await
        .expect("start should succeed");
    finish(&h, &session_id).await;

    let first = h
        .service
        .get_latest_investigation(SUBJECT)
        .await
        .expect("investigation");
    let second = h
        .service
        .get_latest_investigation(SUBJECT)
        .await
        .expect("investigation again");
    assert_eq!(first, second);

    let err = h
        .service
        .get_session_details("nope")
        .await
        .expect_err("unknown session");
    assert!(matches!(err, ServiceError::SessionNotFound(ref id) if id == "nope"));
}

#[tokio::test]
async fn subscriptions_only_see_their_own_session() {
    let h = harness();
    let first = h
        .service
        .start_recommendation(SUBJECT, None)
        .await
        .expect("first start");
    let second = h
        .service
        .start_investigation(OTHER_SUBJECT)
        .await
        .expect("second start");

    let watcher = h.service.subscribe(&first);
    let dropped = h.service.subscribe(&second);
    let survivor = h.service.subscribe(&second);
    drop(dropped);

    let (first_events, second_events) = tokio::join!(
        watcher.collect::<Vec<SessionEvent>>(),
        survivor.collect::<Vec<SessionEvent>>()
    );

    assert!(!first_events.is_empty());
    assert!(first_events.iter().all(|event| event.session_id() == first));
    assert!(first_events.last().is_some_and(SessionEvent::is_terminal));

    assert!(!second_events.is_empty());
    assert!(second_events.iter().all(|event| event.session_id() == second));
    assert!(second_events.last().is_some_and(SessionEvent::is_terminal));
}

#[tokio::test]
async fn json_file_store_keeps_sessions_across_restarts() {
    let state_dir =
        std::env::temp_dir().join(format!("fieldpilot-service-test-{}", Uuid::now_v7()));
    let store: Arc<dyn SessionStore> =
        Arc::new(JsonFileSessionStore::open(&state_dir).expect("store should open"));
    let h = harness_with_store(store);

    let investigation = h
        .service
        .start_investigation(SUBJECT)
        .await
        .expect("start should succeed");
    finish(&h, &investigation).await;
    h.service
        .confirm_investigation(SUBJECT, &["H1".to_string()], "")
        .await
        .expect("confirmation should be accepted");
    let details = h
        .service
        .get_session_details(&investigation)
        .await
        .expect("details");

    let reopened = harness_with_store(Arc::new(
        JsonFileSessionStore::open(&state_dir).expect("store should reopen"),
    ));
    let reloaded = reopened
        .service
        .get_session_details(&investigation)
        .await
        .expect("details after reopen");
    assert_eq!(details, reloaded);
    assert!(reloaded.session.human_confirmed);

    let summary = reopened
        .service
        .get_latest_investigation(SUBJECT)
        .await
        .expect("investigation after reopen");
    assert!(summary.is_confirmed);

    let _ = std::fs::remove_dir_all(&state_dir);
}
