use fieldpilot::{
    config::DiscoveryConfig,
    discovery::Verdict,
    generation::{STAGE_EVIDENCE_GATHERER, STAGE_HYPOTHESIS_GENERATOR},
    store::{GoalType, SessionStatus},
    testing::hypotheses_json,
};

use crate::{SEGMENTED, Scripted, evidence_by_hypothesis, harness, run_investigation};

fn ids(entries: &[fieldpilot::discovery::RankedHypothesis]) -> Vec<&str> {
    entries.iter().map(|entry| entry.id()).collect()
}

#[tokio::test]
async fn five_hypotheses_partition_into_proven_review_and_ruled_out() {
    let h = harness(DiscoveryConfig::default());
    h.backend
        .push_json(
            STAGE_HYPOTHESIS_GENERATOR,
            hypotheses_json(&[
                "Formulary tier change",
                "Competitor detailing",
                "Fewer rep visits",
                "Seasonal patient mix",
                "Guideline update",
            ]),
        )
        .respond_with(
            STAGE_EVIDENCE_GATHERER,
            evidence_by_hypothesis(&[
                ("H1", Scripted::Score(85.0, "proven")),
                ("H2", Scripted::Score(72.0, "likely")),
                ("H3", Scripted::Score(55.0, "possible")),
                ("H4", Scripted::Score(38.0, "unlikely")),
                ("H5", Scripted::Score(20.0, "disproven")),
            ]),
        );

    let session = run_investigation(&h, SEGMENTED).await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.goal_type, GoalType::Investigation);
    assert_eq!(session.confidence, Some(85.0));
    let outcome = session.final_outcome.expect("headline should be stored");
    assert!(outcome.starts_with("H1 Formulary tier change"), "{outcome}");
    assert_eq!(h.backend.calls(STAGE_EVIDENCE_GATHERER), 5);

    let summary = h
        .service
        .get_latest_investigation(SEGMENTED)
        .await
        .expect("investigation should be recorded");
    assert_eq!(summary.session_id, session.id);
    assert_eq!(ids(&summary.proven), vec!["H1", "H2"]);
    assert_eq!(ids(&summary.all_ranked), vec!["H1", "H2", "H3", "H4", "H5"]);
    assert!(!summary.is_confirmed);
    assert!(summary.confirmed.is_empty());
    assert!(summary.unavailable.is_empty());

    let record = h
        .store
        .latest_investigation(SEGMENTED)
        .await
        .expect("store read")
        .expect("record present");
    assert_eq!(ids(&record.ranking.under_review), vec!["H3"]);
    assert_eq!(ids(&record.ranking.ruled_out), vec!["H4", "H5"]);
    assert_eq!(record.headline.as_deref(), Some("H1"));
    assert_eq!(record.ranking.proven[1].score.verdict, Verdict::Likely);
    // Three of six scripted items per hypothesis claim an external source.
    assert_eq!(record.external_evidence_items, 15);
}

#[tokio::test]
async fn ranking_follows_evidence_not_generation_order() {
    let h = harness(DiscoveryConfig::default());
    h.backend
        .push_json(
            STAGE_HYPOTHESIS_GENERATOR,
            hypotheses_json(&["Access friction", "Rep turnover", "New competitor"]),
        )
        .respond_with(
            STAGE_EVIDENCE_GATHERER,
            evidence_by_hypothesis(&[
                ("H1", Scripted::Score(40.0, "possible")),
                ("H2", Scripted::Score(90.0, "proven")),
                ("H3", Scripted::Score(75.0, "likely")),
            ]),
        );

    run_investigation(&h, SEGMENTED).await;
    let summary = h
        .service
        .get_latest_investigation(SEGMENTED)
        .await
        .expect("investigation should be recorded");
    assert_eq!(ids(&summary.all_ranked), vec!["H2", "H3", "H1"]);
    assert_eq!(ids(&summary.proven), vec!["H2", "H3"]);
}

#[tokio::test]
async fn no_proven_hypothesis_still_completes_with_top_confidence() {
    let h = harness(DiscoveryConfig::default());
    h.backend
        .push_json(
            STAGE_HYPOTHESIS_GENERATOR,
            hypotheses_json(&["Access friction", "Rep turnover", "New competitor"]),
        )
        .respond_with(
            STAGE_EVIDENCE_GATHERER,
            evidence_by_hypothesis(&[
                ("H1", Scripted::Score(65.0, "possible")),
                ("H2", Scripted::Score(30.0, "unlikely")),
                ("H3", Scripted::Score(10.0, "disproven")),
            ]),
        );

    let session = run_investigation(&h, SEGMENTED).await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.confidence, Some(65.0));
    assert_eq!(
        session.final_outcome.as_deref(),
        Some("no hypothesis reached the proven threshold")
    );
    let summary = h
        .service
        .get_latest_investigation(SEGMENTED)
        .await
        .expect("investigation should be recorded");
    assert!(summary.proven.is_empty());
}

#[tokio::test]
async fn duplicate_titles_fail_the_investigation() {
    let h = harness(DiscoveryConfig::default());
    h.backend.push_json(
        STAGE_HYPOTHESIS_GENERATOR,
        hypotheses_json(&["Access friction", "access friction", "New competitor"]),
    );

    let session = run_investigation(&h, SEGMENTED).await;
    assert_eq!(session.status, SessionStatus::Failed);
    let outcome = session.final_outcome.expect("failure reason");
    assert!(outcome.contains("not distinguishable"), "{outcome}");
    assert_eq!(h.backend.calls(STAGE_EVIDENCE_GATHERER), 0);
}

#[tokio::test]
async fn too_few_hypotheses_violate_the_contract() {
    let h = harness(DiscoveryConfig::default());
    h.backend.push_json(
        STAGE_HYPOTHESIS_GENERATOR,
        hypotheses_json(&["Access friction", "Rep turnover"]),
    );

    let session = run_investigation(&h, SEGMENTED).await;
    assert_eq!(session.status, SessionStatus::Failed);
    let outcome = session.final_outcome.expect("failure reason");
    assert!(outcome.contains("hypothesis_set contract"), "{outcome}");
}
