//! Concurrency tests for the evidence catalog and ingestion controller.
//!
//! These tests verify that race conditions are handled correctly: the
//! unique digest index serializes concurrent artifact creation, and the
//! guarded status transition lets exactly one complete win per session.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{test_app, HELLO, HELLO_DIGEST};
use evidence_service::db::{self, ArtifactRow, SessionStatus};
use evidence_service::ingest;
use serde_json::json;
use sqlx::PgPool;
use tokio::task::JoinSet;
use uuid::Uuid;

fn artifact_row(digest: &str) -> ArtifactRow {
    let now = Utc::now();
    ArtifactRow {
        id: Uuid::new_v4(),
        digest: digest.to_string(),
        size_bytes: 12,
        mime: "application/pdf".to_string(),
        filename: "e.pdf".to_string(),
        bucket_key: format!("sha256/{}/{}/{}/e.pdf", &digest[0..2], &digest[2..4], digest),
        cid_v1: None,
        uploader_org_id: None,
        project_id: None,
        issuance_id: None,
        meta_json: None,
        verified_at: now,
        scan_status: "PENDING".to_string(),
        created_at: now,
    }
}

#[sqlx::test]
async fn test_concurrent_artifact_creation_with_same_digest(pool: PgPool) {
    // Spawn 10 tasks inserting the same digest concurrently.
    // Exactly 1 creates; the other 9 get the winner's row back.

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let pool = pool.clone();
        tasks.spawn(async move {
            let row = artifact_row(HELLO_DIGEST);
            db::create_artifact_if_absent(&pool, &row).await
        });
    }

    let mut created = 0;
    let mut existing_ids = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let (artifact, was_created) = result.unwrap().unwrap();
        if was_created {
            created += 1;
        } else {
            existing_ids.push(artifact.id);
        }
    }

    assert_eq!(created, 1, "Expected exactly 1 insert to win");
    assert_eq!(existing_ids.len(), 9);

    let winner = db::find_artifact_by_digest(&pool, HELLO_DIGEST)
        .await
        .unwrap()
        .unwrap();
    assert!(existing_ids.iter().all(|id| *id == winner.id));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test]
async fn test_concurrent_session_transitions(pool: PgPool) {
    // One PENDING session, 10 concurrent PENDING→COMPLETE transitions.
    // Exactly 1 may win; the rest observe the terminal state.

    let app = test_app(pool.clone()).await;
    let (status, init) = app
        .hmac_request("portal", Method::POST, "/v1/upload/init", &json!({ "filename": "e.pdf" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let upload_id: Uuid = serde_json::from_value(init["uploadId"].clone()).unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let pool = pool.clone();
        tasks.spawn(async move {
            db::transition_session(
                &pool,
                upload_id,
                SessionStatus::Pending,
                SessionStatus::Complete,
                Some(Utc::now()),
                None,
            )
            .await
        });
    }

    let mut wins = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1, "Expected exactly 1 winning transition");

    let session = db::find_session(&pool, upload_id).await.unwrap().unwrap();
    assert_eq!(session.status, "COMPLETE");
}

#[sqlx::test]
async fn test_concurrent_completes_of_identical_content(pool: PgPool) {
    // N distinct sessions whose bytes hash to the same digest: exactly one
    // artifact is created and every completion reports its id.

    let app = test_app(pool.clone()).await;
    let mut sessions = Vec::new();
    for i in 0..4 {
        let (status, init) = app
            .hmac_request(
                "portal",
                Method::POST,
                "/v1/upload/init",
                &json!({ "filename": format!("copy-{}.pdf", i) }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        app.put_object(init["bucketKey"].as_str().unwrap(), HELLO).await;
        let upload_id: Uuid = serde_json::from_value(init["uploadId"].clone()).unwrap();
        sessions.push((upload_id, init["token"].as_str().unwrap().to_string()));
    }

    let mut tasks = JoinSet::new();
    for (upload_id, token) in sessions {
        let state = app.state.clone();
        tasks.spawn(async move { ingest::complete_upload(&state, upload_id, &token).await });
    }

    let mut artifact_ids = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let outcome = result.unwrap().unwrap();
        assert_eq!(outcome.artifact.digest, HELLO_DIGEST);
        artifact_ids.push(outcome.artifact.id);
    }

    assert_eq!(artifact_ids.len(), 4);
    assert!(
        artifact_ids.iter().all(|id| *id == artifact_ids[0]),
        "all completions must converge on one artifact"
    );

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test]
async fn test_concurrent_completes_of_same_session(pool: PgPool) {
    // Two complete calls race on one session; both return the same
    // artifact and the session settles exactly once.

    let app = test_app(pool.clone()).await;
    let (status, init) = app
        .hmac_request("portal", Method::POST, "/v1/upload/init", &json!({ "filename": "e.pdf" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    app.put_object(init["bucketKey"].as_str().unwrap(), HELLO).await;
    let upload_id: Uuid = serde_json::from_value(init["uploadId"].clone()).unwrap();
    let token = init["token"].as_str().unwrap().to_string();

    let mut tasks = JoinSet::new();
    for _ in 0..2 {
        let state = app.state.clone();
        let token = token.clone();
        tasks.spawn(async move { ingest::complete_upload(&state, upload_id, &token).await });
    }

    let mut artifact_ids = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let outcome = result.unwrap().unwrap();
        artifact_ids.push(outcome.artifact.id);
    }
    assert_eq!(artifact_ids[0], artifact_ids[1]);

    let session = db::find_session(&pool, upload_id).await.unwrap().unwrap();
    assert_eq!(session.status, "COMPLETE");
    assert_eq!(session.artifact_id, Some(artifact_ids[0]));
}
