// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
/// Query-shape tests that need a live Postgres. Run with:
///
/// ```text
/// SWARMLINK_TEST_DATABASE_URL=postgres://localhost/swarmlink_test \
///     cargo test -p swarmlink-store -- --ignored
/// ```
///
/// Each test migrates a fresh schema and cleans up after itself; they are
/// `#[ignore]`d so the default test run stays database-free.
use serde_json::json;

use swarmlink_store::models::ToolType;
use swarmlink_store::queries::{actions, messages, projects, routing, sessions};

async fn pool() -> sqlx::PgPool {
    let url = std::env::var("SWARMLINK_TEST_DATABASE_URL")
        .expect("SWARMLINK_TEST_DATABASE_URL must point at a scratch database");
    let pool = swarmlink_store::connect(&url, 5, 0).await.expect("connect");
    swarmlink_store::migrate(&pool).await.expect("migrate");
    pool
}

#[tokio::test]
#[ignore = "requires a live Postgres"]
async fn project_upsert_is_idempotent_on_path() {
    let pool = pool().await;
    let first = projects::upsert(&pool, "/tmp/it-proj/", None, &json!({"a": 1}))
        .await
        .unwrap();
    let second = projects::upsert(&pool, "/tmp/it-proj", Some("named"), &json!({"b": 2}))
        .await
        .unwrap();

    assert_eq!(first.id, second.id, "same trimmed path, same row");
    assert_eq!(second.name.as_deref(), Some("named"));
    assert_eq!(second.metadata["a"], 1, "metadata shallow-merges");
    assert_eq!(second.metadata["b"], 2);
    assert!(second.updated_at >= first.updated_at);

    projects::delete(&pool, first.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a live Postgres"]
async fn ingest_updates_counters_and_routing_scores() {
    let pool = pool().await;
    let session_id = format!("it-{}", uuid::Uuid::new_v4());

    for exit_code in [0, 0, 1] {
        actions::ingest(
            &pool,
            &actions::IngestAction {
                tool_name: "Read".into(),
                tool_type: ToolType::Builtin,
                session_id: Some(session_id.clone()),
                project_path: Some("/tmp/it-ingest".into()),
                subtask_id: None,
                input: Some("read src/main".into()),
                output: None,
                file_paths: vec!["src/main.rs".into()],
                exit_code: Some(exit_code),
                duration_ms: Some(12),
                metadata: json!({}),
            },
        )
        .await
        .unwrap();
    }

    let session = sessions::get(&pool, &session_id).await.unwrap();
    assert_eq!(session.total_tools_used, 3);
    assert_eq!(session.total_success, 2);
    assert_eq!(session.total_errors, 1);

    let suggestions = routing::suggest(
        &pool,
        &["read".into(), "src".into(), "main".into()],
        None,
        0.1,
        5,
    )
    .await
    .unwrap();
    let read = suggestions
        .iter()
        .find(|s| s.tool_name == "Read")
        .expect("Read must be suggested");
    assert!(read.score >= 0.1 && read.score <= 5.0);
    assert!(read.match_count >= 2);

    let deleted = actions::delete_by_session(&pool, &session_id).await.unwrap();
    assert_eq!(deleted, 3);
    sessions::delete(&pool, &session_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a live Postgres"]
async fn delivery_marks_readers_and_is_idempotent_on_the_unread_set() {
    let pool = pool().await;
    let reader = format!("agent-{}", uuid::Uuid::new_v4());

    let mut tx = pool.begin().await.unwrap();
    messages::insert_in_tx(
        &mut tx,
        "orc",
        None,
        "task.created",
        &json!({"content": "wave 1 started"}),
        5,
        60,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let first = messages::deliver(&pool, &reader, None, None, 100).await.unwrap();
    assert_eq!(first.len(), 1, "broadcast reaches a new reader");
    assert!(first[0].read_by.contains(&reader));

    let second = messages::deliver(&pool, &reader, None, None, 100).await.unwrap();
    assert!(second.is_empty(), "second delivery returns nothing new");

    messages::delete(&pool, first[0].id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a live Postgres"]
async fn feedback_nudges_scores_within_the_clamp() {
    let pool = pool().await;
    let keyword = format!("kw{}", uuid::Uuid::new_v4().simple());

    let mut conn = pool.acquire().await.unwrap();
    routing::record_usage(&mut conn, &[keyword.clone()], "Grep", ToolType::Builtin, true)
        .await
        .unwrap();
    drop(conn);

    let before = routing::suggest(&pool, &[keyword.clone()], None, 0.1, 1)
        .await
        .unwrap()[0]
        .score;

    routing::apply_feedback(&pool, "Grep", &[keyword.clone()], true)
        .await
        .unwrap();
    routing::apply_feedback(&pool, "Grep", &[keyword.clone()], false)
        .await
        .unwrap();

    let after = routing::suggest(&pool, &[keyword.clone()], None, 0.1, 1)
        .await
        .unwrap()[0]
        .score;
    // +0.2 then −0.1, clamped: net +0.1 unless the cap interfered.
    assert!((after - (before + 0.1)).abs() < 1e-3 || after == 5.0);
}
