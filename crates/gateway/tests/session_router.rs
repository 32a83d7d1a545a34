mod common;

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::json;

use sv_domain::config::{SessionsConfig, TaskIdRouting};
use sv_domain::error::Error;
use sv_domain::message::{CallHints, InboundMessage};
use sv_domain::stream::ResponseChunk;
use sv_gateway::runtime::SessionRouter;
use sv_sessions::SessionHistory;

use common::{table, RecordingFactory, Unavailable};

fn router(root: &std::path::Path, agents: Arc<RecordingFactory>) -> SessionRouter {
    SessionRouter::from_config(table(root, agents), &SessionsConfig::default())
}

#[tokio::test]
async fn directive_routes_and_is_stripped() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let router = router(dir.path(), agents.clone());

    let routed = router
        .respond(
            InboundMessage::from("session_id: alice-1\n\nShow EC2 alarms"),
            &CallHints::default(),
        )
        .await
        .unwrap();

    assert_eq!(routed.session_id, "alice-1");
    assert_eq!(routed.reply.content, "alice-1: Show EC2 alarms");
    assert_eq!(
        agents.received(),
        vec![("alice-1".to_string(), "Show EC2 alarms".to_string())]
    );
    assert!(dir.path().join("alice-1.jsonl").exists());
}

#[tokio::test]
async fn hint_beats_directive_and_leaves_text_alone() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let router = router(dir.path(), agents.clone());

    let routed = router
        .respond(
            InboundMessage::from("session_id: other check disk"),
            &CallHints::with_context_id("ctx-7"),
        )
        .await
        .unwrap();

    assert_eq!(routed.session_id, "ctx-7");
    assert_eq!(agents.received()[0].1, "session_id: other check disk");
}

#[tokio::test]
async fn mapping_context_id_selects_session() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path(), Arc::new(RecordingFactory::default()));

    let message = InboundMessage::from_json(json!({
        "contextId": "ops-room",
        "parts": [{ "kind": "text", "text": "restart nginx" }],
    }));
    let routed = router.respond(message, &CallHints::default()).await.unwrap();
    assert_eq!(routed.session_id, "ops-room");
}

#[tokio::test]
async fn unidentified_messages_share_default_session() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let router = router(dir.path(), agents.clone());

    for text in ["first question", "second question"] {
        let routed = router
            .respond(InboundMessage::from(text), &CallHints::default())
            .await
            .unwrap();
        assert_eq!(routed.session_id, "default");
    }

    assert_eq!(agents.built(), 1);
    assert_eq!(router.table().list_ids(), vec!["default".to_string()]);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let router = router(dir.path(), agents.clone());

    router
        .respond(InboundMessage::from("session_id: a hello"), &CallHints::default())
        .await
        .unwrap();
    router
        .respond(InboundMessage::from("session_id: b hello"), &CallHints::default())
        .await
        .unwrap();

    assert_eq!(agents.built(), 2);
    let a = router.table().get("a").unwrap();
    let b = router.table().get("b").unwrap();
    assert!(!Arc::ptr_eq(&a.agent, &b.agent));
    assert_eq!(a.history.load().await.unwrap().len(), 1);
    assert_eq!(b.history.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn task_id_is_ignored_unless_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let hints = CallHints {
        context_id: None,
        task_id: Some("task-42".into()),
    };

    let ignoring = router(dir.path(), Arc::new(RecordingFactory::default()));
    let routed = ignoring
        .respond(InboundMessage::from("status?"), &hints)
        .await
        .unwrap();
    assert_eq!(routed.session_id, "default");

    let cfg = SessionsConfig {
        task_id_routing: TaskIdRouting::Fallback,
        ..SessionsConfig::default()
    };
    let following = SessionRouter::from_config(
        table(dir.path(), Arc::new(RecordingFactory::default())),
        &cfg,
    );
    let routed = following
        .respond(InboundMessage::from("status?"), &hints)
        .await
        .unwrap();
    assert_eq!(routed.session_id, "task-42");
}

#[tokio::test]
async fn stream_preserves_chunk_order() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path(), Arc::new(RecordingFactory::default()));

    let routed = router
        .respond_stream(InboundMessage::from("session_id: carl go"), &CallHints::default())
        .await
        .unwrap();
    assert_eq!(routed.session_id, "carl");

    let chunks: Vec<ResponseChunk> = routed.stream.collect().await;
    assert_eq!(
        chunks,
        vec![
            ResponseChunk::Delta { text: "c1".into() },
            ResponseChunk::Delta { text: "c2".into() },
            ResponseChunk::Delta { text: "c3".into() },
            ResponseChunk::Final { content: "c1c2c3".into() },
        ]
    );
}

#[tokio::test]
async fn introspection_uses_default_session() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path(), Arc::new(RecordingFactory::default()));
    assert!(router.table().list_ids().is_empty());

    let profile = router.introspect().unwrap();
    assert_eq!(profile.name, "DevOps Supervisor");
    assert_eq!(profile.tools[0].name, "aws_cloudwatch_tool");
    assert_eq!(router.table().list_ids(), vec!["default".to_string()]);
}

#[tokio::test]
async fn construction_failure_surfaces_and_inserts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let router = SessionRouter::from_config(
        table(dir.path(), Arc::new(Unavailable)),
        &SessionsConfig::default(),
    );

    let err = router
        .respond(InboundMessage::from("session_id: dave hi"), &CallHints::default())
        .await
        .unwrap_err();
    match err {
        Error::SessionConstruction { session_id, .. } => assert_eq!(session_id, "dave"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(router.table().count(), 0);
}
