mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sv_domain::config::{PollerConfig, PollerSessionMode, SupervisorConfig};
use sv_domain::error::Result;
use sv_domain::stream::{BoxStream, StreamEvent};
use sv_domain::tool::ToolDefinition;
use sv_gateway::runtime::{BackgroundPoller, SupervisorFactory, TurnSettings};
use sv_providers::{ChatRequest, ChatResponse, LanguageModel};
use sv_sessions::SessionHistory;
use sv_tools::{ToolRegistry, WorkerTool};

use common::{table, RecordingFactory};

fn config(mode: PollerSessionMode, instruction: &str) -> PollerConfig {
    PollerConfig {
        interval_secs: 60,
        session_mode: mode,
        instruction: instruction.into(),
        ..PollerConfig::default()
    }
}

struct Email {
    definition: ToolDefinition,
}

#[async_trait::async_trait]
impl WorkerTool for Email {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(&self, _query: &str) -> Result<String> {
        Ok("no new mail".into())
    }
}

/// Takes `delay` before answering and counts the streams it finished.
struct SlowModel {
    delay: Duration,
    finished: AtomicUsize,
}

#[async_trait::async_trait]
impl LanguageModel for SlowModel {
    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse::default())
    }

    async fn chat_stream(
        &self,
        _req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        let events = vec![
            StreamEvent::Token {
                text: "Inbox is empty.".into(),
            },
            StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            },
        ];
        Ok(Box::pin(futures_util::stream::iter(events.into_iter().map(Ok))))
    }

    fn provider_id(&self) -> &str {
        "slow"
    }

    fn model_id(&self) -> &str {
        "slow-1"
    }
}

#[test]
fn disabled_when_interval_is_zero_or_worker_missing() {
    let empty = ToolRegistry::new();
    let mut with_email = ToolRegistry::new();
    with_email.register(Arc::new(Email {
        definition: ToolDefinition::query_tool("email_tool", "Reads and sends email"),
    }));

    let off = PollerConfig {
        interval_secs: 0,
        ..PollerConfig::default()
    };
    assert!(BackgroundPoller::disabled_reason(&off, &with_email).is_some());

    let reason = BackgroundPoller::disabled_reason(&PollerConfig::default(), &empty).unwrap();
    assert!(reason.contains("email_tool"));

    assert!(BackgroundPoller::disabled_reason(&PollerConfig::default(), &with_email).is_none());

    let unconditional = PollerConfig {
        requires_worker: None,
        ..PollerConfig::default()
    };
    assert!(BackgroundPoller::disabled_reason(&unconditional, &empty).is_none());
}

#[tokio::test]
async fn shared_cycle_reuses_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let table = table(dir.path(), agents.clone());
    let poller = BackgroundPoller::new(table.clone(), config(PollerSessionMode::Shared, "check inbox"));

    poller.run_cycle().await.unwrap();
    poller.run_cycle().await.unwrap();

    assert_eq!(agents.built(), 1);
    assert_eq!(
        table.list_ids(),
        vec!["devops-supervisor-autonomous".to_string()]
    );
    let record = table.get("devops-supervisor-autonomous").unwrap();
    assert_eq!(record.history.load().await.unwrap().len(), 2);
}

#[tokio::test]
async fn ephemeral_cycle_disposes_session() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let table = table(dir.path(), agents.clone());
    let poller =
        BackgroundPoller::new(table.clone(), config(PollerSessionMode::Ephemeral, "check inbox"));

    poller.run_cycle().await.unwrap();

    let received = agents.received();
    assert_eq!(received.len(), 1);
    assert!(received[0].0.starts_with("auto-"));
    assert_eq!(table.count(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_ephemeral_cycle_still_disposes_session() {
    let dir = tempfile::tempdir().unwrap();
    let table = table(dir.path(), Arc::new(RecordingFactory::default()));
    let poller =
        BackgroundPoller::new(table.clone(), config(PollerSessionMode::Ephemeral, "fail now"));

    let err = poller.run_cycle_in("auto-173", true).await.unwrap_err();
    assert!(err.to_string().contains("refused"));

    assert!(!table.contains("auto-173"));
    assert!(!dir.path().join("auto-173.jsonl").exists());
}

#[tokio::test]
async fn cancelled_ephemeral_cycle_stops_turn_and_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(SlowModel {
        delay: Duration::from_millis(300),
        finished: AtomicUsize::new(0),
    });
    let factory = SupervisorFactory::new(
        &SupervisorConfig::default(),
        TurnSettings {
            temperature: None,
            max_tokens: None,
            max_tool_loops: 4,
        },
        model.clone(),
        Arc::new(ToolRegistry::new()),
    );
    let table = table(dir.path(), Arc::new(factory));
    let poller =
        BackgroundPoller::new(table.clone(), config(PollerSessionMode::Ephemeral, "check inbox"));

    let cut = tokio::time::timeout(
        Duration::from_millis(100),
        poller.run_cycle_in("auto-173", true),
    )
    .await;
    assert!(cut.is_err(), "cycle should still be waiting on the model");
    assert!(!table.list_ids().contains(&"auto-173".to_string()));

    // Well past the point where the model would have answered.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(model.finished.load(Ordering::SeqCst), 0);
    assert!(!table.list_ids().contains(&"auto-173".to_string()));
    assert!(!dir.path().join("auto-173.jsonl").exists());
}

#[tokio::test]
async fn ephemeral_cleanup_removes_leftover_artifact() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("auto-9.jsonl"), "").unwrap();
    let table = table(dir.path(), Arc::new(common::Unavailable));
    let poller =
        BackgroundPoller::new(table.clone(), config(PollerSessionMode::Ephemeral, "check inbox"));

    assert!(poller.run_cycle_in("auto-9", true).await.is_err());
    assert!(!dir.path().join("auto-9.jsonl").exists());
}

#[tokio::test(start_paused = true)]
async fn loop_sleeps_before_each_cycle_and_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let table = table(dir.path(), agents.clone());
    let poller = BackgroundPoller::new(table.clone(), config(PollerSessionMode::Shared, "check inbox"));

    let cancel = CancellationToken::new();
    let task = poller.spawn(cancel.clone());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(agents.received().is_empty());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(agents.received().len(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(agents.received().len(), 2);

    cancel.cancel();
    task.await.unwrap();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(agents.received().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn loop_survives_failing_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let agents = Arc::new(RecordingFactory::default());
    let table = table(dir.path(), agents.clone());
    let poller = BackgroundPoller::new(table, config(PollerSessionMode::Shared, "fail always"));

    let cancel = CancellationToken::new();
    let task = poller.spawn(cancel.clone());
    tokio::time::sleep(Duration::from_secs(210)).await;
    assert_eq!(agents.received().len(), 3);

    cancel.cancel();
    task.await.unwrap();
}
