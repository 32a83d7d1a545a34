use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use sv_domain::error::{Error, Result};
use sv_domain::message::InboundMessage;
use sv_domain::stream::{BoxStream, ResponseChunk};
use sv_sessions::{
    AgentFactory, AgentProfile, AgentReply, ContextPolicy, ConversationalAgent, HistoryEntry,
    JsonlHistoryFactory, SessionHistory, SessionTable,
};

/// Echoes the message text back and records it in history.
struct Echo {
    history: Arc<dyn SessionHistory>,
}

#[async_trait::async_trait]
impl ConversationalAgent for Echo {
    fn profile(&self) -> AgentProfile {
        AgentProfile {
            name: "echo".into(),
            description: "echoes".into(),
            tools: Vec::new(),
        }
    }

    async fn respond(&self, message: InboundMessage) -> Result<AgentReply> {
        let text = message.text_content();
        self.history
            .append(&[HistoryEntry::new("user", &text)])
            .await?;
        Ok(AgentReply {
            content: text,
            tools_used: Vec::new(),
        })
    }

    async fn respond_stream(
        &self,
        _message: InboundMessage,
    ) -> Result<BoxStream<'static, ResponseChunk>> {
        Err(Error::Agent("unsupported".into()))
    }
}

/// Counts builds and sleeps inside construction to widen the race window.
#[derive(Default)]
struct SlowCounting {
    built: AtomicUsize,
}

impl AgentFactory for SlowCounting {
    fn build(
        &self,
        history: Arc<dyn SessionHistory>,
        _policy: &ContextPolicy,
    ) -> Result<Arc<dyn ConversationalAgent>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        Ok(Arc::new(Echo { history }))
    }
}

struct Failing;

impl AgentFactory for Failing {
    fn build(
        &self,
        _history: Arc<dyn SessionHistory>,
        _policy: &ContextPolicy,
    ) -> Result<Arc<dyn ConversationalAgent>> {
        Err(Error::Provider {
            provider: "test".into(),
            message: "model unavailable".into(),
        })
    }
}

fn table(root: &Path, agents: Arc<dyn AgentFactory>) -> Arc<SessionTable> {
    Arc::new(SessionTable::new(
        root,
        ContextPolicy::default(),
        Arc::new(JsonlHistoryFactory),
        agents,
    ))
}

#[test]
fn concurrent_first_references_build_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(SlowCounting::default());
    let table = table(dir.path(), factory.clone());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let table = table.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                table.get_or_create("bob").unwrap()
            })
        })
        .collect();
    let records: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(Arc::ptr_eq(&records[0], &records[1]));
    assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    assert_eq!(table.list_ids(), vec!["bob".to_string()]);
}

#[test]
fn failed_construction_leaves_table_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let table = table(dir.path(), Arc::new(Failing));

    let err = table.get_or_create("dave").unwrap_err();
    match err {
        Error::SessionConstruction { session_id, message } => {
            assert_eq!(session_id, "dave");
            assert!(message.contains("model unavailable"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(table.count(), 0);
    assert!(!table.contains("dave"));
}

#[tokio::test]
async fn sessions_keep_separate_histories() {
    let dir = tempfile::tempdir().unwrap();
    let table = table(dir.path(), Arc::new(SlowCounting::default()));

    let alice = table.get_or_create("alice").unwrap();
    let bob = table.get_or_create("bob").unwrap();
    alice.agent.respond("from alice".into()).await.unwrap();
    bob.agent.respond("from bob".into()).await.unwrap();

    let alice_lines = alice.history.load().await.unwrap();
    assert_eq!(alice_lines.len(), 1);
    assert_eq!(alice_lines[0].content, "from alice");
    assert_eq!(bob.history.load().await.unwrap()[0].content, "from bob");
}

#[tokio::test]
async fn dispose_removes_record_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let table = table(dir.path(), Arc::new(SlowCounting::default()));

    let record = table.get_or_create("auto-173").unwrap();
    record.agent.respond("check inbox".into()).await.unwrap();
    let artifact = dir.path().join("auto-173.jsonl");
    assert!(artifact.exists());

    assert!(table.dispose("auto-173").unwrap());
    assert!(!table.list_ids().contains(&"auto-173".to_string()));
    assert!(!artifact.exists());
}
