//! Process-wide session table.
//!
//! Maps each session identifier to its agent and history handle. Records are
//! created lazily on first reference, under a single lock, so two concurrent
//! first references to the same id always observe one record and the
//! factories run once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use sv_domain::error::{Error, Result};
use sv_domain::trace::TraceEvent;

use crate::agent::{AgentFactory, ConversationalAgent};
use crate::history::{HistoryFactory, SessionHistory};
use crate::policy::ContextPolicy;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One live session.
pub struct SessionRecord {
    pub id: String,
    pub agent: Arc<dyn ConversationalAgent>,
    pub history: Arc<dyn SessionHistory>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("history", &self.history.location())
            .field("created_at", &self.created_at)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionTable {
    storage_root: PathBuf,
    policy: ContextPolicy,
    histories: Arc<dyn HistoryFactory>,
    agents: Arc<dyn AgentFactory>,
    records: Mutex<HashMap<String, Arc<SessionRecord>>>,
}

impl SessionTable {
    pub fn new(
        storage_root: impl Into<PathBuf>,
        policy: ContextPolicy,
        histories: Arc<dyn HistoryFactory>,
        agents: Arc<dyn AgentFactory>,
    ) -> Self {
        Self {
            storage_root: storage_root.into(),
            policy,
            histories,
            agents,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn policy(&self) -> &ContextPolicy {
        &self.policy
    }

    /// Return the record for `id`, constructing it on first reference.
    ///
    /// Construction happens while the lock is held; if either factory fails
    /// the error is returned and nothing is inserted.
    pub fn get_or_create(&self, id: &str) -> Result<Arc<SessionRecord>> {
        let mut records = self.records.lock();
        if let Some(record) = records.get(id) {
            return Ok(record.clone());
        }

        let construction_error = |e: Error| Error::SessionConstruction {
            session_id: id.to_owned(),
            message: e.to_string(),
        };
        let history = self
            .histories
            .open(id, &self.storage_root)
            .map_err(construction_error)?;
        let agent = self
            .agents
            .build(history.clone(), &self.policy)
            .map_err(construction_error)?;

        let record = Arc::new(SessionRecord {
            id: id.to_owned(),
            agent,
            history,
            created_at: Utc::now(),
        });
        records.insert(id.to_owned(), record.clone());
        let total = records.len();
        drop(records);

        tracing::info!(
            session_id = id,
            history = %record.history.location(),
            sessions = total,
            "session created"
        );
        TraceEvent::SessionCreated {
            session_id: id.to_owned(),
            total_sessions: total,
        }
        .emit();

        Ok(record)
    }

    /// Look up a live record without creating one.
    pub fn get(&self, id: &str) -> Option<Arc<SessionRecord>> {
        self.records.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.lock().contains_key(id)
    }

    /// Snapshot of live session ids, sorted.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }

    /// Remove a session and delete its persisted history.
    ///
    /// The in-memory record is always removed first. When the id is not
    /// live, a history handle is still opened so a leftover artifact gets
    /// deleted. Returns whether an artifact was removed.
    pub fn dispose(&self, id: &str) -> Result<bool> {
        let removed = self.records.lock().remove(id);
        let history = match &removed {
            Some(record) => record.history.clone(),
            None => self.histories.open(id, &self.storage_root)?,
        };
        let artifact_removed = history.purge()?;

        tracing::debug!(
            session_id = id,
            was_live = removed.is_some(),
            artifact_removed,
            "session disposed"
        );
        TraceEvent::SessionDisposed {
            session_id: id.to_owned(),
            artifact_removed,
        }
        .emit();

        Ok(artifact_removed)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentProfile, AgentReply};
    use crate::history::JsonlHistoryFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use sv_domain::message::InboundMessage;
    use sv_domain::stream::{BoxStream, ResponseChunk};

    struct Silent;

    #[async_trait::async_trait]
    impl ConversationalAgent for Silent {
        fn profile(&self) -> AgentProfile {
            AgentProfile {
                name: "silent".into(),
                description: String::new(),
                tools: Vec::new(),
            }
        }
        async fn respond(&self, _message: InboundMessage) -> Result<AgentReply> {
            Ok(AgentReply {
                content: String::new(),
                tools_used: Vec::new(),
            })
        }
        async fn respond_stream(
            &self,
            _message: InboundMessage,
        ) -> Result<BoxStream<'static, ResponseChunk>> {
            Err(Error::Agent("not streaming".into()))
        }
    }

    #[derive(Default)]
    struct Counting {
        built: AtomicUsize,
    }

    impl AgentFactory for Counting {
        fn build(
            &self,
            _history: Arc<dyn SessionHistory>,
            _policy: &ContextPolicy,
        ) -> Result<Arc<dyn ConversationalAgent>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Silent))
        }
    }

    fn table(dir: &Path, agents: Arc<dyn AgentFactory>) -> SessionTable {
        SessionTable::new(
            dir,
            ContextPolicy::default(),
            Arc::new(JsonlHistoryFactory),
            agents,
        )
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(Counting::default());
        let table = table(dir.path(), factory.clone());

        let a = table.get_or_create("alice-1").unwrap();
        let b = table.get_or_create("alice-1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn list_ids_is_sorted_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path(), Arc::new(Counting::default()));
        table.get_or_create("zed").unwrap();
        table.get_or_create("default").unwrap();
        assert_eq!(table.list_ids(), vec!["default".to_string(), "zed".to_string()]);
    }

    #[test]
    fn dispose_unknown_id_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = table(dir.path(), Arc::new(Counting::default()));
        assert!(!table.dispose("never-seen").unwrap());
    }
}
