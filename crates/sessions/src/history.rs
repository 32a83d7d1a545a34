//! Per-session conversation history.
//!
//! Each session owns one [`SessionHistory`] handle. The default store writes
//! an append-only `<session>.jsonl` file under the storage root and keeps a
//! write-through cache so reads never hit disk after the first load.
//! Summaries are appended as marker lines, never rewritten in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sv_domain::error::{Error, Result};
use sv_domain::trace::TraceEvent;

/// A single history line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl HistoryEntry {
    /// Create an entry stamped with the current time.
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            role: role.to_owned(),
            content: content.to_owned(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether this line is a summary that replaces everything before it.
    pub fn is_summary(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("summary"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Persistence handle owned by one session.
#[async_trait::async_trait]
pub trait SessionHistory: Send + Sync {
    fn session_id(&self) -> &str;

    /// Human-readable location of the persisted artifact, for logs.
    fn location(&self) -> String;

    async fn load(&self) -> Result<Vec<HistoryEntry>>;

    async fn append(&self, entries: &[HistoryEntry]) -> Result<()>;

    /// Delete the persisted artifact. Returns `false` when nothing existed.
    ///
    /// Synchronous so it can run from drop guards.
    fn purge(&self) -> Result<bool>;
}

/// Opens the history handle for a session.
pub trait HistoryFactory: Send + Sync {
    fn open(&self, session_id: &str, storage_root: &Path) -> Result<Arc<dyn SessionHistory>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSONL store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opens [`JsonlHistory`] handles. Creates the storage root on first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonlHistoryFactory;

impl HistoryFactory for JsonlHistoryFactory {
    fn open(&self, session_id: &str, storage_root: &Path) -> Result<Arc<dyn SessionHistory>> {
        if session_id.is_empty() {
            return Err(Error::Other("session id must not be empty".into()));
        }
        std::fs::create_dir_all(storage_root)?;
        Ok(Arc::new(JsonlHistory::new(session_id, storage_root)))
    }
}

impl JsonlHistoryFactory {
    /// Session ids with a history file under `storage_root`, sorted.
    pub fn list_session_ids(storage_root: &Path) -> Result<Vec<String>> {
        if !storage_root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(storage_root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(decode_file_stem(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

pub struct JsonlHistory {
    session_id: String,
    path: PathBuf,
    cache: RwLock<Option<Vec<HistoryEntry>>>,
    /// Set by `purge`. Writes check it under the same lock, so a write that
    /// was already in flight can never recreate a purged file.
    retired: Arc<Mutex<bool>>,
}

impl JsonlHistory {
    pub fn new(session_id: &str, storage_root: &Path) -> Self {
        Self {
            session_id: session_id.to_owned(),
            path: storage_root.join(format!("{}.jsonl", encode_file_stem(session_id))),
            cache: RwLock::new(None),
            retired: Arc::new(Mutex::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SessionHistory for JsonlHistory {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        let cached = self.cache.read().clone();
        if let Some(lines) = cached {
            return Ok(lines);
        }

        let path = self.path.clone();
        let sid = self.session_id.clone();
        let lines = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &sid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        *self.cache.write() = Some(lines.clone());
        Ok(lines)
    }

    async fn append(&self, entries: &[HistoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let buf = serialize_lines(entries)?;
        let path = self.path.clone();
        let retired = self.retired.clone();
        let sid = self.session_id.clone();

        // Disk first; the cache only reflects lines that were written.
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let retired = retired.lock();
            if *retired {
                return Err(Error::SessionNotFound(sid));
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(buf.as_bytes())?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        if let Some(cached) = self.cache.write().as_mut() {
            cached.extend(entries.iter().cloned());
        }

        TraceEvent::HistoryAppend {
            session_id: self.session_id.clone(),
            lines: entries.len(),
        }
        .emit();

        Ok(())
    }

    fn purge(&self) -> Result<bool> {
        let mut retired = self.retired.lock();
        *retired = true;
        *self.cache.write() = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

// ── Private helpers ─────────────────────────────────────────────────

fn serialize_lines(lines: &[HistoryEntry]) -> Result<String> {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(&serde_json::to_string(line)?);
        buf.push('\n');
    }
    Ok(buf)
}

fn read_jsonl_file(path: &Path, session_id: &str) -> Result<Vec<HistoryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => lines.push(entry),
            Err(e) => {
                tracing::warn!(
                    session_id = session_id,
                    error = %e,
                    "skipping malformed history line"
                );
            }
        }
    }
    Ok(lines)
}

/// Session ids are arbitrary strings; file names keep `[A-Za-z0-9_-]` and
/// percent-encode every other byte.
fn encode_file_stem(session_id: &str) -> String {
    let mut out = String::with_capacity(session_id.len());
    for b in session_id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_file_stem(stem: &str) -> String {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
