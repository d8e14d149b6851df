//! Shared fixtures for session integration tests.
//!
//! Tests run on a paused tokio clock: `sleep` advances virtual time, so
//! debounce and presence timers fire deterministically.

use notesync::config::SyncConfig;
use notesync::{ClientId, DocPath, MemoryStore, NoteSession};
use notesync_core::WriteOp;
use std::sync::Arc;
use std::time::Duration;

/// Default debounce idle period.
#[allow(dead_code)] // Used by timing tests only
pub(crate) const IDLE: Duration = Duration::from_millis(1000);
/// Default typing settle period.
#[allow(dead_code)] // Used by timing tests only
pub(crate) const SETTLE: Duration = Duration::from_millis(2000);

pub(crate) fn shared_note() -> DocPath {
    DocPath::new("notes", "shared_note").unwrap()
}

#[allow(dead_code)] // Used by presence tests only
pub(crate) fn presence_flag() -> DocPath {
    DocPath::new("notes", "shared_note_typing").unwrap()
}

/// Opens a session on the shared note as `client`.
pub(crate) fn open(store: &Arc<MemoryStore>, client: &str) -> NoteSession {
    NoteSession::open_as(
        store.clone(),
        shared_note(),
        SyncConfig::default(),
        ClientId::from(client),
    )
    .expect("failed to open session")
}

/// Advances virtual time by `ms` milliseconds, letting timers and feeds run.
pub(crate) async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Plain-text contents of every successful write to the shared note.
pub(crate) fn note_writes(store: &MemoryStore) -> Vec<String> {
    store
        .upserts_to(&shared_note())
        .into_iter()
        .map(|data| {
            data["content"]
                .as_str()
                .expect("content should be plain text")
                .to_string()
        })
        .collect()
}

/// `(client, typing)` of every presence write, in order.
#[allow(dead_code)] // Used by presence tests only
pub(crate) fn presence_writes(store: &MemoryStore) -> Vec<(String, bool)> {
    store
        .writes()
        .into_iter()
        .filter(|w| w.op == WriteOp::Upsert && w.succeeded && w.path == presence_flag())
        .filter_map(|w| w.data)
        .map(|data| {
            (
                data["clientId"].as_str().unwrap_or_default().to_string(),
                data["typing"].as_bool().unwrap_or(false),
            )
        })
        .collect()
}
