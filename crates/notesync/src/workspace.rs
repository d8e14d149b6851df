//! Multi-document workspace.
//!
//! Keeps at most one [`NoteSession`] per document and exposes the notes
//! collection as a live index.

use crate::config::SyncConfig;
use crate::presence::ClientId;
use crate::session::NoteSession;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::{Stream, StreamExt};
use notesync_core::{Content, DocPath, Query, RemoteStore, Result, StoredDocument};
use std::sync::Arc;
use std::time::SystemTime;

/// Index entry for one note in the notes collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    pub path: DocPath,
    /// First non-empty line of the note.
    pub title: String,
    pub updated_at: SystemTime,
}

impl NoteSummary {
    fn from_document(doc: &StoredDocument) -> Self {
        let text = doc
            .field::<Content>("content")
            .ok()
            .flatten()
            .unwrap_or_default()
            .plain_text();
        let title = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();

        Self {
            path: doc.path.clone(),
            title,
            updated_at: doc.updated_at,
        }
    }
}

/// Open sessions of one client, keyed by document path.
///
/// # Examples
///
/// ```
/// use notesync::config::SyncConfig;
/// use notesync::workspace::Workspace;
/// use notesync_core::MemoryStore;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let workspace = Workspace::new(Arc::new(MemoryStore::new()), SyncConfig::default());
/// let a = workspace.open_id("shared_note").unwrap();
/// let b = workspace.open_id("shared_note").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(workspace.document_count(), 1);
/// # });
/// ```
pub struct Workspace {
    store: Arc<dyn RemoteStore>,
    config: SyncConfig,
    client_id: ClientId,
    sessions: DashMap<DocPath, Arc<NoteSession>>,
}

impl Workspace {
    pub fn new(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            client_id: ClientId::generate(),
            sessions: DashMap::new(),
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Returns the open session for `path`, opening one if needed.
    pub fn open(&self, path: DocPath) -> Result<Arc<NoteSession>> {
        match self.sessions.entry(path) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let session = Arc::new(NoteSession::open_as(
                    Arc::clone(&self.store),
                    entry.key().clone(),
                    self.config.clone(),
                    self.client_id.clone(),
                )?);
                entry.insert(Arc::clone(&session));
                Ok(session)
            }
        }
    }

    /// Opens a note of the notes collection by id.
    pub fn open_id(&self, id: &str) -> Result<Arc<NoteSession>> {
        self.open(DocPath::new(self.config.collections.notes.clone(), id)?)
    }

    /// Creates a new note with a store-generated id and opens it.
    pub async fn create(&self, content: impl Into<Content>) -> Result<Arc<NoteSession>> {
        let content = content.into();
        let doc = self
            .store
            .append(
                &self.config.collections.notes,
                serde_json::json!({ "content": content }),
            )
            .await?;
        tracing::info!("Created note {}", doc.path);
        self.open(doc.path)
    }

    /// Closes the session for `path`. Returns false when it was not open.
    pub fn close(&self, path: &DocPath) -> bool {
        match self.sessions.remove(path) {
            Some((_, session)) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Closes the session and deletes the note and its presence flag.
    pub async fn delete(&self, path: &DocPath) -> Result<()> {
        self.close(path);
        self.store.delete(path).await?;
        let presence = path.with_suffix(&self.config.collections.presence_suffix)?;
        self.store.delete(&presence).await?;
        tracing::info!("Deleted note {}", path);
        Ok(())
    }

    pub fn document_count(&self) -> usize {
        self.sessions.len()
    }

    /// Live index of the notes collection, most recently updated first.
    /// Presence flags stored alongside the notes are left out.
    pub fn index(&self) -> impl Stream<Item = Vec<NoteSummary>> + Send + Unpin + use<> {
        let suffix = self.config.collections.presence_suffix.clone();
        let query = Query::collection(self.config.collections.notes.clone());

        self.store.subscribe_query(&query).map(move |docs| {
            docs.iter()
                .filter(|doc| !doc.path.id().ends_with(suffix.as_str()))
                .map(NoteSummary::from_document)
                .collect()
        })
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("client_id", &self.client_id)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::MemoryStore;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_summary_title_is_first_non_empty_line() {
        let doc = StoredDocument {
            path: DocPath::new("notes", "n1").unwrap(),
            data: serde_json::json!({"content": "\n  Seating plan \nrow 1"}),
            updated_at: UNIX_EPOCH,
            revision: 3,
        };
        assert_eq!(NoteSummary::from_document(&doc).title, "Seating plan");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_close_delete() {
        let store = Arc::new(MemoryStore::new());
        let workspace = Workspace::new(store.clone(), SyncConfig::default());

        let session = workspace.create("menu").await.unwrap();
        let path = session.path().clone();
        assert_eq!(workspace.document_count(), 1);
        assert!(store.get(&path).is_some());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(session.view().content, Content::from("menu"));

        workspace.delete(&path).await.unwrap();
        assert_eq!(workspace.document_count(), 0);
        assert!(session.is_closed());
        assert!(store.get(&path).is_none());
        assert!(!workspace.close(&path));
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_skips_presence_flags() {
        let store = Arc::new(MemoryStore::new());
        let workspace = Workspace::new(store.clone(), SyncConfig::default());
        let mut index = workspace.index();
        assert!(index.next().await.unwrap().is_empty());

        let session = workspace.open_id("todo").unwrap();
        session.apply_local_edit("call florist").unwrap();

        // typing=true flag, then the debounced note write
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let mut latest = Vec::new();
        while let Some(Some(summaries)) = futures::FutureExt::now_or_never(index.next()) {
            latest = summaries;
        }
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].title, "call florist");
    }
}
