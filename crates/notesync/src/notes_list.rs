//! Saved-notes list.
//!
//! The shared note can be "saved": its text is appended to the saved-notes
//! collection and the shared note is cleared. The list is kept live from a
//! query subscription, newest first.

use crate::config::SyncConfig;
use crate::session::NoteSession;
use futures::StreamExt;
use notesync_core::{
    Direction, DocPath, Query, RemoteStore, Result, StoredDocument, Subscription, unix_millis,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One entry of the saved-notes list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedNote {
    pub path: DocPath,
    pub content: String,
    pub created: Option<SystemTime>,
}

impl SavedNote {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Builds an entry from a stored document. Missing or unreadable content
    /// is shown as an empty note.
    pub fn from_document(doc: &StoredDocument) -> Self {
        let content = doc.field::<String>("content").unwrap_or_else(|e| {
            tracing::debug!("Unreadable content in {}: {}", doc.path, e);
            None
        });
        let created = doc
            .field::<u64>("created")
            .ok()
            .flatten()
            .map(|ms| UNIX_EPOCH + Duration::from_millis(ms));

        Self {
            path: doc.path.clone(),
            content: content.unwrap_or_default(),
            created,
        }
    }
}

/// Live view of the saved-notes collection.
pub struct NoteList {
    store: Arc<dyn RemoteStore>,
    collection: String,
    notes_rx: watch::Receiver<Vec<SavedNote>>,
    feed: JoinHandle<()>,
}

impl NoteList {
    /// Subscribes to the saved-notes collection, ordered by `created`
    /// descending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(store: Arc<dyn RemoteStore>, config: &SyncConfig) -> Self {
        let collection = config.collections.saved_notes.clone();
        let query = Query::collection(collection.clone()).order_by("created", Direction::Descending);
        let feed = store.subscribe_query(&query);
        let (notes_tx, notes_rx) = watch::channel(Vec::new());

        let feed = tokio::spawn(run_list_feed(feed, notes_tx));
        Self {
            store,
            collection,
            notes_rx,
            feed,
        }
    }

    /// Current list, newest first.
    pub fn notes(&self) -> Vec<SavedNote> {
        self.notes_rx.borrow().clone()
    }

    /// Receiver notified whenever the list changes.
    pub fn watch(&self) -> watch::Receiver<Vec<SavedNote>> {
        self.notes_rx.clone()
    }

    /// Saves the session's current text to the list and clears the shared
    /// note.
    ///
    /// Returns `Ok(None)` without writing anything when the text is blank.
    pub async fn save_session(&self, session: &NoteSession) -> Result<Option<SavedNote>> {
        let content = session.content();
        if content.is_blank() {
            tracing::debug!("Not saving blank note from {}", session.path());
            return Ok(None);
        }

        let created = SystemTime::now();
        let doc = self
            .store
            .append(
                &self.collection,
                serde_json::json!({
                    "content": content.plain_text(),
                    "created": unix_millis(created),
                }),
            )
            .await?;
        tracing::info!("Saved {} as {}", session.path(), doc.path);

        session.replace_and_persist("").await?;
        Ok(Some(SavedNote::from_document(&doc)))
    }

    /// Deletes a saved note by id.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = DocPath::new(self.collection.clone(), id)?;
        self.store.delete(&path).await?;
        tracing::info!("Deleted saved note {}", path);
        Ok(())
    }
}

impl Drop for NoteList {
    fn drop(&mut self) {
        self.feed.abort();
    }
}

async fn run_list_feed(
    mut feed: Subscription<Vec<StoredDocument>>,
    notes_tx: watch::Sender<Vec<SavedNote>>,
) {
    while let Some(docs) = feed.next().await {
        let notes = docs.iter().map(SavedNote::from_document).collect();
        notes_tx.send_replace(notes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(data: serde_json::Value) -> StoredDocument {
        StoredDocument {
            path: DocPath::new("notes_list", "abc").unwrap(),
            data,
            updated_at: UNIX_EPOCH,
            revision: 1,
        }
    }

    #[test]
    fn test_saved_note_from_document() {
        let note = SavedNote::from_document(&doc(json!({"content": "cake", "created": 2000})));
        assert_eq!(note.id(), "abc");
        assert_eq!(note.content, "cake");
        assert_eq!(note.created, Some(UNIX_EPOCH + Duration::from_secs(2)));
    }

    #[test]
    fn test_missing_fields_default() {
        let note = SavedNote::from_document(&doc(json!({})));
        assert_eq!(note.content, "");
        assert_eq!(note.created, None);
    }

    #[test]
    fn test_unreadable_content_is_empty() {
        let note = SavedNote::from_document(&doc(json!({"content": 12})));
        assert_eq!(note.content, "");
    }
}
