//! Remote document store abstraction.
//!
//! The editing layer depends on exactly five store primitives: subscribe to
//! one document, subscribe to a collection query, upsert by path, append with
//! a store-generated id, and delete by path. Anything that can provide these
//! (a hosted document database client, or [`crate::MemoryStore`]) plugs in
//! behind [`RemoteStore`].

use crate::document::{DocPath, StoredDocument};
use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Document-oriented store with push-based change feeds.
///
/// Subscriptions emit the current state first and then one item per change.
/// Dropping a [`Subscription`] unsubscribes.
///
/// # Examples
///
/// ```
/// use notesync_core::{DocPath, MemoryStore, RemoteStore};
/// use futures::StreamExt;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// let path = DocPath::new("notes", "shared_note").unwrap();
///
/// let mut feed = store.subscribe_document(&path);
/// assert_eq!(feed.next().await, Some(None));
///
/// store.upsert(&path, json!({"content": "hi"})).await.unwrap();
/// let doc = feed.next().await.flatten().unwrap();
/// assert_eq!(doc.data["content"], "hi");
/// # });
/// ```
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Watches a single document. Emits `None` while it does not exist.
    fn subscribe_document(&self, path: &DocPath) -> Subscription<Option<StoredDocument>>;

    /// Watches every document of a collection, ordered per `query`.
    fn subscribe_query(&self, query: &Query) -> Subscription<Vec<StoredDocument>>;

    /// Creates or replaces the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::WriteFailed`] when the store rejects the write.
    async fn upsert(&self, path: &DocPath, data: serde_json::Value) -> Result<StoredDocument>;

    /// Adds a document with a store-generated id to `collection`.
    async fn append(&self, collection: &str, data: serde_json::Value) -> Result<StoredDocument>;

    /// Removes the document at `path`. Deleting a missing document succeeds.
    async fn delete(&self, path: &DocPath) -> Result<()>;
}

/// Sort direction for query subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

/// Sort key for query subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderField {
    /// Store-assigned modification time.
    UpdatedAt,
    /// A top-level payload field. Documents missing it sort last.
    Field(String),
}

/// Collection query: every document in `collection`, sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub order_by: OrderField,
    pub direction: Direction,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: OrderField::UpdatedAt,
            direction: Direction::Descending,
        }
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = OrderField::Field(field.into());
        self.direction = direction;
        self
    }
}

/// Push feed of snapshots from the store.
///
/// Implements [`Stream`]; the feed ends when the store drops its sender.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Creates a connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<T>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Waits for the next snapshot.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns an already-delivered snapshot without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_query_defaults_to_updated_at_descending() {
        let query = Query::collection("notes");
        assert_eq!(query.order_by, OrderField::UpdatedAt);
        assert_eq!(query.direction, Direction::Descending);
    }

    #[test]
    fn test_query_order_by_field() {
        let query = Query::collection("notes_list").order_by("created", Direction::Ascending);
        assert_eq!(query.order_by, OrderField::Field("created".into()));
        assert_eq!(query.direction, Direction::Ascending);
    }

    #[tokio::test]
    async fn test_subscription_stream_ends_when_sender_dropped() {
        let (tx, mut sub) = Subscription::channel();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        let items: Vec<i32> = (&mut sub).collect().await;
        assert_eq!(items, vec![1, 2]);
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_dropping_subscription_closes_sender() {
        let (tx, sub) = Subscription::<u8>::channel();
        assert!(!tx.is_closed());
        drop(sub);
        assert!(tx.is_closed());
    }
}
