//! In-process [`RemoteStore`] with live change feeds.
//!
//! Used by the demo binary and by tests. Supports injected write latency and
//! write failures, and keeps a log of every write attempt.

use crate::document::{DocPath, StoredDocument};
use crate::error::{Result, SyncError};
use crate::store::{Direction, OrderField, Query, RemoteStore, Subscription};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc::UnboundedSender;

/// Kind of write recorded in the [`MemoryStore`] log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Upsert,
    Append,
    Delete,
}

/// One write attempt against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub op: WriteOp,
    pub path: DocPath,
    pub data: Option<Value>,
    pub succeeded: bool,
}

type DocWatcher = UnboundedSender<Option<StoredDocument>>;
type QueryWatcher = (Query, UnboundedSender<Vec<StoredDocument>>);

/// Thread-safe in-memory document store.
///
/// All mutations and subscription registrations are serialized, so each
/// subscriber observes changes in write order.
pub struct MemoryStore {
    documents: DashMap<DocPath, StoredDocument>,
    doc_watchers: DashMap<DocPath, Vec<DocWatcher>>,
    query_watchers: DashMap<String, Vec<QueryWatcher>>,
    revision: AtomicU64,
    write_lock: Mutex<()>,
    write_log: Mutex<Vec<WriteRecord>>,
    write_delay: Mutex<Option<Duration>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            doc_watchers: DashMap::new(),
            query_watchers: DashMap::new(),
            revision: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            write_log: Mutex::new(Vec::new()),
            write_delay: Mutex::new(None),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Delays every subsequent write by `delay` before it is applied.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    /// Makes every subsequent write fail with [`SyncError::WriteFailed`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    /// Returns a copy of the document at `path`, if present.
    pub fn get(&self, path: &DocPath) -> Option<StoredDocument> {
        self.documents.get(path).map(|doc| doc.clone())
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Every write attempt so far, in issue order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.write_log.lock().clone()
    }

    /// Payloads of successful upserts to `path`, in order.
    pub fn upserts_to(&self, path: &DocPath) -> Vec<Value> {
        self.write_log
            .lock()
            .iter()
            .filter(|w| w.succeeded && w.op == WriteOp::Upsert && &w.path == path)
            .filter_map(|w| w.data.clone())
            .collect()
    }

    pub fn clear_write_log(&self) {
        self.write_log.lock().clear();
    }

    async fn before_write(&self, op: WriteOp, path: &DocPath, data: Option<&Value>) -> Result<()> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            self.record(op, path, data.cloned(), false);
            tracing::debug!("Injected write failure for {}", path);
            return Err(SyncError::WriteFailed {
                path: path.to_string(),
                reason: "store unavailable".into(),
            });
        }
        Ok(())
    }

    fn record(&self, op: WriteOp, path: &DocPath, data: Option<Value>, succeeded: bool) {
        self.write_log.lock().push(WriteRecord {
            op,
            path: path.clone(),
            data,
            succeeded,
        });
    }

    /// Stores `data` at `path` and notifies watchers. Caller holds `write_lock`.
    fn apply_put(&self, path: &DocPath, data: Value) -> StoredDocument {
        let revision = self.revision.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let doc = StoredDocument {
            path: path.clone(),
            data,
            updated_at: SystemTime::now(),
            revision,
        };
        self.documents.insert(path.clone(), doc.clone());
        self.notify(path, Some(doc.clone()));
        doc
    }

    fn notify(&self, path: &DocPath, doc: Option<StoredDocument>) {
        if let Some(mut watchers) = self.doc_watchers.get_mut(path) {
            watchers.retain(|tx| tx.send(doc.clone()).is_ok());
        }

        if let Some(mut watchers) = self.query_watchers.get_mut(path.collection()) {
            watchers.retain(|(query, tx)| tx.send(self.run_query(query)).is_ok());
        }
    }

    fn run_query(&self, query: &Query) -> Vec<StoredDocument> {
        let mut docs: Vec<StoredDocument> = self
            .documents
            .iter()
            .filter(|entry| entry.key().collection() == query.collection)
            .map(|entry| entry.value().clone())
            .collect();

        docs.sort_by(|a, b| compare_docs(a, b, query));
        docs
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("documents", &self.documents.len())
            .field("revision", &self.revision.load(AtomicOrdering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn compare_docs(a: &StoredDocument, b: &StoredDocument, query: &Query) -> Ordering {
    let primary = match &query.order_by {
        OrderField::UpdatedAt => Some(
            a.updated_at
                .cmp(&b.updated_at)
                .then(a.revision.cmp(&b.revision)),
        ),
        OrderField::Field(name) => match (a.data.get(name), b.data.get(name)) {
            (Some(x), Some(y)) => Some(compare_values(x, y)),
            // Missing values sort last in either direction
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => None,
        },
    };

    let ordering = primary
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.revision.cmp(&b.revision));

    match query.direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe_document(&self, path: &DocPath) -> Subscription<Option<StoredDocument>> {
        let (tx, sub) = Subscription::channel();
        let _guard = self.write_lock.lock();
        if tx.send(self.get(path)).is_ok() {
            self.doc_watchers.entry(path.clone()).or_default().push(tx);
        }
        sub
    }

    fn subscribe_query(&self, query: &Query) -> Subscription<Vec<StoredDocument>> {
        let (tx, sub) = Subscription::channel();
        let _guard = self.write_lock.lock();
        if tx.send(self.run_query(query)).is_ok() {
            self.query_watchers
                .entry(query.collection.clone())
                .or_default()
                .push((query.clone(), tx));
        }
        sub
    }

    async fn upsert(&self, path: &DocPath, data: Value) -> Result<StoredDocument> {
        self.before_write(WriteOp::Upsert, path, Some(&data)).await?;
        let _guard = self.write_lock.lock();
        self.record(WriteOp::Upsert, path, Some(data.clone()), true);
        Ok(self.apply_put(path, data))
    }

    async fn append(&self, collection: &str, data: Value) -> Result<StoredDocument> {
        let path = DocPath::new(collection, uuid::Uuid::new_v4().simple().to_string())?;
        self.before_write(WriteOp::Append, &path, Some(&data)).await?;
        let _guard = self.write_lock.lock();
        self.record(WriteOp::Append, &path, Some(data.clone()), true);
        Ok(self.apply_put(&path, data))
    }

    async fn delete(&self, path: &DocPath) -> Result<()> {
        self.before_write(WriteOp::Delete, path, None).await?;
        let _guard = self.write_lock.lock();
        self.record(WriteOp::Delete, path, None, true);
        if self.documents.remove(path).is_some() {
            self.notify(path, None);
        }
        Ok(())
    }
}
