//! Per-document editing session.
//!
//! A [`NoteSession`] ties together the [`EditBuffer`], the [`SyncScheduler`],
//! the cancellable timers and the store's change feeds for one open document.
//! The indicators a UI needs ("saving", "someone is typing", loading) live on
//! the session's [`SessionView`], never in process-wide state.
//!
//! Timers and feed tasks hold weak references, so dropping the session
//! releases it. Writes that were already issued always run to completion.

use crate::buffer::EditBuffer;
use crate::config::SyncConfig;
use crate::presence::{ClientId, PresenceFlag, is_remote_typing};
use crate::scheduler::{FlushDecision, FlushState, SyncScheduler, Ticket};
use crate::tasks::DeferredTasks;
use futures::StreamExt;
use notesync_core::{
    Content, DocPath, RemoteStore, Result, StoredDocument, Subscription, SyncError,
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Snapshot of everything the UI renders for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub content: Content,
    /// No snapshot has arrived from the store yet.
    pub loading: bool,
    /// A write is in flight or finished less than `saving_display_ms` ago.
    pub saving: bool,
    pub flush_state: FlushState,
    /// Another client is typing in this document.
    pub remote_typing: bool,
    /// Store timestamp of the last remote snapshot.
    pub last_modified: Option<SystemTime>,
    /// Error from the most recent failed write, cleared by the next success.
    pub last_error: Option<String>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            content: Content::default(),
            loading: true,
            saving: false,
            flush_state: FlushState::Idle,
            remote_typing: false,
            last_modified: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKind {
    Flush,
    TypingSettle,
    PresenceRefresh,
    SavingClear,
    PresenceExpiry,
}

#[derive(Debug)]
struct SessionState {
    buffer: EditBuffer,
    scheduler: SyncScheduler,
    loading: bool,
    remote_typing: bool,
    presence_epoch: u64,
    last_error: Option<String>,
    closed: bool,
}

struct SessionInner {
    path: DocPath,
    presence_path: DocPath,
    client_id: ClientId,
    config: SyncConfig,
    store: Arc<dyn RemoteStore>,
    state: Mutex<SessionState>,
    view_tx: watch::Sender<SessionView>,
    timers: DeferredTasks<TimerKind>,
    feeds: Mutex<Vec<JoinHandle<()>>>,
}

/// Live editing session for one document.
///
/// # Examples
///
/// ```
/// use notesync::config::SyncConfig;
/// use notesync::session::NoteSession;
/// use notesync_core::{DocPath, MemoryStore};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let path = DocPath::new("notes", "shared_note").unwrap();
/// let session = NoteSession::open(store.clone(), path.clone(), SyncConfig::default()).unwrap();
///
/// session.apply_local_edit("hello").unwrap();
/// assert_eq!(session.view().content.plain_text(), "hello");
///
/// assert!(session.flush_now().await.unwrap());
/// assert_eq!(store.upserts_to(&path).len(), 1);
/// # });
/// ```
pub struct NoteSession {
    inner: Arc<SessionInner>,
}

impl NoteSession {
    /// Opens a session with a freshly generated client id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(store: Arc<dyn RemoteStore>, path: DocPath, config: SyncConfig) -> Result<Self> {
        Self::open_as(store, path, config, ClientId::generate())
    }

    /// Opens a session that identifies itself as `client_id` in presence flags.
    pub fn open_as(
        store: Arc<dyn RemoteStore>,
        path: DocPath,
        config: SyncConfig,
        client_id: ClientId,
    ) -> Result<Self> {
        let presence_path = path.with_suffix(&config.collections.presence_suffix)?;
        let (view_tx, _) = watch::channel(SessionView::default());

        let inner = Arc::new(SessionInner {
            path,
            presence_path,
            client_id,
            config,
            store,
            state: Mutex::new(SessionState {
                buffer: EditBuffer::new(),
                scheduler: SyncScheduler::new(),
                loading: true,
                remote_typing: false,
                presence_epoch: 0,
                last_error: None,
                closed: false,
            }),
            view_tx,
            timers: DeferredTasks::new(),
            feeds: Mutex::new(Vec::new()),
        });

        let doc_feed = inner.store.subscribe_document(&inner.path);
        let mut feeds = vec![tokio::spawn(run_document_feed(
            Arc::downgrade(&inner),
            doc_feed,
        ))];

        if inner.config.presence.enabled {
            let presence_feed = inner.store.subscribe_document(&inner.presence_path);
            feeds.push(tokio::spawn(run_presence_feed(
                Arc::downgrade(&inner),
                presence_feed,
            )));
        }
        *inner.feeds.lock() = feeds;

        tracing::info!("Opened session for {} as client {}", inner.path, inner.client_id);
        Ok(Self { inner })
    }

    pub fn path(&self) -> &DocPath {
        &self.inner.path
    }

    pub fn client_id(&self) -> &ClientId {
        &self.inner.client_id
    }

    /// Current snapshot of the session indicators.
    pub fn view(&self) -> SessionView {
        self.inner.view_tx.borrow().clone()
    }

    /// Receiver notified on every change of the session view.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.inner.view_tx.subscribe()
    }

    pub fn content(&self) -> Content {
        self.inner.state.lock().buffer.content().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Applies a local edit and restarts the debounce timer.
    ///
    /// Returns immediately; the write happens once edits have been idle for
    /// `debounce.idle_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SessionClosed`] after [`close`](Self::close).
    pub fn apply_local_edit(&self, content: impl Into<Content>) -> Result<()> {
        self.inner.apply_local_edit(content.into())
    }

    /// Cancels the pending debounce and writes the buffer now.
    ///
    /// Returns `Ok(false)` when there were no unsaved edits.
    pub async fn flush_now(&self) -> Result<bool> {
        let write = {
            let mut state = self.inner.state.lock();
            self.inner.ensure_open(&state)?;
            if !state.buffer.is_dirty() {
                return Ok(false);
            }
            self.inner.timers.cancel(&TimerKind::Flush);
            state.scheduler.begin_immediate_flush();
            let content = state.buffer.take_for_flush();
            self.inner.publish(&state);
            self.inner.spawn_write(content)
        };

        join_write(&self.inner.path, write).await?;
        Ok(true)
    }

    /// Replaces the buffer with `content` and writes it immediately.
    pub async fn replace_and_persist(&self, content: impl Into<Content>) -> Result<()> {
        let write = {
            let mut state = self.inner.state.lock();
            self.inner.ensure_open(&state)?;
            self.inner.timers.cancel(&TimerKind::Flush);
            state.buffer.apply_local_edit(content.into());
            state.scheduler.begin_immediate_flush();
            let content = state.buffer.take_for_flush();
            self.inner.publish(&state);
            self.inner.spawn_write(content)
        };

        join_write(&self.inner.path, write).await.map(|_| ())
    }

    /// Cancels pending timers and stops listening to the store.
    ///
    /// Unsaved edits still waiting on the debounce are dropped; writes already
    /// issued complete normally. If this client was typing, a final
    /// `typing=false` flag is written.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for NoteSession {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for NoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteSession")
            .field("path", &self.inner.path)
            .field("client_id", &self.inner.client_id)
            .finish_non_exhaustive()
    }
}

async fn join_write(
    path: &DocPath,
    write: JoinHandle<Result<StoredDocument>>,
) -> Result<StoredDocument> {
    write.await.map_err(|e| SyncError::WriteFailed {
        path: path.to_string(),
        reason: e.to_string(),
    })?
}

async fn run_document_feed(
    session: Weak<SessionInner>,
    mut feed: Subscription<Option<StoredDocument>>,
) {
    while let Some(snapshot) = feed.next().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.on_remote_document(snapshot);
    }
}

async fn run_presence_feed(
    session: Weak<SessionInner>,
    mut feed: Subscription<Option<StoredDocument>>,
) {
    while let Some(snapshot) = feed.next().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.on_remote_presence(snapshot.as_ref());
    }
}

/// Spawns onto the current runtime, if there is one.
fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => tracing::debug!("No runtime available, dropping background write"),
    }
}

impl SessionInner {
    fn ensure_open(&self, state: &SessionState) -> Result<()> {
        if state.closed {
            return Err(SyncError::SessionClosed(self.path.to_string()));
        }
        Ok(())
    }

    fn publish(&self, state: &SessionState) {
        self.view_tx.send_replace(SessionView {
            content: state.buffer.content().clone(),
            loading: state.loading,
            saving: state.scheduler.is_saving(),
            flush_state: state.scheduler.flush_state(),
            remote_typing: state.remote_typing,
            last_modified: state.buffer.last_modified(),
            last_error: state.last_error.clone(),
        });
    }

    fn arm<F>(self: &Arc<Self>, kind: TimerKind, delay: Duration, on_fire: F)
    where
        F: FnOnce(Arc<Self>) + Send + 'static,
    {
        let session = Arc::downgrade(self);
        self.timers.schedule(kind, delay, async move {
            if let Some(inner) = session.upgrade() {
                on_fire(inner);
            }
        });
    }

    fn apply_local_edit(self: &Arc<Self>, content: Content) -> Result<()> {
        let mut state = self.state.lock();
        self.ensure_open(&state)?;

        state.buffer.apply_local_edit(content);
        let plan = state
            .scheduler
            .on_local_edit(self.config.presence.enabled);

        // Armed under the state lock so concurrent edits cannot leave an
        // older ticket in the slot.
        self.arm(TimerKind::Flush, self.config.debounce.idle(), move |inner| {
            inner.on_flush_timer(plan.flush);
        });
        if let Some(settle) = plan.settle {
            self.arm(
                TimerKind::TypingSettle,
                self.config.presence.settle(),
                move |inner| inner.on_typing_settle(settle),
            );
        }
        if plan.announce_typing {
            tracing::debug!("{} started typing in {}", self.client_id, self.path);
            self.spawn_presence_write(true);
        }
        if let Some(refresh) = plan.refresh {
            self.arm_presence_refresh(refresh);
        }

        self.publish(&state);
        Ok(())
    }

    fn on_flush_timer(self: &Arc<Self>, ticket: Ticket) {
        let mut state = self.state.lock();

        match state.scheduler.on_flush_timer(ticket) {
            FlushDecision::Superseded => {}
            FlushDecision::Write => {
                let content = state.buffer.take_for_flush();
                tracing::debug!(
                    "Debounce elapsed for {}, writing revision {}",
                    self.path,
                    state.buffer.local_revision()
                );
                self.publish(&state);
                // Detached: the outcome is handled in on_write_complete
                drop(self.spawn_write(content));
            }
        }
    }

    /// Issues the content write as an independent task.
    fn spawn_write(self: &Arc<Self>, content: Content) -> JoinHandle<Result<StoredDocument>> {
        let store = Arc::clone(&self.store);
        let path = self.path.clone();
        let session = Arc::downgrade(self);

        tokio::spawn(async move {
            let result = store
                .upsert(&path, serde_json::json!({ "content": content }))
                .await;

            match session.upgrade() {
                Some(inner) => inner.on_write_complete(&result),
                None => {
                    if let Err(e) = &result {
                        tracing::warn!("Failed to save {} after close: {}", path, e);
                    }
                }
            }
            result
        })
    }

    fn on_write_complete(self: &Arc<Self>, result: &Result<StoredDocument>) {
        let mut state = self.state.lock();
        let clear = state.scheduler.on_write_complete();

        match result {
            Ok(doc) => {
                tracing::debug!("Saved {} at revision {}", self.path, doc.revision);
                state.last_error = None;
            }
            Err(e) => {
                tracing::warn!("Failed to save {}: {}", self.path, e);
                state.last_error = Some(e.to_string());
            }
        }

        if state.closed {
            // No timers on a closed session; drop the indicator once idle
            state.scheduler.on_saving_clear(clear);
        } else {
            self.arm(
                TimerKind::SavingClear,
                self.config.debounce.saving_display(),
                move |inner| inner.on_saving_clear(clear),
            );
        }
        self.publish(&state);
    }

    fn on_saving_clear(&self, ticket: Ticket) {
        let mut state = self.state.lock();
        if state.scheduler.on_saving_clear(ticket) {
            self.publish(&state);
        }
    }

    fn on_typing_settle(self: &Arc<Self>, ticket: Ticket) {
        let settled = self.state.lock().scheduler.on_typing_settle(ticket);
        if settled {
            tracing::debug!("{} stopped typing in {}", self.client_id, self.path);
            self.timers.cancel(&TimerKind::PresenceRefresh);
            self.spawn_presence_write(false);
        }
    }

    fn arm_presence_refresh(self: &Arc<Self>, ticket: Ticket) {
        self.arm(
            TimerKind::PresenceRefresh,
            self.config.presence.refresh_interval(),
            move |inner| inner.on_presence_refresh(ticket),
        );
    }

    fn on_presence_refresh(self: &Arc<Self>, ticket: Ticket) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if let Some(next) = state.scheduler.on_presence_refresh(ticket) {
            tracing::trace!("{} still typing in {}", self.client_id, self.path);
            self.spawn_presence_write(true);
            self.arm_presence_refresh(next);
        }
    }

    fn spawn_presence_write(&self, typing: bool) {
        let store = Arc::clone(&self.store);
        let path = self.presence_path.clone();
        let flag = PresenceFlag::new(typing, &self.client_id);

        spawn_detached(async move {
            if let Err(e) = store.upsert(&path, flag.to_value()).await {
                tracing::warn!("Failed to write presence flag {}: {}", path, e);
            }
        });
    }

    fn on_remote_document(&self, snapshot: Option<StoredDocument>) {
        let (content, timestamp) = match &snapshot {
            None => (Content::default(), None),
            Some(doc) => match doc.field::<Content>("content") {
                Ok(content) => (content.unwrap_or_default(), Some(doc.updated_at)),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable snapshot of {}: {}", self.path, e);
                    let mut state = self.state.lock();
                    state.loading = false;
                    self.publish(&state);
                    return;
                }
            },
        };

        let mut state = self.state.lock();
        let outcome = state.buffer.apply_remote_snapshot(content, timestamp);
        state.loading = false;

        if outcome.own_echo {
            tracing::trace!("Own write to {} echoed behind a newer edit", self.path);
        } else if outcome.clobbered_local {
            tracing::warn!(
                "Remote snapshot of {} replaced unsaved local edits on screen",
                self.path
            );
        }
        self.publish(&state);
    }

    fn on_remote_presence(self: &Arc<Self>, snapshot: Option<&StoredDocument>) {
        let stale_after = self.config.presence.stale_after();
        let typing = is_remote_typing(snapshot, &self.client_id, stale_after, SystemTime::now());

        let mut state = self.state.lock();
        state.presence_epoch += 1;
        state.remote_typing = typing;

        if typing && !state.closed {
            let epoch = state.presence_epoch;
            self.arm(TimerKind::PresenceExpiry, stale_after, move |inner| {
                inner.expire_remote_presence(epoch);
            });
        } else {
            self.timers.cancel(&TimerKind::PresenceExpiry);
        }
        self.publish(&state);
    }

    fn expire_remote_presence(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.presence_epoch == epoch && state.remote_typing {
            tracing::debug!("Presence flag for {} went stale", self.path);
            state.remote_typing = false;
            self.publish(&state);
        }
    }

    fn close(&self) {
        let was_typing = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let was_typing = state.scheduler.cancel();
            self.timers.cancel_all();
            self.publish(&state);
            was_typing
        };

        for feed in self.feeds.lock().drain(..) {
            feed.abort();
        }

        if was_typing && self.config.presence.enabled {
            self.spawn_presence_write(false);
        }
        tracing::info!("Closed session for {}", self.path);
    }
}
