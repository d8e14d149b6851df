//! In-memory copy of the document being edited.
//!
//! Local edits land here synchronously so the UI can echo them immediately.
//! Remote snapshots always replace what the UI shows. The most recent local
//! edit is kept aside until a flush takes it, so the client whose debounce
//! fires last still writes its own keystrokes.

use notesync_core::Content;
use std::time::SystemTime;

/// Outcome of applying a remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteApply {
    /// The snapshot differed from the buffer.
    pub changed: bool,
    /// Unsaved local edits were replaced on screen.
    pub clobbered_local: bool,
    /// The snapshot was this client's own earlier write coming back while a
    /// newer local edit is pending; the buffer kept the newer edit.
    pub own_echo: bool,
}

/// Edit buffer for one open document.
#[derive(Debug, Clone, Default)]
pub struct EditBuffer {
    content: Content,
    unsaved: Option<Content>,
    last_sent: Option<Content>,
    local_revision: u64,
    last_modified: Option<SystemTime>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content the UI should render.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// True while the buffer holds a local edit not yet handed to a flush.
    pub fn is_dirty(&self) -> bool {
        self.unsaved.is_some()
    }

    /// Number of local edits applied so far.
    pub fn local_revision(&self) -> u64 {
        self.local_revision
    }

    /// Store timestamp of the last remote snapshot applied.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Replaces the buffered content with a local edit.
    pub fn apply_local_edit(&mut self, content: Content) {
        self.content = content.clone();
        self.unsaved = Some(content);
        self.local_revision += 1;
    }

    /// Overwrites the buffer with a snapshot from the change feed.
    ///
    /// The only snapshot that does not replace the rendered content is the
    /// echo of this client's last write while a newer edit is pending.
    pub fn apply_remote_snapshot(
        &mut self,
        content: Content,
        timestamp: Option<SystemTime>,
    ) -> RemoteApply {
        self.last_modified = timestamp;

        if self.unsaved.is_some() && self.last_sent.as_ref() == Some(&content) {
            return RemoteApply {
                changed: false,
                clobbered_local: false,
                own_echo: true,
            };
        }

        let changed = content != self.content;
        let clobbered_local = changed && self.unsaved.is_some();
        self.content = content;

        RemoteApply {
            changed,
            clobbered_local,
            own_echo: false,
        }
    }

    /// Hands the latest local edit to a flush and marks the buffer clean.
    ///
    /// Falls back to the rendered content when nothing is pending.
    pub fn take_for_flush(&mut self) -> Content {
        let content = self
            .unsaved
            .take()
            .unwrap_or_else(|| self.content.clone());
        self.last_sent = Some(content.clone());
        content
    }
}
