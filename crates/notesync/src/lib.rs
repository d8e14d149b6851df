//! Debounced realtime note synchronization.
//!
//! Local edits are echoed into an in-memory buffer, coalesced by a debounce
//! timer and written to a [`RemoteStore`](notesync_core::RemoteStore). Remote
//! changes come back through the store's change feed and overwrite the buffer
//! (last write wins). A short-lived presence flag tells other viewers that
//! someone is typing.

pub mod buffer;
pub mod config;
pub mod notes_list;
pub mod presence;
pub mod scheduler;
pub mod session;
pub mod tasks;
pub mod workspace;

// Re-export commonly used types
pub use buffer::EditBuffer;
pub use config::SyncConfig;
pub use notes_list::{NoteList, SavedNote};
pub use notesync_core::{Content, DocPath, MemoryStore, RemoteStore, Result, SyncError};
pub use presence::ClientId;
pub use scheduler::{FlushState, PresenceState, SyncScheduler};
pub use session::{NoteSession, SessionView};
pub use workspace::{NoteSummary, Workspace};
