//! Core abstractions for notesync.
//!
//! This crate provides the pieces shared by every notesync client:
//!
//! - **Document model**: [`DocPath`], [`StoredDocument`], and note [`Content`]
//!   (plain text or a rich-text block tree)
//! - **Remote store**: the [`RemoteStore`] trait with its five primitives and
//!   the [`Subscription`] change feed
//! - **In-memory store**: [`MemoryStore`], a complete in-process implementation
//! - **Error types**: [`SyncError`] and the [`Result`] alias
//!
//! # Examples
//!
//! ```
//! use notesync_core::{Content, DocPath, MemoryStore, RemoteStore};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let path = DocPath::new("notes", "shared_note").unwrap();
//! let content = Content::from("bring flowers");
//!
//! store.upsert(&path, json!({ "content": &content })).await.unwrap();
//! let stored = store.get(&path).unwrap();
//! assert_eq!(stored.field::<Content>("content").unwrap(), Some(content));
//! # });
//! ```

pub mod document;
pub mod error;
pub mod memory;
pub mod store;

// Re-export commonly used types
pub use document::{Block, Content, DocPath, StoredDocument, TextRun, unix_millis};
pub use error::{Result, SyncError};
pub use memory::{MemoryStore, WriteOp, WriteRecord};
pub use store::{Direction, OrderField, Query, RemoteStore, Subscription};
