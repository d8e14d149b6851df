//! Tests for saving the shared note into the saved-notes list.

mod common;

use common::{advance, note_writes, open};
use notesync::config::SyncConfig;
use notesync::{Content, MemoryStore, NoteList};
use std::sync::Arc;
use tokio_test::assert_ok;

#[tokio::test(start_paused = true)]
async fn test_save_appends_and_clears_shared_note() {
    let store = Arc::new(MemoryStore::new());
    let editor = open(&store, "a");
    let viewer = open(&store, "b");
    let list = NoteList::subscribe(store.clone(), &SyncConfig::default());
    advance(1).await;

    assert_ok!(editor.apply_local_edit("order the cake"));
    let saved = list.save_session(&editor).await.unwrap().unwrap();
    assert_eq!(saved.content, "order the cake");
    assert!(saved.created.is_some());
    advance(1).await;

    let notes = list.notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id(), saved.id());

    // Shared note cleared everywhere; the pending debounce never fires
    assert!(editor.view().content.is_blank());
    assert!(viewer.view().content.is_blank());
    advance(3_000).await;
    assert_eq!(note_writes(&store), vec![""]);
}

#[tokio::test(start_paused = true)]
async fn test_blank_note_is_not_saved() {
    let store = Arc::new(MemoryStore::new());
    let editor = open(&store, "a");
    let list = NoteList::subscribe(store.clone(), &SyncConfig::default());
    advance(1).await;

    assert_ok!(editor.apply_local_edit("   \n"));
    assert!(list.save_session(&editor).await.unwrap().is_none());
    advance(1).await;
    assert!(list.notes().is_empty());
    assert_eq!(editor.view().content, Content::from("   \n"));
}

#[tokio::test(start_paused = true)]
async fn test_list_is_newest_first_and_supports_delete() {
    let store = Arc::new(MemoryStore::new());
    let editor = open(&store, "a");
    let list = NoteList::subscribe(store.clone(), &SyncConfig::default());
    advance(1).await;

    for text in ["first", "second", "third"] {
        assert_ok!(editor.apply_local_edit(text));
        assert_ok!(list.save_session(&editor).await);
        advance(1).await;
    }

    let contents: Vec<String> = list.notes().into_iter().map(|n| n.content).collect();
    assert_eq!(contents, vec!["third", "second", "first"]);

    let middle = list.notes()[1].id().to_string();
    assert_ok!(list.delete(&middle).await);
    advance(1).await;

    let contents: Vec<String> = list.notes().into_iter().map(|n| n.content).collect();
    assert_eq!(contents, vec!["third", "first"]);
}

#[tokio::test(start_paused = true)]
async fn test_list_watch_notifies_other_clients() {
    let store = Arc::new(MemoryStore::new());
    let editor = open(&store, "a");
    let mine = NoteList::subscribe(store.clone(), &SyncConfig::default());
    let theirs = NoteList::subscribe(store.clone(), &SyncConfig::default());
    let mut rx = theirs.watch();
    advance(1).await;
    rx.borrow_and_update();

    assert_ok!(editor.apply_local_edit("seating chart"));
    assert_ok!(mine.save_session(&editor).await);

    assert_ok!(rx.changed().await);
    assert_eq!(rx.borrow().len(), 1);
    assert_eq!(rx.borrow()[0].content, "seating chart");
}
