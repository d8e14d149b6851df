use notesync::config::SyncConfig;
use notesync::{ClientId, DocPath, MemoryStore, NoteList, NoteSession};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Edit(&'a str),
    Flush,
    Save,
    List,
    Delete(&'a str),
    Quit,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim_end().split_once(' ') {
            Some((":delete", id)) => Self::Delete(id.trim()),
            _ => match line.trim_end() {
                ":flush" => Self::Flush,
                ":save" => Self::Save,
                ":list" => Self::List,
                ":quit" | ":q" => Self::Quit,
                _ => Self::Edit(line),
            },
        }
    }
}

#[tokio::main]
async fn main() -> notesync::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SyncConfig::load(Path::new(&path))?,
        None => SyncConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let path = DocPath::new(config.collections.notes.clone(), "shared_note")?;
    let local = NoteSession::open_as(
        store.clone(),
        path.clone(),
        config.clone(),
        ClientId::from("local"),
    )?;
    let peer = NoteSession::open_as(store.clone(), path, config.clone(), ClientId::from("peer"))?;
    let list = NoteList::subscribe(store.clone(), &config);

    let mut peer_view = peer.watch();
    let watcher = tokio::spawn(async move {
        while peer_view.changed().await.is_ok() {
            let view = peer_view.borrow_and_update().clone();
            tracing::info!(
                "peer sees {:?} (someone typing: {}, saving: {})",
                view.content.plain_text(),
                view.remote_typing,
                view.saving
            );
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Edit(text) => local.apply_local_edit(text)?,
            Command::Flush => {
                if !local.flush_now().await? {
                    println!("nothing to flush");
                }
            }
            Command::Save => match list.save_session(&local).await? {
                Some(note) => println!("saved as {}", note.id()),
                None => println!("note is empty, nothing saved"),
            },
            Command::List => {
                let notes = list.notes();
                if notes.is_empty() {
                    println!("no saved notes yet");
                }
                for note in notes {
                    println!("{}  {}", note.id(), note.content);
                }
            }
            Command::Delete(id) => list.delete(id).await?,
            Command::Quit => break,
        }
    }

    local.close();
    peer.close();
    watcher.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(":flush"), Command::Flush);
        assert_eq!(Command::parse(":save\n"), Command::Save);
        assert_eq!(Command::parse(":list"), Command::List);
        assert_eq!(Command::parse(":q"), Command::Quit);
        assert_eq!(Command::parse(":delete abc123 "), Command::Delete("abc123"));
    }

    #[test]
    fn test_plain_lines_are_edits() {
        assert_eq!(Command::parse("buy rings"), Command::Edit("buy rings"));
        assert_eq!(Command::parse(""), Command::Edit(""));
    }
}
