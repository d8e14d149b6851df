//! Document model shared by the store and the editing layer.
//!
//! A stored document is a JSON payload addressed by a [`DocPath`]
//! (`collection/id`). Note bodies are carried as [`Content`], which is either
//! plain text or a rich-text block tree.

use crate::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Address of a document inside the store.
///
/// # Examples
///
/// ```
/// use notesync_core::DocPath;
///
/// let path: DocPath = "notes/shared_note".parse().unwrap();
/// assert_eq!(path.collection(), "notes");
/// assert_eq!(path.id(), "shared_note");
/// assert_eq!(path.to_string(), "notes/shared_note");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    /// Creates a path, rejecting empty segments and embedded separators.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        let id = id.into();
        validate_segment(&collection)?;
        validate_segment(&id)?;
        Ok(Self { collection, id })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns a sibling path in the same collection with `suffix` appended
    /// to the id.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        Self::new(self.collection.clone(), format!("{}{}", self.id, suffix))
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.contains('/') {
        return Err(SyncError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocPath {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((collection, id)) => Self::new(collection, id),
            None => Err(SyncError::InvalidPath(s.to_string())),
        }
    }
}

/// A document as held by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub path: DocPath,
    pub data: serde_json::Value,
    /// Assigned by the store on every write.
    pub updated_at: SystemTime,
    /// Store-wide monotonic write counter.
    pub revision: u64,
}

impl StoredDocument {
    /// Deserializes a single top-level field of the payload.
    ///
    /// Returns `Ok(None)` when the field is absent or null.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.data.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| SyncError::InvalidPayload {
                    path: self.path.to_string(),
                    source,
                }),
        }
    }
}

/// Milliseconds since the Unix epoch, saturating at zero for earlier times.
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Note body: plain text or a rich-text block tree.
///
/// Serialized untagged, so plain text is a JSON string and rich text is a
/// JSON array of blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Plain(String),
    Rich(Vec<Block>),
}

impl Default for Content {
    fn default() -> Self {
        Self::Plain(String::new())
    }
}

impl Content {
    /// Flattens the content to text, one line per leaf block.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Rich(blocks) => {
                let mut lines = Vec::new();
                for block in blocks {
                    block.collect_lines(&mut lines);
                }
                lines.join("\n")
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        self.plain_text().trim().is_empty()
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Plain(text)
    }
}

impl From<Vec<Block>> for Content {
    fn from(blocks: Vec<Block>) -> Self {
        Self::Rich(blocks)
    }
}

/// A rich-text block element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Block {
    Paragraph { children: Vec<TextRun> },
    HeadingOne { children: Vec<TextRun> },
    HeadingTwo { children: Vec<TextRun> },
    ListItem { children: Vec<TextRun> },
    BulletedList { children: Vec<Block> },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph {
            children: vec![TextRun::new(text)],
        }
    }

    fn collect_lines(&self, out: &mut Vec<String>) {
        match self {
            Self::Paragraph { children }
            | Self::HeadingOne { children }
            | Self::HeadingTwo { children }
            | Self::ListItem { children } => {
                out.push(children.iter().map(|run| run.text.as_str()).collect());
            }
            Self::BulletedList { children } => {
                for child in children {
                    child.collect_lines(out);
                }
            }
        }
    }
}

/// A run of text with optional formatting marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_doc_path_parse_and_display() {
        let path: DocPath = "notes_list/abc123".parse().unwrap();
        assert_eq!(path.collection(), "notes_list");
        assert_eq!(path.id(), "abc123");
        assert_eq!(path.to_string(), "notes_list/abc123");
    }

    #[test]
    fn test_doc_path_rejects_bad_segments() {
        assert!("notes".parse::<DocPath>().is_err());
        assert!("/id".parse::<DocPath>().is_err());
        assert!("notes/".parse::<DocPath>().is_err());
        assert!("notes/a/b".parse::<DocPath>().is_err());
        assert!(DocPath::new("notes", "").is_err());
    }

    #[test]
    fn test_doc_path_with_suffix() {
        let path = DocPath::new("notes", "shared_note").unwrap();
        let presence = path.with_suffix("_typing").unwrap();
        assert_eq!(presence.to_string(), "notes/shared_note_typing");
    }

    #[test]
    fn test_plain_content_is_json_string() {
        let content = Content::from("hello");
        assert_eq!(serde_json::to_value(&content).unwrap(), json!("hello"));
        let back: Content = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn test_rich_content_wire_shape() {
        let content = Content::Rich(vec![
            Block::HeadingOne {
                children: vec![TextRun::bold("Guests")],
            },
            Block::BulletedList {
                children: vec![Block::ListItem {
                    children: vec![TextRun::new("Aunt May")],
                }],
            },
        ]);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "heading-one", "children": [{"text": "Guests", "bold": true}]},
                {"type": "bulleted-list", "children": [
                    {"type": "list-item", "children": [{"text": "Aunt May"}]}
                ]}
            ])
        );
    }

    #[test]
    fn test_rich_plain_text_flattening() {
        let content = Content::Rich(vec![
            Block::paragraph("venue"),
            Block::BulletedList {
                children: vec![
                    Block::ListItem {
                        children: vec![TextRun::new("flo"), TextRun::bold("wers")],
                    },
                    Block::ListItem {
                        children: vec![TextRun::new("cake")],
                    },
                ],
            },
        ]);
        assert_eq!(content.plain_text(), "venue\nflowers\ncake");
    }

    #[test]
    fn test_blank_detection() {
        assert!(Content::default().is_blank());
        assert!(Content::from("  \n\t").is_blank());
        assert!(Content::Rich(vec![Block::paragraph(" ")]).is_blank());
        assert!(!Content::from(" x ").is_blank());
    }

    #[test]
    fn test_stored_document_field() {
        let doc = StoredDocument {
            path: DocPath::new("notes", "n1").unwrap(),
            data: json!({"content": "hi", "created": 42, "empty": null}),
            updated_at: UNIX_EPOCH,
            revision: 1,
        };
        assert_eq!(doc.field::<String>("content").unwrap().as_deref(), Some("hi"));
        assert_eq!(doc.field::<u64>("created").unwrap(), Some(42));
        assert_eq!(doc.field::<String>("empty").unwrap(), None);
        assert_eq!(doc.field::<String>("missing").unwrap(), None);
        assert!(doc.field::<u64>("content").is_err());
    }

    #[test]
    fn test_unix_millis() {
        let time = UNIX_EPOCH + std::time::Duration::from_millis(1_500);
        assert_eq!(unix_millis(time), 1_500);
        assert_eq!(unix_millis(UNIX_EPOCH), 0);
    }
}
