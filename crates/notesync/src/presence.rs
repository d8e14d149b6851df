//! Typing-presence flags.
//!
//! Each note has a sibling document holding `{ "typing": bool, "clientId": .. }`.
//! It is overwritten on every local presence transition and never retained.

use notesync_core::{Result, StoredDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Random identifier of one editing client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload of a presence document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceFlag {
    pub typing: bool,
    #[serde(default)]
    pub client_id: Option<ClientId>,
}

impl PresenceFlag {
    pub fn new(typing: bool, client_id: &ClientId) -> Self {
        Self {
            typing,
            client_id: Some(client_id.clone()),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "typing": self.typing,
            "clientId": self.client_id,
        })
    }

    /// Reads a flag from a stored presence document.
    pub fn from_document(doc: &StoredDocument) -> Result<Self> {
        Ok(Self {
            typing: doc.field("typing")?.unwrap_or(false),
            client_id: doc.field("clientId")?,
        })
    }
}

/// Whether a stored presence document means "someone else is typing".
///
/// Flags written by `own` are ignored, as are flags older than `stale_after`
/// relative to `now`, so a client that vanished mid-burst does not leave the
/// indicator on forever.
pub fn is_remote_typing(
    doc: Option<&StoredDocument>,
    own: &ClientId,
    stale_after: Duration,
    now: SystemTime,
) -> bool {
    let Some(doc) = doc else {
        return false;
    };

    let flag = match PresenceFlag::from_document(doc) {
        Ok(flag) => flag,
        Err(e) => {
            tracing::debug!("Ignoring malformed presence flag {}: {}", doc.path, e);
            return false;
        }
    };

    if !flag.typing || flag.client_id.as_ref() == Some(own) {
        return false;
    }

    match now.duration_since(doc.updated_at) {
        Ok(age) => age <= stale_after,
        // Written "in the future" by a skewed clock; treat as fresh
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::DocPath;
    use serde_json::json;

    fn presence_doc(data: serde_json::Value, updated_at: SystemTime) -> StoredDocument {
        StoredDocument {
            path: DocPath::new("notes", "shared_note_typing").unwrap(),
            data,
            updated_at,
            revision: 1,
        }
    }

    #[test]
    fn test_flag_wire_shape() {
        let flag = PresenceFlag::new(true, &ClientId::from("c1"));
        assert_eq!(flag.to_value(), json!({"typing": true, "clientId": "c1"}));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(ClientId::generate(), ClientId::generate());
    }

    #[test]
    fn test_remote_typing_from_other_client() {
        let now = SystemTime::now();
        let doc = presence_doc(json!({"typing": true, "clientId": "other"}), now);
        assert!(is_remote_typing(
            Some(&doc),
            &ClientId::from("me"),
            Duration::from_secs(10),
            now
        ));
    }

    #[test]
    fn test_own_flag_is_ignored() {
        let now = SystemTime::now();
        let doc = presence_doc(json!({"typing": true, "clientId": "me"}), now);
        assert!(!is_remote_typing(
            Some(&doc),
            &ClientId::from("me"),
            Duration::from_secs(10),
            now
        ));
    }

    #[test]
    fn test_flag_without_client_counts_as_remote() {
        let now = SystemTime::now();
        let doc = presence_doc(json!({"typing": true}), now);
        assert!(is_remote_typing(
            Some(&doc),
            &ClientId::from("me"),
            Duration::from_secs(10),
            now
        ));
    }

    #[test]
    fn test_not_typing_and_missing() {
        let now = SystemTime::now();
        let doc = presence_doc(json!({"typing": false, "clientId": "other"}), now);
        let me = ClientId::from("me");
        assert!(!is_remote_typing(Some(&doc), &me, Duration::from_secs(10), now));
        assert!(!is_remote_typing(None, &me, Duration::from_secs(10), now));
    }

    #[test]
    fn test_stale_flag_is_ignored() {
        let written = SystemTime::now();
        let doc = presence_doc(json!({"typing": true, "clientId": "other"}), written);
        let later = written + Duration::from_secs(30);
        assert!(!is_remote_typing(
            Some(&doc),
            &ClientId::from("me"),
            Duration::from_secs(10),
            later
        ));
    }

    #[test]
    fn test_malformed_flag_is_ignored() {
        let now = SystemTime::now();
        let doc = presence_doc(json!({"typing": "yes"}), now);
        assert!(!is_remote_typing(
            Some(&doc),
            &ClientId::from("me"),
            Duration::from_secs(10),
            now
        ));
    }
}
