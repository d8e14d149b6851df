use notesync_core::{Result, SyncError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration for notesync sessions.
///
/// Usually loaded from a JSON file. All fields use sensible defaults if not
/// specified.
///
/// # Examples
///
/// ```
/// use notesync::config::SyncConfig;
///
/// let json = r#"{
///     "debounce": { "idle_ms": 750 },
///     "presence": { "enabled": false }
/// }"#;
///
/// let config: SyncConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.debounce.idle_ms, 750);
/// assert!(!config.presence.enabled);
/// assert_eq!(config.collections.notes, "notes");
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
}

impl SyncConfig {
    /// Reads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            SyncError::Config(format!("{}: {}", path.display(), e))
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Timing of debounced persistence.
///
/// # Defaults
///
/// - `idle_ms`: `1000` - quiet period before buffered edits are written
/// - `saving_display_ms`: `600` - how long "saving" stays visible after a write
#[derive(Debug, Clone, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_idle_ms", deserialize_with = "deserialize_idle_ms")]
    pub idle_ms: u64,
    #[serde(
        default = "default_saving_display_ms",
        deserialize_with = "deserialize_saving_display_ms"
    )]
    pub saving_display_ms: u64,
}

impl DebounceConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn saving_display(&self) -> Duration {
        Duration::from_millis(self.saving_display_ms)
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            idle_ms: default_idle_ms(),
            saving_display_ms: default_saving_display_ms(),
        }
    }
}

/// Typing-presence signalling.
///
/// # Defaults
///
/// - `enabled`: `true`
/// - `settle_ms`: `2000` - quiet period before `typing=false` is written
/// - `stale_after_ms`: `10000` - remote flags older than this are ignored
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_settle_ms", deserialize_with = "deserialize_settle_ms")]
    pub settle_ms: u64,
    #[serde(
        default = "default_stale_after_ms",
        deserialize_with = "deserialize_stale_after_ms"
    )]
    pub stale_after_ms: u64,
}

impl PresenceConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// How often `typing=true` is rewritten during a long burst, so viewers
    /// never see the flag go stale while the writer is still typing.
    pub fn refresh_interval(&self) -> Duration {
        self.stale_after() / 2
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_ms: default_settle_ms(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

/// Collection names used in the remote store.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "default_notes_collection")]
    pub notes: String,
    #[serde(default = "default_saved_notes_collection")]
    pub saved_notes: String,
    /// Appended to a note id to derive its presence flag id.
    #[serde(default = "default_presence_suffix")]
    pub presence_suffix: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            notes: default_notes_collection(),
            saved_notes: default_saved_notes_collection(),
            presence_suffix: default_presence_suffix(),
        }
    }
}

// Default value functions
const fn default_true() -> bool {
    true
}

const fn default_idle_ms() -> u64 {
    1000
}

const fn default_saving_display_ms() -> u64 {
    600
}

const fn default_settle_ms() -> u64 {
    2000
}

const fn default_stale_after_ms() -> u64 {
    10_000
}

fn default_notes_collection() -> String {
    "notes".to_string()
}

fn default_saved_notes_collection() -> String {
    "notes_list".to_string()
}

fn default_presence_suffix() -> String {
    "_typing".to_string()
}

const MIN_IDLE_MS: u64 = 10;
const MAX_IDLE_MS: u64 = 60_000;
const MIN_SETTLE_MS: u64 = 100;
const MAX_SETTLE_MS: u64 = 120_000;
const MAX_SAVING_DISPLAY_MS: u64 = 10_000;
const MIN_STALE_AFTER_MS: u64 = 1_000;
const MAX_STALE_AFTER_MS: u64 = 600_000;

fn clamp_ms(name: &str, value: u64, min: u64, max: u64) -> u64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(
            "{} of {}ms is outside {}..={}ms, using {}ms",
            name,
            value,
            min,
            max,
            clamped
        );
    }
    clamped
}

fn deserialize_idle_ms<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = u64::deserialize(deserializer)?;
    Ok(clamp_ms("idle_ms", value, MIN_IDLE_MS, MAX_IDLE_MS))
}

fn deserialize_settle_ms<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = u64::deserialize(deserializer)?;
    Ok(clamp_ms("settle_ms", value, MIN_SETTLE_MS, MAX_SETTLE_MS))
}

fn deserialize_saving_display_ms<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = u64::deserialize(deserializer)?;
    Ok(clamp_ms("saving_display_ms", value, 0, MAX_SAVING_DISPLAY_MS))
}

fn deserialize_stale_after_ms<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = u64::deserialize(deserializer)?;
    Ok(clamp_ms(
        "stale_after_ms",
        value,
        MIN_STALE_AFTER_MS,
        MAX_STALE_AFTER_MS,
    ))
}
