//! Configuration types for music-dl

use crate::error::{Error, Result};
use crate::types::Quality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// User-facing download settings
///
/// These are the values a settings screen edits; the manager reads them through
/// [`SettingsStore`] on every request, so changes apply to the next request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory downloaded files are saved to (default: "./downloads")
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    /// Quality used when a request does not name one (default: 320k)
    #[serde(default)]
    pub default_quality: Quality,

    /// Fetch and save lyrics next to each completed download (default: false)
    #[serde(default)]
    pub download_lyrics: bool,

    /// File name pattern; `{name}` and `{singer}` are substituted (default: "{name} - {singer}")
    #[serde(default = "default_file_name_template")]
    pub file_name_template: String,

    /// Extension of the lyric sidecar file (default: "lrc")
    #[serde(default = "default_lyric_extension")]
    pub lyric_extension: String,
}

impl Settings {
    /// Check the values every request builds file names from
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.file_name_template.trim().is_empty() {
            return Err(Error::Config {
                message: "file_name_template must not be empty".to_string(),
                key: Some("file_name_template".to_string()),
            });
        }
        if self.lyric_extension.trim_matches('.').is_empty() {
            return Err(Error::Config {
                message: "lyric_extension must not be empty".to_string(),
                key: Some("lyric_extension".to_string()),
            });
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            default_quality: Quality::default(),
            download_lyrics: false,
            file_name_template: default_file_name_template(),
            lyric_extension: default_lyric_extension(),
        }
    }
}

/// What to do with the `.part` file when a lifecycle ends without completing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialFileAction {
    /// Leave partial bytes on disk (the next lifecycle truncates them)
    #[default]
    Keep,
    /// Delete the partial file on cancel and on error
    Delete,
}

/// HTTP transport settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP connect timeout in seconds (default: 15)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Maximum time between two received chunks in seconds (default: 60)
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
        }
    }
}

/// Main configuration for [`DownloadManager`](crate::DownloadManager)
///
/// User settings are flattened so the JSON form stays a single flat object
/// apart from the `transport` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// User-facing settings (seed for the default settings store)
    #[serde(flatten)]
    pub settings: Settings,

    /// Maximum simultaneously transferring tasks (default: 3; 1 = serial)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Partial file handling on cancel/error (default: keep)
    #[serde(default)]
    pub partial_files: PartialFileAction,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// HTTP transport settings
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            max_concurrent_downloads: default_max_concurrent(),
            partial_files: PartialFileAction::default(),
            event_buffer: default_event_buffer(),
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file (JSON)
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::filesystem(path, e))?;
        Self::from_json_str(&json)
    }

    /// Check values that have no sensible interpretation
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        if self.event_buffer == 0 {
            return Err(Error::Config {
                message: "event_buffer must be at least 1".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }
        self.settings.validate()
    }
}

/// Read-only view of the user settings, consulted on every request
pub trait SettingsStore: Send + Sync {
    /// Directory downloads are written to
    fn save_dir(&self) -> PathBuf;
    /// Quality used when a request does not name one
    fn default_quality(&self) -> Quality;
    /// Whether to fetch lyric sidecars
    fn download_lyrics(&self) -> bool;
    /// File name pattern
    fn file_name_template(&self) -> String {
        default_file_name_template()
    }
    /// Lyric sidecar extension
    fn lyric_extension(&self) -> String {
        default_lyric_extension()
    }
}

impl SettingsStore for Settings {
    fn save_dir(&self) -> PathBuf {
        self.save_dir.clone()
    }

    fn default_quality(&self) -> Quality {
        self.default_quality
    }

    fn download_lyrics(&self) -> bool {
        self.download_lyrics
    }

    fn file_name_template(&self) -> String {
        self.file_name_template.clone()
    }

    fn lyric_extension(&self) -> String {
        self.lyric_extension.clone()
    }
}

/// Runtime-updatable settings shared between the manager and a settings UI
#[derive(Clone, Debug, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    /// Wrap initial settings
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> Settings {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Apply a change; it takes effect for the next request
    ///
    /// The change is applied to a copy and only stored if the result validates, so
    /// a rejected update leaves the current settings untouched.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = guard.clone();
        f(&mut next);
        next.validate()?;
        *guard = next;
        Ok(())
    }
}

impl SettingsStore for SharedSettings {
    fn save_dir(&self) -> PathBuf {
        self.snapshot().save_dir
    }

    fn default_quality(&self) -> Quality {
        self.snapshot().default_quality
    }

    fn download_lyrics(&self) -> bool {
        self.snapshot().download_lyrics
    }

    fn file_name_template(&self) -> String {
        self.snapshot().file_name_template
    }

    fn lyric_extension(&self) -> String {
        self.snapshot().lyric_extension
    }
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_file_name_template() -> String {
    "{name} - {singer}".to_string()
}

fn default_lyric_extension() -> String {
    "lrc".to_string()
}

fn default_max_concurrent() -> usize {
    3
}

fn default_event_buffer() -> usize {
    1000
}

fn default_user_agent() -> String {
    format!("music-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(60)
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
