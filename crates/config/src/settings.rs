// Application settings
// Loaded from ~/.config/clientlink/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clientlink_queue::{
    default_queue_path, DispatchConfig, DEFAULT_MAX_PENDING, DEFAULT_POLL_INTERVAL,
    DEFAULT_TIMEOUT,
};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Queue
    #[serde(rename = "queue.path")]
    pub queue_path: Option<PathBuf>, // None = shared memory default

    #[serde(rename = "queue.pollIntervalMs")]
    pub poll_interval_ms: u64,

    #[serde(rename = "queue.timeoutMs")]
    pub timeout_ms: u64,

    #[serde(rename = "queue.maxPending")]
    pub max_pending: usize,

    // Status
    #[serde(rename = "status.path")]
    pub status_path: Option<PathBuf>,

    // Scripts
    #[serde(rename = "script.modulePaths")]
    pub module_paths: Vec<PathBuf>,

    // Session
    #[serde(rename = "session.stopGraceMs")]
    pub stop_grace_ms: u64,

    // Logging
    #[serde(rename = "log.level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Queue
            queue_path: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_pending: DEFAULT_MAX_PENDING,
            // Status
            status_path: None,
            // Scripts
            module_paths: Vec::new(),
            // Session
            stop_grace_ms: 2000,
            // Logging
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clientlink");
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, writing a commented default
    /// file if there is none yet
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load settings from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                log::warn!("Error parsing {}: {}", path.display(), e);
                log::warn!("Using default settings");
                Self::default()
            }),
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with // are comments.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Save current settings to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io { path: path.to_path_buf(), source };

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_error)
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Shared command queue (null = /dev/shm/clientlink/queue.json or the temp dir)
    "queue.path": null,
    "queue.pollIntervalMs": 50,
    "queue.timeoutMs": 3000,
    "queue.maxPending": 100,

    // Status snapshot written by the client's status collector
    "status.path": null,

    // Extra directories searched by require()
    "script.modulePaths": [],

    // How long stop waits for a script to wind down
    "session.stopGraceMs": 2000,

    // error, warn, info, debug, trace (RUST_LOG overrides)
    "log.level": "info"
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }

    /// Queue file, resolving the shared memory default
    pub fn resolved_queue_path(&self) -> PathBuf {
        self.queue_path.clone().unwrap_or_else(default_queue_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl From<&Settings> for DispatchConfig {
    fn from(settings: &Settings) -> Self {
        DispatchConfig {
            max_pending: settings.max_pending,
            poll_interval: settings.poll_interval(),
            timeout: settings.queue_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEFAULT_FILE: &str = r#"{
    // comment
    "queue.timeoutMs": 3000
}"#;

    #[test]
    fn test_defaults_match_dispatcher() {
        let settings = Settings::default();
        assert_eq!(DispatchConfig::from(&settings), DispatchConfig::default());
        assert_eq!(settings.stop_grace(), Duration::from_secs(2));
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_parse_strips_comments_and_fills_defaults() {
        let settings = Settings::parse(DEFAULT_FILE).unwrap();
        assert_eq!(settings, Settings::default());

        let custom = Settings::parse(
            r#"{
            // faster polling
            "queue.pollIntervalMs": 10,
            "queue.path": "/tmp/q.json",
            "script.modulePaths": ["/opt/scripts"]
        }"#,
        )
        .unwrap();
        assert_eq!(custom.poll_interval(), Duration::from_millis(10));
        assert_eq!(custom.resolved_queue_path(), PathBuf::from("/tmp/q.json"));
        assert_eq!(custom.module_paths, vec![PathBuf::from("/opt/scripts")]);
        assert_eq!(custom.max_pending, 100);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ \"queue.timeoutMs\": \"soon\" }").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(Settings::load_from(&dir.path().join("missing.json")), Settings::default());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings { timeout_ms: 500, stop_grace_ms: 100, ..Settings::default() };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
        assert_eq!(DispatchConfig::from(&loaded).timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_default_file_parses_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        Settings::default().create_default_file(&path);
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
