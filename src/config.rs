//! Application configuration
//!
//! Settings come from an optional JSON file; command-line flags override
//! individual values. Anything unspecified falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Process names and titles hidden from the dock
pub const DEFAULT_DENYLIST: &[&str] = &[
    "ApplicationFrameHost",
    "WindowsInternal",
    "ShellExperienceHost",
    "SearchHost",
    "TextInputHost",
    "StartMenuExperienceHost",
    "SystemSettings",
    "WidgetService",
    "WindowsShellExperience",
    "LockApp",
];

/// Patterns for the system-process filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Case-insensitive substrings matched against process name and title
    pub deny: Vec<String>,
    /// Process names exempt from the denylist
    pub allow: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            deny: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            allow: Vec::new(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DockConfig {
    /// Window registry poll interval
    pub refresh_interval_ms: u64,

    /// Directory receiving recordings
    pub recordings_dir: PathBuf,

    /// Screen sampling interval
    pub frame_interval_ms: u64,

    /// Frame rate declared in the container
    pub container_fps: u32,

    /// Requested audio sample rate
    pub audio_sample_rate: u32,

    pub capture_system_audio: bool,

    pub capture_microphone: bool,

    pub filter: FilterConfig,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 3000,
            recordings_dir: default_recordings_dir(),
            frame_interval_ms: 33,
            container_fps: 20,
            audio_sample_rate: 44100,
            capture_system_audio: true,
            capture_microphone: true,
            filter: FilterConfig::default(),
        }
    }
}

impl DockConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DockConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject values that would stall or break the pipelines
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "refreshIntervalMs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "frameIntervalMs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.container_fps == 0 || self.container_fps > 240 {
            return Err(ConfigError::Invalid {
                field: "containerFps",
                reason: format!("{} is outside 1..=240", self.container_fps),
            });
        }
        if !(8000..=192_000).contains(&self.audio_sample_rate) {
            return Err(ConfigError::Invalid {
                field: "audioSampleRate",
                reason: format!("{} Hz is not supported", self.audio_sample_rate),
            });
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// `<Documents>/Recordings`, or `./Recordings` when there is no documents folder
pub fn default_recordings_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Recordings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = DockConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(3));
        assert_eq!(config.frame_interval_ms, 33);
        assert_eq!(config.container_fps, 20);
        assert!(config.filter.deny.iter().any(|p| p == "LockApp"));
        assert!(config.filter.allow.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dock.json");
        std::fs::write(&path, r#"{ "containerFps": 30, "filter": { "allow": ["SearchHostHelper"] } }"#).unwrap();

        let config = DockConfig::load(&path).unwrap();
        assert_eq!(config.container_fps, 30);
        assert_eq!(config.refresh_interval_ms, 3000);
        assert_eq!(config.filter.allow, vec!["SearchHostHelper".to_string()]);
        // Omitted deny list falls back to the default patterns
        assert_eq!(config.filter.deny.len(), DEFAULT_DENYLIST.len());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dock.json");
        std::fs::write(&path, r#"{ "frameIntervalMs": 0 }"#).unwrap();
        assert!(matches!(
            DockConfig::load(&path),
            Err(ConfigError::Invalid { field: "frameIntervalMs", .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dock.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(DockConfig::load(&path), Err(ConfigError::Json(_))));
    }
}
