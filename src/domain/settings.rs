use crate::domain::profiles::ServiceKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "sensor_session".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // Session timing
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    #[serde(default = "default_feature_read_timeout_ms")]
    pub feature_read_timeout_ms: u64,
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    /// Buffered measurement events before the pump waits for the subscriber
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default)]
    pub last_service: Option<ServiceKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            feature_read_timeout_ms: default_feature_read_timeout_ms(),
            scan_timeout_ms: default_scan_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            last_service: None,
        }
    }
}

impl Settings {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn feature_read_timeout(&self) -> Duration {
        Duration::from_millis(self.feature_read_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

fn default_discovery_timeout_ms() -> u64 {
    1000
}
fn default_feature_read_timeout_ms() -> u64 {
    1000
}
fn default_scan_timeout_ms() -> u64 {
    10_000
}
fn default_event_channel_capacity() -> usize {
    64
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load settings from an explicit file, falling back to defaults when it
    /// is missing or unreadable
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("SensorSession");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.settings_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    /// Remember the service used for the most recent session
    pub fn remember_service(&mut self, kind: ServiceKind) -> anyhow::Result<()> {
        if self.settings.last_service != Some(kind) {
            self.settings.last_service = Some(kind);
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.discovery_timeout(), Duration::from_secs(1));
        assert_eq!(settings.feature_read_timeout(), Duration::from_secs(1));
        assert_eq!(settings.event_channel_capacity, 64);
        assert_eq!(settings.log_settings.level, "info");
        assert!(settings.last_service.is_none());
    }

    #[test]
    fn test_service_kind_persists_in_kebab_case() {
        let settings = Settings {
            last_service: Some(ServiceKind::RunningSpeedAndCadence),
            ..Settings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"running-speed-and-cadence\""));

        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.last_service, Some(ServiceKind::RunningSpeedAndCadence));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join(format!("sensor_session_test_{}", std::process::id()));
        let path = dir.join("settings.json");

        let mut service = SettingsService::with_path(path.clone());
        service.get_mut().feature_read_timeout_ms = 250;
        service.remember_service(ServiceKind::Battery).unwrap();

        let reloaded = SettingsService::with_path(path);
        assert_eq!(reloaded.get().feature_read_timeout_ms, 250);
        assert_eq!(reloaded.get().last_service, Some(ServiceKind::Battery));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("sensor_session_missing/none.json");
        let service = SettingsService::with_path(path);
        assert_eq!(service.get().scan_timeout(), Duration::from_secs(10));
    }
}
