//! Settings parser for ~/.config/ivimon/config.toml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ivimon_core::prelude::*;
use ivimon_core::DEFAULT_LIVE_CAPACITY;

use crate::archive::DEFAULT_ROTATE_MB;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = "ivimon";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Monitor configuration
///
/// Every field has a default, so a missing or partial config file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the adb binary; anything resolvable via PATH works
    pub adb_path: String,
    pub live_view: LiveViewSettings,
    pub logcat: LogcatSettings,
    pub archive: ArchiveSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            live_view: LiveViewSettings::default(),
            logcat: LogcatSettings::default(),
            archive: ArchiveSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveViewSettings {
    /// Maximum records held for display
    pub capacity: usize,
    /// Keep unparseable lines as UNKNOWN records instead of dropping them
    pub keep_unparsed: bool,
}

impl Default for LiveViewSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LIVE_CAPACITY,
            keep_unparsed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogcatSettings {
    /// Flush the device-side buffer before streaming starts
    pub clear_on_start: bool,
    /// Optional `logcat -G` size applied before streaming, e.g. "16M"
    pub buffer_size: Option<String>,
}

impl Default for LogcatSettings {
    fn default() -> Self {
        Self {
            clear_on_start: true,
            buffer_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// Directory for archive files; `None` disables archival
    pub directory: Option<PathBuf>,
    /// Rotation threshold in megabytes
    pub rotate_mb: u64,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            directory: None,
            rotate_mb: DEFAULT_ROTATE_MB,
        }
    }
}

impl ArchiveSettings {
    pub fn rotate_bytes(&self) -> u64 {
        self.rotate_mb * 1024 * 1024
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Settings {
    /// Path of the user-level config file, if a config directory exists
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
    }

    /// Load settings from the user-level config file
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load() -> Settings {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this host, using defaults");
                Settings::default()
            }
        }
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Settings {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Settings::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    debug!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse {:?}: {}", path, e);
                    Settings::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                Settings::default()
            }
        }
    }

    /// Save settings to a specific path
    ///
    /// Uses atomic write (temp file + rename) for safety.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::config(format!("Failed to create config dir: {}", e)))?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
        let full_content = format!("{}{}", config_header(), content);

        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &full_content)
            .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;
        std::fs::rename(&temp_path, path)
            .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Save settings to the user-level config file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| Error::config("No config directory on this host"))?;
        self.save_to(&path)
    }
}

fn config_header() -> String {
    "# IVI log monitor configuration\n\
     # Missing values fall back to their defaults\n\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let settings = Settings::load_from(&temp.path().join("config.toml"));

        assert_eq!(settings.adb_path, "adb");
        assert_eq!(settings.live_view.capacity, DEFAULT_LIVE_CAPACITY);
        assert!(settings.live_view.keep_unparsed);
        assert!(settings.logcat.clear_on_start);
        assert!(settings.logcat.buffer_size.is_none());
        assert!(settings.archive.directory.is_none());
        assert_eq!(settings.archive.rotate_mb, DEFAULT_ROTATE_MB);
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");

        let config = r#"
adb_path = "/opt/platform-tools/adb"

[logcat]
clear_on_start = false
buffer_size = "16M"
"#;
        std::fs::write(&path, config).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.adb_path, "/opt/platform-tools/adb");
        assert!(!settings.logcat.clear_on_start);
        assert_eq!(settings.logcat.buffer_size.as_deref(), Some("16M"));
        // Untouched sections stay at defaults.
        assert_eq!(settings.live_view.capacity, DEFAULT_LIVE_CAPACITY);
        assert_eq!(settings.archive.rotate_mb, DEFAULT_ROTATE_MB);
    }

    #[test]
    fn test_load_invalid_toml_gives_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "not valid toml {{{{").unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.adb_path = "/usr/local/bin/adb".to_string();
        settings.live_view.capacity = 2000;
        settings.live_view.keep_unparsed = false;
        settings.archive.directory = Some(PathBuf::from("/var/log/ivimon"));
        settings.archive.rotate_mb = 10;

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path);

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_save_is_atomic() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");

        Settings::default().save_to(&path).unwrap();

        assert!(path.exists());
        assert!(!temp.path().join("config.toml.tmp").exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# IVI log monitor configuration"));
    }

    #[test]
    fn test_rotate_bytes() {
        let archive = ArchiveSettings::default();
        assert_eq!(archive.rotate_bytes(), 50 * 1024 * 1024);

        let small = ArchiveSettings {
            rotate_mb: 1,
            ..Default::default()
        };
        assert_eq!(small.rotate_bytes(), 1024 * 1024);
    }
}
