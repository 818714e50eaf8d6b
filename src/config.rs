//! Configuration management

use crate::{Result, VoxError};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Default XTTS model used for voice cloning
pub const DEFAULT_XTTS_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

/// Outputs smaller than this are treated as empty
pub const DEFAULT_MIN_OUTPUT_BYTES: u64 = 1000;

/// Application configuration
///
/// Persistent defaults for synthesis parameters, batch layout and engine
/// selection. Command line flags override these per run.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.voxbatch.cfg)
    path: PathBuf,
}

impl Config {
    /// Load configuration from the default location, creating it if needed
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, writing the defaults there if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(path)
                .map_err(|e| VoxError::Config(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default at {:?}", path);
            let default = Self::default_config();
            default
                .write_to_file(path)
                .map_err(|e| VoxError::Config(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self {
            ini,
            path: path.to_path_buf(),
        })
    }

    /// Built-in defaults, not backed by any file on disk
    pub fn defaults() -> Self {
        Self {
            ini: Self::default_config(),
            path: Self::config_path(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| VoxError::Config(format!("Failed to save config: {}", e)))
    }

    /// Get config file path (~/.voxbatch.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}.cfg", crate::APP_NAME))
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("synthesis"))
            .set("language", "auto")
            .set("speed", "1.0")
            .set("output_format", "wav")
            .set("min_output_bytes", DEFAULT_MIN_OUTPUT_BYTES.to_string());

        ini.with_section(Some("batch"))
            .set("output_dir", "output_audio")
            .set("file_prefix", "audio")
            .set("text_field", "text");

        ini.with_section(Some("engines"))
            .set("disabled", "")
            .set("xtts_model", DEFAULT_XTTS_MODEL);

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    // Synthesis settings

    /// Default language, `None` when it should be detected from the text
    pub fn language(&self) -> Option<String> {
        let lang = self.get_string("synthesis", "language", "auto");
        let lang = lang.trim();
        if lang.is_empty() || lang.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(lang.to_string())
        }
    }

    /// Default speech speed multiplier
    pub fn speed(&self) -> f32 {
        self.get_float("synthesis", "speed", 1.0)
    }

    /// Audio format written to the output directory
    pub fn output_format(&self) -> String {
        self.get_string("synthesis", "output_format", "wav")
            .trim()
            .trim_start_matches('.')
            .to_lowercase()
    }

    /// Minimum size of an engine output before it counts as audio
    pub fn min_output_bytes(&self) -> u64 {
        self.get_int("synthesis", "min_output_bytes", DEFAULT_MIN_OUTPUT_BYTES as i64)
            .try_into()
            .unwrap_or(DEFAULT_MIN_OUTPUT_BYTES)
    }

    // Batch settings

    /// Directory batch outputs are written to
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.get_string("batch", "output_dir", "output_audio"))
    }

    /// Prefix of the per-item output file names
    pub fn file_prefix(&self) -> String {
        self.get_string("batch", "file_prefix", "audio")
    }

    /// CSV column / JSON field holding the text
    pub fn text_field(&self) -> String {
        self.get_string("batch", "text_field", "text")
    }

    // Engine settings

    /// Engine ids that must not be tried
    pub fn disabled_engines(&self) -> Vec<String> {
        self.get_string("engines", "disabled", "")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether the engine with this id may be used
    pub fn engine_enabled(&self, id: &str) -> bool {
        !self.disabled_engines().iter().any(|d| d == id)
    }

    /// Model name passed to the XTTS engine
    pub fn xtts_model(&self) -> String {
        self.get_string("engines", "xtts_model", DEFAULT_XTTS_MODEL)
    }

    /// Executable override for an engine (`<id>_command` in `[engines]`)
    pub fn engine_command(&self, id: &str) -> Option<String> {
        self.ini
            .get_from(Some("engines"), &format!("{}_command", id))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::defaults();
        assert_eq!(config.language(), None);
        assert_eq!(config.speed(), 1.0);
        assert_eq!(config.output_format(), "wav");
        assert_eq!(config.min_output_bytes(), 1000);
        assert_eq!(config.file_prefix(), "audio");
        assert_eq!(config.text_field(), "text");
        assert!(config.disabled_engines().is_empty());
        assert_eq!(config.xtts_model(), DEFAULT_XTTS_MODEL);
        assert_eq!(config.engine_command("espeak"), None);
        assert!(config.path().ends_with(".voxbatch.cfg"));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::defaults();
        config.set("synthesis", "language", "uk");
        config.set("synthesis", "output_format", ".MP3");
        config.set("engines", "disabled", "say, GTTS");
        config.set("engines", "espeak_command", "/opt/bin/espeak-ng");

        assert_eq!(config.language().as_deref(), Some("uk"));
        assert_eq!(config.output_format(), "mp3");
        assert!(!config.engine_enabled("gtts"));
        assert!(!config.engine_enabled("say"));
        assert!(config.engine_enabled("xtts"));
        assert_eq!(
            config.engine_command("espeak").as_deref(),
            Some("/opt/bin/espeak-ng")
        );
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let mut config = Config::defaults();
        config.set("synthesis", "speed", "fast");
        config.set("synthesis", "min_output_bytes", "-5");
        assert_eq!(config.speed(), 1.0);
        assert_eq!(config.min_output_bytes(), DEFAULT_MIN_OUTPUT_BYTES);
    }
}
