//! EFM viewer configuration system
//!
//! Loads viewer settings from `efm.toml` (current directory first, then the
//! user configuration directory), with environment variable overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "efm.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure for the viewer
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct EfmConfig {
    /// Playback settings
    pub viewer: ViewerSettings,
    /// DOM selectors the viewer binds to
    pub selectors: SelectorConfig,
    /// Timeline engine settings
    pub timeline: TimelineSettings,
    /// Logging and debug switches
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerSettings {
    /// Playback speed multiplier; strip duration is divided by it
    pub speed: f64,
    /// Minutes moved by the skip forward/backward buttons
    pub skip_offset_minutes: f64,
    /// Key the strip configuration is cached under by the host
    pub storage_id: String,
}

/// Selectors for every element the viewer renders into or listens on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    pub viewer: String,
    pub media: String,
    pub loader: String,
    pub controls: String,
    pub timeline: String,
    pub timer: String,
    pub control_bar: String,
    pub media_collection: String,
    pub media_item_image: String,
    pub play_button: String,
    pub seek_bar: String,
    pub forward_time_button: String,
    pub backward_time_button: String,
    pub play_speed: String,
    pub menu_bar: String,
    pub menu_bar_strips: String,
    pub menu_bar_button: String,
    pub menu_bar_dropdown_item: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineSettings {
    /// How many per-strip timelines stay cached (most recently used first)
    pub cache_capacity: usize,
    /// Frame interval the host binary simulates, in milliseconds
    pub frame_interval_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Verbose logging for renders and timeline ticks
    pub debug: bool,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            skip_offset_minutes: 15.0,
            storage_id: "efm__configData".to_string(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            viewer: "[data-efm-viewer]".to_string(),
            media: ".efm__media".to_string(),
            loader: ".efm__loader".to_string(),
            controls: ".efm__controls".to_string(),
            timeline: ".efm__timeline".to_string(),
            timer: ".efm__timer".to_string(),
            control_bar: ".efm__controlBar".to_string(),
            media_collection: ".efm__media-collection".to_string(),
            media_item_image: ".efm__media-item img".to_string(),
            play_button: ".efm__play-pause".to_string(),
            seek_bar: ".efm__seek-bar".to_string(),
            forward_time_button: ".efm__forward".to_string(),
            backward_time_button: ".efm__backward".to_string(),
            play_speed: ".efm__play-speed".to_string(),
            menu_bar: ".efm__menuBar".to_string(),
            menu_bar_strips: ".dropdown-menu__strips".to_string(),
            menu_bar_button: ".efm__menuBar-strip--title".to_string(),
            menu_bar_dropdown_item: ".dropdown-item".to_string(),
        }
    }
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 4,
            frame_interval_ms: 1000.0 / 60.0,
        }
    }
}

fn env_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl EfmConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Candidate locations, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("efm").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load the first config file found on the search path, or defaults
    pub fn load_or_default() -> Self {
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded configuration");
                    return config;
                }
                Err(error) => warn!(%error, "ignoring unreadable configuration"),
            }
        }
        Self::default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Ok(val) = std::env::var("EFM_SPEED") {
            match val.parse::<f64>() {
                Ok(speed) if speed > 0.0 => self.viewer.speed = speed,
                _ => warn!(value = %val, "EFM_SPEED must be a positive number"),
            }
        }
        if let Ok(val) = std::env::var("EFM_SKIP_OFFSET") {
            if let Ok(minutes) = val.parse::<f64>() {
                self.viewer.skip_offset_minutes = minutes;
            }
        }
        if let Ok(val) = std::env::var("EFM_TIMELINE_CACHE") {
            if let Ok(capacity) = val.parse::<usize>() {
                self.timeline.cache_capacity = capacity.max(1);
            }
        }
        if let Ok(val) = std::env::var("EFM_DEBUG") {
            self.diagnostics.debug = env_flag(&val);
        }
        if let Ok(filter) = std::env::var("EFM_LOG") {
            self.diagnostics.log_filter = Some(filter);
        }
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.viewer.speed.is_finite() && self.viewer.speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "viewer.speed must be positive, got {}",
                self.viewer.speed
            )));
        }
        if self.timeline.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "timeline.cache_capacity must be at least 1".to_string(),
            ));
        }
        let interval = self.timeline.frame_interval_ms;
        if !(interval.is_finite() && interval > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "timeline.frame_interval_ms must be positive, got {interval}"
            )));
        }
        Ok(())
    }

    /// Filter directive for the log subscriber.
    pub fn log_filter(&self) -> String {
        match (&self.diagnostics.log_filter, self.diagnostics.debug) {
            (Some(filter), _) => filter.clone(),
            (None, true) => "debug".to_string(),
            (None, false) => "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EfmConfig::default();
        assert_eq!(config.viewer.speed, 1.0);
        assert_eq!(config.viewer.skip_offset_minutes, 15.0);
        assert_eq!(config.timeline.cache_capacity, 4);
        assert_eq!(config.selectors.seek_bar, ".efm__seek-bar");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = EfmConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EfmConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[viewer]\nspeed = 2.0\n\n[timeline]\ncache_capacity = 2").unwrap();
        let config = EfmConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.viewer.speed, 2.0);
        assert_eq!(config.viewer.skip_offset_minutes, 15.0);
        assert_eq!(config.timeline.cache_capacity, 2);
        assert_eq!(config.selectors.media, ".efm__media");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[viewer]\nspeed = 0.0").unwrap();
        assert!(matches!(
            EfmConfig::load_from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[viewer\nspeed = ").unwrap();
        assert!(matches!(
            EfmConfig::load_from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        assert!(matches!(
            EfmConfig::load_from_file("/definitely/not/here/efm.toml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_non_finite_frame_interval_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeline]\nframe_interval_ms = nan").unwrap();
        assert!(matches!(
            EfmConfig::load_from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let mut config = EfmConfig::default();
        config.timeline.frame_interval_ms = f64::INFINITY;
        assert!(config.validate().is_err());
        config.timeline.frame_interval_ms = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        // Should not panic even if efm.toml doesn't exist
        let config = EfmConfig::load_or_default();
        assert!(config.viewer.speed > 0.0);
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("EFM_SPEED", "4");
            std::env::set_var("EFM_DEBUG", "true");
            std::env::set_var("EFM_TIMELINE_CACHE", "0");
        }

        let mut config = EfmConfig::default();
        config.merge_with_env();

        assert_eq!(config.viewer.speed, 4.0);
        assert!(config.diagnostics.debug);
        assert_eq!(config.timeline.cache_capacity, 1);
        assert_eq!(config.log_filter(), "debug");

        unsafe {
            std::env::remove_var("EFM_SPEED");
            std::env::remove_var("EFM_DEBUG");
            std::env::remove_var("EFM_TIMELINE_CACHE");
        }
    }
}
