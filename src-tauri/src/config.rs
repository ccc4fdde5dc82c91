//! Configuration management for Solus
//!
//! Provides persistent settings storage with schema versioning and migrations.
//! Configuration is stored in `~/.solus/config.json`. Sessions take a snapshot
//! of the config when they start, so edits apply from the next wake onwards.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

/// Global config instance for caching
static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Errors from loading, validating or persisting the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown config version: {0}")]
    UnknownVersion(u32),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Wake-word listener settings
    pub wake: WakeConfig,
    /// Session and token service settings
    pub session: SessionConfig,
    /// On-screen guidance rendering settings
    pub guidance: GuidanceConfig,
    /// Screen-capture acquisition settings
    pub capture: CaptureConfig,
    /// Floating bubble settings
    pub bubble: BubbleConfig,
    /// General application settings
    pub general: GeneralConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            wake: WakeConfig::default(),
            session: SessionConfig::default(),
            guidance: GuidanceConfig::default(),
            capture: CaptureConfig::default(),
            bubble: BubbleConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

/// Wake-word listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Keyword model file for the spotting engine
    pub keyword_path: String,
    /// Access key for the spotting engine, if it needs one
    pub access_key: Option<String>,
    /// Delay before spotting resumes after a session ends (milliseconds)
    pub restart_delay_ms: u64,
    /// Desktop shell only: global shortcut that stands in for the wake word
    pub shortcut: String,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            keyword_path: "SolusWakeWord.ppn".to_string(),
            access_key: None,
            restart_delay_ms: 1000,
            shortcut: "CommandOrControl+Shift+Space".to_string(),
        }
    }
}

impl WakeConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the token service (`{url}/api/get-token`)
    pub token_server_url: String,
    /// Conferencing server the issued token is valid for
    pub room_url: String,
    /// Participant identity requested from the token service
    pub participant_id: String,
    /// Close the session after this long without activity (seconds)
    pub inactivity_timeout_secs: u64,
    /// Token request timeout (seconds)
    pub token_timeout_secs: u64,
    /// Publish the microphone as soon as the room is joined
    pub start_with_mic_on: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_server_url: "http://localhost:8000".to_string(),
            room_url: "ws://localhost:7880".to_string(),
            participant_id: "android-user".to_string(),
            inactivity_timeout_secs: 30,
            token_timeout_secs: 15,
            start_with_mic_on: true,
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

/// Guidance overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Remove an annotation after this long without a newer request (seconds)
    pub auto_dismiss_secs: u64,
    /// Fade-in duration for newly displayed annotations (milliseconds)
    pub fade_in_ms: u64,
    /// Distance from the target edge to the arrow tail (pixels)
    pub arrow_distance_px: f64,
    /// Extra tail travel during the pulse (pixels)
    pub arrow_pulse_px: f64,
    /// Duration of one full pulse cycle (milliseconds)
    pub arrow_pulse_period_ms: u64,
    /// Padding between the target and the highlight outline (pixels)
    pub highlight_padding_px: f64,
    /// Instruction text size (pixels)
    pub text_size_px: f64,
    /// Maximum instruction box width before wrapping (pixels)
    pub text_max_width_px: f64,
    /// Gap between the instruction box and anything it avoids (pixels)
    pub text_margin_px: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            auto_dismiss_secs: 10,
            fade_in_ms: 300,
            arrow_distance_px: 150.0,
            arrow_pulse_px: 30.0,
            arrow_pulse_period_ms: 1000,
            highlight_padding_px: 16.0,
            text_size_px: 42.0,
            text_max_width_px: 600.0,
            text_margin_px: 24.0,
        }
    }
}

impl GuidanceConfig {
    pub fn auto_dismiss(&self) -> Duration {
        Duration::from_secs(self.auto_dismiss_secs)
    }
}

/// Screen-capture track acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How many times to poll for the capture track before giving up
    pub max_attempts: u32,
    /// Delay between polls (milliseconds)
    pub retry_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_interval_ms: 500,
        }
    }
}

impl CaptureConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Floating bubble configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleConfig {
    /// Collapsed bubble diameter (pixels)
    pub size_px: u32,
    /// Initial horizontal offset (pixels)
    pub initial_x: i32,
    /// Initial vertical offset (pixels)
    pub initial_y: i32,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            size_px: 160,
            initial_x: 0,
            initial_y: 300,
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log every guidance payload and its computed layout
    pub debug_mode: bool,
    /// Show the persistent listener status notification
    pub show_status_notification: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            show_status_notification: true,
        }
    }
}

impl Config {
    /// Load a config file from an explicit path, migrating older schemas.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            tracing::info!("Config file not found at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        let original_version = config.version;
        let migrated = migrate_config(config)?;

        migrated.validate()?;

        if migrated.version != original_version {
            migrated.save_to(path)?;
        }

        Ok(migrated)
    }

    /// Persist the config to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        tracing::info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make timers fire immediately or never retry
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.inactivity_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session.inactivity_timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.guidance.auto_dismiss_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "guidance.auto_dismiss_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.capture.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "capture.max_attempts",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.session.token_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session.token_timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Get the path to the config file (~/.solus/config.json)
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Get the path to the config directory (~/.solus)
pub fn get_config_dir() -> PathBuf {
    home_dir_or_fallback().join(".solus")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, ConfigError> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version > CURRENT_VERSION {
        return Err(ConfigError::UnknownVersion(config.version));
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, ConfigError> {
    match config.version {
        // Version 0 -> 1: pre-release configs had no guidance section
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(ConfigError::UnknownVersion(v)),
    }
}

/// Get the global config instance
fn get_config_instance() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| {
        let config = Config::load_from(&get_config_path()).unwrap_or_else(|e| {
            tracing::error!("Failed to load config, using defaults: {}", e);
            Config::default()
        });
        RwLock::new(config)
    })
}

/// Get the current configuration.
///
/// The config is cached in memory and loaded from disk on first access.
pub fn get_config() -> Config {
    get_config_instance().read().clone()
}

/// Replace the configuration and persist it to disk
pub fn set_config(mut config: Config) -> Result<(), ConfigError> {
    config.version = CURRENT_VERSION;
    config.validate()?;
    config.save_to(&get_config_path())?;

    *get_config_instance().write() = config;
    tracing::info!("Configuration updated");
    Ok(())
}

/// Reset configuration to defaults and persist to disk
pub fn reset_config() -> Result<Config, ConfigError> {
    let default_config = Config::default();
    default_config.save_to(&get_config_path())?;

    *get_config_instance().write() = default_config.clone();
    tracing::info!("Configuration reset to defaults");
    Ok(default_config)
}
