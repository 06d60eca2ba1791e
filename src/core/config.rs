//! Application configuration management

use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Folder containing the ffmpeg binary. `None` uses `ffmpeg` from PATH
    pub ffmpeg_dir: Option<PathBuf>,
    /// Destination for downloads and conversions when none is chosen
    pub default_output: PathBuf,
    /// Explicit yt-dlp executable, otherwise looked up on PATH
    pub yt_dlp_path: Option<PathBuf>,
    /// Explicit pandoc executable, otherwise looked up on PATH
    pub pandoc_path: Option<PathBuf>,
    pub download: DownloadSettings,
    pub advanced: AdvancedConfig,
}

/// Downloader-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadSettings {
    /// Audio bitrate in kbps used when extracting mp3
    pub audio_quality: String,
    /// yt-dlp output template, relative to the output folder
    pub output_template: String,
}

/// Advanced configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvancedConfig {
    pub log_level: String, // "error", "warn", "info", "debug", "trace"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ffmpeg_dir: None,
            default_output: default_output_dir(),
            yt_dlp_path: None,
            pandoc_path: None,
            download: DownloadSettings::default(),
            advanced: AdvancedConfig::default(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            audio_quality: "192".to_string(),
            output_template: "%(uploader)s - %(title)s.%(ext)s".to_string(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// `~/Downloads`, falling back to `./downloads` when no home is known
pub fn default_output_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| {
            dirs.download_dir()
                .map(Path::to_path_buf)
                .or_else(|| Some(dirs.home_dir().join("Downloads")))
        })
        .unwrap_or_else(|| PathBuf::from("downloads"))
}

impl AppConfig {
    /// Load configuration from file, creating default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating default if not exists
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: AppConfig =
                serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

            tracing::info!("Loaded configuration from: {:?}", config_path);
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load, validate and fall back to defaults on any failure
    pub fn load_or_default(config_path: &Path) -> Self {
        match Self::load_from(config_path) {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => cfg,
                Err(err) => {
                    tracing::warn!(
                        "Invalid configuration detected ({}), falling back to defaults",
                        err
                    );
                    Self::persist_defaults(config_path)
                }
            },
            Err(err) => {
                tracing::warn!(
                    "Failed to load configuration from disk: {:#}. Using defaults",
                    err
                );
                Self::persist_defaults(config_path)
            }
        }
    }

    fn persist_defaults(config_path: &Path) -> Self {
        let default_cfg = Self::default();
        if let Err(save_err) = default_cfg.save_to(config_path) {
            tracing::warn!("Failed to persist default configuration: {}", save_err);
        }
        default_cfg
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "mediatoolkit", "toolkit")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Get the application data directory
    pub fn get_data_dir() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "mediatoolkit", "toolkit")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.data_dir().to_path_buf())
    }

    /// Get the logs directory
    pub fn get_logs_dir() -> Result<PathBuf> {
        Ok(Self::get_data_dir()?.join("logs"))
    }

    /// Reset the configuration file in the standard location
    pub fn reset() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::reset_at(&config_path)
    }

    /// Reset configuration at `config_path` to defaults
    pub fn reset_at(config_path: &Path) -> Result<Self> {
        let config = Self::default();
        config.save_to(config_path)?;
        tracing::info!("Reset configuration to defaults");
        Ok(config)
    }

    /// Export configuration as JSON string
    pub fn export(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Failed to export configuration")
    }

    /// Parse and validate configuration from a JSON string
    pub fn import(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).with_context(|| "Failed to parse imported configuration")?;

        config
            .validate()
            .with_context(|| "Imported configuration is invalid")?;

        Ok(config)
    }

    /// Remember the folder holding the ffmpeg binary
    pub fn set_ffmpeg_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.ffmpeg_dir = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        };
    }

    pub fn set_default_output(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            anyhow::bail!("Default output folder must not be empty");
        }
        self.default_output = dir;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.default_output.as_os_str().is_empty() {
            anyhow::bail!("Default output folder must not be empty");
        }

        if self.download.audio_quality.trim().parse::<u32>().is_err() {
            anyhow::bail!(
                "Audio quality must be a bitrate in kbps, got '{}'",
                self.download.audio_quality
            );
        }

        if !self.download.output_template.contains("%(ext)s") {
            anyhow::bail!("Output template must contain %(ext)s");
        }

        if !["error", "warn", "info", "debug", "trace"].contains(&self.advanced.log_level.as_str())
        {
            anyhow::bail!(
                "Invalid log level: must be 'error', 'warn', 'info', 'debug', or 'trace'"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download.audio_quality, "192");
        assert!(config.ffmpeg_dir.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = config.export().unwrap();
        let parsed_config = AppConfig::import(&json).unwrap();
        assert_eq!(config, parsed_config);
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = AppConfig::default();
        config.download.audio_quality = "high".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.download.output_template = "%(title)s".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.advanced.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_ffmpeg_dir_clears_setting() {
        let mut config = AppConfig::default();
        config.set_ffmpeg_dir("/opt/ffmpeg/bin");
        assert_eq!(config.ffmpeg_dir, Some(PathBuf::from("/opt/ffmpeg/bin")));

        config.set_ffmpeg_dir("");
        assert!(config.ffmpeg_dir.is_none());
    }

    #[test]
    fn test_empty_default_output_rejected() {
        let mut config = AppConfig::default();
        assert!(config.set_default_output("").is_err());
    }
}
