//! Media Toolkit - Core Library
//!
//! Downloads media from YouTube and Instagram through yt-dlp and converts
//! files between common video, audio, image and document formats.

#[cfg(feature = "desktop")]
pub mod commands;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    config::AppConfig,
    converter::{detect_kind, suggest_targets, SmartConverter},
    downloader::MediaDownloader,
    jobs::JobManager,
    models::{
        AppError, AppResult, ConversionRequest, DownloadFormat, DownloadRequest, Job, JobEvent,
        JobStatus, MediaKind, TargetFormat,
    },
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

/// Application state shared between front ends
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    pub config_path: PathBuf,
    pub jobs: JobManager,
}

impl AppState {
    /// Load settings from the standard location
    pub fn new() -> anyhow::Result<(Self, mpsc::UnboundedReceiver<JobEvent>)> {
        let config_path = AppConfig::get_config_path()?;
        Ok(Self::with_config_path(config_path))
    }

    /// Load settings from `config_path`, falling back to defaults
    pub fn with_config_path(config_path: PathBuf) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let config = AppConfig::load_or_default(&config_path);
        let config = Arc::new(RwLock::new(config));
        let (jobs, events) = JobManager::new(config.clone());

        (
            Self {
                config,
                config_path,
                jobs,
            },
            events,
        )
    }

    pub async fn config_snapshot(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Validate, store and persist a whole configuration
    pub async fn update_config(&self, new_config: AppConfig) -> AppResult<()> {
        new_config
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.persist(&new_config)?;
        *self.config.write().await = new_config;
        Ok(())
    }

    pub async fn reset_config(&self) -> AppResult<AppConfig> {
        let config = AppConfig::reset_at(&self.config_path)
            .map_err(|e| AppError::Config(format!("{:#}", e)))?;
        *self.config.write().await = config.clone();
        Ok(config)
    }

    pub async fn set_ffmpeg_dir(&self, dir: &Path) -> AppResult<AppConfig> {
        let mut config = self.config_snapshot().await;
        config.set_ffmpeg_dir(dir);
        self.update_config(config.clone()).await?;
        tracing::info!("ffmpeg path set to: {}", dir.display());
        Ok(config)
    }

    pub async fn set_default_output(&self, dir: &Path) -> AppResult<AppConfig> {
        let mut config = self.config_snapshot().await;
        config
            .set_default_output(dir)
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.update_config(config.clone()).await?;
        tracing::info!("default output set to: {}", dir.display());
        Ok(config)
    }

    /// Write the current settings as JSON to `path`
    pub async fn export_config(&self, path: &Path) -> AppResult<()> {
        let json = self
            .config_snapshot()
            .await
            .export()
            .map_err(|e| AppError::Config(format!("{:#}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Replace the settings with the JSON file at `path`
    pub async fn import_config(&self, path: &Path) -> AppResult<AppConfig> {
        let json = std::fs::read_to_string(path)?;
        let config = AppConfig::import(&json).map_err(|e| AppError::Config(format!("{:#}", e)))?;
        self.update_config(config.clone()).await?;
        Ok(config)
    }

    fn persist(&self, config: &AppConfig) -> AppResult<()> {
        config
            .save_to(&self.config_path)
            .map_err(|e| AppError::Config(format!("Failed to save configuration: {:#}", e)))
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the default filter
pub fn init() -> anyhow::Result<()> {
    utils::logging::init_tracing("info");
    tracing::info!("📚 {} v{} initialized", NAME, VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "media-toolkit");
    }

    #[tokio::test]
    async fn test_settings_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let (state, _events) = AppState::with_config_path(path.clone());

        state.set_ffmpeg_dir(Path::new("/opt/ffmpeg/bin")).await.unwrap();
        state.set_default_output(dir.path()).await.unwrap();

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.ffmpeg_dir, Some(PathBuf::from("/opt/ffmpeg/bin")));
        assert_eq!(reloaded.default_output, dir.path());

        let reset = state.reset_config().await.unwrap();
        assert!(reset.ffmpeg_dir.is_none());
        assert!(state.config_snapshot().await.ffmpeg_dir.is_none());
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _events) = AppState::with_config_path(dir.path().join("config.json"));
        state.set_ffmpeg_dir(Path::new("/opt/ffmpeg")).await.unwrap();

        let exported = dir.path().join("backup.json");
        state.export_config(&exported).await.unwrap();
        state.reset_config().await.unwrap();

        let imported = state.import_config(&exported).await.unwrap();
        assert_eq!(imported.ffmpeg_dir, Some(PathBuf::from("/opt/ffmpeg")));
        assert_eq!(state.config_snapshot().await, imported);

        std::fs::write(&exported, "{ not json").unwrap();
        assert!(state.import_config(&exported).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _events) = AppState::with_config_path(dir.path().join("config.json"));

        let mut bad = state.config_snapshot().await;
        bad.download.audio_quality = "loud".to_string();
        assert!(state.update_config(bad).await.is_err());
        assert_eq!(state.config_snapshot().await.download.audio_quality, "192");
        assert!(state.set_default_output(Path::new("")).await.is_err());
    }
}
