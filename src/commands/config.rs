//! Configuration command handlers
//!
//! Getting, updating, resetting, exporting and importing settings, plus the
//! folder pickers on the settings panel.

use std::path::{Path, PathBuf};

use tauri::State;
use tracing::{error, info};

use crate::core::AppConfig;
use crate::AppState;

/// Get current application configuration
#[tauri::command]
pub async fn get_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    info!("⚙️ Getting application configuration");
    Ok(state.config_snapshot().await)
}

/// Update application configuration
#[tauri::command]
pub async fn update_config(
    state: State<'_, AppState>,
    new_config: AppConfig,
) -> Result<(), String> {
    info!("🔧 Updating application configuration");

    match state.update_config(new_config).await {
        Ok(()) => {
            info!("✅ Configuration updated successfully");
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to update configuration: {}", e);
            Err(e.to_string())
        }
    }
}

/// Reset configuration to default values
#[tauri::command]
pub async fn reset_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    info!("🔄 Resetting configuration to defaults");

    match state.reset_config().await {
        Ok(config) => {
            info!("✅ Configuration reset successfully");
            Ok(config)
        }
        Err(e) => {
            error!("❌ Failed to reset configuration: {}", e);
            Err(e.to_string())
        }
    }
}

/// Export configuration to file
#[tauri::command]
pub async fn export_config(state: State<'_, AppState>, file_path: String) -> Result<(), String> {
    info!("💾 Exporting configuration to: {}", file_path);

    match state.export_config(Path::new(file_path.trim())).await {
        Ok(()) => {
            info!("✅ Configuration exported successfully");
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to export configuration: {}", e);
            Err(e.to_string())
        }
    }
}

/// Import configuration from file
#[tauri::command]
pub async fn import_config(
    state: State<'_, AppState>,
    file_path: String,
) -> Result<AppConfig, String> {
    info!("📂 Importing configuration from: {}", file_path);

    match state.import_config(Path::new(file_path.trim())).await {
        Ok(config) => {
            info!("✅ Configuration imported successfully");
            Ok(config)
        }
        Err(e) => {
            error!("❌ Failed to import configuration: {}", e);
            Err(e.to_string())
        }
    }
}

/// Remember the folder holding ffmpeg. An empty string clears it
#[tauri::command]
pub async fn set_ffmpeg_folder(
    state: State<'_, AppState>,
    folder: String,
) -> Result<AppConfig, String> {
    let folder = PathBuf::from(folder.trim());

    match state.set_ffmpeg_dir(&folder).await {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("❌ Failed to set ffmpeg folder: {}", e);
            Err(e.to_string())
        }
    }
}

#[tauri::command]
pub async fn set_default_output(
    state: State<'_, AppState>,
    folder: String,
) -> Result<AppConfig, String> {
    let folder = PathBuf::from(folder.trim());

    match state.set_default_output(&folder).await {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("❌ Failed to set default output folder: {}", e);
            Err(e.to_string())
        }
    }
}
