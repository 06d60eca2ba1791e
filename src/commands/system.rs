//! System command handlers
//!
//! Tool availability checks and opening folders in the platform file manager.

use std::path::PathBuf;

use tauri::{AppHandle, Manager, State};
use tracing::{error, info, warn};

use crate::core::models::ToolStatus;
use crate::core::tools::probe_all;
use crate::utils::file_utils::ensure_dir_exists;
use crate::AppState;

/// Probe yt-dlp, ffmpeg and pandoc
#[tauri::command]
pub async fn check_tools(state: State<'_, AppState>) -> Result<Vec<ToolStatus>, String> {
    info!("🔧 Checking external tools");

    let config = state.config_snapshot().await;
    let statuses = probe_all(&config).await;
    for status in statuses.iter().filter(|s| !s.available) {
        warn!("⚠️ {} is not available", status.name);
    }
    Ok(statuses)
}

/// Open `folder`, or the default output folder when none is given
#[tauri::command]
pub async fn open_output_folder(
    app: AppHandle,
    state: State<'_, AppState>,
    folder: Option<String>,
) -> Result<(), String> {
    let folder = match folder.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()) {
        Some(folder) => PathBuf::from(folder),
        None => state.config_snapshot().await.default_output,
    };

    info!("📁 Opening folder: {}", folder.display());

    if let Err(e) = ensure_dir_exists(&folder) {
        error!("❌ Failed to prepare folder: {}", e);
        return Err(e.to_string());
    }

    tauri::api::shell::open(&app.shell_scope(), folder.to_string_lossy(), None).map_err(|e| {
        error!("❌ Failed to open folder: {}", e);
        e.to_string()
    })
}
