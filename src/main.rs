// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use tauri::{Manager, State};
use tracing::{error, info, warn};

use media_toolkit::commands::*;
use media_toolkit::core::AppConfig;
use media_toolkit::utils::logging::init_tracing;
use media_toolkit::{AppState, JobEvent};

/// 加载应用状态，配置目录不可用时退回到临时目录，避免启动失败
fn create_state() -> (AppState, tokio::sync::mpsc::UnboundedReceiver<JobEvent>) {
    match AppState::new() {
        Ok(state) => state,
        Err(e) => {
            warn!("Failed to resolve config directory: {:#}. Using a temporary location", e);
            let fallback = std::env::temp_dir()
                .join("media-toolkit")
                .join("config.json");
            AppState::with_config_path(fallback)
        }
    }
}

fn main() {
    let level = AppConfig::load()
        .map(|config| config.advanced.log_level)
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);

    info!("🚀 Starting {} v{}", media_toolkit::NAME, media_toolkit::VERSION);

    let (app_state, mut job_events) = create_state();

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            // 下载
            start_youtube_download,
            start_instagram_download,
            // 转换
            start_conversion,
            suggest_formats,
            // 任务
            get_job,
            list_jobs,
            get_job_stats,
            cancel_job,
            clear_finished_jobs,
            // 配置
            get_config,
            update_config,
            reset_config,
            export_config,
            import_config,
            set_ffmpeg_folder,
            set_default_output,
            // 系统
            check_tools,
            open_output_folder,
        ])
        .setup(move |app| {
            info!("🔧 Setting up application");

            let app_handle = app.handle();

            // 把后台任务事件转发到前端
            tauri::async_runtime::spawn(async move {
                while let Some(event) = job_events.recv().await {
                    if let Err(e) = app_handle.emit_all("job-event", &event) {
                        error!("Failed to emit job event: {}", e);
                    }
                }
            });

            let app_state: State<AppState> = app.state();
            let config_path = app_state.config_path.clone();
            info!("⚙️ Settings file: {}", config_path.display());

            if let Err(e) = app.emit_all("app_ready", true) {
                error!("Failed to emit app_ready event: {}", e);
            } else {
                info!("✅ App ready event emitted");
            }

            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
