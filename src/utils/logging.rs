use std::path::PathBuf;

use crate::core::config::AppConfig;

pub fn local_logging_enabled() -> bool {
    cfg!(feature = "local-logging")
}

pub fn resolve_log_dir() -> Result<PathBuf, String> {
    AppConfig::get_logs_dir().map_err(|e| format!("Failed to resolve log directory: {e}"))
}

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(level: &str) -> String {
    format!("media_toolkit={level},media_toolkit_cli={level},tauri=info")
}

pub fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(level).into());

    #[cfg(feature = "local-logging")]
    {
        use std::sync::OnceLock;
        use tracing_appender::non_blocking::WorkerGuard;

        static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

        let log_dir = match resolve_log_dir() {
            Ok(dir) => dir,
            Err(err) => {
                eprintln!("{err}");
                let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
                return;
            }
        };

        if let Err(err) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory: {err}");
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
            return;
        }

        let file_appender = tracing_appender::rolling::daily(&log_dir, "backend.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .try_init();
    }

    #[cfg(not(feature = "local-logging"))]
    {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
