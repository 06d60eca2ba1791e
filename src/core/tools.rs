//! External tool discovery
//!
//! Resolves the yt-dlp, ffmpeg and pandoc executables from the user's
//! settings or from PATH, and probes them for availability.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::config::AppConfig;
use crate::core::models::{AppError, AppResult, ToolStatus};

/// External binaries the toolkit drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
    Pandoc,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::YtDlp, Tool::Ffmpeg, Tool::Pandoc];

    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::YtDlp => "yt-dlp",
            Self::Ffmpeg => "ffmpeg",
            Self::Pandoc => "pandoc",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "-version",
            Self::YtDlp | Self::Pandoc => "--version",
        }
    }

    /// Program to spawn for this tool. Configured locations win over PATH
    /// and are returned even if they do not exist, so the spawn error names them.
    pub fn program(&self, config: &AppConfig) -> PathBuf {
        match self {
            Self::Ffmpeg => ffmpeg_program(config.ffmpeg_dir.as_deref()),
            Self::YtDlp => config
                .yt_dlp_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(self.binary_name())),
            Self::Pandoc => config
                .pandoc_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(self.binary_name())),
        }
    }

    /// Resolve the tool to an existing executable
    pub fn locate(&self, config: &AppConfig) -> AppResult<PathBuf> {
        let program = self.program(config);
        let resolved = if program.components().count() > 1 {
            program.is_file().then_some(program)
        } else {
            which::which(&program).ok()
        };

        resolved.ok_or_else(|| AppError::ToolNotFound {
            tool: self.binary_name().to_string(),
        })
    }

    pub fn is_available(&self, config: &AppConfig) -> bool {
        self.locate(config).is_ok()
    }
}

/// `<dir>/ffmpeg` (`ffmpeg.exe` on Windows) when a folder is set, else `ffmpeg`
pub fn ffmpeg_program(ffmpeg_dir: Option<&Path>) -> PathBuf {
    let exe = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    match ffmpeg_dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(exe),
        _ => PathBuf::from("ffmpeg"),
    }
}

/// Run `<tool> --version` and report what was found
pub async fn probe(tool: Tool, config: &AppConfig) -> ToolStatus {
    let name = tool.binary_name().to_string();
    let path = match tool.locate(config) {
        Ok(path) => path,
        Err(_) => {
            debug!("{} not found", name);
            return ToolStatus {
                name,
                available: false,
                path: None,
                version: None,
            };
        }
    };

    let output = tokio::process::Command::new(&path)
        .arg(tool.version_arg())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            ToolStatus {
                name,
                available: true,
                path: Some(path),
                version: stdout.lines().next().map(|line| line.trim().to_string()),
            }
        }
        Ok(output) => {
            warn!("{} exited with {} while probing", name, output.status);
            ToolStatus {
                name,
                available: false,
                path: Some(path),
                version: None,
            }
        }
        Err(e) => {
            warn!("Failed to run {}: {}", name, e);
            ToolStatus {
                name,
                available: false,
                path: Some(path),
                version: None,
            }
        }
    }
}

/// Probe every tool the toolkit uses
pub async fn probe_all(config: &AppConfig) -> Vec<ToolStatus> {
    let mut statuses = Vec::with_capacity(Tool::ALL.len());
    for tool in Tool::ALL {
        statuses.push(probe(tool, config).await);
    }
    statuses
}

/// Keep the trailing lines of a tool's stderr for error messages
pub(crate) fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
