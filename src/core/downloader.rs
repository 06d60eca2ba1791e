//! Media downloader
//!
//! Drives the `yt-dlp` executable for YouTube and Instagram downloads.
//! Arguments are derived from the requested recipe, progress is parsed from
//! yt-dlp's `--newline` output and relayed through a [`ProgressReporter`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::core::config::AppConfig;
use crate::core::models::{
    AppError, AppResult, DownloadFormat, DownloadRequest, Platform,
};
use crate::core::progress::ProgressReporter;
use crate::core::tools::{stderr_tail, Tool};
use crate::utils::file_utils::ensure_dir_exists;
use crate::utils::validation::validate_url;

/// Result of a finished download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub url: String,
    pub output_dir: PathBuf,
    /// Final file as reported by yt-dlp, if it announced one
    pub file: Option<PathBuf>,
}

/// One interesting line of yt-dlp output
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadLine {
    Progress {
        percent: f64,
        total: Option<String>,
        speed: Option<String>,
        eta: Option<String>,
    },
    Destination(PathBuf),
    Merging(PathBuf),
    AudioExtracted(PathBuf),
    AlreadyDownloaded(PathBuf),
    Error(String),
}

struct LinePatterns {
    percent: Regex,
    total: Regex,
    speed: Regex,
    eta: Regex,
    destination: Regex,
    merging: Regex,
    extract_audio: Regex,
    already: Regex,
    error: Regex,
}

fn patterns() -> &'static LinePatterns {
    static PATTERNS: OnceLock<LinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| LinePatterns {
        percent: Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").expect("valid regex"),
        total: Regex::new(r"\bof\s+~?\s*(\d+(?:\.\d+)?\s*[KMGT]?i?B)").expect("valid regex"),
        speed: Regex::new(r"\bat\s+(\d+(?:\.\d+)?\s*[KMGT]?i?B/s)").expect("valid regex"),
        eta: Regex::new(r"\bETA\s+(\S+)").expect("valid regex"),
        destination: Regex::new(r"^\[download\] Destination: (.+)$").expect("valid regex"),
        merging: Regex::new(r#"^\[Merger\] Merging formats into "(.+)"$"#).expect("valid regex"),
        extract_audio: Regex::new(r"^\[ExtractAudio\] Destination: (.+)$").expect("valid regex"),
        already: Regex::new(r"^\[download\] (.+) has already been downloaded").expect("valid regex"),
        error: Regex::new(r"^ERROR: (.+)$").expect("valid regex"),
    })
}

/// Parse one line of yt-dlp output
pub fn parse_progress_line(line: &str) -> Option<DownloadLine> {
    let line = line.trim_end();
    let p = patterns();

    if let Some(caps) = p.error.captures(line) {
        return Some(DownloadLine::Error(caps[1].trim().to_string()));
    }
    if let Some(caps) = p.destination.captures(line) {
        return Some(DownloadLine::Destination(PathBuf::from(caps[1].trim())));
    }
    if let Some(caps) = p.merging.captures(line) {
        return Some(DownloadLine::Merging(PathBuf::from(&caps[1])));
    }
    if let Some(caps) = p.extract_audio.captures(line) {
        return Some(DownloadLine::AudioExtracted(PathBuf::from(caps[1].trim())));
    }
    if let Some(caps) = p.already.captures(line) {
        return Some(DownloadLine::AlreadyDownloaded(PathBuf::from(caps[1].trim())));
    }
    if let Some(caps) = p.percent.captures(line) {
        let percent = caps[1].parse::<f64>().ok()?;
        let capture = |re: &Regex| re.captures(line).map(|c| c[1].to_string());
        return Some(DownloadLine::Progress {
            percent,
            total: capture(&p.total),
            speed: capture(&p.speed),
            eta: capture(&p.eta).filter(|eta| eta != "Unknown"),
        });
    }

    None
}

/// Build the yt-dlp argument list for a request
pub fn build_download_args(
    request: &DownloadRequest,
    output_dir: &Path,
    config: &AppConfig,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--no-colors".into(),
        "--no-check-certificates".into(),
        "-o".into(),
        output_dir
            .join(&config.download.output_template)
            .to_string_lossy()
            .into_owned(),
    ];

    match request.platform {
        Platform::Instagram => args.push("--no-playlist".into()),
        Platform::YouTube | Platform::Other => args.push("--yes-playlist".into()),
    }

    // Instagram 帖子/短视频统一使用 mp4 合并方案
    let format = match request.platform {
        Platform::Instagram => DownloadFormat::Mp4,
        _ => request.format,
    };

    match format {
        DownloadFormat::Mp3 => {
            args.extend([
                "-f".into(),
                "bestaudio/best".into(),
                "-x".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                format!("{}K", config.download.audio_quality.trim()),
            ]);
        }
        DownloadFormat::Mp4 => {
            args.extend([
                "-f".into(),
                "bestvideo+bestaudio/best".into(),
                "--merge-output-format".into(),
                "mp4".into(),
            ]);
        }
        DownloadFormat::Best => {
            args.extend(["-f".into(), "best".into()]);
        }
    }

    if let Some(dir) = config
        .ffmpeg_dir
        .as_ref()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        args.push("--ffmpeg-location".into());
        args.push(dir.to_string_lossy().into_owned());
    }

    if let Some(cookies) = request
        .cookie_file
        .as_ref()
        .filter(|path| !path.as_os_str().is_empty())
    {
        args.push("--cookies".into());
        args.push(cookies.to_string_lossy().into_owned());
    }

    args.push("--".into());
    args.push(request.url.trim().to_string());
    args
}

/// Choose the folder a download lands in
pub fn resolve_output_dir(requested: Option<&Path>, config: &AppConfig) -> PathBuf {
    requested
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| {
            Some(config.default_output.clone()).filter(|dir| !dir.as_os_str().is_empty())
        })
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Fail fast on requests yt-dlp could never satisfy
pub fn validate_request(request: &DownloadRequest) -> AppResult<()> {
    if request.url.trim().is_empty() {
        return Err(AppError::InvalidInput("No URL provided".to_string()));
    }
    validate_url(request.url.trim())?;
    Ok(())
}

/// yt-dlp backed downloader
pub struct MediaDownloader {
    config: AppConfig,
}

impl MediaDownloader {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Download a URL, reporting log lines and progress as it goes
    pub async fn download(
        &self,
        request: &DownloadRequest,
        reporter: &ProgressReporter,
    ) -> AppResult<DownloadOutcome> {
        match self.download_inner(request, reporter).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("❌ Download failed for {}: {}", request.url, e);
                reporter.log(format!("❌ Error: {}", e)).await;
                reporter.progress(0.0).await;
                Err(e)
            }
        }
    }

    async fn download_inner(
        &self,
        request: &DownloadRequest,
        reporter: &ProgressReporter,
    ) -> AppResult<DownloadOutcome> {
        validate_request(request)?;

        let output_dir = resolve_output_dir(request.output_dir.as_deref(), &self.config);
        ensure_dir_exists(&output_dir)?;

        let url = request.url.trim().to_string();
        let label = match request.platform {
            Platform::Instagram => "Starting Instagram download",
            _ => "Starting download",
        };
        reporter
            .log(format!(
                "{}: {} → {} as {}",
                label,
                url,
                output_dir.display(),
                request.format
            ))
            .await;
        reporter.progress(0.0).await;

        let program = Tool::YtDlp.program(&self.config);
        let args = build_download_args(request, &output_dir, &self.config);
        info!("⬇️ Running {} {:?}", program.display(), args);

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AppError::ToolNotFound {
                    tool: Tool::YtDlp.binary_name().to_string(),
                },
                _ => AppError::Download(format!("Failed to start yt-dlp: {}", e)),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::System("yt-dlp stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::System("yt-dlp stderr unavailable".to_string()))?;

        // yt-dlp 在 Windows 管道上按控制台代码页输出，不能假定是 UTF-8
        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            let _ = stderr.read_to_end(&mut buffer).await;
            String::from_utf8_lossy(&buffer).into_owned()
        });

        let mut tracker = OutputTracker::default();
        let mut reader = BufReader::new(stdout);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer).await? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buffer);
            if let Some(parsed) = parse_progress_line(&line) {
                tracker.apply(parsed, reporter).await;
            }
        }

        let status = child.wait().await?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let mut errors = tracker.errors.clone();
            errors.extend(stderr_output.lines().filter_map(|line| {
                match parse_progress_line(line) {
                    Some(DownloadLine::Error(message)) => Some(message),
                    _ => None,
                }
            }));

            let message = if errors.is_empty() {
                let tail = stderr_tail(&stderr_output, 1);
                if tail.is_empty() {
                    format!("yt-dlp exited with {}", status)
                } else {
                    tail
                }
            } else {
                errors.join("\n")
            };
            return Err(AppError::Download(message));
        }

        if !stderr_output.trim().is_empty() {
            debug!("yt-dlp stderr: {}", stderr_tail(&stderr_output, 5));
        }

        match &tracker.current_file {
            Some(file) => reporter.log(format!("Saved: {}", file.display())).await,
            None => warn!("yt-dlp finished without announcing an output file"),
        }
        reporter.progress(100.0).await;

        Ok(DownloadOutcome {
            url,
            output_dir,
            file: tracker.current_file,
        })
    }
}

/// Folds yt-dlp output into reporter calls
#[derive(Default)]
struct OutputTracker {
    current_file: Option<PathBuf>,
    last_logged_percent: Option<u32>,
    finished_announced: bool,
    errors: Vec<String>,
}

impl OutputTracker {
    async fn apply(&mut self, line: DownloadLine, reporter: &ProgressReporter) {
        match line {
            DownloadLine::Progress {
                percent,
                total,
                speed,
                ..
            } => {
                reporter.progress(percent).await;

                let whole = percent.floor() as u32;
                if self.last_logged_percent != Some(whole) {
                    self.last_logged_percent = Some(whole);
                    let file = self
                        .current_file
                        .as_ref()
                        .and_then(|path| path.file_name())
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let mut text = format!("Downloading: {} {:.1}%", file, percent);
                    if let Some(total) = total {
                        text.push_str(&format!(" of {}", total));
                    }
                    if let Some(speed) = speed {
                        text.push_str(&format!(" at {}", speed));
                    }
                    reporter.log(text).await;
                }

                if percent >= 100.0 && !self.finished_announced {
                    self.finished_announced = true;
                    reporter.log("Merging/processing...").await;
                }
            }
            DownloadLine::Destination(path) => {
                self.current_file = Some(path);
                self.last_logged_percent = None;
                self.finished_announced = false;
            }
            DownloadLine::Merging(path) | DownloadLine::AudioExtracted(path) => {
                self.current_file = Some(path);
            }
            DownloadLine::AlreadyDownloaded(path) => {
                reporter
                    .log(format!("Already downloaded: {}", path.display()))
                    .await;
                reporter.progress(100.0).await;
                self.current_file = Some(path);
            }
            DownloadLine::Error(message) => {
                reporter.log(format!("❌ Error: {}", message)).await;
                self.errors.push(message);
            }
        }
    }
}
