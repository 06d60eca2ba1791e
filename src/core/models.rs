//! Core data models for the media toolkit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Target formats offered by the smart converter

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Mp3,

    Mp4,

    Wav,

    Gif,

    Png,

    Jpg,

    Ico,

    Webp,

    Pdf,

    Txt,

    Docx,

    Md,

    Rtf,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 13] = [
        TargetFormat::Mp3,
        TargetFormat::Mp4,
        TargetFormat::Wav,
        TargetFormat::Gif,
        TargetFormat::Png,
        TargetFormat::Jpg,
        TargetFormat::Ico,
        TargetFormat::Webp,
        TargetFormat::Pdf,
        TargetFormat::Txt,
        TargetFormat::Docx,
        TargetFormat::Md,
        TargetFormat::Rtf,
    ];

    /// File extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
            Self::Wav => "wav",
            Self::Gif => "gif",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Ico => "ico",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Docx => "docx",
            Self::Md => "md",
            Self::Rtf => "rtf",
        }
    }

    /// Formats the in-process image encoder can write
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Self::Png | Self::Jpg | Self::Ico | Self::Webp | Self::Gif
        )
    }

    /// Formats handed to the document converter when it is installed
    pub fn is_document(&self) -> bool {
        matches!(
            self,
            Self::Pdf | Self::Docx | Self::Txt | Self::Md | Self::Rtf
        )
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        if normalized == "jpeg" {
            return Ok(Self::Jpg);
        }

        Self::ALL
            .iter()
            .copied()
            .find(|format| format.extension() == normalized)
            .ok_or_else(|| AppError::InvalidInput(format!("Unsupported target format: {}", s)))
    }
}

/// Broad file category, derived from the file extension

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,

    Audio,

    Image,

    Document,

    Unknown,
}

impl MediaKind {
    pub fn is_av(&self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

/// Download recipe selected in the UI

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    /// Best video and best audio merged into an mp4 container
    #[default]
    Mp4,

    /// Audio only, extracted to mp3
    Mp3,

    /// Whatever single file the site offers as best
    Best,
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp4 => f.write_str("mp4"),
            Self::Mp3 => f.write_str("mp3"),
            Self::Best => f.write_str("best"),
        }
    }
}

impl FromStr for DownloadFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" | "video" => Ok(Self::Mp4),
            "mp3" | "audio" => Ok(Self::Mp3),
            "best" => Ok(Self::Best),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported download format: {}",
                other
            ))),
        }
    }
}

/// Source platform of a download URL

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Platform {
    YouTube,

    Instagram,

    Other,
}

/// A single download as requested by the user

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,

    pub format: DownloadFormat,

    pub output_dir: Option<PathBuf>,

    /// Netscape-format cookie file passed through to the downloader
    pub cookie_file: Option<PathBuf>,

    pub platform: Platform,
}

impl DownloadRequest {
    pub fn youtube(url: impl Into<String>, format: DownloadFormat) -> Self {
        Self {
            url: url.into(),
            format,
            output_dir: None,
            cookie_file: None,
            platform: Platform::YouTube,
        }
    }

    /// Instagram posts and reels always use the merged mp4 recipe
    pub fn instagram(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: DownloadFormat::Mp4,
            output_dir: None,
            cookie_file: None,
            platform: Platform::Instagram,
        }
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_cookie_file(mut self, cookie_file: Option<PathBuf>) -> Self {
        self.cookie_file = cookie_file;
        self
    }
}

/// A single conversion as requested by the user

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input: PathBuf,

    pub target: TargetFormat,

    pub output_dir: Option<PathBuf>,
}

/// Job category

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobKind {
    Download,

    Conversion,
}

/// Job status enumeration

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Queued,

    Running,

    Completed,

    Failed,

    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Background job record shown in the UI

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,

    pub kind: JobKind,

    pub label: String,

    pub status: JobStatus,

    pub progress: f64,

    pub log: Vec<String>,

    pub output: Option<PathBuf>,

    pub error: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,

    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Events streamed from background jobs to the front end

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Log {
        job_id: String,
        line: String,
    },

    Progress {
        job_id: String,
        percent: f64,
    },

    Finished {
        job_id: String,
        status: JobStatus,
        message: String,
        output: Option<PathBuf>,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Log { job_id, .. } | Self::Progress { job_id, .. } | Self::Finished { job_id, .. } => {
                job_id
            }
        }
    }
}

/// Job statistics

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStats {
    pub total: usize,

    pub queued: usize,

    pub running: usize,

    pub completed: usize,

    pub failed: usize,

    pub cancelled: usize,
}

/// Availability of an external binary

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,

    pub available: bool,

    pub path: Option<PathBuf>,

    pub version: Option<String>,
}

/// Application error types

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{tool} not found. Install it or set its location in settings")]
    ToolNotFound { tool: String },

    #[error("Download error: {0}")]
    Download(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported conversion: {0}")]
    Unsupported(String),

    #[error("System error: {0}")]
    System(String),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
