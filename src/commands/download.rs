//! Download command handlers

use std::path::PathBuf;

use tauri::State;
use tracing::{error, info};

use crate::core::models::{AppResult, DownloadFormat, DownloadRequest};
use crate::AppState;

/// Start a YouTube (or any yt-dlp supported) download, returning the job id
#[tauri::command]
pub async fn start_youtube_download(
    state: State<'_, AppState>,
    url: String,
    format: Option<String>,
    output_dir: Option<String>,
    cookie_file: Option<String>,
) -> Result<String, String> {
    info!("📥 Download requested: {}", url);

    let request = match youtube_request(url, format, output_dir, cookie_file) {
        Ok(request) => request,
        Err(e) => {
            error!("❌ Invalid download request: {}", e);
            return Err(e.to_string());
        }
    };

    match state.jobs.submit_download(request).await {
        Ok(job_id) => {
            info!("✅ Download job {} started", job_id);
            Ok(job_id)
        }
        Err(e) => {
            error!("❌ Failed to start download: {}", e);
            Err(e.to_string())
        }
    }
}

/// Start an Instagram post/reel download, returning the job id
#[tauri::command]
pub async fn start_instagram_download(
    state: State<'_, AppState>,
    url: String,
    output_dir: Option<String>,
    cookie_file: Option<String>,
) -> Result<String, String> {
    info!("📸 Instagram download requested: {}", url);

    let request = DownloadRequest::instagram(url)
        .with_output_dir(non_empty_path(output_dir))
        .with_cookie_file(non_empty_path(cookie_file));

    match state.jobs.submit_download(request).await {
        Ok(job_id) => {
            info!("✅ Instagram job {} started", job_id);
            Ok(job_id)
        }
        Err(e) => {
            error!("❌ Failed to start Instagram download: {}", e);
            Err(e.to_string())
        }
    }
}

fn youtube_request(
    url: String,
    format: Option<String>,
    output_dir: Option<String>,
    cookie_file: Option<String>,
) -> AppResult<DownloadRequest> {
    let format = match format.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.parse::<DownloadFormat>()?,
        _ => DownloadFormat::default(),
    };

    Ok(DownloadRequest::youtube(url, format)
        .with_output_dir(non_empty_path(output_dir))
        .with_cookie_file(non_empty_path(cookie_file)))
}

/// The webview sends "" for untouched path inputs
pub(crate) fn non_empty_path(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_request_defaults() {
        let request = youtube_request(
            "https://youtu.be/abc".to_string(),
            None,
            Some("  ".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(request.format, DownloadFormat::Mp4);
        assert!(request.output_dir.is_none());

        let audio =
            youtube_request("https://youtu.be/abc".to_string(), Some("MP3".into()), None, None)
                .unwrap();
        assert_eq!(audio.format, DownloadFormat::Mp3);

        assert!(
            youtube_request("https://youtu.be/abc".to_string(), Some("flac".into()), None, None)
                .is_err()
        );
    }

    #[test]
    fn test_youtube_request_keeps_chosen_folders() {
        let request = youtube_request(
            "https://youtu.be/abc".to_string(),
            Some("mp4".into()),
            Some(" /media/videos ".to_string()),
            Some("/home/me/cookies.txt".to_string()),
        )
        .unwrap();
        assert_eq!(request.output_dir, Some(PathBuf::from("/media/videos")));
        assert_eq!(request.cookie_file, Some(PathBuf::from("/home/me/cookies.txt")));
    }
}
