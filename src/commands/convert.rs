//! Smart converter command handlers

use std::path::{Path, PathBuf};

use serde::Serialize;
use tauri::State;
use tracing::{error, info};

use crate::commands::download::non_empty_path;
use crate::core::converter::{detect_kind, suggest_targets};
use crate::core::models::{AppResult, ConversionRequest, MediaKind, TargetFormat};
use crate::AppState;

/// Detected kind and suggested targets for a picked file
#[derive(Debug, Clone, Serialize)]
pub struct FormatSuggestion {
    pub kind: MediaKind,
    pub formats: Vec<TargetFormat>,
}

/// Convert `input` to `target`, returning the job id
#[tauri::command]
pub async fn start_conversion(
    state: State<'_, AppState>,
    input: String,
    target: String,
    output_dir: Option<String>,
) -> Result<String, String> {
    info!("🔄 Conversion requested: {} -> {}", input, target);

    let request = match conversion_request(&input, &target, output_dir) {
        Ok(request) => request,
        Err(e) => {
            error!("❌ Invalid conversion request: {}", e);
            return Err(e.to_string());
        }
    };

    match state.jobs.submit_conversion(request).await {
        Ok(job_id) => {
            info!("✅ Conversion job {} started", job_id);
            Ok(job_id)
        }
        Err(e) => {
            error!("❌ Failed to start conversion: {}", e);
            Err(e.to_string())
        }
    }
}

/// Refresh the target dropdown after a file is picked
#[tauri::command]
pub async fn suggest_formats(input: String) -> Result<FormatSuggestion, String> {
    Ok(suggestion_for(Path::new(input.trim())))
}

fn conversion_request(
    input: &str,
    target: &str,
    output_dir: Option<String>,
) -> AppResult<ConversionRequest> {
    Ok(ConversionRequest {
        input: PathBuf::from(input.trim()),
        target: target.parse()?,
        output_dir: non_empty_path(output_dir),
    })
}

fn suggestion_for(path: &Path) -> FormatSuggestion {
    let kind = detect_kind(path);
    FormatSuggestion {
        kind,
        formats: suggest_targets(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_for_video() {
        let suggestion = suggestion_for(Path::new("/tmp/clip.MKV"));
        assert_eq!(suggestion.kind, MediaKind::Video);
        assert_eq!(suggestion.formats[0], TargetFormat::Mp4);
    }

    #[test]
    fn test_conversion_request_parsing() {
        let request = conversion_request(" /tmp/a.png ", "JPEG", Some(String::new())).unwrap();
        assert_eq!(request.input, PathBuf::from("/tmp/a.png"));
        assert_eq!(request.target, TargetFormat::Jpg);
        assert!(request.output_dir.is_none());

        assert!(conversion_request("/tmp/a.png", "bmp", None).is_err());
    }
}
