//! URL and input validation utilities

use url::Url;

use crate::core::models::{AppError, AppResult, Platform};

/// Parse a download URL, accepting only http(s)
pub fn validate_url(url: &str) -> AppResult<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| AppError::InvalidInput(format!("Invalid URL format: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(AppError::InvalidInput(format!(
            "Unsupported URL scheme: {}",
            other
        ))),
    }
}

/// Work out which platform a URL belongs to
pub fn detect_platform(url: &str) -> Platform {
    let host = match Url::parse(url.trim()) {
        Ok(parsed) => parsed.host_str().unwrap_or_default().to_ascii_lowercase(),
        Err(_) => return Platform::Other,
    };

    let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

    if matches("youtube.com") || matches("youtu.be") || matches("youtube-nocookie.com") {
        Platform::YouTube
    } else if matches("instagram.com") || matches("instagr.am") {
        Platform::Instagram
    } else {
        Platform::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(validate_url("  http://example.com/video.mp4 ").is_ok());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_detect_platform() {
        assert_eq!(
            detect_platform("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Platform::YouTube
        );
        assert_eq!(detect_platform("https://youtu.be/dQw4w9WgXcQ"), Platform::YouTube);
        assert_eq!(detect_platform("https://m.youtube.com/watch?v=x"), Platform::YouTube);
        assert_eq!(
            detect_platform("https://www.instagram.com/reel/Cabc123/"),
            Platform::Instagram
        );
        assert_eq!(detect_platform("https://notyoutube.com/x"), Platform::Other);
        assert_eq!(detect_platform("garbage"), Platform::Other);
    }
}
