//! File system utilities

use std::fs;
use std::path::Path;

use crate::core::models::AppResult;

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> AppResult<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        tracing::debug!("Created directory {}", path.display());
    }
    Ok(())
}

/// Get file extension
pub fn get_file_extension(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|ext| ext.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_file_extension() {
        assert_eq!(get_file_extension("movie.final.MKV"), Some("MKV"));
        assert_eq!(get_file_extension("README"), None);
    }

    #[test]
    fn test_ensure_dir_exists_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
        // 已存在时不报错
        ensure_dir_exists(&nested).unwrap();
    }
}
