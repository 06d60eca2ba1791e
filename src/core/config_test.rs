//! 配置持久化测试
//!
//! 测试 AppConfig 的文件读写、缺省字段回填以及损坏文件的回退逻辑

#[cfg(test)]
mod tests {
    use super::super::config::AppConfig;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.set_ffmpeg_dir("/usr/local/ffmpeg/bin");
        config.set_default_output("/data/media").unwrap();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.ffmpeg_dir, Some(PathBuf::from("/usr/local/ffmpeg/bin")));
        assert_eq!(loaded.default_output, PathBuf::from("/data/media"));
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "ffmpeg_dir": "/opt/ffmpeg" }"#).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(loaded.ffmpeg_dir, Some(PathBuf::from("/opt/ffmpeg")));
        assert_eq!(loaded.default_output, defaults.default_output);
        assert_eq!(loaded.download, defaults.download);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(AppConfig::load_from(&path).is_err());

        let config = AppConfig::load_or_default(&path);
        assert_eq!(config, AppConfig::default());

        // 回退后文件被重写为合法配置
        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, AppConfig::default());
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "advanced": { "log_level": "loud" } }"#).unwrap();

        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.advanced.log_level, "info");
    }

    #[test]
    fn test_reset_overwrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.set_ffmpeg_dir("/somewhere");
        config.save_to(&path).unwrap();

        let reset = AppConfig::reset_at(&path).unwrap();
        assert!(reset.ffmpeg_dir.is_none());
        assert!(AppConfig::load_from(&path).unwrap().ffmpeg_dir.is_none());
    }

    #[test]
    fn test_import_rejects_invalid_json_config() {
        let json = r#"{ "download": { "audio_quality": "loud", "output_template": "%(title)s.%(ext)s" } }"#;
        assert!(AppConfig::import(json).is_err());
    }
}
