//! Job manager integration tests
//!
//! Runs real conversions through the image backend and checks the job
//! lifecycle, event stream and bookkeeping.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;
    use tokio::sync::{mpsc, RwLock};

    use crate::core::config::AppConfig;
    use crate::core::jobs::JobManager;
    use crate::core::models::{
        ConversionRequest, DownloadFormat, DownloadRequest, JobEvent, JobKind, JobStatus,
        TargetFormat,
    };

    fn manager_for(dir: &Path) -> (JobManager, mpsc::UnboundedReceiver<JobEvent>) {
        let mut config = AppConfig::default();
        config.set_default_output(dir).unwrap();
        JobManager::new(Arc::new(RwLock::new(config)))
    }

    fn write_png(path: &Path) {
        let img = RgbaImage::from_pixel(8, 8, Rgba([200, 30, 30, 255]));
        img.save(path).unwrap();
    }

    async fn wait_finished(
        rx: &mut mpsc::UnboundedReceiver<JobEvent>,
        job_id: &str,
    ) -> (Vec<JobEvent>, JobEvent) {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(30), rx.recv())
                .await
                .expect("job did not finish in time")
                .expect("event channel closed");
            if event.job_id() != job_id {
                continue;
            }
            if matches!(event, JobEvent::Finished { .. }) {
                return (seen, event);
            }
            seen.push(event);
        }
    }

    #[tokio::test]
    async fn test_conversion_job_completes() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("logo.png");
        write_png(&input);
        let (manager, mut rx) = manager_for(dir.path());

        let job_id = manager
            .submit_conversion(ConversionRequest {
                input: input.clone(),
                target: TargetFormat::Jpg,
                output_dir: None,
            })
            .await
            .unwrap();

        let (events, finished) = wait_finished(&mut rx, &job_id).await;
        let expected_output = dir.path().join("logo.jpg");
        match finished {
            JobEvent::Finished { status, output, .. } => {
                assert_eq!(status, JobStatus::Completed);
                assert_eq!(output, Some(expected_output.clone()));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(expected_output.exists());

        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0.0, 80.0, 100.0]);

        let job = manager.get_job(&job_id).await.unwrap();
        assert_eq!(job.kind, JobKind::Conversion);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert!(job.log.iter().any(|line| line.starts_with("Starting conversion")));
    }

    #[tokio::test]
    async fn test_conversion_failure_is_recorded() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("broken.png");
        std::fs::write(&input, b"definitely not a png").unwrap();
        let (manager, mut rx) = manager_for(dir.path());

        let job_id = manager
            .submit_conversion(ConversionRequest {
                input,
                target: TargetFormat::Webp,
                output_dir: None,
            })
            .await
            .unwrap();

        let (_, finished) = wait_finished(&mut rx, &job_id).await;
        assert!(matches!(
            finished,
            JobEvent::Finished { status: JobStatus::Failed, .. }
        ));

        let job = manager.get_job(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 0.0);
        assert!(job.error.is_some());
    }

    #[tokio::test]
    async fn test_invalid_submissions_are_rejected_upfront() {
        let dir = tempdir().unwrap();
        let (manager, _rx) = manager_for(dir.path());

        let missing = manager
            .submit_conversion(ConversionRequest {
                input: dir.path().join("nope.mp4"),
                target: TargetFormat::Mp3,
                output_dir: None,
            })
            .await;
        assert!(missing.is_err());

        let blank = manager
            .submit_download(DownloadRequest::youtube("  ", DownloadFormat::Mp4))
            .await;
        assert!(blank.is_err());

        assert_eq!(manager.statistics().await.total, 0);
    }

    #[tokio::test]
    async fn test_download_without_yt_dlp_fails_cleanly() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.set_default_output(dir.path()).unwrap();
        config.yt_dlp_path = Some(dir.path().join("missing-yt-dlp"));
        let (manager, mut rx) = JobManager::new(Arc::new(RwLock::new(config)));

        let job_id = manager
            .submit_download(DownloadRequest::instagram(
                "https://www.instagram.com/reel/abc123/",
            ))
            .await
            .unwrap();

        let (events, finished) = wait_finished(&mut rx, &job_id).await;
        assert!(events.iter().any(|e| matches!(
            e,
            JobEvent::Log { line, .. } if line.starts_with("Starting Instagram download")
        )));
        match finished {
            JobEvent::Finished { status, message, .. } => {
                assert_eq!(status, JobStatus::Failed);
                assert!(message.contains("yt-dlp not found"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_and_clear() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("icon.png");
        write_png(&input);
        let (manager, mut rx) = manager_for(dir.path());

        let done_id = manager
            .submit_conversion(ConversionRequest {
                input: input.clone(),
                target: TargetFormat::Ico,
                output_dir: Some(dir.path().join("icons")),
            })
            .await
            .unwrap();
        wait_finished(&mut rx, &done_id).await;
        assert!(dir.path().join("icons").join("icon.ico").exists());

        // 已完成的任务不能再取消
        assert!(manager.cancel_job(&done_id).await.is_err());
        assert!(manager.cancel_job("unknown").await.is_err());

        let stats = manager.statistics().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.completed, 1);

        assert_eq!(manager.clear_finished().await, 1);
        assert!(manager.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_status_is_final() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("big.png");
        let img = RgbaImage::from_pixel(1024, 1024, Rgba([1, 2, 3, 255]));
        img.save(&input).unwrap();
        let (manager, mut rx) = manager_for(dir.path());

        let job_id = manager
            .submit_conversion(ConversionRequest {
                input,
                target: TargetFormat::Ico,
                output_dir: None,
            })
            .await
            .unwrap();

        // 任务可能在取消之前已经完成，两种结果都必须是终态
        let cancelled = manager.cancel_job(&job_id).await.is_ok();
        let (_, finished) = wait_finished(&mut rx, &job_id).await;
        let job = manager.get_job(&job_id).await.unwrap();

        if cancelled {
            assert!(matches!(
                finished,
                JobEvent::Finished { status: JobStatus::Cancelled, .. }
            ));
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(
                manager.get_job(&job_id).await.unwrap().status,
                JobStatus::Cancelled
            );
        } else {
            assert_eq!(job.status, JobStatus::Completed);
        }
        assert!(job.status.is_terminal());
        assert_eq!(manager.statistics().await.running, 0);
    }
}
