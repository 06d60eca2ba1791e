//! Background job manager
//!
//! Every download or conversion the user starts runs as its own tokio task.
//! The manager keeps a record per job (status, progress, log) and streams
//! [`JobEvent`]s to whoever owns the receiver, so the UI never blocks on an
//! external tool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::AppConfig;
use crate::core::converter::SmartConverter;
use crate::core::downloader::{validate_request, MediaDownloader};
use crate::core::models::{
    AppError, AppResult, ConversionRequest, DownloadRequest, Job, JobEvent, JobKind, JobStats,
    JobStatus, Platform,
};
use crate::core::progress::{JobTable, ProgressReporter};

#[derive(Clone)]
pub struct JobManager {
    config: Arc<RwLock<AppConfig>>,
    jobs: JobTable,
    handles: Arc<RwLock<HashMap<String, AbortHandle>>>,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl JobManager {
    /// Create a manager sharing `config` and the receiving end of its event stream
    pub fn new(
        config: Arc<RwLock<AppConfig>>,
    ) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                config,
                jobs: Arc::new(RwLock::new(HashMap::new())),
                handles: Arc::new(RwLock::new(HashMap::new())),
                events,
            },
            receiver,
        )
    }

    /// Queue a download and return its job id
    pub async fn submit_download(&self, request: DownloadRequest) -> AppResult<String> {
        validate_request(&request)?;

        let config = self.config.read().await.clone();
        let label = match request.platform {
            Platform::Instagram => format!("Instagram: {}", request.url.trim()),
            _ => format!("{} ({})", request.url.trim(), request.format),
        };
        let (job_id, reporter) = self.register(JobKind::Download, label).await;

        let manager = self.clone();
        let task_id = job_id.clone();
        let handle = tokio::spawn(async move {
            manager.mark_running(&task_id).await;
            let downloader = MediaDownloader::new(config);
            let result = downloader
                .download(&request, &reporter)
                .await
                .map(|outcome| {
                    let message = format!("✅ Download complete: {}", outcome.url);
                    (message, outcome.file)
                });
            manager.finish(&task_id, result).await;
        });

        self.track(&job_id, handle.abort_handle()).await;
        Ok(job_id)
    }

    /// Queue a conversion and return its job id
    pub async fn submit_conversion(&self, request: ConversionRequest) -> AppResult<String> {
        let config = self.config.read().await.clone();
        let converter = SmartConverter::new(config);
        converter.prepare(&request)?;

        let label = format!("{} → {}", request.input.display(), request.target);
        let (job_id, reporter) = self.register(JobKind::Conversion, label).await;

        let manager = self.clone();
        let task_id = job_id.clone();
        let handle = tokio::spawn(async move {
            manager.mark_running(&task_id).await;
            let result = converter
                .convert(&request, &reporter)
                .await
                .map(|outcome| {
                    let message = format!("✅ Converted to {}", outcome.target);
                    (message, Some(outcome.output))
                });
            manager.finish(&task_id, result).await;
        });

        self.track(&job_id, handle.abort_handle()).await;
        Ok(job_id)
    }

    pub async fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// All jobs, newest first
    pub async fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Abort a running job. Child processes die with the task
    pub async fn cancel_job(&self, job_id: &str) -> AppResult<()> {
        {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| AppError::InvalidInput(format!("Unknown job: {}", job_id)))?;

            if job.status.is_terminal() {
                return Err(AppError::InvalidInput(format!(
                    "Job {} already finished",
                    job_id
                )));
            }

            job.status = JobStatus::Cancelled;
            job.updated_at = chrono::Utc::now();
        }

        if let Some(handle) = self.handles.write().await.remove(job_id) {
            handle.abort();
        }

        info!("🛑 Cancelled job {}", job_id);
        self.send(JobEvent::Finished {
            job_id: job_id.to_string(),
            status: JobStatus::Cancelled,
            message: "Cancelled".to_string(),
            output: None,
        });
        Ok(())
    }

    /// Drop finished jobs from memory, returning how many were removed
    pub async fn clear_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !job.status.is_terminal());
        let removed = before - jobs.len();
        if removed > 0 {
            info!("🧹 Cleared {} finished jobs", removed);
        }
        removed
    }

    pub async fn statistics(&self) -> JobStats {
        let jobs = self.jobs.read().await;
        let mut stats = JobStats {
            total: jobs.len(),
            ..JobStats::default()
        };
        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    async fn register(&self, kind: JobKind, label: String) -> (String, ProgressReporter) {
        let job_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        let job = Job {
            id: job_id.clone(),
            kind,
            label,
            status: JobStatus::Queued,
            progress: 0.0,
            log: Vec::new(),
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.jobs.write().await.insert(job_id.clone(), job);
        let reporter = ProgressReporter::new(job_id.clone(), self.events.clone(), self.jobs.clone());
        (job_id, reporter)
    }

    async fn track(&self, job_id: &str, handle: AbortHandle) {
        let finished = self
            .jobs
            .read()
            .await
            .get(job_id)
            .map(|job| job.status.is_terminal())
            .unwrap_or(true);
        if !finished {
            self.handles.write().await.insert(job_id.to_string(), handle);
        }
    }

    async fn mark_running(&self, job_id: &str) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            if job.status == JobStatus::Queued {
                job.status = JobStatus::Running;
                job.updated_at = chrono::Utc::now();
            }
        }
    }

    async fn finish(&self, job_id: &str, result: AppResult<(String, Option<PathBuf>)>) {
        let event = {
            let mut jobs = self.jobs.write().await;
            let Some(job) = jobs.get_mut(job_id) else {
                return;
            };
            if job.status.is_terminal() {
                return;
            }

            job.updated_at = chrono::Utc::now();
            match result {
                Ok((message, output)) => {
                    job.status = JobStatus::Completed;
                    job.progress = 100.0;
                    job.output = output.clone();
                    info!("✅ Job {} completed", job_id);
                    JobEvent::Finished {
                        job_id: job_id.to_string(),
                        status: JobStatus::Completed,
                        message,
                        output,
                    }
                }
                Err(e) => {
                    let message = format!("❌ Error: {}", e);
                    job.status = JobStatus::Failed;
                    job.progress = 0.0;
                    job.error = Some(e.to_string());
                    warn!("Job {} failed: {}", job_id, e);
                    JobEvent::Finished {
                        job_id: job_id.to_string(),
                        status: JobStatus::Failed,
                        message,
                        output: None,
                    }
                }
            }
        };

        self.handles.write().await.remove(job_id);
        self.send(event);
    }

    fn send(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }
}
