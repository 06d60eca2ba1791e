//! Progress and log reporting for background jobs
//!
//! A [`ProgressReporter`] is handed to the downloader and the converter.
//! Every log line and percentage is written to the job record and forwarded
//! to the front end as a [`JobEvent`].

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::core::models::{Job, JobEvent};

/// Shared job table, keyed by job id
pub type JobTable = Arc<RwLock<HashMap<String, Job>>>;

/// Clamp a percentage into `0.0..=100.0`, mapping NaN to zero
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

#[derive(Clone)]
pub struct ProgressReporter {
    job_id: String,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
    jobs: Option<JobTable>,
}

impl ProgressReporter {
    pub(crate) fn new(
        job_id: String,
        events: mpsc::UnboundedSender<JobEvent>,
        jobs: JobTable,
    ) -> Self {
        Self {
            job_id,
            events: Some(events),
            jobs: Some(jobs),
        }
    }

    /// Reporter that only streams events, for callers without a job table
    pub fn channel(job_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                job_id: job_id.into(),
                events: Some(tx),
                jobs: None,
            },
            rx,
        )
    }

    /// Reporter that drops everything
    pub fn silent() -> Self {
        Self {
            job_id: String::new(),
            events: None,
            jobs: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn log(&self, line: impl Into<String>) {
        let line = line.into();
        debug!(job_id = %self.job_id, "{}", line);

        if let Some(jobs) = &self.jobs {
            let mut jobs = jobs.write().await;
            if let Some(job) = jobs.get_mut(&self.job_id) {
                if !job.status.is_terminal() {
                    job.log.push(line.clone());
                    job.updated_at = chrono::Utc::now();
                }
            }
        }

        self.send(JobEvent::Log {
            job_id: self.job_id.clone(),
            line,
        });
    }

    pub async fn progress(&self, percent: f64) {
        let percent = clamp_percent(percent);

        if let Some(jobs) = &self.jobs {
            let mut jobs = jobs.write().await;
            if let Some(job) = jobs.get_mut(&self.job_id) {
                if !job.status.is_terminal() {
                    job.progress = percent;
                    job.updated_at = chrono::Utc::now();
                }
            }
        }

        self.send(JobEvent::Progress {
            job_id: self.job_id.clone(),
            percent,
        });
    }

    pub(crate) fn send(&self, event: JobEvent) {
        if let Some(events) = &self.events {
            // 前端已关闭时接收端会被丢弃，忽略发送失败
            let _ = events.send(event);
        }
    }
}
