//! Background job command handlers

use tauri::State;
use tracing::{error, info};

use crate::core::models::{Job, JobStats};
use crate::AppState;

#[tauri::command]
pub async fn get_job(state: State<'_, AppState>, job_id: String) -> Result<Job, String> {
    state
        .jobs
        .get_job(&job_id)
        .await
        .ok_or_else(|| format!("Unknown job: {}", job_id))
}

#[tauri::command]
pub async fn list_jobs(state: State<'_, AppState>) -> Result<Vec<Job>, String> {
    Ok(state.jobs.list_jobs().await)
}

#[tauri::command]
pub async fn get_job_stats(state: State<'_, AppState>) -> Result<JobStats, String> {
    Ok(state.jobs.statistics().await)
}

/// Cancel a queued or running job
#[tauri::command]
pub async fn cancel_job(state: State<'_, AppState>, job_id: String) -> Result<(), String> {
    info!("🛑 Cancel requested for job {}", job_id);

    match state.jobs.cancel_job(&job_id).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("❌ Failed to cancel job {}: {}", job_id, e);
            Err(e.to_string())
        }
    }
}

/// Remove completed, failed and cancelled jobs from the list
#[tauri::command]
pub async fn clear_finished_jobs(state: State<'_, AppState>) -> Result<usize, String> {
    Ok(state.jobs.clear_finished().await)
}
