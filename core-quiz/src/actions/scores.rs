use super::{Failure, QuizActions};
use crate::error::Result;
use crate::models::{ExportStatus, ExportTask, Score};
use core_auth::{ApiError, PendingRequest};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

const FETCH_ALL: Failure = Failure::new("Failed to fetch scores");
const FETCH_ONE: Failure = Failure::new("Failed to fetch score");
const EXPORT: Failure = Failure::new("Failed to export scores");
const EXPORT_STATUS: Failure = Failure::new("Failed to check export status");
const EXPORT_QUIZ_DATA: Failure = Failure::new("Failed to export quiz data");
const DASHBOARD: Failure = Failure::new("Failed to fetch dashboard statistics");

/// Cadence for [`QuizActions::wait_for_export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPolling {
    pub interval: Duration,
    /// Give up once this much time has passed since the first poll.
    pub deadline: Duration,
}

impl Default for ExportPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(60),
        }
    }
}

impl QuizActions {
    #[instrument(skip(self))]
    pub async fn fetch_scores(&self) -> Result<Vec<Score>> {
        let scores: Vec<Score> = self.read(PendingRequest::get("/scores"), FETCH_ALL).await?;
        self.state.set_scores(scores.clone());
        Ok(scores)
    }

    #[instrument(skip(self))]
    pub async fn fetch_score(&self, id: i64) -> Result<Score> {
        self.read(PendingRequest::get(format!("/scores/{}", id)), FETCH_ONE)
            .await
    }

    /// Queues a CSV export of the caller's scores.
    #[instrument(skip(self))]
    pub async fn export_scores(&self) -> Result<ExportTask> {
        let task: ExportTask = self
            .mutate(PendingRequest::post("/scores/export"), EXPORT)
            .await?;
        info!(task_id = %task.task_id, "Score export queued");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn export_status(&self, task_id: &str) -> Result<ExportStatus> {
        self.read(
            PendingRequest::get(format!("/scores/export/{}", task_id)),
            EXPORT_STATUS,
        )
        .await
    }

    /// Polls an export until it succeeds or fails.
    ///
    /// A job that is still running when the polling deadline passes is
    /// reported like a failed mutation, with [`ApiError::Timeout`] as the
    /// cause. A job that finished in the failed state is returned as is.
    #[instrument(skip(self))]
    pub async fn wait_for_export(&self, task_id: &str) -> Result<ExportStatus> {
        let started = Instant::now();

        loop {
            let status = self.export_status(task_id).await?;
            if status.state.is_terminal() {
                info!(state = %status.state, "Score export finished");
                return Ok(status);
            }

            if started.elapsed() >= self.polling.deadline {
                return Err(self.fail(ApiError::Timeout(self.polling.deadline), EXPORT, true));
            }

            debug!(state = %status.state, "Score export still running");
            tokio::time::sleep(self.polling.interval).await;
        }
    }

    #[instrument(skip(self))]
    pub async fn export_quiz_data(&self) -> Result<Value> {
        self.mutate(PendingRequest::post("/users/scores/export"), EXPORT_QUIZ_DATA)
            .await
    }

    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> Result<Value> {
        self.read(PendingRequest::get("/dashboard/stats"), DASHBOARD)
            .await
    }
}
