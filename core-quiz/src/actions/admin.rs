use super::{Failure, QuizActions};
use crate::error::Result;
use core_auth::{PendingRequest, UserProfile};
use serde_json::{json, Value};
use tracing::{info, instrument};

const FETCH_USERS: Failure = Failure::new("Failed to fetch users");
const USER_STATS: Failure = Failure::new("Failed to fetch user statistics");
const USER_STATUS: Failure = Failure::new("Failed to update user status");
const EXPORT_USERS: Failure = Failure::new("Failed to export user data");
const FETCH_REPORTS: Failure = Failure::new("Failed to fetch reports");
const EXPORT_REPORTS: Failure = Failure::new("Failed to export reports");

impl QuizActions {
    #[instrument(skip(self))]
    pub async fn fetch_users(&self) -> Result<Vec<UserProfile>> {
        self.read(PendingRequest::get("/admin/users"), FETCH_USERS)
            .await
    }

    #[instrument(skip(self))]
    pub async fn user_stats(&self, user_id: i64) -> Result<Value> {
        self.read(
            PendingRequest::get(format!("/admin/users/{}/stats", user_id)),
            USER_STATS,
        )
        .await
    }

    /// Activates or deactivates an account.
    #[instrument(skip(self))]
    pub async fn set_user_status(&self, user_id: i64, is_active: bool) -> Result<Value> {
        let request = self.body(
            PendingRequest::put(format!("/admin/users/{}/status", user_id)),
            &json!({ "is_active": is_active }),
            USER_STATUS,
        )?;
        let body: Value = self.mutate(request, USER_STATUS).await?;
        info!(user_id, is_active, "User status updated");
        Ok(body)
    }

    #[instrument(skip(self))]
    pub async fn export_users(&self) -> Result<Value> {
        self.mutate(PendingRequest::post("/admin/users/export"), EXPORT_USERS)
            .await
    }

    /// Aggregated activity for `period` (`week`, `month`, ...), passed to the
    /// backend verbatim.
    #[instrument(skip(self))]
    pub async fn fetch_reports(&self, period: &str) -> Result<Value> {
        self.read(
            PendingRequest::get("/admin/reports").query("period", period),
            FETCH_REPORTS,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn export_reports(&self) -> Result<Value> {
        self.read(PendingRequest::get("/admin/reports/export"), EXPORT_REPORTS)
            .await
    }
}
