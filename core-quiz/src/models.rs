//! Quiz Domain Models
//!
//! Wire types for the quiz backend's resources. Every record keeps fields
//! the client does not interpret in `extra`, so views can read them and a
//! record can be echoed back without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<i64>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<u32>,
    /// Server-formatted timestamps, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub text: String,
    /// Only present in admin views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<i64>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubjectForm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChapterForm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuizForm {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChoiceForm {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuestionForm {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    pub choices: Vec<ChoiceForm>,
}

/// Answers for `POST /quizzes/{id}/submit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuizSubmission {
    /// Selected choice id per question id.
    pub answers: BTreeMap<i64, i64>,
    /// Seconds spent on the attempt.
    pub time_taken: u64,
}

// ============================================================================
// Exports
// ============================================================================

/// Handle for a background export job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTask {
    pub task_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Progress of an export job as reported by the task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExportState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Other(String),
}

impl ExportState {
    /// Succeeded and failed jobs will not change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Succeeded | ExportState::Failed)
    }
}

impl From<String> for ExportState {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" | "QUEUED" => ExportState::Pending,
            "STARTED" | "PROGRESS" | "RUNNING" => ExportState::Running,
            "SUCCESS" | "COMPLETED" | "DONE" => ExportState::Succeeded,
            "FAILURE" | "FAILED" | "REVOKED" => ExportState::Failed,
            _ => ExportState::Other(value),
        }
    }
}

impl From<ExportState> for String {
    fn from(state: ExportState) -> Self {
        match state {
            ExportState::Pending => "PENDING".to_string(),
            ExportState::Running => "STARTED".to_string(),
            ExportState::Succeeded => "SUCCESS".to_string(),
            ExportState::Failed => "FAILURE".to_string(),
            ExportState::Other(value) => value,
        }
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportStatus {
    pub state: ExportState,
    /// Download location once the job succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
