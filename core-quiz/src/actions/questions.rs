use super::{Failure, QuizActions};
use crate::error::Result;
use crate::models::{Question, QuestionForm};
use core_auth::PendingRequest;
use serde_json::Value;
use tracing::instrument;

const FETCH_ALL: Failure = Failure::new("Failed to fetch questions");
const CREATE: Failure = Failure::new("Failed to create question");
const UPDATE: Failure = Failure::new("Failed to update question");
const DELETE: Failure = Failure::new("Failed to delete question");

impl QuizActions {
    #[instrument(skip(self))]
    pub async fn fetch_questions(&self, quiz_id: i64) -> Result<Vec<Question>> {
        self.read(
            PendingRequest::get(format!("/quizzes/{}/questions", quiz_id)),
            FETCH_ALL,
        )
        .await
    }

    #[instrument(skip(self, form), fields(choices = form.choices.len()))]
    pub async fn create_question(&self, quiz_id: i64, form: &QuestionForm) -> Result<Question> {
        let request = self.body(
            PendingRequest::post(format!("/quizzes/{}/questions", quiz_id)),
            form,
            CREATE,
        )?;
        self.mutate(request, CREATE).await
    }

    #[instrument(skip(self, form))]
    pub async fn update_question(&self, id: i64, form: &QuestionForm) -> Result<Question> {
        let request = self.body(PendingRequest::put(format!("/questions/{}", id)), form, UPDATE)?;
        self.mutate(request, UPDATE).await
    }

    #[instrument(skip(self))]
    pub async fn delete_question(&self, id: i64) -> Result<Value> {
        self.mutate(PendingRequest::delete(format!("/questions/{}", id)), DELETE)
            .await
    }
}
