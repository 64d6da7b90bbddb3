use super::{server_message, Failure, QuizActions};
use crate::error::Result;
use crate::models::{Quiz, QuizForm, QuizSubmission};
use core_auth::PendingRequest;
use serde_json::Value;
use tracing::{info, instrument};

const FETCH_ALL: Failure = Failure::new("Failed to fetch quizzes");
const FETCH_ONE: Failure = Failure::new("Failed to fetch quiz");
const CREATE: Failure = Failure::new("Failed to create quiz")
    .on_conflict("A quiz with this title already exists in this chapter");
const UPDATE: Failure = Failure::new("Failed to update quiz")
    .on_conflict("Another quiz with this title already exists in this chapter");
const DELETE: Failure = Failure::new("Failed to delete quiz").bad_request_uses_message();
const START: Failure = Failure::new("Failed to start quiz");
const SUBMIT: Failure = Failure::new("Failed to submit quiz");

pub const QUIZ_CREATED: &str = "Quiz created successfully";
pub const QUIZ_UPDATED: &str = "Quiz updated successfully";
pub const QUIZ_DELETED: &str = "Quiz successfully deleted";

impl QuizActions {
    #[instrument(skip(self))]
    pub async fn fetch_quizzes(&self, chapter_id: i64) -> Result<Vec<Quiz>> {
        self.read(
            PendingRequest::get(format!("/chapters/{}/quizzes", chapter_id)),
            FETCH_ALL,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn fetch_quiz(&self, id: i64) -> Result<Quiz> {
        let quiz: Quiz = self
            .read(PendingRequest::get(format!("/quizzes/{}", id)), FETCH_ONE)
            .await?;
        self.state.set_current_quiz(quiz.clone());
        Ok(quiz)
    }

    #[instrument(skip(self, form), fields(title = %form.title))]
    pub async fn create_quiz(&self, chapter_id: i64, form: &QuizForm) -> Result<Quiz> {
        let request = self.body(
            PendingRequest::post(format!("/chapters/{}/quizzes", chapter_id)),
            form,
            CREATE,
        )?;
        let quiz: Quiz = self.mutate(request, CREATE).await?;

        info!(quiz_id = quiz.id, "Quiz created");
        self.succeed(QUIZ_CREATED);
        Ok(quiz)
    }

    #[instrument(skip(self, form))]
    pub async fn update_quiz(&self, id: i64, form: &QuizForm) -> Result<Quiz> {
        let request = self.body(PendingRequest::put(format!("/quizzes/{}", id)), form, UPDATE)?;
        let quiz: Quiz = self.mutate(request, UPDATE).await?;
        self.succeed(QUIZ_UPDATED);
        Ok(quiz)
    }

    #[instrument(skip(self))]
    pub async fn delete_quiz(&self, id: i64) -> Result<Value> {
        let body: Value = self
            .mutate(PendingRequest::delete(format!("/quizzes/{}", id)), DELETE)
            .await?;
        self.succeed(&server_message(&body, QUIZ_DELETED));
        Ok(body)
    }

    /// Opens an attempt; the response carries the questions without their
    /// correct answers.
    #[instrument(skip(self))]
    pub async fn start_attempt(&self, quiz_id: i64) -> Result<Value> {
        self.mutate(
            PendingRequest::post(format!("/quizzes/{}/attempt", quiz_id)),
            START,
        )
        .await
    }

    #[instrument(skip(self, submission), fields(answers = submission.answers.len()))]
    pub async fn submit_quiz(&self, quiz_id: i64, submission: &QuizSubmission) -> Result<Value> {
        let request = self.body(
            PendingRequest::post(format!("/quizzes/{}/submit", quiz_id)),
            submission,
            SUBMIT,
        )?;
        let result: Value = self.mutate(request, SUBMIT).await?;
        info!(quiz_id, "Quiz submitted");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::actions::test_support::*;
    use crate::models::{QuizForm, QuizSubmission};
    use bridge_traits::HttpMethod;
    use core_runtime::notifications::Severity;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_fetch_quizzes_for_chapter() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.url.ends_with("/api/chapters/2/quizzes"))
            .returning(|_| {
                respond(
                    200,
                    json!([
                        { "id": 1, "title": "Quiz 1 - Algebra", "chapter_id": 2 },
                        { "id": 2, "title": "Quiz 2 - Geometry", "chapter_id": 2 }
                    ]),
                )
            });
        let actions = actions_with(http).await;

        let quizzes = actions.fetch_quizzes(2).await.unwrap();

        assert_eq!(quizzes.len(), 2);
        assert_eq!(quizzes[1].title, "Quiz 2 - Geometry");
    }

    #[tokio::test]
    async fn test_create_quiz_conflict_text() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| respond(409, json!({ "error": "duplicate" })));
        let actions = actions_with(http).await;

        let err = actions
            .create_quiz(
                2,
                &QuizForm {
                    title: "Quiz 1 - Algebra".to_string(),
                    ..QuizForm::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.message, "A quiz with this title already exists in this chapter");
        assert_eq!(notifications(&actions).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_quiz_defaults_success_text() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.method == HttpMethod::Delete)
            .returning(|_| respond(204, serde_json::Value::Null));
        let actions = actions_with(http).await;

        actions.delete_quiz(4).await.unwrap();

        assert_eq!(
            notifications(&actions),
            vec![(Severity::Success, "Quiz successfully deleted".to_string())]
        );
    }

    #[tokio::test]
    async fn test_submit_quiz_posts_answers() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                request.url.ends_with("/quizzes/4/submit")
                    && body_of(request) == json!({ "answers": { "10": 41 }, "time_taken": 120 })
            })
            .returning(|_| respond(200, json!({ "score": 80.0, "passed": true })));
        let actions = actions_with(http).await;

        let result = actions
            .submit_quiz(
                4,
                &QuizSubmission {
                    answers: BTreeMap::from([(10, 41)]),
                    time_taken: 120,
                },
            )
            .await
            .unwrap();

        assert_eq!(result["passed"], true);
        assert!(notifications(&actions).is_empty());
    }

    #[tokio::test]
    async fn test_start_attempt_failure_notifies() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.url.ends_with("/quizzes/4/attempt"))
            .returning(|_| respond(403, json!({ "error": "Quiz is not active" })));
        let actions = actions_with(http).await;

        let err = actions.start_attempt(4).await.unwrap_err();

        assert_eq!(err.message, "Quiz is not active");
        assert_eq!(
            notifications(&actions),
            vec![(Severity::Error, "Quiz is not active".to_string())]
        );
    }
}
