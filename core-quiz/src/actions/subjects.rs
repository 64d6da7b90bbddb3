use super::{Failure, QuizActions};
use crate::error::Result;
use crate::models::{Subject, SubjectForm};
use core_auth::PendingRequest;
use serde_json::Value;
use tracing::{info, instrument};

const FETCH_ALL: Failure = Failure::new("Failed to fetch subjects");
const FETCH_ONE: Failure = Failure::new("Failed to fetch subject");
const CREATE: Failure = Failure::new("Failed to create subject");
const UPDATE: Failure = Failure::new("Failed to update subject");
const DELETE: Failure = Failure::new("Failed to delete subject");

pub const SUBJECT_CREATED: &str = "Subject created successfully!";

impl QuizActions {
    /// Loads every subject into the view state.
    #[instrument(skip(self))]
    pub async fn fetch_subjects(&self) -> Result<Vec<Subject>> {
        let subjects: Vec<Subject> = self.read(PendingRequest::get("/subjects"), FETCH_ALL).await?;
        self.state.set_subjects(subjects.clone());
        Ok(subjects)
    }

    #[instrument(skip(self))]
    pub async fn fetch_subject(&self, id: i64) -> Result<Subject> {
        let subject: Subject = self
            .read(PendingRequest::get(format!("/subjects/{}", id)), FETCH_ONE)
            .await?;
        self.state.set_current_subject(subject.clone());
        Ok(subject)
    }

    #[instrument(skip(self, form), fields(name = %form.name))]
    pub async fn create_subject(&self, form: &SubjectForm) -> Result<Subject> {
        let request = self.body(PendingRequest::post("/subjects"), form, CREATE)?;
        let subject: Subject = self.mutate(request, CREATE).await?;

        info!(subject_id = subject.id, "Subject created");
        self.succeed(SUBJECT_CREATED);
        self.refresh_subjects().await;
        Ok(subject)
    }

    #[instrument(skip(self, form))]
    pub async fn update_subject(&self, id: i64, form: &SubjectForm) -> Result<Subject> {
        let request = self.body(PendingRequest::put(format!("/subjects/{}", id)), form, UPDATE)?;
        let subject: Subject = self.mutate(request, UPDATE).await?;
        self.refresh_subjects().await;
        Ok(subject)
    }

    #[instrument(skip(self))]
    pub async fn delete_subject(&self, id: i64) -> Result<Value> {
        let body: Value = self
            .mutate(PendingRequest::delete(format!("/subjects/{}", id)), DELETE)
            .await?;
        self.refresh_subjects().await;
        Ok(body)
    }

    // The mutation already succeeded; a failed reload only shows up as the
    // view error set by `fetch_subjects`.
    async fn refresh_subjects(&self) {
        let _ = self.fetch_subjects().await;
    }
}

#[cfg(test)]
mod tests {
    use crate::actions::test_support::*;
    use crate::models::SubjectForm;
    use core_auth::manager::SESSION_EXPIRED_MESSAGE;
    use core_runtime::notifications::Severity;
    use mockall::Sequence;
    use serde_json::json;

    fn physics() -> SubjectForm {
        SubjectForm {
            name: "Physics".to_string(),
            ..SubjectForm::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_subjects_updates_state() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.url.ends_with("/api/subjects") && request.bearer() == Some("T1"))
            .times(1)
            .returning(|_| respond(200, json!([{ "id": 1, "name": "Mathematics" }])));
        let actions = actions_with(http).await;
        let mut watched = actions.state().watch_subjects();

        let subjects = actions.fetch_subjects().await.unwrap();

        assert_eq!(subjects.len(), 1);
        assert_eq!(actions.state().subjects()[0].name, "Mathematics");
        assert!(watched.has_changed().unwrap());
        assert!(!actions.state().is_loading());
    }

    #[tokio::test]
    async fn test_fetch_failure_sets_error_without_notification() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| respond(500, json!({})));
        let actions = actions_with(http).await;

        let err = actions.fetch_subjects().await.unwrap_err();

        assert_eq!(err.message, "Failed to fetch subjects");
        assert_eq!(err.status(), Some(500));
        assert_eq!(actions.state().error().as_deref(), Some("Failed to fetch subjects"));
        assert!(notifications(&actions).is_empty());
    }

    #[tokio::test]
    async fn test_create_subject_notifies_and_reloads() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                request.url.ends_with("/subjects")
                    && request.method == bridge_traits::HttpMethod::Post
                    && body_of(request)["name"] == "Physics"
            })
            .times(1)
            .returning(|_| respond(201, json!({ "id": 2, "name": "Physics" })));
        http.expect_execute()
            .withf(|request| request.method == bridge_traits::HttpMethod::Get)
            .times(1)
            .returning(|_| {
                respond(
                    200,
                    json!([{ "id": 1, "name": "Mathematics" }, { "id": 2, "name": "Physics" }]),
                )
            });
        let actions = actions_with(http).await;

        let created = actions
            .create_subject(&SubjectForm {
                name: "Physics".to_string(),
                ..SubjectForm::default()
            })
            .await
            .unwrap();

        assert_eq!(created.id, 2);
        assert_eq!(actions.state().subjects().len(), 2);
        assert_eq!(
            notifications(&actions),
            vec![(Severity::Success, "Subject created successfully!".to_string())]
        );
    }

    #[tokio::test]
    async fn test_create_subject_failure_notifies_once() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| respond(409, json!({ "error": "Subject already exists" })));
        let actions = actions_with(http).await;

        let err = actions
            .create_subject(&SubjectForm {
                name: "Mathematics".to_string(),
                ..SubjectForm::default()
            })
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(
            notifications(&actions),
            vec![(Severity::Error, "Subject already exists".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_subject_sets_current() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.url.ends_with("/subjects/7"))
            .returning(|_| respond(200, json!({ "id": 7, "name": "Chemistry" })));
        let actions = actions_with(http).await;

        actions.fetch_subject(7).await.unwrap();

        assert_eq!(actions.state().current_subject().unwrap().id, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_401_on_replay_after_refresh_notifies_once() {
        let mut seq = Sequence::new();
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.url.ends_with("/subjects") && request.bearer() == Some("T1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| respond(401, json!({ "error": "Token has expired" })));
        http.expect_execute()
            .withf(|request| request.url.ends_with("/auth/refresh"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| respond(200, json!({ "access_token": "T2" })));
        http.expect_execute()
            .withf(|request| request.url.ends_with("/subjects") && request.bearer() == Some("T2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| respond(401, json!({ "error": "Not allowed" })));
        let actions = actions_with(http).await;

        let err = actions.create_subject(&physics()).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(
            notifications(&actions),
            vec![(Severity::Error, "Not allowed".to_string())]
        );
        assert_eq!(actions.state().error().as_deref(), Some("Not allowed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_refresh_leaves_only_session_notice() {
        let mut seq = Sequence::new();
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| respond(401, json!({ "error": "Token has expired" })));
        http.expect_execute()
            .withf(|request| request.url.ends_with("/auth/refresh"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| respond(401, json!({ "error": "Refresh token revoked" })));
        let actions = actions_with(http).await;

        let err = actions.create_subject(&physics()).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(
            notifications(&actions),
            vec![(Severity::Error, SESSION_EXPIRED_MESSAGE.to_string())]
        );
    }
}
