use super::{server_message, Failure, QuizActions};
use crate::error::Result;
use crate::models::{Chapter, ChapterForm};
use core_auth::PendingRequest;
use serde_json::Value;
use tracing::{info, instrument};

const FETCH_ALL: Failure = Failure::new("Failed to fetch chapters");
const FETCH_ONE: Failure = Failure::new("Failed to fetch chapter");
const CREATE: Failure =
    Failure::new("Failed to create chapter").on_conflict("A chapter with this name already exists");
const UPDATE: Failure = Failure::new("Failed to update chapter")
    .on_conflict("Another chapter with this name already exists");
const DELETE: Failure = Failure::new("Failed to delete chapter").bad_request_uses_message();

pub const CHAPTER_CREATED: &str = "Chapter created successfully";
pub const CHAPTER_UPDATED: &str = "Chapter updated successfully";
pub const CHAPTER_DELETED: &str = "Chapter successfully deleted";

impl QuizActions {
    #[instrument(skip(self))]
    pub async fn fetch_chapters(&self, subject_id: i64) -> Result<Vec<Chapter>> {
        self.read(
            PendingRequest::get(format!("/subjects/{}/chapters", subject_id)),
            FETCH_ALL,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn fetch_chapter(&self, id: i64) -> Result<Chapter> {
        let chapter: Chapter = self
            .read(PendingRequest::get(format!("/chapters/{}", id)), FETCH_ONE)
            .await?;
        self.state.set_current_chapter(chapter.clone());
        Ok(chapter)
    }

    #[instrument(skip(self, form), fields(name = %form.name))]
    pub async fn create_chapter(&self, subject_id: i64, form: &ChapterForm) -> Result<Chapter> {
        let request = self.body(
            PendingRequest::post(format!("/subjects/{}/chapters", subject_id)),
            form,
            CREATE,
        )?;
        let chapter: Chapter = self.mutate(request, CREATE).await?;

        info!(chapter_id = chapter.id, "Chapter created");
        self.succeed(CHAPTER_CREATED);
        Ok(chapter)
    }

    #[instrument(skip(self, form))]
    pub async fn update_chapter(&self, id: i64, form: &ChapterForm) -> Result<Chapter> {
        let request = self.body(PendingRequest::put(format!("/chapters/{}", id)), form, UPDATE)?;
        let chapter: Chapter = self.mutate(request, UPDATE).await?;
        self.succeed(CHAPTER_UPDATED);
        Ok(chapter)
    }

    #[instrument(skip(self))]
    pub async fn delete_chapter(&self, id: i64) -> Result<Value> {
        let body: Value = self
            .mutate(PendingRequest::delete(format!("/chapters/{}", id)), DELETE)
            .await?;
        self.succeed(&server_message(&body, CHAPTER_DELETED));
        Ok(body)
    }
}
