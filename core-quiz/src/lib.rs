//! # Quiz Domain Layer
//!
//! Typed actions over the quiz backend: subjects, chapters, quizzes,
//! questions, scores and the admin endpoints.
//!
//! ## Overview
//!
//! - [`QuizActions`] performs one authenticated call per action and turns
//!   failures into a single user-facing message.
//! - [`ViewState`] publishes the lists, current selections, loading flag and
//!   last error through `watch` channels.
//! - [`models`] holds the wire types.

pub mod actions;
pub mod error;
pub mod models;
pub mod state;

pub use actions::{ExportPolling, QuizActions};
pub use error::{ActionError, Result};
pub use models::{
    Chapter, ChapterForm, Choice, ChoiceForm, ExportState, ExportStatus, ExportTask, Question,
    QuestionForm, Quiz, QuizForm, QuizSubmission, Score, Subject, SubjectForm,
};
pub use state::ViewState;
