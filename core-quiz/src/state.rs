//! Reactive view state shared by the domain actions.

use crate::models::{Chapter, Quiz, Score, Subject};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Channels {
    subjects: watch::Sender<Vec<Subject>>,
    scores: watch::Sender<Vec<Score>>,
    current_subject: watch::Sender<Option<Subject>>,
    current_chapter: watch::Sender<Option<Chapter>>,
    current_quiz: watch::Sender<Option<Quiz>>,
    loading: watch::Sender<bool>,
    error: watch::Sender<Option<String>>,
    in_flight: AtomicUsize,
}

/// Latest values published by the actions; each field has its own
/// `watch` channel so views subscribe only to what they render.
///
/// Cloning yields another handle to the same channels.
#[derive(Clone)]
pub struct ViewState {
    channels: Arc<Channels>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Channels {
                subjects: watch::channel(Vec::new()).0,
                scores: watch::channel(Vec::new()).0,
                current_subject: watch::channel(None).0,
                current_chapter: watch::channel(None).0,
                current_quiz: watch::channel(None).0,
                loading: watch::channel(false).0,
                error: watch::channel(None).0,
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub fn subjects(&self) -> Vec<Subject> {
        self.channels.subjects.borrow().clone()
    }

    pub fn scores(&self) -> Vec<Score> {
        self.channels.scores.borrow().clone()
    }

    pub fn current_subject(&self) -> Option<Subject> {
        self.channels.current_subject.borrow().clone()
    }

    pub fn current_chapter(&self) -> Option<Chapter> {
        self.channels.current_chapter.borrow().clone()
    }

    pub fn current_quiz(&self) -> Option<Quiz> {
        self.channels.current_quiz.borrow().clone()
    }

    /// True while at least one action is waiting on the backend.
    pub fn is_loading(&self) -> bool {
        *self.channels.loading.borrow()
    }

    /// Message of the most recent failed action.
    pub fn error(&self) -> Option<String> {
        self.channels.error.borrow().clone()
    }

    pub fn clear_error(&self) {
        self.channels.error.send_replace(None);
    }

    pub fn watch_subjects(&self) -> watch::Receiver<Vec<Subject>> {
        self.channels.subjects.subscribe()
    }

    pub fn watch_scores(&self) -> watch::Receiver<Vec<Score>> {
        self.channels.scores.subscribe()
    }

    pub fn watch_current_subject(&self) -> watch::Receiver<Option<Subject>> {
        self.channels.current_subject.subscribe()
    }

    pub fn watch_current_chapter(&self) -> watch::Receiver<Option<Chapter>> {
        self.channels.current_chapter.subscribe()
    }

    pub fn watch_current_quiz(&self) -> watch::Receiver<Option<Quiz>> {
        self.channels.current_quiz.subscribe()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.channels.loading.subscribe()
    }

    pub fn watch_error(&self) -> watch::Receiver<Option<String>> {
        self.channels.error.subscribe()
    }

    pub(crate) fn set_subjects(&self, subjects: Vec<Subject>) {
        self.channels.subjects.send_replace(subjects);
    }

    pub(crate) fn set_scores(&self, scores: Vec<Score>) {
        self.channels.scores.send_replace(scores);
    }

    pub(crate) fn set_current_subject(&self, subject: Subject) {
        self.channels.current_subject.send_replace(Some(subject));
    }

    pub(crate) fn set_current_chapter(&self, chapter: Chapter) {
        self.channels.current_chapter.send_replace(Some(chapter));
    }

    pub(crate) fn set_current_quiz(&self, quiz: Quiz) {
        self.channels.current_quiz.send_replace(Some(quiz));
    }

    pub(crate) fn set_error(&self, message: &str) {
        self.channels.error.send_replace(Some(message.to_string()));
    }

    /// Marks an action as in flight until the guard is dropped.
    pub(crate) fn begin_loading(&self) -> LoadingGuard {
        if self.channels.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.channels.loading.send_replace(true);
        }
        LoadingGuard {
            channels: Arc::clone(&self.channels),
        }
    }
}

pub(crate) struct LoadingGuard {
    channels: Arc<Channels>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.channels.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.channels.loading.send_replace(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_tracks_nested_actions() {
        let state = ViewState::new();
        let mut loading = state.watch_loading();

        let outer = state.begin_loading();
        let inner = state.begin_loading();
        assert!(state.is_loading());

        drop(inner);
        assert!(state.is_loading());

        drop(outer);
        assert!(!state.is_loading());
        assert!(loading.has_changed().unwrap());
        assert!(!*loading.borrow_and_update());
    }

    #[test]
    fn test_error_is_sticky_until_cleared() {
        let state = ViewState::new();

        state.set_error("Failed to fetch subjects");
        assert_eq!(state.error().as_deref(), Some("Failed to fetch subjects"));

        state.clear_error();
        assert!(state.error().is_none());
    }
}
