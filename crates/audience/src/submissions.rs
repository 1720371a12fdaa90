//! Quiz/lead storage seam. The engine only needs to pull submissions for a
//! quiz; everything else about lead capture lives outside this workspace.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One lead-capture submission as the external store exposes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Channel-appropriate address: phone number or email.
    pub identity: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub is_complete: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Read-only view over the quiz/lead store.
///
/// Returns `None` when the quiz itself does not exist; a quiz with no
/// submissions yet returns `Some(vec![])`.
pub trait SubmissionStore: Send + Sync {
    fn get_submissions(&self, quiz_id: Uuid) -> Option<Vec<Submission>>;
}

/// In-memory submission store backed by DashMap.
///
/// Production: replace with the relational lead store behind the same trait.
/// This provides the same API surface for development and testing.
#[derive(Default)]
pub struct InMemorySubmissionStore {
    quizzes: DashMap<Uuid, Vec<Submission>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self {
            quizzes: DashMap::new(),
        }
    }

    /// Register a quiz so lookups against it resolve (possibly empty).
    pub fn register_quiz(&self, quiz_id: Uuid) {
        self.quizzes.entry(quiz_id).or_default();
    }

    pub fn add_submission(&self, quiz_id: Uuid, submission: Submission) {
        self.quizzes.entry(quiz_id).or_default().push(submission);
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn get_submissions(&self, quiz_id: Uuid) -> Option<Vec<Submission>> {
        self.quizzes.get(&quiz_id).map(|entry| entry.clone())
    }
}
