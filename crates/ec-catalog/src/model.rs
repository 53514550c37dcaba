use ec_types::{PaperNumber, Question, Version};
use serde::{Deserialize, Serialize};

/// Shared shape of the ID/Mark task state machine (spec.md §3 state
/// machine diagram).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Todo,
    OutWith(String),
    Done,
}

impl TaskState {
    pub fn owner(&self) -> Option<&str> {
        match self {
            TaskState::OutWith(u) => Some(u),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskState::Done)
    }
}

/// One page image ingested from the scanning pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub paper_number: PaperNumber,
    pub page_number: u32,
    pub version: Version,
    pub artifact_id: String,
    pub content_hash: String,
    pub source_filename: String,
}

/// Static layout handed down from the production pipeline: which pages
/// identify the paper, and which pages make up each question group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub paper_number: PaperNumber,
    pub magic_code: String,
    pub id_pages: Vec<u32>,
    pub question_groups: Vec<QuestionGroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGroupSpec {
    pub question: Question,
    pub version: Version,
    pub pages: Vec<u32>,
    pub max_mark: u32,
}

/// One per paper. Becomes `Todo` once every id-page has an ingested image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTask {
    pub paper_number: PaperNumber,
    pub state: TaskState,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub claimed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// The user who most recently returned this task `Done`. Distinct from
    /// `state`'s `OutWith` owner, which is cleared on completion; this
    /// survives it, for `ProgressAccountant::user_progress`.
    pub identified_by: Option<String>,
}

impl IdTask {
    pub fn new_todo(paper_number: PaperNumber) -> Self {
        Self {
            paper_number,
            state: TaskState::Todo,
            student_id: None,
            student_name: None,
            claimed_at: None,
            identified_by: None,
        }
    }
}

/// One per question-group per paper. Becomes `Todo` once every page in the
/// group's page list has an ingested image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkTask {
    pub paper_number: PaperNumber,
    pub question: Question,
    pub version: Version,
    pub state: TaskState,
    pub score: Option<u32>,
    pub annotated_image_id: Option<String>,
    pub annotation_record_id: Option<String>,
    /// Digest snapshot of the task's input pages, taken at claim time and
    /// re-verified at return time (spec.md §4.3, I3).
    pub integrity_check: Option<String>,
    /// When the task was completed, per the server clock.
    pub marking_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Client-reported seconds spent annotating, as told to `return_mark`.
    /// Not verified against anything; kept for progress/statistics only.
    pub marking_duration_seconds: Option<u32>,
    pub tags: Vec<String>,
    pub claimed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// The user who most recently returned this task `Done`. See
    /// `IdTask::identified_by`.
    pub marked_by: Option<String>,
}

impl MarkTask {
    pub fn new_todo(paper_number: PaperNumber, question: Question, version: Version) -> Self {
        Self {
            paper_number,
            question,
            version,
            state: TaskState::Todo,
            score: None,
            annotated_image_id: None,
            annotation_record_id: None,
            integrity_check: None,
            marking_time: None,
            marking_duration_seconds: None,
            tags: Vec::new(),
            claimed_at: None,
            marked_by: None,
        }
    }
}

/// Preserves the prior value of a task's result whenever a `Done` task is
/// re-identified, re-marked, or administratively reset (spec.md I6, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub at: chrono::DateTime<chrono::Utc>,
    pub actor: String,
    pub task_ref: String,
    pub reason: String,
    pub prior_snapshot: String,
}
