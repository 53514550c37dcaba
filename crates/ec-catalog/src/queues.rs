//! Thin queue views over the `Catalog` (spec.md §4.4, §4.5). The readiness
//! predicates that decide when a `Todo` task appears live in `Catalog`
//! itself, since they fire off page ingest; these wrappers exist so callers
//! depend on a queue-shaped API rather than the full `Catalog` surface.

use std::sync::Arc;

use ec_types::{CoordResult, PaperNumber, Question, Version};

use crate::catalog::{Catalog, ClaimedId, ClaimedMark};
use crate::model::IdTask;
use crate::model::MarkTask;

/// Queue over papers that are fully scanned but not yet identified.
pub struct IdentificationQueue {
    catalog: Arc<Catalog>,
}

impl IdentificationQueue {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn claim_next(&self, user: &str) -> CoordResult<Option<ClaimedId>> {
        self.catalog.claim_next_id(user)
    }

    pub fn return_identified(
        &self,
        user: &str,
        paper: PaperNumber,
        student_id: String,
        student_name: String,
        already_done: bool,
    ) -> CoordResult<()> {
        self.catalog
            .return_id(user, paper, student_id, student_name, already_done)
    }

    pub fn abandon(&self, user: &str, paper: PaperNumber) -> CoordResult<()> {
        self.catalog.abandon_id(user, paper)
    }

    pub fn list_done(&self, user: &str) -> CoordResult<Vec<IdTask>> {
        self.catalog.list_done_id(user)
    }
}

/// Queue over `(paper, question, version)` triples ready to be marked.
/// Claims are always filtered by `(question, version)` — markers work a
/// single question/version pair at a time.
pub struct MarkingQueue {
    catalog: Arc<Catalog>,
}

impl MarkingQueue {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn claim_next(
        &self,
        user: &str,
        question: Question,
        version: Version,
    ) -> CoordResult<Option<ClaimedMark>> {
        self.catalog.claim_next_mark(user, question, version)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn return_marked(
        &self,
        user: &str,
        paper: PaperNumber,
        question: Question,
        version: Version,
        score: u32,
        marking_seconds: u32,
        tags: Vec<String>,
        annotated_artifact_id: String,
        annotation_record_id: String,
        integrity_check: String,
    ) -> CoordResult<()> {
        self.catalog.return_mark(
            user,
            paper,
            question,
            version,
            score,
            marking_seconds,
            tags,
            annotated_artifact_id,
            annotation_record_id,
            integrity_check,
        )
    }

    pub fn abandon(
        &self,
        user: &str,
        paper: PaperNumber,
        question: Question,
        version: Version,
    ) -> CoordResult<()> {
        self.catalog.abandon_mark(user, paper, question, version)
    }

    pub fn set_tags(
        &self,
        paper: PaperNumber,
        question: Question,
        version: Version,
        tags: Vec<String>,
    ) -> CoordResult<()> {
        self.catalog.set_tags(paper, question, version, tags)
    }

    pub fn list_done(&self, question: Question, version: Version) -> CoordResult<Vec<MarkTask>> {
        self.catalog.list_done_marks(question, version)
    }

    pub fn max_mark(&self, question: Question, version: Version) -> CoordResult<u32> {
        self.catalog.max_mark(question, version)
    }
}
