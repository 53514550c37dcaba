use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use ec_auth::Authority;
use ec_types::{CoordError, CoordResult, PaperNumber, Question, Version};
use redb::{Database, ReadableTable};
use sha2::{Digest, Sha256};

use crate::db::{
    self, AUDIT_LOG_TABLE, ID_TASKS_TABLE, MARK_TASKS_TABLE, PAGE_IMAGES_TABLE, PAPERS_TABLE,
    STUDENT_ID_INDEX_TABLE,
};
use crate::model::{AuditEntry, IdTask, MarkTask, PageImage, Paper, TaskState};

fn page_image_key(paper: PaperNumber, page: u32, version: Version) -> String {
    format!("{}/{}/{}", paper.0, page, version.0)
}

fn mark_task_key(paper: PaperNumber, question: Question, version: Version) -> String {
    format!("{}/{}/{}", paper.0, question.0, version.0)
}

/// What `claim_next_id` hands back to the caller.
pub struct ClaimedId {
    pub paper_number: PaperNumber,
    pub id_page_artifact_ids: Vec<String>,
}

/// What `claim_next_mark` hands back to the caller.
pub struct ClaimedMark {
    pub paper_number: PaperNumber,
    pub question: Question,
    pub version: Version,
    pub page_artifact_ids: Vec<String>,
    pub tags: Vec<String>,
    pub integrity_check: String,
    /// Populated when this is a re-claim of a previously `Done` task.
    pub prior_annotated_image_id: Option<String>,
    pub prior_annotation_record_id: Option<String>,
}

/// Owns all task state and enforces the state machine (spec.md §4.3). The
/// `lock` is the single point of serialization for mutating operations;
/// it is never held across artifact I/O (spec.md §5).
pub struct Catalog {
    db: Arc<Database>,
    authority: Arc<Authority>,
    lock: Mutex<()>,
    audit_seq: Mutex<u64>,
}

impl Catalog {
    pub fn new(db: Arc<Database>, authority: Arc<Authority>) -> Self {
        let audit_seq = Self::max_audit_seq(&db);
        Self {
            db,
            authority,
            lock: Mutex::new(()),
            audit_seq: Mutex::new(audit_seq),
        }
    }

    /// Highest sequence number already present in `AUDIT_LOG_TABLE`, so a
    /// restart resumes numbering instead of overwriting old entries (I6).
    fn max_audit_seq(db: &Database) -> u64 {
        let Ok(txn) = db.begin_read() else {
            return 0;
        };
        let Ok(table) = txn.open_table(AUDIT_LOG_TABLE) else {
            return 0;
        };
        match table.last() {
            Ok(Some((key, _))) => key.value(),
            _ => 0,
        }
    }

    fn next_audit_seq(&self) -> u64 {
        let mut seq = self.audit_seq.lock().unwrap();
        *seq += 1;
        *seq
    }

    fn write_audit(&self, actor: &str, task_ref: &str, reason: &str, prior_snapshot: String) {
        let entry = AuditEntry {
            seq: self.next_audit_seq(),
            at: chrono::Utc::now(),
            actor: actor.to_string(),
            task_ref: task_ref.to_string(),
            reason: reason.to_string(),
            prior_snapshot,
        };
        let write_txn = self.db.begin_write().expect("audit log write txn");
        {
            let mut table = write_txn
                .open_table(AUDIT_LOG_TABLE)
                .expect("open audit_log table");
            let bytes = bincode::serialize(&entry).expect("serialize audit entry");
            table
                .insert(entry.seq, bytes.as_slice())
                .expect("insert audit entry");
        }
        write_txn.commit().expect("commit audit entry");
    }

    // -- registration & ingest ------------------------------------------

    /// Registers a paper's static layout (id pages, question groups). The
    /// production pipeline calls this before any scans for that paper
    /// exist; immutable thereafter (spec.md §3).
    pub fn register_paper(&self, paper: Paper) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(PAPERS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            let bytes = bincode::serialize(&paper).map_err(|_| CoordError::ServerError)?;
            table
                .insert(paper.paper_number.0, bytes.as_slice())
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;
        Ok(())
    }

    pub fn get_paper(&self, paper: PaperNumber) -> CoordResult<Paper> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(PAPERS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        let bytes = table
            .get(paper.0)
            .map_err(|_| CoordError::ServerError)?
            .ok_or_else(|| CoordError::NotFound(format!("paper {paper}")))?;
        bincode::deserialize(bytes.value()).map_err(|_| CoordError::ServerError)
    }

    pub fn all_papers(&self) -> CoordResult<Vec<Paper>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(PAPERS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(|_| CoordError::ServerError)? {
            let (_, value) = entry.map_err(|_| CoordError::ServerError)?;
            out.push(bincode::deserialize(value.value()).map_err(|_| CoordError::ServerError)?);
        }
        Ok(out)
    }

    fn get_page_image(
        &self,
        paper: PaperNumber,
        page: u32,
        version: Version,
    ) -> CoordResult<Option<PageImage>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(PAGE_IMAGES_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        match table
            .get(page_image_key(paper, page, version).as_str())
            .map_err(|_| CoordError::ServerError)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes.value()).map_err(|_| CoordError::ServerError)?,
            )),
            None => Ok(None),
        }
    }

    /// Records an ingested page image; materializes the `IDTask` and/or
    /// any `MarkTask`s whose readiness predicate this page just satisfied.
    /// Re-ingesting the same (paper, page, version) with a changed hash
    /// resets an already-`Done` task back to `Todo` and writes an audit
    /// entry (spec.md §4.3).
    pub fn ingest_page(
        &self,
        paper: PaperNumber,
        page: u32,
        version: Version,
        artifact_id: String,
        content_hash: String,
        source_filename: String,
    ) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        // Validate the paper is known before mutating anything, per the
        // BadRequest-and-don't-mutate recommendation for unrelated papers
        // (spec.md §9 open question).
        self.get_paper(paper)?;

        let previous = self.get_page_image(paper, page, version)?;
        let hash_changed = previous
            .as_ref()
            .map(|p| p.content_hash != content_hash)
            .unwrap_or(true);

        let image = PageImage {
            paper_number: paper,
            page_number: page,
            version,
            artifact_id,
            content_hash,
            source_filename,
        };

        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(PAGE_IMAGES_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            let bytes = bincode::serialize(&image).map_err(|_| CoordError::ServerError)?;
            table
                .insert(page_image_key(paper, page, version).as_str(), bytes.as_slice())
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;

        if hash_changed {
            self.maybe_demote_on_replace(paper, page, "admin_replace_page_image")?;
        }
        self.materialize_readiness(paper)?;
        Ok(())
    }

    /// If an already-`Done` task depends on the replaced page, reset it to
    /// `Todo` and write an audit entry (spec.md §4.3).
    fn maybe_demote_on_replace(&self, paper: PaperNumber, page: u32, reason: &str) -> CoordResult<()> {
        let spec = self.get_paper(paper)?;

        if spec.id_pages.contains(&page) {
            if let Some(task) = self.get_id_task(paper)? {
                if task.state.is_done() {
                    let prior = serde_json::to_string(&task).unwrap_or_default();
                    self.put_id_task(&IdTask::new_todo(paper))?;
                    self.write_audit(
                        "system",
                        &format!("id:{paper}"),
                        reason,
                        prior,
                    );
                }
            }
        }
        for group in &spec.question_groups {
            if group.pages.contains(&page) {
                if let Some(task) = self.get_mark_task(paper, group.question, group.version)? {
                    if task.state.is_done() {
                        let prior = serde_json::to_string(&task).unwrap_or_default();
                        self.put_mark_task(&MarkTask::new_todo(paper, group.question, group.version))?;
                        self.write_audit(
                            "system",
                            &format!("mark:{paper}:{}:{}", group.question.0, group.version.0),
                            reason,
                            prior,
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn materialize_readiness(&self, paper: PaperNumber) -> CoordResult<()> {
        let spec = self.get_paper(paper)?;

        if self.get_id_task(paper)?.is_none() {
            let all_present = spec
                .id_pages
                .iter()
                .all(|p| self.any_version_ingested(paper, *p).unwrap_or(false));
            if all_present && !spec.id_pages.is_empty() {
                self.put_id_task(&IdTask::new_todo(paper))?;
            }
        }

        for group in &spec.question_groups {
            if self.get_mark_task(paper, group.question, group.version)?.is_none() {
                let all_present = group
                    .pages
                    .iter()
                    .all(|p| self.get_page_image(paper, *p, group.version).ok().flatten().is_some());
                if all_present && !group.pages.is_empty() {
                    self.put_mark_task(&MarkTask::new_todo(paper, group.question, group.version))?;
                }
            }
        }
        Ok(())
    }

    fn any_version_ingested(&self, paper: PaperNumber, page: u32) -> CoordResult<bool> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(PAGE_IMAGES_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        let prefix = format!("{}/{}/", paper.0, page);
        for entry in table.iter().map_err(|_| CoordError::ServerError)? {
            let (key, _) = entry.map_err(|_| CoordError::ServerError)?;
            if key.value().starts_with(&prefix) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // -- task accessors ---------------------------------------------------

    fn get_id_task(&self, paper: PaperNumber) -> CoordResult<Option<IdTask>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(ID_TASKS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        match table.get(paper.0).map_err(|_| CoordError::ServerError)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes.value()).map_err(|_| CoordError::ServerError)?,
            )),
            None => Ok(None),
        }
    }

    fn put_id_task(&self, task: &IdTask) -> CoordResult<()> {
        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(ID_TASKS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            let bytes = bincode::serialize(task).map_err(|_| CoordError::ServerError)?;
            table
                .insert(task.paper_number.0, bytes.as_slice())
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;
        Ok(())
    }

    pub fn get_mark_task(
        &self,
        paper: PaperNumber,
        question: Question,
        version: Version,
    ) -> CoordResult<Option<MarkTask>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(MARK_TASKS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        match table
            .get(mark_task_key(paper, question, version).as_str())
            .map_err(|_| CoordError::ServerError)?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes.value()).map_err(|_| CoordError::ServerError)?,
            )),
            None => Ok(None),
        }
    }

    fn put_mark_task(&self, task: &MarkTask) -> CoordResult<()> {
        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(MARK_TASKS_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            let bytes = bincode::serialize(task).map_err(|_| CoordError::ServerError)?;
            table
                .insert(
                    mark_task_key(task.paper_number, task.question, task.version).as_str(),
                    bytes.as_slice(),
                )
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;
        Ok(())
    }

    pub(crate) fn all_id_tasks(&self) -> CoordResult<Vec<IdTask>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(ID_TASKS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(|_| CoordError::ServerError)? {
            let (_, value) = entry.map_err(|_| CoordError::ServerError)?;
            out.push(bincode::deserialize(value.value()).map_err(|_| CoordError::ServerError)?);
        }
        Ok(out)
    }

    pub(crate) fn all_mark_tasks(&self) -> CoordResult<Vec<MarkTask>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(MARK_TASKS_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(|_| CoordError::ServerError)? {
            let (_, value) = entry.map_err(|_| CoordError::ServerError)?;
            out.push(bincode::deserialize(value.value()).map_err(|_| CoordError::ServerError)?);
        }
        Ok(out)
    }

    /// `H(h(p1) || "|" || h(p2) || "|" || ...)` over the group's pages, in
    /// page-number order (spec.md §4.3).
    fn compute_integrity_check(&self, paper: PaperNumber, pages: &[u32], version: Version) -> CoordResult<String> {
        let mut sorted_pages = pages.to_vec();
        sorted_pages.sort_unstable();
        let mut hasher = Sha256::new();
        for (i, page) in sorted_pages.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            let image = self
                .get_page_image(paper, *page, version)?
                .ok_or_else(|| CoordError::ServerError)?;
            hasher.update(image.content_hash.as_bytes());
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Artifact ids of a paper's id pages, regardless of task state. Used
    /// by the "read images for a task" endpoint so a client can re-fetch
    /// the pixels for a task it already claimed without claiming again
    /// (spec.md §6).
    pub fn id_task_images(&self, paper: PaperNumber) -> CoordResult<Vec<String>> {
        let spec = self.get_paper(paper)?;
        let mut artifact_ids = Vec::new();
        for page in &spec.id_pages {
            if let Some(image) = self.get_page_image(paper, *page, Version(1))? {
                artifact_ids.push(image.artifact_id);
            }
        }
        Ok(artifact_ids)
    }

    /// Artifact ids of a mark task's pages, regardless of task state. See
    /// `id_task_images`.
    pub fn mark_task_images(
        &self,
        paper: PaperNumber,
        question: Question,
        version: Version,
    ) -> CoordResult<Vec<String>> {
        let spec = self.get_paper(paper)?;
        let group = spec
            .question_groups
            .iter()
            .find(|g| g.question == question && g.version == version)
            .ok_or_else(|| CoordError::OutOfRange(format!("question {} v{}", question.0, version.0)))?;
        let mut artifact_ids = Vec::new();
        for page in &group.pages {
            if let Some(image) = self.get_page_image(paper, *page, version)? {
                artifact_ids.push(image.artifact_id);
            }
        }
        Ok(artifact_ids)
    }

    // -- identification queue ---------------------------------------------

    pub fn claim_next_id(&self, user: &str) -> CoordResult<Option<ClaimedId>> {
        let _guard = self.lock.lock().unwrap();
        if !self.authority.has_active_token(user) {
            return Err(CoordError::Unauthorised);
        }

        let mut todo: Vec<IdTask> = self
            .all_id_tasks()?
            .into_iter()
            .filter(|t| matches!(t.state, TaskState::Todo))
            .collect();
        todo.sort_by_key(|t| t.paper_number.0);

        let Some(mut task) = todo.into_iter().next() else {
            return Ok(None);
        };

        task.state = TaskState::OutWith(user.to_string());
        task.claimed_at = Some(chrono::Utc::now());
        self.put_id_task(&task)?;

        let spec = self.get_paper(task.paper_number)?;
        let mut artifact_ids = Vec::new();
        for page in &spec.id_pages {
            // id pages are always version 1 by convention of the
            // production pipeline (they carry no per-version content).
            if let Some(image) = self.get_page_image(task.paper_number, *page, Version(1))? {
                artifact_ids.push(image.artifact_id);
            }
        }

        Ok(Some(ClaimedId {
            paper_number: task.paper_number,
            id_page_artifact_ids: artifact_ids,
        }))
    }

    pub fn return_id(
        &self,
        user: &str,
        paper: PaperNumber,
        student_id: String,
        student_name: String,
        already_done: bool,
    ) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        let mut task = self
            .get_id_task(paper)?
            .ok_or_else(|| CoordError::NotFound(format!("id task for paper {paper}")))?;

        match &task.state {
            TaskState::OutWith(owner) if owner == user => {}
            TaskState::Done if already_done => {}
            TaskState::Done => {
                return Err(CoordError::Conflict(format!(
                    "id task for paper {paper} is already done; retry with already_done=true to re-identify"
                )));
            }
            _ => {
                return Err(CoordError::TaskChanged(format!(
                    "id task for paper {paper} is not claimed by {user}"
                )));
            }
        }

        // I5: student_id must be globally unique across Done IDTasks.
        let read_txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let conflict = {
            let table = read_txn
                .open_table(STUDENT_ID_INDEX_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            match table.get(student_id.as_str()).map_err(|_| CoordError::ServerError)? {
                Some(owner_paper) if owner_paper.value() != paper.0 => true,
                _ => false,
            }
        };

        if conflict {
            // Revert to OutWith(user) without changing state toward Done.
            task.state = TaskState::OutWith(user.to_string());
            self.put_id_task(&task)?;
            return Err(CoordError::Conflict(format!(
                "student id {student_id} already assigned to another paper"
            )));
        }

        let was_done = task.state.is_done();
        if was_done {
            let prior = serde_json::to_string(&task).unwrap_or_default();
            self.write_audit(user, &format!("id:{paper}"), "re-identify", prior);
        }

        // Drop this paper's prior index entry if student_id changed.
        if let Some(prior_sid) = task.student_id.clone() {
            if prior_sid != student_id {
                let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
                {
                    let mut table = write_txn
                        .open_table(STUDENT_ID_INDEX_TABLE)
                        .map_err(|_| CoordError::ServerError)?;
                    table
                        .remove(prior_sid.as_str())
                        .map_err(|_| CoordError::ServerError)?;
                }
                write_txn.commit().map_err(|_| CoordError::ServerError)?;
            }
        }

        let write_txn = self.db.begin_write().map_err(|_| CoordError::ServerError)?;
        {
            let mut table = write_txn
                .open_table(STUDENT_ID_INDEX_TABLE)
                .map_err(|_| CoordError::ServerError)?;
            table
                .insert(student_id.as_str(), paper.0)
                .map_err(|_| CoordError::ServerError)?;
        }
        write_txn.commit().map_err(|_| CoordError::ServerError)?;

        task.state = TaskState::Done;
        task.student_id = Some(student_id);
        task.student_name = Some(student_name);
        task.identified_by = Some(user.to_string());
        self.put_id_task(&task)?;
        Ok(())
    }

    pub fn abandon_id(&self, user: &str, paper: PaperNumber) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        if let Some(mut task) = self.get_id_task(paper)? {
            if task.state.owner() == Some(user) {
                task.state = TaskState::Todo;
                task.claimed_at = None;
                self.put_id_task(&task)?;
            }
        }
        Ok(())
    }

    pub fn list_done_id(&self, _user: &str) -> CoordResult<Vec<IdTask>> {
        Ok(self
            .all_id_tasks()?
            .into_iter()
            .filter(|t| t.state.is_done())
            .collect())
    }

    // -- marking queue -----------------------------------------------------

    pub fn claim_next_mark(
        &self,
        user: &str,
        question: Question,
        version: Version,
    ) -> CoordResult<Option<ClaimedMark>> {
        let _guard = self.lock.lock().unwrap();
        if !self.authority.has_active_token(user) {
            return Err(CoordError::Unauthorised);
        }

        let mut todo: Vec<MarkTask> = self
            .all_mark_tasks()?
            .into_iter()
            .filter(|t| {
                t.question == question && t.version == version && matches!(t.state, TaskState::Todo)
            })
            .collect();
        todo.sort_by_key(|t| t.paper_number.0);

        let Some(mut task) = todo.into_iter().next() else {
            return Ok(None);
        };

        let spec = self.get_paper(task.paper_number)?;
        let group = spec
            .question_groups
            .iter()
            .find(|g| g.question == question && g.version == version)
            .ok_or_else(|| CoordError::OutOfRange(format!("question {} v{}", question.0, version.0)))?;

        let integrity_check = self.compute_integrity_check(task.paper_number, &group.pages, version)?;

        let prior_annotated = task.annotated_image_id.clone();
        let prior_annotation_record = task.annotation_record_id.clone();

        task.state = TaskState::OutWith(user.to_string());
        task.integrity_check = Some(integrity_check.clone());
        task.claimed_at = Some(chrono::Utc::now());
        self.put_mark_task(&task)?;

        let mut artifact_ids = Vec::new();
        for page in &group.pages {
            if let Some(image) = self.get_page_image(task.paper_number, *page, version)? {
                artifact_ids.push(image.artifact_id);
            }
        }

        Ok(Some(ClaimedMark {
            paper_number: task.paper_number,
            question,
            version,
            page_artifact_ids: artifact_ids,
            tags: task.tags.clone(),
            integrity_check,
            prior_annotated_image_id: prior_annotated,
            prior_annotation_record_id: prior_annotation_record,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn return_mark(
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
        let _guard = self.lock.lock().unwrap();
        let mut task = self
            .get_mark_task(paper, question, version)?
            .ok_or_else(|| {
                CoordError::TaskDeleted(format!(
                    "mark task {paper}:{}:{}",
                    question.0, version.0
                ))
            })?;

        if task.state.owner() != Some(user) {
            return Err(CoordError::TaskChanged(format!(
                "mark task {paper}:{}:{} is not claimed by {user}",
                question.0, version.0
            )));
        }

        let spec = self.get_paper(paper)?;
        let group = spec
            .question_groups
            .iter()
            .find(|g| g.question == question && g.version == version)
            .ok_or_else(|| CoordError::OutOfRange(format!("question {} v{}", question.0, version.0)))?;

        let current_integrity = self.compute_integrity_check(paper, &group.pages, version)?;
        // Set by `claim_next_mark` before the task leaves `Todo`; always
        // `Some` here since `task.state.owner() == Some(user)` just held.
        debug_assert!(task.integrity_check.is_some());

        if integrity_check != current_integrity {
            // Either the client held a stale value, or an administrator
            // substituted a page since the claim (scenario 3, spec.md §8)
            // — both leave the task `OutWith(user)` for a retry.
            return Err(CoordError::IntegrityMismatch(format!(
                "integrity_check for {paper}:{}:{} does not match current pages",
                question.0, version.0
            )));
        }
        if score > group.max_mark {
            return Err(CoordError::OutOfRange(format!(
                "score {score} exceeds max mark {} for question {}",
                group.max_mark, question.0
            )));
        }

        let was_done = task.state.is_done();
        if was_done {
            let prior = serde_json::to_string(&task).unwrap_or_default();
            self.write_audit(
                user,
                &format!("mark:{paper}:{}:{}", question.0, version.0),
                "re-mark",
                prior,
            );
        }

        task.state = TaskState::Done;
        task.score = Some(score);
        task.annotated_image_id = Some(annotated_artifact_id);
        task.annotation_record_id = Some(annotation_record_id);
        task.marking_time = Some(chrono::Utc::now());
        task.marking_duration_seconds = Some(marking_seconds);
        task.marked_by = Some(user.to_string());
        task.tags = tags;
        self.put_mark_task(&task)?;
        Ok(())
    }

    pub fn abandon_mark(
        &self,
        user: &str,
        paper: PaperNumber,
        question: Question,
        version: Version,
    ) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        if let Some(mut task) = self.get_mark_task(paper, question, version)? {
            if task.state.owner() == Some(user) {
                task.state = TaskState::Todo;
                task.claimed_at = None;
                self.put_mark_task(&task)?;
            }
        }
        Ok(())
    }

    pub fn set_tags(
        &self,
        paper: PaperNumber,
        question: Question,
        version: Version,
        tags: Vec<String>,
    ) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        let mut task = self
            .get_mark_task(paper, question, version)?
            .ok_or_else(|| CoordError::NotFound(format!("mark task {paper}:{}:{}", question.0, version.0)))?;
        task.tags = tags;
        self.put_mark_task(&task)?;
        Ok(())
    }

    pub fn list_done_marks(
        &self,
        question: Question,
        version: Version,
    ) -> CoordResult<Vec<MarkTask>> {
        Ok(self
            .all_mark_tasks()?
            .into_iter()
            .filter(|t| t.question == question && t.version == version && t.state.is_done())
            .collect())
    }

    /// Max mark configured for a `(question, version)` pair, read off
    /// whichever registered paper defines that question group first — the
    /// layout is shared across all papers carrying the question.
    pub fn max_mark(&self, question: Question, version: Version) -> CoordResult<u32> {
        self.all_papers()?
            .iter()
            .find_map(|p| {
                p.question_groups
                    .iter()
                    .find(|g| g.question == question && g.version == version)
                    .map(|g| g.max_mark)
            })
            .ok_or_else(|| CoordError::OutOfRange(format!("question {} v{}", question.0, version.0)))
    }

    // -- cross-cutting admin / lifecycle -----------------------------------

    /// Reverts every task `OutWith(user)` with state != Done back to
    /// `Todo`. Invoked on login, logout, and token revocation (I1).
    pub fn reset_user_in_flight(&self, user: &str) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        for mut task in self.all_id_tasks()? {
            if task.state.owner() == Some(user) {
                task.state = TaskState::Todo;
                task.claimed_at = None;
                self.put_id_task(&task)?;
            }
        }
        for mut task in self.all_mark_tasks()? {
            if task.state.owner() == Some(user) {
                task.state = TaskState::Todo;
                task.claimed_at = None;
                self.put_mark_task(&task)?;
            }
        }
        Ok(())
    }

    /// Forces a `Done` task back to `Todo`, preserving an audit entry.
    pub fn admin_reset_task(&self, task_ref: ec_types::TaskRef) -> CoordResult<()> {
        let _guard = self.lock.lock().unwrap();
        match task_ref {
            ec_types::TaskRef::Id(paper) => {
                let task = self
                    .get_id_task(paper)?
                    .ok_or_else(|| CoordError::NotFound(format!("id task for paper {paper}")))?;
                let prior = serde_json::to_string(&task).unwrap_or_default();
                self.put_id_task(&IdTask::new_todo(paper))?;
                self.write_audit("admin", &format!("id:{paper}"), "admin_reset_task", prior);
            }
            ec_types::TaskRef::Mark(paper, question, version) => {
                let task = self
                    .get_mark_task(paper, question, version)?
                    .ok_or_else(|| {
                        CoordError::NotFound(format!("mark task {paper}:{}:{}", question.0, version.0))
                    })?;
                let prior = serde_json::to_string(&task).unwrap_or_default();
                self.put_mark_task(&MarkTask::new_todo(paper, question, version))?;
                self.write_audit(
                    "admin",
                    &format!("mark:{paper}:{}:{}", question.0, version.0),
                    "admin_reset_task",
                    prior,
                );
            }
        }
        Ok(())
    }

    /// Reads the audit log; used only by tests and operator tooling, not
    /// exposed over the wire protocol.
    pub fn audit_log(&self) -> CoordResult<Vec<AuditEntry>> {
        let txn = self.db.begin_read().map_err(|_| CoordError::ServerError)?;
        let table = txn
            .open_table(AUDIT_LOG_TABLE)
            .map_err(|_| CoordError::ServerError)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(|_| CoordError::ServerError)? {
            let (_, value) = entry.map_err(|_| CoordError::ServerError)?;
            out.push(bincode::deserialize(value.value()).map_err(|_| CoordError::ServerError)?);
        }
        Ok(out)
    }

    pub fn open_at(path: impl AsRef<std::path::Path>, authority: Arc<Authority>) -> Self {
        let db = db::open_db(path);
        Self::new(db, authority)
    }

    /// Exposes the shared database handle so the binary crate can hand it
    /// to `Authority::new` before constructing the catalog.
    pub fn db_handle(&self) -> Arc<Database> {
        self.db.clone()
    }
}

/// Progress accounting lives in its own module but reads through these
/// crate-visible accessors to avoid duplicating the table scan logic.
pub(crate) fn group_by_version(tasks: &[MarkTask]) -> BTreeMap<Version, Vec<&MarkTask>> {
    let mut map: BTreeMap<Version, Vec<&MarkTask>> = BTreeMap::new();
    for t in tasks {
        map.entry(t.version).or_default().push(t);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionGroupSpec;
    use ec_auth::Authority;

    fn fresh() -> (Catalog, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::create(dir.path().join("catalog.redb")).unwrap());
        let authority = Arc::new(Authority::new(db.clone(), 0xabcd).unwrap());
        authority.create_or_update_user("marker1", "hunter22", false).unwrap();
        authority.issue_token("marker1").unwrap();
        (Catalog::new(db, authority), dir)
    }

    fn one_question_paper(paper: u32) -> Paper {
        Paper {
            paper_number: PaperNumber(paper),
            magic_code: "magic".into(),
            id_pages: vec![1],
            question_groups: vec![QuestionGroupSpec {
                question: Question(1),
                version: Version(1),
                pages: vec![2],
                max_mark: 10,
            }],
        }
    }

    fn ingest_all_pages(catalog: &Catalog, paper: PaperNumber) {
        catalog
            .ingest_page(paper, 1, Version(1), "artifact-1".into(), "hash-1".into(), "p1.png".into())
            .unwrap();
        catalog
            .ingest_page(paper, 2, Version(1), "artifact-2".into(), "hash-2".into(), "p2.png".into())
            .unwrap();
    }

    #[test]
    fn claim_return_id_happy_path() {
        let (catalog, _dir) = fresh();
        let paper = PaperNumber(1);
        catalog.register_paper(one_question_paper(1)).unwrap();
        ingest_all_pages(&catalog, paper);

        let claimed = catalog.claim_next_id("marker1").unwrap().unwrap();
        assert_eq!(claimed.paper_number, paper);

        catalog
            .return_id("marker1", paper, "1234567".into(), "Ada".into(), false)
            .unwrap();

        let done = catalog.list_done_id("marker1").unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].identified_by.as_deref(), Some("marker1"));
    }

    #[test]
    fn duplicate_student_id_rejects_and_reverts_to_outwith() {
        let (catalog, _dir) = fresh();
        catalog.register_paper(one_question_paper(1)).unwrap();
        catalog.register_paper(one_question_paper(2)).unwrap();
        ingest_all_pages(&catalog, PaperNumber(1));
        ingest_all_pages(&catalog, PaperNumber(2));

        catalog.claim_next_id("marker1").unwrap();
        catalog
            .return_id("marker1", PaperNumber(1), "999".into(), "Ada".into(), false)
            .unwrap();

        catalog.claim_next_id("marker1").unwrap();
        let result = catalog.return_id("marker1", PaperNumber(2), "999".into(), "Bob".into(), false);
        assert!(matches!(result, Err(CoordError::Conflict(_))));

        // still claimable by the same user — not stuck as Todo for someone else.
        let task = catalog.get_id_task(PaperNumber(2)).unwrap().unwrap();
        assert_eq!(task.state.owner(), Some("marker1"));
    }

    #[test]
    fn claim_next_mark_filters_by_question_and_version() {
        let (catalog, _dir) = fresh();
        catalog.register_paper(one_question_paper(1)).unwrap();
        ingest_all_pages(&catalog, PaperNumber(1));

        assert!(catalog
            .claim_next_mark("marker1", Question(2), Version(1))
            .unwrap()
            .is_none());

        let claimed = catalog
            .claim_next_mark("marker1", Question(1), Version(1))
            .unwrap()
            .unwrap();
        assert_eq!(claimed.question, Question(1));
        assert!(!claimed.integrity_check.is_empty());
    }

    #[test]
    fn return_mark_with_stale_integrity_check_is_rejected_without_completing() {
        let (catalog, _dir) = fresh();
        catalog.register_paper(one_question_paper(1)).unwrap();
        ingest_all_pages(&catalog, PaperNumber(1));
        catalog
            .claim_next_mark("marker1", Question(1), Version(1))
            .unwrap();

        let result = catalog.return_mark(
            "marker1",
            PaperNumber(1),
            Question(1),
            Version(1),
            5,
            90,
            vec![],
            "annotated".into(),
            "record".into(),
            "not-the-real-digest".into(),
        );
        assert!(matches!(result, Err(CoordError::IntegrityMismatch(_))));

        let task = catalog
            .get_mark_task(PaperNumber(1), Question(1), Version(1))
            .unwrap()
            .unwrap();
        assert_eq!(task.state.owner(), Some("marker1"));
    }

    #[test]
    fn replacing_a_done_marks_page_demotes_it_back_to_todo_with_audit() {
        let (catalog, _dir) = fresh();
        catalog.register_paper(one_question_paper(1)).unwrap();
        ingest_all_pages(&catalog, PaperNumber(1));

        let claimed = catalog
            .claim_next_mark("marker1", Question(1), Version(1))
            .unwrap()
            .unwrap();
        catalog
            .return_mark(
                "marker1",
                PaperNumber(1),
                Question(1),
                Version(1),
                7,
                60,
                vec![],
                "annotated".into(),
                "record".into(),
                claimed.integrity_check,
            )
            .unwrap();

        // admin replaces page 2 with different content.
        catalog
            .ingest_page(PaperNumber(1), 2, Version(1), "artifact-2b".into(), "hash-2b".into(), "p2.png".into())
            .unwrap();

        let task = catalog
            .get_mark_task(PaperNumber(1), Question(1), Version(1))
            .unwrap()
            .unwrap();
        assert_eq!(task.state, TaskState::Todo);
        assert!(!catalog.audit_log().unwrap().is_empty());
    }

    #[test]
    fn task_images_are_readable_without_claiming() {
        let (catalog, _dir) = fresh();
        catalog.register_paper(one_question_paper(1)).unwrap();
        ingest_all_pages(&catalog, PaperNumber(1));

        let id_images = catalog.id_task_images(PaperNumber(1)).unwrap();
        assert_eq!(id_images, vec!["artifact-1".to_string()]);

        let mark_images = catalog
            .mark_task_images(PaperNumber(1), Question(1), Version(1))
            .unwrap();
        assert_eq!(mark_images, vec!["artifact-2".to_string()]);
    }

    #[test]
    fn return_mark_after_admin_substitutes_a_page_is_rejected_as_integrity_mismatch() {
        let (catalog, _dir) = fresh();
        catalog.register_paper(one_question_paper(1)).unwrap();
        ingest_all_pages(&catalog, PaperNumber(1));

        let claimed = catalog
            .claim_next_mark("marker1", Question(1), Version(1))
            .unwrap()
            .unwrap();

        // admin substitutes the question's page while it is still claimed.
        catalog
            .ingest_page(PaperNumber(1), 2, Version(1), "artifact-2b".into(), "hash-2b".into(), "p2.png".into())
            .unwrap();

        let result = catalog.return_mark(
            "marker1",
            PaperNumber(1),
            Question(1),
            Version(1),
            7,
            60,
            vec![],
            "annotated".into(),
            "record".into(),
            claimed.integrity_check,
        );
        assert!(matches!(result, Err(CoordError::IntegrityMismatch(_))));

        let task = catalog
            .get_mark_task(PaperNumber(1), Question(1), Version(1))
            .unwrap()
            .unwrap();
        assert_eq!(task.state.owner(), Some("marker1"));
    }

    #[test]
    fn token_revocation_resets_in_flight_claims() {
        let (catalog, _dir) = fresh();
        catalog.register_paper(one_question_paper(1)).unwrap();
        ingest_all_pages(&catalog, PaperNumber(1));
        catalog.claim_next_id("marker1").unwrap();

        catalog.reset_user_in_flight("marker1").unwrap();

        let task = catalog.get_id_task(PaperNumber(1)).unwrap().unwrap();
        assert_eq!(task.state, TaskState::Todo);
    }
}
