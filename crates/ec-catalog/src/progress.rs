//! Pure derivations from catalog state (spec.md §4.6). Nothing here is
//! stored; every call re-scans the relevant tables, so there is no counter
//! to drift out of sync with reality.

use std::collections::BTreeMap;
use std::sync::Arc;

use ec_types::{CoordResult, Question, Version};

use crate::catalog::{group_by_version, Catalog};

pub struct ProgressAccountant {
    catalog: Arc<Catalog>,
}

impl ProgressAccountant {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// `(done, total)` across every registered paper's `IDTask`.
    pub fn id_progress(&self) -> CoordResult<(usize, usize)> {
        let total = self.catalog.all_papers()?.len();
        let done = self
            .catalog
            .all_id_tasks()?
            .into_iter()
            .filter(|t| t.state.is_done())
            .count();
        Ok((done, total))
    }

    /// `(done, total)` for a single `(question, version)` pair. `total` is
    /// the number of registered papers whose layout includes that question
    /// group at that version, whether or not the group's pages have all
    /// been scanned yet.
    pub fn mark_progress(&self, question: Question, version: Version) -> CoordResult<(usize, usize)> {
        let total = self
            .catalog
            .all_papers()?
            .iter()
            .filter(|p| {
                p.question_groups
                    .iter()
                    .any(|g| g.question == question && g.version == version)
            })
            .count();
        let done = self
            .catalog
            .all_mark_tasks()?
            .into_iter()
            .filter(|t| t.question == question && t.version == version && t.state.is_done())
            .count();
        Ok((done, total))
    }

    /// Maps each user who has completed at least one task to their total
    /// count of `Done` tasks, across both id and mark tasks.
    pub fn user_progress(&self) -> CoordResult<BTreeMap<String, usize>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for task in self.catalog.all_id_tasks()?.into_iter().filter(|t| t.state.is_done()) {
            if let Some(user) = task.identified_by {
                *counts.entry(user).or_insert(0) += 1;
            }
        }
        for task in self.catalog.all_mark_tasks()?.into_iter().filter(|t| t.state.is_done()) {
            if let Some(user) = task.marked_by {
                *counts.entry(user).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// `question`'s score distribution, grouped by marking version.
    pub fn mark_histogram_by_version(
        &self,
        question: Question,
    ) -> CoordResult<BTreeMap<Version, BTreeMap<u32, usize>>> {
        let tasks: Vec<_> = self
            .catalog
            .all_mark_tasks()?
            .into_iter()
            .filter(|t| t.question == question && t.state.is_done())
            .collect();
        let by_version = group_by_version(&tasks);
        let mut out = BTreeMap::new();
        for (version, group) in by_version {
            let mut histogram: BTreeMap<u32, usize> = BTreeMap::new();
            for task in group {
                if let Some(score) = task.score {
                    *histogram.entry(score).or_insert(0) += 1;
                }
            }
            out.insert(version, histogram);
        }
        Ok(out)
    }

    /// `question`'s score distribution, grouped by the user who returned it.
    pub fn mark_histogram_by_user(
        &self,
        question: Question,
    ) -> CoordResult<BTreeMap<String, BTreeMap<u32, usize>>> {
        let mut out: BTreeMap<String, BTreeMap<u32, usize>> = BTreeMap::new();
        for task in self
            .catalog
            .all_mark_tasks()?
            .into_iter()
            .filter(|t| t.question == question && t.state.is_done())
        {
            let (Some(owner), Some(score)) = (task.marked_by.clone(), task.score) else {
                continue;
            };
            *out.entry(owner).or_default().entry(score).or_insert(0) += 1;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paper, QuestionGroupSpec};
    use ec_auth::Authority;
    use ec_types::PaperNumber;
    use redb::Database;
    use std::sync::Arc;

    fn fresh() -> (Arc<Catalog>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::create(dir.path().join("catalog.redb")).unwrap());
        let authority = Arc::new(Authority::new(db.clone(), 0x9999).unwrap());
        (Arc::new(Catalog::new(db, authority)), dir)
    }

    fn register(catalog: &Catalog, paper: u32) {
        catalog
            .register_paper(Paper {
                paper_number: PaperNumber(paper),
                magic_code: "m".into(),
                id_pages: vec![1],
                question_groups: vec![QuestionGroupSpec {
                    question: Question(1),
                    version: Version(1),
                    pages: vec![2],
                    max_mark: 10,
                }],
            })
            .unwrap();
    }

    #[test]
    fn progress_totals_reflect_registered_papers() {
        let (catalog, _dir) = fresh();
        register(&catalog, 1);
        register(&catalog, 2);
        let accountant = ProgressAccountant::new(catalog);

        let (done, total) = accountant.id_progress().unwrap();
        assert_eq!((done, total), (0, 2));

        let (done, total) = accountant.mark_progress(Question(1), Version(1)).unwrap();
        assert_eq!((done, total), (0, 2));
    }

    #[test]
    fn mark_progress_ignores_unrelated_question_version() {
        let (catalog, _dir) = fresh();
        register(&catalog, 1);
        let accountant = ProgressAccountant::new(catalog);

        let (done, total) = accountant.mark_progress(Question(2), Version(1)).unwrap();
        assert_eq!((done, total), (0, 0));
    }
}
