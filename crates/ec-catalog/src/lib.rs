//! Authoritative state for scanned papers, the identification and marking
//! task state machines, and on-demand progress accounting.
//!
//! `Catalog` is the only writer of record; every mutating operation takes
//! its single `Mutex` for the duration of the logical transaction, per
//! spec.md §5's single-writer-lock model.

pub mod catalog;
pub mod db;
pub mod model;
pub mod progress;
pub mod queues;

pub use catalog::{Catalog, ClaimedId, ClaimedMark};
pub use model::{AuditEntry, IdTask, MarkTask, PageImage, Paper, QuestionGroupSpec, TaskState};
pub use progress::ProgressAccountant;
pub use queues::{IdentificationQueue, MarkingQueue};
