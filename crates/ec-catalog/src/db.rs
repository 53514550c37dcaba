use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

/// Opens (or creates) the catalog's `redb` database file and makes sure
/// every table this crate uses exists. The same handle is also handed to
/// `ec-auth::Authority`, which opens its own disjoint tables in it.
pub fn open_db(path: impl AsRef<Path>) -> Arc<Database> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).expect("failed to create catalog db directory");
        }
    }

    let db = Database::create(path).expect("failed to open catalog redb database");
    let write_txn = db.begin_write().expect("failed to begin write transaction");
    {
        let _ = write_txn
            .open_table(PAPERS_TABLE)
            .expect("failed to open papers table");
        let _ = write_txn
            .open_table(PAGE_IMAGES_TABLE)
            .expect("failed to open page_images table");
        let _ = write_txn
            .open_table(ID_TASKS_TABLE)
            .expect("failed to open id_tasks table");
        let _ = write_txn
            .open_table(MARK_TASKS_TABLE)
            .expect("failed to open mark_tasks table");
        let _ = write_txn
            .open_table(STUDENT_ID_INDEX_TABLE)
            .expect("failed to open student_id_index table");
        let _ = write_txn
            .open_table(AUDIT_LOG_TABLE)
            .expect("failed to open audit_log table");
    }
    write_txn.commit().expect("failed to commit transaction");

    Arc::new(db)
}

pub const PAPERS_TABLE: TableDefinition<u32, &[u8]> = TableDefinition::new("catalog/papers");
/// Keyed by "`paper`/`page`/`version`".
pub const PAGE_IMAGES_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("catalog/page_images");
pub const ID_TASKS_TABLE: TableDefinition<u32, &[u8]> = TableDefinition::new("catalog/id_tasks");
/// Keyed by "`paper`/`question`/`version`".
pub const MARK_TASKS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("catalog/mark_tasks");
/// `student_id` -> paper_number, enforcing I5's global uniqueness.
pub const STUDENT_ID_INDEX_TABLE: TableDefinition<&str, u32> =
    TableDefinition::new("catalog/student_id_index");
pub const AUDIT_LOG_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("catalog/audit_log");
