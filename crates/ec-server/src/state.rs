use std::path::PathBuf;
use std::sync::Arc;

use ec_auth::Authority;
use ec_catalog::{Catalog, IdentificationQueue, MarkingQueue, ProgressAccountant};
use ec_store::ArtifactStore;

/// Shared application state handed to every handler via axum's `State`
/// extractor, mirroring `form-state::api::app`'s `Arc<Mutex<DataStore>>`
/// pattern — generalized to the several collaborators this core has
/// instead of one monolithic datastore.
#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<Authority>,
    pub catalog: Arc<Catalog>,
    pub artifacts: Arc<ArtifactStore>,
    pub id_queue: Arc<IdentificationQueue>,
    pub mark_queue: Arc<MarkingQueue>,
    pub progress: Arc<ProgressAccountant>,
    pub short_name: String,
    pub user_list_path: PathBuf,
}

impl AppState {
    pub fn new(
        authority: Arc<Authority>,
        catalog: Arc<Catalog>,
        artifacts: Arc<ArtifactStore>,
        short_name: String,
        user_list_path: PathBuf,
    ) -> Self {
        let id_queue = Arc::new(IdentificationQueue::new(catalog.clone()));
        let mark_queue = Arc::new(MarkingQueue::new(catalog.clone()));
        let progress = Arc::new(ProgressAccountant::new(catalog.clone()));
        Self {
            authority,
            catalog,
            artifacts,
            id_queue,
            mark_queue,
            progress,
            short_name,
            user_list_path,
        }
    }
}
