//! Artifact Store: durably holds page image bytes, annotated image bytes,
//! and annotation records. Write-temp-then-rename is the only write path,
//! so no partial file is ever visible under its final name (spec.md §4.2
//! invariant).

pub mod model;
pub mod store;

pub use model::{ArtifactId, ArtifactKind};
pub use store::ArtifactStore;
