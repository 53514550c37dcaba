use std::io::Write;
use std::path::PathBuf;

use ec_types::{CoordError, CoordResult};
use sha2::{Digest, Sha256};

use crate::model::{ArtifactId, ArtifactKind};

/// Durable, content-addressed store of artifact bytes rooted at a single
/// directory on disk.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> CoordResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|_| CoordError::ServerError)?;
        Ok(Self { root })
    }

    /// SHA-256 content digest, hex-encoded.
    pub fn hash(bytes: &[u8]) -> ArtifactId {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        ArtifactId(hex::encode(hasher.finalize()))
    }

    /// Writes `bytes` to a temp file in the target directory, fsyncs, then
    /// atomically renames into its final content-addressed path. Returns
    /// the artifact id. Idempotent: writing identical content twice is a
    /// no-op on the second call.
    pub fn put(&self, kind: ArtifactKind, bytes: &[u8]) -> CoordResult<ArtifactId> {
        let id = Self::hash(bytes);
        let final_path = self.root.join(id.relative_path(kind));
        if final_path.exists() {
            return Ok(id);
        }
        let parent = final_path
            .parent()
            .expect("relative_path always has a parent");
        std::fs::create_dir_all(parent).map_err(|_| CoordError::ServerError)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|_| CoordError::ServerError)?;
        tmp.write_all(bytes).map_err(|_| CoordError::ServerError)?;
        tmp.as_file().sync_all().map_err(|_| CoordError::ServerError)?;
        tmp.persist(&final_path).map_err(|_| CoordError::ServerError)?;
        Ok(id)
    }

    /// Reads the artifact's bytes. `NotFound` if the file is missing.
    pub fn get(&self, kind: ArtifactKind, id: &ArtifactId) -> CoordResult<Vec<u8>> {
        let path = self.root.join(id.relative_path(kind));
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoordError::NotFound(format!("artifact {id}")),
            _ => CoordError::ServerError,
        })
    }

    /// Recomputes the content digest of the bytes on disk and compares it
    /// to `id`. Used to enforce invariant I4 (every referenced artifact's
    /// on-disk digest matches its recorded hash).
    pub fn verify(&self, kind: ArtifactKind, id: &ArtifactId) -> CoordResult<bool> {
        let bytes = self.get(kind, id)?;
        Ok(&Self::hash(&bytes) == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_put_then_get() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let bytes = b"a scanned page, pretend this is PNG data";

        let id = store.put(ArtifactKind::OriginalPage, bytes).unwrap();
        assert_eq!(id, ArtifactStore::hash(bytes));

        let round_tripped = store.get(ArtifactKind::OriginalPage, &id).unwrap();
        assert_eq!(round_tripped, bytes);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let bogus = ArtifactId("0".repeat(64));
        assert!(matches!(
            store.get(ArtifactKind::OriginalPage, &bogus),
            Err(CoordError::NotFound(_))
        ));
    }

    #[test]
    fn put_is_idempotent_for_identical_content() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let bytes = b"same bytes twice";
        let first = store.put(ArtifactKind::Annotated, bytes).unwrap();
        let second = store.put(ArtifactKind::Annotated, bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn no_partial_file_visible_under_final_name() {
        // put() only makes the final path visible via persist(); a
        // half-written temp file never lands at final_path because
        // NamedTempFile::persist is the only path that creates it.
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let id = store.put(ArtifactKind::OriginalPage, b"data").unwrap();
        assert!(store.verify(ArtifactKind::OriginalPage, &id).unwrap());
    }
}
