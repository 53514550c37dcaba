use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of binary blob an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    OriginalPage,
    Annotated,
    AnnotationRecord,
}

impl ArtifactKind {
    fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::OriginalPage => "original",
            ArtifactKind::Annotated => "annotated",
            ArtifactKind::AnnotationRecord => "annotation-record",
        }
    }
}

/// A content hash, hex-encoded, used both as the artifact's identifier and
/// as the integrity check against the on-disk bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub String);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ArtifactId {
    /// Content-addressed relative path: `<kind>/<hash[0..2]>/<hash>`.
    pub fn relative_path(&self, kind: ArtifactKind) -> std::path::PathBuf {
        let shard = &self.0[..2.min(self.0.len())];
        std::path::PathBuf::from(kind.dir_name())
            .join(shard)
            .join(&self.0)
    }
}
