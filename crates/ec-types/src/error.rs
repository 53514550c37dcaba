use thiserror::Error;

/// The closed set of error kinds the dispatcher is allowed to surface to a
/// client. Internal crates never return anything outside this enum across
/// their public boundary (spec.md §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordError {
    /// Authentication, token, or enabled-flag failure. Deliberately generic:
    /// unknown user, wrong password, and disabled user are indistinguishable
    /// to the caller.
    #[error("not authorised")]
    Unauthorised,

    /// The client's `api_version` does not match the server's.
    #[error("api version mismatch")]
    ApiMismatch,

    /// The referenced task or artifact does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate student id, user already holds a token, or task already
    /// owned by someone else.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An integrity_check or content digest disagreed with its snapshot.
    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    /// An administrator mutated the underlying page set out from under an
    /// in-flight claim.
    #[error("task changed: {0}")]
    TaskChanged(String),

    /// The claimed task no longer exists (administrative deletion).
    #[error("task deleted: {0}")]
    TaskDeleted(String),

    /// A question/version pair outside the paper's spec.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Malformed request payload.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything unexpected. Never carries internal detail to the wire.
    #[error("internal server error")]
    ServerError,
}

pub type CoordResult<T> = Result<T, CoordError>;

impl CoordError {
    /// The short machine-readable kind string carried on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordError::Unauthorised => "Unauthorised",
            CoordError::ApiMismatch => "ApiMismatch",
            CoordError::NotFound(_) => "NotFound",
            CoordError::Conflict(_) => "Conflict",
            CoordError::IntegrityMismatch(_) => "IntegrityMismatch",
            CoordError::TaskChanged(_) => "TaskChanged",
            CoordError::TaskDeleted(_) => "TaskDeleted",
            CoordError::OutOfRange(_) => "OutOfRange",
            CoordError::BadRequest(_) => "BadRequest",
            CoordError::ServerError => "ServerError",
        }
    }
}
