use ec_types::{CoordError, CoordResult};
use serde::{Deserialize, Serialize};

/// Every response carries an outcome code (spec.md §4.7): a success value,
/// an explicit "nothing available" (distinguished from an error per §7's
/// `RangeAvailable`), or a closed error kind plus a human message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome<T> {
    Success(T),
    Empty,
    Error { kind: String, message: String },
}

impl<T> Outcome<T> {
    pub fn from_result(result: CoordResult<T>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Error {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn from_optional(result: CoordResult<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Outcome::Success(value),
            Ok(None) => Outcome::Empty,
            Err(err) => Outcome::Error {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Inverse direction: turns a wire-level error back into a `CoordError`,
/// for client code that wants to propagate it with `?`.
pub fn error_kind_to_coord_error(kind: &str, message: String) -> CoordError {
    match kind {
        "Unauthorised" => CoordError::Unauthorised,
        "ApiMismatch" => CoordError::ApiMismatch,
        "NotFound" => CoordError::NotFound(message),
        "Conflict" => CoordError::Conflict(message),
        "IntegrityMismatch" => CoordError::IntegrityMismatch(message),
        "TaskChanged" => CoordError::TaskChanged(message),
        "TaskDeleted" => CoordError::TaskDeleted(message),
        "OutOfRange" => CoordError::OutOfRange(message),
        "BadRequest" => CoordError::BadRequest(message),
        _ => CoordError::ServerError,
    }
}
