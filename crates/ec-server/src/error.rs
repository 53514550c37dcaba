use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ec_types::CoordError;
use serde::Serialize;

/// Wraps `CoordError` so it can be returned directly from a handler; maps
/// each kind to an HTTP status per spec.md §7, with the kind and message
/// duplicated into the JSON body so a client can branch on the kind
/// without parsing status codes.
pub struct ApiError(pub CoordError);

/// Flat error body per spec.md §7 — `kind` and `message` at the top level,
/// not nested under a variant tag, so `body["kind"]` works directly.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
}

impl From<CoordError> for ApiError {
    fn from(err: CoordError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoordError::Unauthorised => StatusCode::UNAUTHORIZED,
            CoordError::ApiMismatch => StatusCode::CONFLICT,
            CoordError::NotFound(_) => StatusCode::NOT_FOUND,
            CoordError::Conflict(_) => StatusCode::CONFLICT,
            CoordError::IntegrityMismatch(_) => StatusCode::CONFLICT,
            CoordError::TaskChanged(_) => StatusCode::CONFLICT,
            CoordError::TaskDeleted(_) => StatusCode::GONE,
            CoordError::OutOfRange(_) => StatusCode::BAD_REQUEST,
            CoordError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoordError::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("internal error: {}", self.0);
        } else {
            log::warn!("request failed: {}", self.0);
        }
        let body = ErrorBody {
            kind: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
