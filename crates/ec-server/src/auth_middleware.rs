use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;
use ec_types::CoordError;

/// Every authenticated request carries these two headers instead of a
/// body field, so `GET` requests (claim, progress, list) can authenticate
/// without inventing a body for them. Grounded on the teacher's
/// `Authorization: Bearer` convention (`form-state::auth::middleware`),
/// adapted to this protocol's `(user, token)` pair (spec.md §6).
const USER_HEADER: &str = "x-exam-user";
const TOKEN_HEADER: &str = "x-exam-token";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// Validates `(user, token)` against the `Authority`, and that the user is
/// still enabled; rejects otherwise with `Unauthorised` (spec.md §4.7:
/// "failure yields a uniform `Unauthorised` response" for any cause).
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = header_str(request.headers(), USER_HEADER)
        .ok_or(CoordError::Unauthorised)?
        .to_string();
    let token = header_str(request.headers(), TOKEN_HEADER)
        .ok_or(CoordError::Unauthorised)?
        .to_string();

    if !state.authority.validate(&user, &token) || !state.authority.is_enabled(&user)? {
        return Err(ApiError(CoordError::Unauthorised));
    }

    request.extensions_mut().insert(AuthedUser(user));
    Ok(next.run(request).await)
}

/// Runs after `require_auth` on the `/admin/*` sub-router only, so the
/// `AuthedUser` extension is already present; rejects non-admins with
/// `Unauthorised`, the same uniform response any other auth failure gets.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthedUser>()
        .ok_or(CoordError::Unauthorised)?
        .0
        .clone();

    if !state.authority.is_admin(&user)? {
        return Err(ApiError(CoordError::Unauthorised));
    }

    Ok(next.run(request).await)
}

/// Extractor handlers use to read the authenticated username without
/// re-validating it — `require_auth` already did that before `next.run`.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthedUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
