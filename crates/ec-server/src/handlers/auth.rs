use axum::extract::{Path, State};
use axum::Json;

use ec_protocol::auth::{ClearTokenRequest, TokenRequest, TokenResponse};
use ec_protocol::info::API_VERSION;
use ec_types::CoordError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `PUT /users/{user}`. A second successful login atomically revokes the
/// prior session and reverts every task it held `OutWith` back to `Todo`
/// before minting the new token (spec.md §8 scenario 4), rather than
/// leaving `Authority::issue_token`'s bare "already active" conflict to
/// the caller.
pub async fn request_token(
    State(state): State<AppState>,
    Path(path_user): Path<String>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    if request.user != path_user {
        return Err(CoordError::BadRequest("user in path and body disagree".into()).into());
    }
    if request.api_version != API_VERSION {
        return Err(CoordError::ApiMismatch.into());
    }
    if !state.authority.verify_password(&request.user, &request.password) {
        return Err(CoordError::Unauthorised.into());
    }

    if state.authority.has_active_token(&request.user) {
        state.catalog.reset_user_in_flight(&request.user)?;
        state.authority.revoke(&request.user)?;
    }

    let token = state.authority.issue_token(&request.user)?;
    log::info!("{} logged in", request.user);
    Ok(Json(TokenResponse { token }))
}

/// `DELETE /users/{user}`. Clears a stale token using the password as
/// proof of identity, for a client that lost its token value but still
/// knows the password (e.g. after a crash). Also reverts in-flight claims,
/// per I1.
pub async fn clear_token(
    State(state): State<AppState>,
    Path(path_user): Path<String>,
    Json(request): Json<ClearTokenRequest>,
) -> ApiResult<()> {
    if request.user != path_user {
        return Err(CoordError::BadRequest("user in path and body disagree".into()).into());
    }
    if !state.authority.verify_password(&request.user, &request.password) {
        return Err(CoordError::Unauthorised.into());
    }
    state.catalog.reset_user_in_flight(&request.user)?;
    state.authority.revoke(&request.user)?;
    Ok(())
}
