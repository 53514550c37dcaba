use serde::{Deserialize, Serialize};

/// `PUT /users/{user}` body. A mismatching `api_version` yields
/// `ApiMismatch` before password verification even runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub user: String,
    pub password: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// `DELETE /users/{user}` body — clears a stale token without the token
/// itself, using the password as proof of identity instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearTokenRequest {
    pub user: String,
    pub password: String,
}

/// Every authenticated request carries this pair; `ec-server` extracts it
/// from request headers rather than the JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}
