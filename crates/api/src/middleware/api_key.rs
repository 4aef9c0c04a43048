use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Which configured key authenticated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRole {
    Admin,
    Server,
}

/// Reject requests without a configured API key in `x-api-key`, and expose
/// the matching role to handlers through the request extensions.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing API key".to_string()))?;

    let config = state.config();
    let role = if config.admin_api_key.as_deref() == Some(key) {
        ApiRole::Admin
    } else if config.server_api_key.as_deref() == Some(key) {
        ApiRole::Server
    } else {
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    };

    request.extensions_mut().insert(role);
    Ok(next.run(request).await)
}
