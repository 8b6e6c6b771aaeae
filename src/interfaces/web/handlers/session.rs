use axum::{Extension, Json, extract::State, http::HeaderMap, http::StatusCode};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::core::clock::Clock;
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::{CurrentUser, bearer_token};
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let Some(user) = state
        .store
        .authenticate(&payload.username, &payload.password)
        .await?
    else {
        warn!(username = %payload.username.trim(), "Failed login attempt");
        return Err(ApiError::Unauthorized("Invalid username or password"));
    };

    let now = state.clock.now();
    state.store.purge_expired_sessions(now).await?;
    let (token, record) = state
        .store
        .create_session(&user.id, state.session_ttl, now)
        .await?;
    info!(user = %user.username, "Session opened");

    Ok(Json(json!({
        "success": true,
        "token": token,
        "expiresAt": record.expires_at,
        "user": user,
        "message": "Session opened. Save the token value - it will not be shown again."
    })))
}

/// Revokes the session named by the bearer token.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let Some(token) = bearer_token(&headers) else {
        return Err(ApiError::Unauthorized(
            "Missing or invalid Authorization header. Use: Bearer <token>",
        ));
    };
    if state.store.delete_session(&token).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Unauthorized("Invalid or expired session"))
    }
}

pub async fn me(Extension(me): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({ "success": true, "user": me.user }))
}
