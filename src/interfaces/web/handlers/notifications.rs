use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::clock::Clock;
use crate::interfaces::web::AppState;
use crate::interfaces::web::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    let notifications = state.store.list_notifications(query.unread).await?;
    let unread = state.store.count_unread_notifications().await?;
    Ok(Json(json!({
        "success": true,
        "notifications": notifications,
        "unread": unread
    })))
}

pub async fn mark_notification_read(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    if !state
        .store
        .mark_notification_read(&id, state.clock.now())
        .await?
    {
        return Err(ApiError::NotFound("Notification"));
    }
    Ok(Json(json!({ "success": true })))
}
