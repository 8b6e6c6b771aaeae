use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::created;
use super::leads::existing_lead;
use crate::core::clock::Clock;
use crate::interfaces::web::AppState;
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryRequest {
    pub lead_id: String,
    pub recipient: String,
}

pub async fn list_deliveries(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let deliveries = state.store.list_deliveries().await?;
    Ok(Json(json!({ "success": true, "deliveries": deliveries })))
}

pub async fn create_delivery(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateDeliveryRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if payload.recipient.trim().is_empty() {
        return Err(ApiError::BadRequest("recipient is required".into()));
    }
    existing_lead(&state, &payload.lead_id).await?;
    let delivery = state
        .store
        .create_delivery(&payload.lead_id, &payload.recipient, state.clock.now())
        .await?;
    Ok(created(json!({ "success": true, "delivery": delivery })))
}

pub async fn get_delivery(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let delivery = state
        .store
        .get_delivery(&id)
        .await?
        .ok_or(ApiError::NotFound("Delivery"))?;
    Ok(Json(json!({ "success": true, "delivery": delivery })))
}

pub async fn delete_delivery(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    if state.store.delete_delivery(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Delivery"))
    }
}
