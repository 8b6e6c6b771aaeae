use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use super::created;
use super::leads::existing_lead;
use crate::core::clock::Clock;
use crate::core::store::types::NewPayment;
use crate::interfaces::web::AppState;
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

pub async fn list_payments(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let payments = state.store.list_payments().await?;
    Ok(Json(json!({ "success": true, "payments": payments })))
}

pub async fn create_payment(
    State(state): State<AppState>,
    ApiJson(entry): ApiJson<NewPayment>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let entry = entry.validate().map_err(ApiError::BadRequest)?;
    if let Some(lead_id) = &entry.lead_id {
        existing_lead(&state, lead_id).await?;
    }
    if let Some(delivery_id) = &entry.delivery_id
        && state.store.get_delivery(delivery_id).await?.is_none()
    {
        return Err(ApiError::NotFound("Delivery"));
    }
    let payment = state
        .store
        .create_payment(entry, state.clock.now())
        .await?;
    Ok(created(json!({ "success": true, "payment": payment })))
}

pub async fn get_payment(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let payment = state
        .store
        .get_payment(&id)
        .await?
        .ok_or(ApiError::NotFound("Payment"))?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}
