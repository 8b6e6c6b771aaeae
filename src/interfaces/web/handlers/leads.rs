use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::created;
use crate::core::clock::Clock;
use crate::core::pipeline::LeadStatus;
use crate::core::store::types::{Lead, LeadFields, NewInteraction};
use crate::interfaces::web::AppState;
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

pub(crate) async fn existing_lead(state: &AppState, id: &str) -> ApiResult<Lead> {
    state
        .store
        .get_lead(id)
        .await?
        .ok_or(ApiError::NotFound("Lead"))
}

#[derive(Deserialize)]
pub struct LeadListQuery {
    pub status: Option<String>,
}

pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<LeadListQuery>,
) -> ApiResult<Json<Value>> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            LeadStatus::from_status(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown lead status '{}'", raw)))?,
        ),
    };
    let leads = state.store.list_leads(status).await?;
    Ok(Json(json!({ "success": true, "leads": leads })))
}

pub async fn create_lead(
    State(state): State<AppState>,
    ApiJson(fields): ApiJson<LeadFields>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let fields = fields.validate().map_err(ApiError::BadRequest)?;
    let lead = state.store.create_lead(fields, state.clock.now()).await?;
    Ok(created(json!({ "success": true, "lead": lead })))
}

pub async fn get_lead(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let lead = existing_lead(&state, &id).await?;
    Ok(Json(json!({ "success": true, "lead": lead })))
}

pub async fn update_lead(
    Path(id): Path<String>,
    State(state): State<AppState>,
    ApiJson(fields): ApiJson<LeadFields>,
) -> ApiResult<Json<Value>> {
    let fields = fields.validate().map_err(ApiError::BadRequest)?;
    let lead = state
        .store
        .update_lead(&id, fields, state.clock.now())
        .await?
        .ok_or(ApiError::NotFound("Lead"))?;
    Ok(Json(json!({ "success": true, "lead": lead })))
}

pub async fn delete_lead(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    if state.store.delete_lead(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Lead"))
    }
}

pub async fn list_interactions(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    existing_lead(&state, &id).await?;
    let interactions = state.store.list_interactions(&id).await?;
    Ok(Json(json!({ "success": true, "interactions": interactions })))
}

/// Log a contact event. The lead in the path wins over any `leadId` in the body.
pub async fn add_interaction(
    Path(id): Path<String>,
    State(state): State<AppState>,
    ApiJson(entry): ApiJson<NewInteraction>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    existing_lead(&state, &id).await?;
    let entry = NewInteraction { lead_id: id, ..entry }
        .validate()
        .map_err(ApiError::BadRequest)?;
    let interaction = state
        .store
        .add_interaction(entry, state.clock.now())
        .await?;
    Ok(created(json!({ "success": true, "interaction": interaction })))
}
