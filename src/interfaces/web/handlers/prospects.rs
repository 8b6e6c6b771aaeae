use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::created;
use crate::core::clock::Clock;
use crate::core::export::links::contact_links;
use crate::core::pipeline::ProspectStatus;
use crate::core::store::types::{Prospect, ProspectFields};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

/// `Some(agent id)` when the caller only sees their own prospects.
pub(crate) fn owner_scope(me: &CurrentUser) -> Option<&str> {
    (!me.user.is_operator()).then_some(me.user.id.as_str())
}

/// Load a prospect the caller is allowed to touch.
pub(crate) async fn visible_prospect(
    state: &AppState,
    me: &CurrentUser,
    id: &str,
) -> ApiResult<Prospect> {
    let prospect = state
        .store
        .get_prospect(id)
        .await?
        .ok_or(ApiError::NotFound("Prospect"))?;
    if owner_scope(me).is_some_and(|agent| agent != prospect.agent_id) {
        return Err(ApiError::Forbidden("Prospect belongs to another agent"));
    }
    Ok(prospect)
}

pub async fn list_prospects(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let prospects = state.store.list_prospects(owner_scope(&me)).await?;
    Ok(Json(json!({ "success": true, "prospects": prospects })))
}

pub async fn create_prospect(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(fields): ApiJson<ProspectFields>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let fields = fields.validate().map_err(ApiError::BadRequest)?;
    let prospect = state
        .store
        .create_prospect(&me.user.id, fields, state.clock.now())
        .await?;
    info!(prospect = %prospect.id, agent = %me.user.username, "Prospect created");
    Ok(created(json!({ "success": true, "prospect": prospect })))
}

pub async fn get_prospect(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let prospect = visible_prospect(&state, &me, &id).await?;
    Ok(Json(json!({ "success": true, "prospect": prospect })))
}

pub async fn update_prospect(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(fields): ApiJson<ProspectFields>,
) -> ApiResult<Json<Value>> {
    visible_prospect(&state, &me, &id).await?;
    let fields = fields.validate().map_err(ApiError::BadRequest)?;
    let prospect = state
        .store
        .update_prospect(&id, fields, state.clock.now())
        .await?
        .ok_or(ApiError::NotFound("Prospect"))?;
    Ok(Json(json!({ "success": true, "prospect": prospect })))
}

pub async fn delete_prospect(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    visible_prospect(&state, &me, &id).await?;
    if state.store.delete_prospect(&id).await? {
        info!(prospect = %id, "Prospect deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Prospect"))
    }
}

#[derive(Deserialize)]
pub struct StatusRequest {
    #[serde(alias = "status")]
    pub statut: ProspectStatus,
}

/// Move a card on the pipeline board.
pub async fn set_prospect_status(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<StatusRequest>,
) -> ApiResult<Json<Value>> {
    visible_prospect(&state, &me, &id).await?;
    let prospect = state
        .store
        .set_prospect_status(&id, payload.statut, state.clock.now())
        .await?
        .ok_or(ApiError::NotFound("Prospect"))?;
    Ok(Json(json!({ "success": true, "prospect": prospect })))
}

#[derive(Deserialize)]
pub struct LinksQuery {
    pub message: Option<String>,
}

pub async fn prospect_links(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(query): Query<LinksQuery>,
) -> ApiResult<Json<Value>> {
    let prospect = visible_prospect(&state, &me, &id).await?;
    let Some(phone) = prospect.fields.phone.as_deref() else {
        return Err(ApiError::BadRequest("Prospect has no phone number".into()));
    };
    let links = contact_links(phone, query.message.as_deref())
        .ok_or_else(|| ApiError::BadRequest(format!("'{}' is not a usable phone number", phone)))?;
    Ok(Json(json!({ "success": true, "links": links })))
}
