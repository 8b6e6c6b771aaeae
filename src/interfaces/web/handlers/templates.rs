use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::created;
use crate::core::automation::render::placeholders;
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

#[derive(Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    pub body: String,
}

pub async fn list_templates(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let templates = state.store.list_templates().await?;
    Ok(Json(json!({ "success": true, "templates": templates })))
}

/// Create or replace a template by name.
pub async fn save_template(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<TemplateRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    me.require_operator()?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Template name is required".into()));
    }
    if payload.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Template body is required".into()));
    }
    let template = state
        .store
        .upsert_template(&payload.name, &payload.body)
        .await?;
    let slots = placeholders(&template.body);
    Ok(created(json!({
        "success": true,
        "template": template,
        "placeholders": slots
    })))
}

pub async fn delete_template(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    me.require_operator()?;
    if state.store.delete_template(&name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Template"))
    }
}
