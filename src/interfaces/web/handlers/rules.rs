use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::created;
use crate::core::automation::action::parse_steps;
use crate::core::automation::trigger::Trigger;
use crate::core::clock::Clock;
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRequest {
    pub name: String,
    pub trigger: String,
    pub action: Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl RuleRequest {
    /// Rules the runner could not execute are refused up front.
    fn check(&self) -> ApiResult<Trigger> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("name is required".into()));
        }
        let trigger = Trigger::parse(self.trigger.trim()).ok_or_else(|| {
            let supported: Vec<&str> = Trigger::ALL.iter().map(|t| t.as_str()).collect();
            ApiError::BadRequest(format!(
                "Unknown trigger '{}'. Supported: {}",
                self.trigger.trim(),
                supported.join(", ")
            ))
        })?;
        parse_steps(&self.action).map_err(ApiError::BadRequest)?;
        Ok(trigger)
    }
}

pub async fn list_rules(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let rules = state.store.list_rules(false).await?;
    Ok(Json(json!({ "success": true, "rules": rules })))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<RuleRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    me.require_operator()?;
    let trigger = payload.check()?;
    let rule = state
        .store
        .create_rule(
            &payload.name,
            trigger.as_str(),
            &payload.action,
            payload.is_active,
            state.clock.now(),
        )
        .await?;
    info!(rule = %rule.id, trigger = %rule.trigger, "Rule created");
    Ok(created(json!({ "success": true, "rule": rule })))
}

pub async fn get_rule(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let rule = state
        .store
        .get_rule(&id)
        .await?
        .ok_or(ApiError::NotFound("Rule"))?;
    Ok(Json(json!({ "success": true, "rule": rule })))
}

pub async fn update_rule(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<RuleRequest>,
) -> ApiResult<Json<Value>> {
    me.require_operator()?;
    let trigger = payload.check()?;
    let rule = state
        .store
        .update_rule(
            &id,
            &payload.name,
            trigger.as_str(),
            &payload.action,
            payload.is_active,
        )
        .await?
        .ok_or(ApiError::NotFound("Rule"))?;
    Ok(Json(json!({ "success": true, "rule": rule })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRequest {
    pub is_active: bool,
}

pub async fn set_rule_active(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<ActiveRequest>,
) -> ApiResult<Json<Value>> {
    me.require_operator()?;
    if !state.store.set_rule_active(&id, payload.is_active).await? {
        return Err(ApiError::NotFound("Rule"));
    }
    Ok(Json(json!({ "success": true, "isActive": payload.is_active })))
}

pub async fn delete_rule(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    me.require_operator()?;
    if state.store.delete_rule(&id).await? {
        info!(rule = %id, "Rule deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Rule"))
    }
}
