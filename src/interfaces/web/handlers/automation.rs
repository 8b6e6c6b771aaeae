use axum::{Extension, Json, extract::State};
use serde_json::{Value, json};

use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;
use crate::interfaces::web::error::{ApiError, ApiResult};

/// Run one cycle now. Refused while a timed cycle is in progress.
pub async fn run_automation(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    me.require_operator()?;
    let report = state.automation.try_run_cycle().await.ok_or_else(|| {
        ApiError::Conflict("An automation cycle is already running".to_string())
    })?;
    Ok(Json(json!({ "success": true, "report": report })))
}

pub async fn automation_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "enabled": state.automation_enabled,
        "busy": state.automation.is_busy(),
        "lastReport": state.automation.last_report().await
    }))
}
