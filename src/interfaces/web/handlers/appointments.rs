use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use super::created;
use super::leads::existing_lead;
use super::prospects::visible_prospect;
use crate::core::clock::{Clock, parse_ts};
use crate::core::export::ics::appointment_ics;
use crate::core::store::types::{Appointment, NewAppointment};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;
use crate::interfaces::web::error::{ApiError, ApiJson, ApiResult};

#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn bound(name: &str, value: Option<&str>) -> ApiResult<Option<DateTime<Utc>>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_ts(raw)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("'{}' must be an RFC 3339 timestamp", name))),
    }
}

async fn existing_appointment(state: &AppState, id: &str) -> ApiResult<Appointment> {
    state
        .store
        .get_appointment(id)
        .await?
        .ok_or(ApiError::NotFound("Appointment"))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let from = bound("from", query.from.as_deref())?;
    let to = bound("to", query.to.as_deref())?;
    let appointments = state.store.list_appointments(from, to).await?;
    Ok(Json(json!({ "success": true, "appointments": appointments })))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ApiJson(entry): ApiJson<NewAppointment>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let entry = entry.validate().map_err(ApiError::BadRequest)?;
    if let Some(lead_id) = &entry.lead_id {
        existing_lead(&state, lead_id).await?;
    }
    if let Some(prospect_id) = &entry.prospect_id {
        visible_prospect(&state, &me, prospect_id).await?;
    }
    let appointment = state
        .store
        .create_appointment(entry, state.clock.now())
        .await?;
    Ok(created(json!({ "success": true, "appointment": appointment })))
}

pub async fn get_appointment(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let appointment = existing_appointment(&state, &id).await?;
    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

pub async fn delete_appointment(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    if state.store.delete_appointment(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Appointment"))
    }
}

/// The appointment as a one-event calendar file.
pub async fn appointment_ics_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let appointment = existing_appointment(&state, &id).await?;
    let body = appointment_ics(&appointment, state.clock.now());
    let disposition = format!("attachment; filename=\"rdv-{}.ics\"", appointment.id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
