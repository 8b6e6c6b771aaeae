use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Duration;
use serde_json::{Value, json};
use tracing::info;

use super::created;
use super::prospects::owner_scope;
use crate::core::clock::Clock;
use crate::core::dashboard::{dashboard_kpis, pipeline_board};
use crate::core::export::prospects_csv::{read_prospects, write_prospects};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;
use crate::interfaces::web::error::{ApiError, ApiResult};

const UPCOMING_DAYS: i64 = 7;

pub async fn pipeline(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let prospects = state.store.list_prospects(owner_scope(&me)).await?;
    Ok(Json(json!({ "success": true, "columns": pipeline_board(prospects) })))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let now = state.clock.now();
    let prospects = state.store.list_prospects(owner_scope(&me)).await?;
    let leads = state.store.list_leads(None).await?;
    let upcoming = state
        .store
        .list_appointments(Some(now), Some(now + Duration::days(UPCOMING_DAYS)))
        .await?
        .len();
    let unread = state.store.count_unread_notifications().await?;

    let kpis = dashboard_kpis(&prospects, &leads, upcoming, unread);
    Ok(Json(json!({ "success": true, "kpis": kpis })))
}

pub async fn export_prospects_csv(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let prospects = state.store.list_prospects(owner_scope(&me)).await?;
    let csv = write_prospects(&prospects)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"prospects.csv\"",
            ),
        ],
        csv,
    ))
}

/// Import a CSV in the export format. Nothing is written unless every row parses.
pub async fn import_prospects_csv(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let rows = read_prospects(&body).map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;

    let now = state.clock.now();
    let mut prospects = Vec::with_capacity(rows.len());
    for fields in rows {
        prospects.push(state.store.create_prospect(&me.user.id, fields, now).await?);
    }
    info!(count = prospects.len(), agent = %me.user.username, "Prospects imported");
    Ok(created(json!({
        "success": true,
        "imported": prospects.len(),
        "prospects": prospects
    })))
}
