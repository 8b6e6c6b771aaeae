pub mod appointments;
pub mod automation;
pub mod deliveries;
pub mod leads;
pub mod notifications;
pub mod payments;
pub mod prospects;
pub mod reports;
pub mod rules;
pub mod session;
pub mod templates;

use axum::{Json, http::StatusCode};
use serde_json::Value;

/// 201 with the usual success envelope.
pub(super) fn created(body: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(body))
}
