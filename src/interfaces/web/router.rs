use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::auth;
use super::handlers::{
    appointments, automation, deliveries, leads, notifications, payments, prospects, reports,
    rules, session, templates,
};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub(crate) fn build_api_router(state: AppState) -> Router {
    // Login, logout and health check their own credentials (or need none).
    let public_routes = Router::new()
        .route(
            "/api/session",
            post(session::login).delete(session::logout),
        )
        .route("/api/health", get(super::health_endpoint))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.api_port))
        .with_state(state.clone());

    let authed_routes = Router::new()
        .route("/api/me", get(session::me))
        .route(
            "/api/prospects",
            get(prospects::list_prospects).post(prospects::create_prospect),
        )
        .route(
            "/api/prospects/{id}",
            get(prospects::get_prospect)
                .put(prospects::update_prospect)
                .delete(prospects::delete_prospect),
        )
        .route(
            "/api/prospects/{id}/status",
            axum::routing::patch(prospects::set_prospect_status),
        )
        .route("/api/prospects/{id}/links", get(prospects::prospect_links))
        .route("/api/leads", get(leads::list_leads).post(leads::create_lead))
        .route(
            "/api/leads/{id}",
            get(leads::get_lead)
                .put(leads::update_lead)
                .delete(leads::delete_lead),
        )
        .route(
            "/api/leads/{id}/interactions",
            get(leads::list_interactions).post(leads::add_interaction),
        )
        .route(
            "/api/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/api/appointments/{id}",
            get(appointments::get_appointment).delete(appointments::delete_appointment),
        )
        .route(
            "/api/appointments/{id}/ics",
            get(appointments::appointment_ics_endpoint),
        )
        .route(
            "/api/deliveries",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route(
            "/api/deliveries/{id}",
            get(deliveries::get_delivery).delete(deliveries::delete_delivery),
        )
        .route(
            "/api/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route("/api/payments/{id}", get(payments::get_payment))
        .route("/api/rules", get(rules::list_rules).post(rules::create_rule))
        .route(
            "/api/rules/{id}",
            get(rules::get_rule)
                .put(rules::update_rule)
                .delete(rules::delete_rule),
        )
        .route(
            "/api/rules/{id}/active",
            axum::routing::patch(rules::set_rule_active),
        )
        .route(
            "/api/templates",
            get(templates::list_templates).post(templates::save_template),
        )
        .route(
            "/api/templates/{name}",
            axum::routing::delete(templates::delete_template),
        )
        .route(
            "/api/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/notifications/{id}/read",
            post(notifications::mark_notification_read),
        )
        .route("/api/automation/run", post(automation::run_automation))
        .route(
            "/api/automation/status",
            get(automation::automation_status),
        )
        .route("/api/pipeline", get(reports::pipeline))
        .route("/api/dashboard", get(reports::dashboard))
        .route(
            "/api/export/prospects.csv",
            get(reports::export_prospects_csv),
        )
        .route(
            "/api/import/prospects",
            post(reports::import_prospects_csv),
        )
        .route("/api/logs", get(super::sse_logs_endpoint))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.api_port))
        .with_state(state);

    public_routes.merge(authed_routes)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}
