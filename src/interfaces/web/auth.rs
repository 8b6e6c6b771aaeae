use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use super::error::ApiError;
use crate::core::clock::Clock;
use crate::core::store::types::User;

/// The authenticated caller, inserted as a request extension by [`require_auth`].
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub user: User,
}

impl CurrentUser {
    pub fn require_operator(&self) -> Result<(), ApiError> {
        if self.user.is_operator() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Operator role required"))
        }
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return ApiError::Unauthorized("Missing or invalid Authorization header. Use: Bearer <token>")
            .into_response();
    };

    match state.store.user_for_token(&token, state.clock.now()).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser { user });
            next.run(req).await
        }
        Ok(None) => ApiError::Unauthorized("Invalid or expired session").into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::Role;
    use crate::interfaces::web::test_support::{test_state, user_with_token};
    use axum::{Extension, Router, http::StatusCode, middleware, routing::get};
    use tower::util::ServiceExt;

    fn protected_app(state: AppState) -> Router {
        Router::new()
            .route(
                "/api/ping",
                get(|Extension(me): Extension<CurrentUser>| async move { me.user.username }),
            )
            .layer(middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    async fn ping(app: Router, auth: Option<String>) -> StatusCode {
        let mut builder = Request::builder().uri("/api/ping");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let (state, _) = test_state().await;
        assert_eq!(ping(protected_app(state), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let (state, _) = test_state().await;
        let status = ping(protected_app(state), Some("Bearer icrm_nope".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_session_is_accepted() {
        let (state, _) = test_state().await;
        let token = user_with_token(&state, "claire", Role::Agent).await;
        let status = ping(protected_app(state), Some(format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let (state, clock) = test_state().await;
        let token = user_with_token(&state, "claire", Role::Agent).await;
        clock.advance(chrono::Duration::days(30));
        let status = ping(protected_app(state), Some(format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
