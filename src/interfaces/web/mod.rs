pub(crate) mod auth;
mod error;
mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Json,
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::automation::AutomationEngine;
use crate::core::clock::Clock;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::store::CrmStore;

pub struct ApiServerConfig {
    pub store: CrmStore,
    pub automation: AutomationEngine,
    pub automation_enabled: bool,
    pub clock: Arc<dyn Clock>,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub session_ttl: chrono::Duration,
    pub api_host: String,
    pub api_port: u16,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: CrmStore,
    pub(crate) automation: AutomationEngine,
    pub(crate) automation_enabled: bool,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) session_ttl: chrono::Duration,
    pub(crate) api_port: u16,
}

pub struct ApiServer {
    state: AppState,
    api_host: String,
    api_port: u16,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                store: config.store,
                automation: config.automation,
                automation_enabled: config.automation_enabled,
                clock: config.clock,
                log_tx: config.log_tx,
                session_ttl: config.session_ttl,
                api_port: config.api_port,
            },
            api_host: config.api_host,
            api_port: config.api_port,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

async fn health_endpoint() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// --- Lifecycle ---

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Could not bind API server to {}", addr))?;
        let app = router::build_api_router(self.state.clone());
        let cancel = self.cancel.clone();

        info!("API Server running at http://{addr}");
        self.handle = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
            {
                tracing::error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
        Ok(())
    }
}
