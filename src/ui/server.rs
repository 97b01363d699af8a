//! HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::UiConfig;
use crate::error::Result;
use crate::runtime::GameHandle;
use crate::ui::handlers;

/// State shared by all handlers
pub struct AppState {
    pub game: GameHandle,
}

pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, game: GameHandle) -> Self {
        Self {
            config,
            state: Arc::new(AppState { game }),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.bind_address, self.config.http_port)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/state", get(handlers::get_state))
            .route("/api/events", get(handlers::event_stream))
            .route("/api/select", post(handlers::select))
            .route("/api/selection/clear", post(handlers::clear_selection))
            .route("/api/confirm", post(handlers::confirm))
            .route("/api/skip", post(handlers::skip))
            .route("/api/retry", post(handlers::retry))
            .route("/api/restart", post(handlers::restart))
            .route("/api/media/ended", post(handlers::media_ended))
            .route("/api/media/error", post(handlers::media_error))
            .route("/api/result", get(handlers::get_result))
            .with_state(Arc::clone(&self.state))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let address = self.address();
        let listener = TcpListener::bind(&address).await?;
        tracing::info!("Web UI listening on http://{}", address);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    pub fn start_background(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!(error = %e, "Web server stopped");
            }
        })
    }
}
