//! HTTP listener.
//!
//! The hosting platform probes `/` for liveness. When Discord credentials are
//! configured the same listener also receives interactions.

use std::sync::Arc;

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::chat::interactions::{InteractionState, handle_interaction};
use crate::logging::Component;

async fn root() -> &'static str {
    "Bot is running!"
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub fn router(interactions: Option<Arc<InteractionState>>) -> Router {
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health));

    match interactions {
        Some(state) => app.merge(
            Router::new()
                .route("/interactions", post(handle_interaction))
                .with_state(state),
        ),
        None => app,
    }
}

/// Serves `app` on an already-bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(component = %Component::System, %addr, "HTTP listener started");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
