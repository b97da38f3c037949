use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::engine::WorkspaceEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn WorkspaceEngine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/workspaces", get(handlers::list_workspaces))
        .route("/workspaces/:name/sessions", post(handlers::join_workspace))
        .route(
            "/workspaces/:name/sessions/:agent",
            delete(handlers::leave_workspace),
        )
        .layer(CorsLayer::permissive())
        .with_state(state.engine)
}

pub async fn serve_until<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    log::info!("Workspace node listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
