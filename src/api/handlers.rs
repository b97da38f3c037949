use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::engine::WorkspaceEngine;
use crate::types::{AgentArch, AgentCredential, AgentSession};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub agent: String,
    #[serde(default)]
    pub arch: AgentArch,
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_workspaces(
    State(engine): State<Arc<dyn WorkspaceEngine>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(engine.workspaces().await?))
}

pub async fn join_workspace(
    State(engine): State<Arc<dyn WorkspaceEngine>>,
    Path(name): Path<String>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<AgentSession>, ApiError> {
    let credential = AgentCredential::new(request.agent);
    let session = engine
        .start_session(&name, &credential, &request.arch)
        .await?;

    log::info!("Agent {} joined workspace {} remotely", session.agent, name);
    Ok(Json(session))
}

pub async fn leave_workspace(
    State(engine): State<Arc<dyn WorkspaceEngine>>,
    Path((name, agent)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    engine.end_session(&name, &agent).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
