pub mod distributed;
pub mod local;

pub use distributed::HttpDistributedEngine;
pub use local::LocalEngine;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::inspector::LogSink;
use crate::types::{AgentArch, AgentCredential, AgentSession};

/// Failures engines report. Carried inside `anyhow::Error` so callers that
/// care (the HTTP layer) can downcast.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("workspace {0} does not exist")]
    UnknownWorkspace(String),

    #[error("workspace {0} already exists")]
    WorkspaceExists(String),

    #[error("agent {agent} already has a session in workspace {workspace}")]
    DuplicateAgent { workspace: String, agent: String },

    #[error("agent {agent} has no session in workspace {workspace}")]
    UnknownAgent { workspace: String, agent: String },
}

/// Process-local workspace engine.
#[async_trait]
pub trait WorkspaceEngine: Send + Sync {
    async fn initialize_workspace(&self, name: &str, sink: Option<LogSink>) -> Result<()>;

    async fn start_session(
        &self,
        workspace: &str,
        credential: &AgentCredential,
        arch: &AgentArch,
    ) -> Result<AgentSession>;

    async fn end_session(&self, workspace: &str, agent: &str) -> Result<()>;

    /// Removes a workspace and every session still open in it.
    async fn close_workspace(&self, name: &str) -> Result<()>;

    async fn workspaces(&self) -> Result<Vec<String>>;
}

/// Network-capable engine: hosts workspaces other processes can join and
/// joins workspaces hosted elsewhere.
#[async_trait]
pub trait DistributedEngine: Send + Sync {
    async fn initialize_workspace(
        &self,
        name: &str,
        port: u16,
        sink: Option<LogSink>,
    ) -> Result<()>;

    async fn start_session(
        &self,
        uri: &Url,
        credential: &AgentCredential,
        arch: &AgentArch,
    ) -> Result<AgentSession>;

    async fn end_session(&self, session: &AgentSession) -> Result<()>;

    /// Engine backing the workspaces this node hosts.
    fn hosting_engine(&self) -> Arc<dyn WorkspaceEngine>;

    async fn shutdown(&self) -> Result<()>;
}
