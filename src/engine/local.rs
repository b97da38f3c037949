use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{EngineError, WorkspaceEngine};
use crate::inspector::LogSink;
use crate::types::{AgentArch, AgentCredential, AgentSession, SessionId, WorkspaceEvent};

static SHARED: OnceLock<Arc<LocalEngine>> = OnceLock::new();

struct Workspace {
    sessions: HashMap<String, SessionId>,
    sink: Option<LogSink>,
}

impl Workspace {
    fn emit(&self, event: WorkspaceEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }
}

/// In-memory workspace engine. One active session per agent name per
/// workspace.
#[derive(Clone)]
pub struct LocalEngine {
    workspaces: Arc<RwLock<HashMap<String, Workspace>>>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            workspaces: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The process-wide engine, created on first use.
    pub fn shared() -> Arc<LocalEngine> {
        SHARED.get_or_init(|| Arc::new(LocalEngine::new())).clone()
    }

    /// Drops every workspace and its sessions.
    pub fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    pub fn session_count(&self, workspace: &str) -> Result<usize> {
        let workspaces = self.read()?;
        workspaces
            .get(workspace)
            .map(|w| w.sessions.len())
            .ok_or_else(|| EngineError::UnknownWorkspace(workspace.to_string()).into())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Workspace>>> {
        self.workspaces
            .read()
            .map_err(|_| anyhow!("workspace registry lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Workspace>>> {
        self.workspaces
            .write()
            .map_err(|_| anyhow!("workspace registry lock poisoned"))
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkspaceEngine for LocalEngine {
    async fn initialize_workspace(&self, name: &str, sink: Option<LogSink>) -> Result<()> {
        let mut workspaces = self.write()?;
        if workspaces.contains_key(name) {
            return Err(EngineError::WorkspaceExists(name.to_string()).into());
        }

        let workspace = Workspace {
            sessions: HashMap::new(),
            sink,
        };
        workspace.emit(WorkspaceEvent::WorkspaceCreated {
            workspace: name.to_string(),
            at: Utc::now(),
        });
        workspaces.insert(name.to_string(), workspace);
        Ok(())
    }

    async fn start_session(
        &self,
        workspace: &str,
        credential: &AgentCredential,
        arch: &AgentArch,
    ) -> Result<AgentSession> {
        let mut workspaces = self.write()?;
        let entry = workspaces
            .get_mut(workspace)
            .ok_or_else(|| EngineError::UnknownWorkspace(workspace.to_string()))?;

        if entry.sessions.contains_key(&credential.agent_name) {
            return Err(EngineError::DuplicateAgent {
                workspace: workspace.to_string(),
                agent: credential.agent_name.clone(),
            }
            .into());
        }

        let session = AgentSession::new(workspace, credential, arch.clone());
        entry
            .sessions
            .insert(credential.agent_name.clone(), session.id);
        entry.emit(WorkspaceEvent::AgentJoined {
            workspace: workspace.to_string(),
            agent: credential.agent_name.clone(),
            at: session.started_at,
        });

        Ok(session)
    }

    async fn end_session(&self, workspace: &str, agent: &str) -> Result<()> {
        let mut workspaces = self.write()?;
        let entry = workspaces
            .get_mut(workspace)
            .ok_or_else(|| EngineError::UnknownWorkspace(workspace.to_string()))?;

        if entry.sessions.remove(agent).is_none() {
            return Err(EngineError::UnknownAgent {
                workspace: workspace.to_string(),
                agent: agent.to_string(),
            }
            .into());
        }

        entry.emit(WorkspaceEvent::AgentLeft {
            workspace: workspace.to_string(),
            agent: agent.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    async fn close_workspace(&self, name: &str) -> Result<()> {
        self.write()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::UnknownWorkspace(name.to_string()).into())
    }

    async fn workspaces(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
