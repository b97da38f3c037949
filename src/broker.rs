use std::sync::Arc;
use url::Url;

use crate::bootstrap::{EngineProvider, WorkspaceHandle};
use crate::engine::WorkspaceEngine;
use crate::error::{Error, Result};
use crate::types::{AgentArch, AgentCredential, AgentSession, SessionEndpoint};

/// Mints agent sessions against a bootstrapped workspace. Holds no state of
/// its own; concurrency guarantees come from the engines.
pub struct SessionBroker<'a> {
    handle: &'a WorkspaceHandle,
    provider: &'a dyn EngineProvider,
}

impl<'a> SessionBroker<'a> {
    pub fn new(handle: &'a WorkspaceHandle, provider: &'a dyn EngineProvider) -> Self {
        Self { handle, provider }
    }

    /// Joins the workspace this process hosts.
    pub async fn join_local(&self, agent_name: &str, arch: &AgentArch) -> Result<AgentSession> {
        let (engine, workspace) = self.local_workspace()?;
        let credential = AgentCredential::new(agent_name);

        let session = engine
            .start_session(workspace, &credential, arch)
            .await
            .map_err(|e| {
                Error::session(format!(
                    "agent {} could not join workspace {}: {}",
                    agent_name, workspace, e
                ))
            })?;

        log::debug!("Agent {} joined local workspace {}", agent_name, workspace);
        Ok(session)
    }

    /// Joins the workspace at `uri`, which need not be the one resolved at
    /// startup.
    pub async fn join_remote(
        &self,
        uri: &Url,
        agent_name: &str,
        arch: &AgentArch,
    ) -> Result<AgentSession> {
        let engine = self
            .provider
            .distributed_engine()
            .map_err(|e| Error::session(format!("distributed engine unavailable: {}", e)))?;
        let credential = AgentCredential::new(agent_name);

        let session = engine
            .start_session(uri, &credential, arch)
            .await
            .map_err(|e| {
                Error::session(format!(
                    "agent {} could not join {}: {:#}",
                    agent_name, uri, e
                ))
            })?;

        log::debug!("Agent {} joined remote workspace {}", agent_name, uri);
        Ok(session)
    }

    /// Joins the remote workspace in remote mode, the hosted one otherwise.
    pub async fn join(&self, agent_name: &str, arch: &AgentArch) -> Result<AgentSession> {
        match self.handle {
            WorkspaceHandle::Remote { uri } => self.join_remote(uri, agent_name, arch).await,
            _ => self.join_local(agent_name, arch).await,
        }
    }

    pub async fn leave(&self, session: &AgentSession) -> Result<()> {
        let outcome = match &session.endpoint {
            SessionEndpoint::Local => {
                let (engine, _) = self.local_workspace()?;
                engine.end_session(&session.workspace, &session.agent).await
            }
            SessionEndpoint::Remote { .. } => match self.provider.distributed_engine() {
                Ok(engine) => engine.end_session(session).await,
                Err(e) => Err(e),
            },
        };

        outcome.map_err(|e| {
            Error::session(format!(
                "agent {} could not leave workspace {}: {:#}",
                session.agent, session.workspace, e
            ))
        })
    }

    fn local_workspace(&self) -> Result<(Arc<dyn WorkspaceEngine>, &'a str)> {
        match self.handle {
            WorkspaceHandle::Local { engine, name, .. } => Ok((engine.clone(), name.as_str())),
            WorkspaceHandle::Infrastructure { engine, name, .. } => {
                Ok((engine.hosting_engine(), name.as_str()))
            }
            WorkspaceHandle::Remote { uri } => Err(Error::session(format!(
                "no local workspace in remote mode; join {} instead",
                uri
            ))),
            WorkspaceHandle::Unavailable { mode, reason } => Err(Error::session(format!(
                "{} workspace is unavailable: {}",
                mode, reason
            ))),
        }
    }
}
