use std::sync::Arc;
use url::Url;

use crate::bootstrap::{Bootstrapper, DefaultEngines, EngineProvider, WorkspaceHandle};
use crate::broker::SessionBroker;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::inspector::Inspector;
use crate::locator;
use crate::options;
use crate::types::{AgentArch, AgentSession, DeploymentMode, WorkspaceIdentity};

type TeardownHook = Box<dyn FnOnce() + Send + Sync>;

struct ProcessState {
    mode: DeploymentMode,
    identity: WorkspaceIdentity,
    handle: WorkspaceHandle,
    owns_network_resource: bool,
}

enum Phase {
    Uninitialized,
    Running(ProcessState),
    Stopped(ProcessState),
}

/// The workspace context of one process: created empty, initialized once
/// from the command line, then shared by every agent that joins.
pub struct Environment {
    provider: Arc<dyn EngineProvider>,
    config: Config,
    phase: Phase,
    teardown: Vec<TeardownHook>,
}

impl Environment {
    pub fn new(config: Config) -> Self {
        let provider = Arc::new(DefaultEngines::new(config.clone()));
        Self::with_provider(provider, config)
    }

    pub fn with_provider(provider: Arc<dyn EngineProvider>, config: Config) -> Self {
        Self {
            provider,
            config,
            phase: Phase::Uninitialized,
            teardown: Vec::new(),
        }
    }

    /// Parses `args`, resolves the workspace identity and bootstraps it.
    /// A context can be initialized only once.
    pub async fn initialize<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        if !matches!(self.phase, Phase::Uninitialized) {
            return Err(Error::IllegalState(
                "environment is already initialized".to_string(),
            ));
        }

        let (mode, options) = options::parse(args)?;
        let identity = locator::locate(mode, &options)?;

        let bootstrapper = Bootstrapper::new(self.provider.clone(), self.config.bootstrap_policy);
        let handle = bootstrapper
            .bootstrap(mode, &identity, options.debug)
            .await?;

        log::info!(
            "Environment initialized in {} mode for workspace {}",
            mode,
            identity.name
        );
        self.phase = Phase::Running(ProcessState {
            mode,
            identity,
            handle,
            owns_network_resource: mode == DeploymentMode::Infrastructure,
        });
        Ok(())
    }

    pub async fn join_local(&self, agent_name: &str, arch: &AgentArch) -> Result<AgentSession> {
        self.broker()?.join_local(agent_name, arch).await
    }

    pub async fn join_remote(
        &self,
        uri: &Url,
        agent_name: &str,
        arch: &AgentArch,
    ) -> Result<AgentSession> {
        self.broker()?.join_remote(uri, agent_name, arch).await
    }

    pub async fn join(&self, agent_name: &str, arch: &AgentArch) -> Result<AgentSession> {
        self.broker()?.join(agent_name, arch).await
    }

    pub async fn leave(&self, session: &AgentSession) -> Result<()> {
        self.broker()?.leave(session).await
    }

    /// Registers work to run at the start of [`Environment::stop`].
    pub fn register_teardown<F>(&mut self, hook: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.teardown.push(Box::new(hook));
    }

    /// Best-effort shutdown. Teardown hooks always run; the workspace and
    /// network resources are released only when this context created them.
    /// Failures are logged, never returned.
    pub async fn stop(&mut self) {
        for hook in self.teardown.drain(..) {
            hook();
        }

        let state = match std::mem::replace(&mut self.phase, Phase::Uninitialized) {
            Phase::Running(state) => state,
            Phase::Stopped(state) => {
                self.phase = Phase::Stopped(state);
                return;
            }
            Phase::Uninitialized => {
                log::debug!("stop called on an uninitialized environment");
                return;
            }
        };

        if let WorkspaceHandle::Local { engine, name, .. } = &state.handle {
            if let Err(e) = engine.close_workspace(name).await {
                log::warn!("Failed to close workspace {}: {:#}", name, e);
            }
        }

        if state.owns_network_resource {
            let engine = match &state.handle {
                WorkspaceHandle::Infrastructure { engine, .. } => Ok(engine.clone()),
                _ => self.provider.distributed_engine(),
            };
            match engine {
                Ok(engine) => {
                    if let Err(e) = engine.shutdown().await {
                        log::error!("Distributed engine shutdown failed: {:#}", e);
                    }
                }
                Err(e) => log::warn!("No distributed engine to shut down: {:#}", e),
            }
        }

        log::info!("Environment for workspace {} stopped", state.identity.name);
        self.phase = Phase::Stopped(state);
    }

    pub fn mode(&self) -> Option<DeploymentMode> {
        self.state().map(|s| s.mode)
    }

    pub fn identity(&self) -> Option<&WorkspaceIdentity> {
        self.state().map(|s| &s.identity)
    }

    pub fn handle(&self) -> Option<&WorkspaceHandle> {
        self.state().map(|s| &s.handle)
    }

    pub fn is_remote(&self) -> bool {
        self.mode() == Some(DeploymentMode::Remote)
    }

    pub fn workspace_uri(&self) -> Option<&Url> {
        self.identity().and_then(|i| i.uri.as_ref())
    }

    pub fn owns_network_resource(&self) -> bool {
        self.state().map_or(false, |s| s.owns_network_resource)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    pub fn inspector(&self) -> Option<&Inspector> {
        self.handle().and_then(WorkspaceHandle::inspector)
    }

    fn state(&self) -> Option<&ProcessState> {
        match &self.phase {
            Phase::Running(state) | Phase::Stopped(state) => Some(state),
            Phase::Uninitialized => None,
        }
    }

    fn broker(&self) -> Result<SessionBroker<'_>> {
        match &self.phase {
            Phase::Running(state) => Ok(SessionBroker::new(&state.handle, self.provider.as_ref())),
            Phase::Uninitialized => Err(Error::IllegalState(
                "environment is not initialized".to_string(),
            )),
            Phase::Stopped(_) => Err(Error::IllegalState("environment is stopped".to_string())),
        }
    }
}
