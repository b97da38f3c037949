use anyhow::Result as AnyResult;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::config::{BootstrapPolicy, Config};
use crate::engine::{DistributedEngine, HttpDistributedEngine, LocalEngine, WorkspaceEngine};
use crate::error::{Error, Result};
use crate::inspector::Inspector;
use crate::types::{DeploymentMode, WorkspaceIdentity};

/// Source of the engines a process bootstraps into. The default hands out
/// the process-wide singletons; tests and embedders substitute their own.
pub trait EngineProvider: Send + Sync {
    fn local_engine(&self) -> AnyResult<Arc<dyn WorkspaceEngine>>;
    fn distributed_engine(&self) -> AnyResult<Arc<dyn DistributedEngine>>;
    fn start_inspector(&self) -> AnyResult<Inspector>;
}

pub struct DefaultEngines {
    config: Config,
}

impl DefaultEngines {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl EngineProvider for DefaultEngines {
    fn local_engine(&self) -> AnyResult<Arc<dyn WorkspaceEngine>> {
        Ok(LocalEngine::shared())
    }

    fn distributed_engine(&self) -> AnyResult<Arc<dyn DistributedEngine>> {
        Ok(HttpDistributedEngine::shared(&self.config)?)
    }

    fn start_inspector(&self) -> AnyResult<Inspector> {
        Ok(Inspector::start(self.config.inspector_history))
    }
}

/// Reference to the workspace a process ended up with after bootstrap.
pub enum WorkspaceHandle {
    Local {
        engine: Arc<dyn WorkspaceEngine>,
        name: String,
        inspector: Option<Inspector>,
    },
    Infrastructure {
        engine: Arc<dyn DistributedEngine>,
        name: String,
        port: u16,
        inspector: Option<Inspector>,
    },
    /// Resolved when an agent asks for a session.
    Remote { uri: Url },
    /// Setup failed under the lenient policy.
    Unavailable {
        mode: DeploymentMode,
        reason: String,
    },
}

impl WorkspaceHandle {
    pub fn mode(&self) -> DeploymentMode {
        match self {
            WorkspaceHandle::Local { .. } => DeploymentMode::Standalone,
            WorkspaceHandle::Infrastructure { .. } => DeploymentMode::Infrastructure,
            WorkspaceHandle::Remote { .. } => DeploymentMode::Remote,
            WorkspaceHandle::Unavailable { mode, .. } => *mode,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, WorkspaceHandle::Unavailable { .. })
    }

    pub fn inspector(&self) -> Option<&Inspector> {
        match self {
            WorkspaceHandle::Local { inspector, .. }
            | WorkspaceHandle::Infrastructure { inspector, .. } => inspector.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for WorkspaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceHandle::Local {
                name, inspector, ..
            } => f
                .debug_struct("Local")
                .field("name", name)
                .field("inspected", &inspector.is_some())
                .finish(),
            WorkspaceHandle::Infrastructure {
                name,
                port,
                inspector,
                ..
            } => f
                .debug_struct("Infrastructure")
                .field("name", name)
                .field("port", port)
                .field("inspected", &inspector.is_some())
                .finish(),
            WorkspaceHandle::Remote { uri } => {
                f.debug_struct("Remote").field("uri", &uri.as_str()).finish()
            }
            WorkspaceHandle::Unavailable { mode, reason } => f
                .debug_struct("Unavailable")
                .field("mode", mode)
                .field("reason", reason)
                .finish(),
        }
    }
}

pub struct Bootstrapper {
    provider: Arc<dyn EngineProvider>,
    policy: BootstrapPolicy,
}

impl Bootstrapper {
    pub fn new(provider: Arc<dyn EngineProvider>, policy: BootstrapPolicy) -> Self {
        Self { provider, policy }
    }

    pub async fn bootstrap(
        &self,
        mode: DeploymentMode,
        identity: &WorkspaceIdentity,
        debug: bool,
    ) -> Result<WorkspaceHandle> {
        let outcome = match mode {
            DeploymentMode::Standalone => self.standalone(identity, debug).await,
            DeploymentMode::Infrastructure => self.infrastructure(identity, debug).await,
            DeploymentMode::Remote => Self::remote(identity),
        };

        match outcome {
            Err(Error::Bootstrap { mode, reason }) if self.policy == BootstrapPolicy::Lenient => {
                log::error!("{} setup failed, continuing without a workspace: {}", mode, reason);
                Ok(WorkspaceHandle::Unavailable { mode, reason })
            }
            other => other,
        }
    }

    async fn standalone(&self, identity: &WorkspaceIdentity, debug: bool) -> Result<WorkspaceHandle> {
        let mode = DeploymentMode::Standalone;
        let engine = self
            .provider
            .local_engine()
            .map_err(|e| Error::bootstrap(mode, e))?;
        let inspector = self.inspector(mode, debug)?;

        engine
            .initialize_workspace(&identity.name, inspector.as_ref().map(Inspector::log_sink))
            .await
            .map_err(|e| Error::bootstrap(mode, e))?;

        log::info!("Standalone workspace {} created", identity.name);
        Ok(WorkspaceHandle::Local {
            engine,
            name: identity.name.clone(),
            inspector,
        })
    }

    async fn infrastructure(
        &self,
        identity: &WorkspaceIdentity,
        debug: bool,
    ) -> Result<WorkspaceHandle> {
        let mode = DeploymentMode::Infrastructure;
        let engine = self
            .provider
            .distributed_engine()
            .map_err(|e| Error::bootstrap(mode, e))?;
        let inspector = self.inspector(mode, debug)?;

        engine
            .initialize_workspace(
                &identity.name,
                identity.port,
                inspector.as_ref().map(Inspector::log_sink),
            )
            .await
            .map_err(|e| Error::bootstrap(mode, format!("{:#}", e)))?;

        log::info!(
            "Workspace {} on port {} spawned",
            identity.name,
            identity.port
        );
        Ok(WorkspaceHandle::Infrastructure {
            engine,
            name: identity.name.clone(),
            port: identity.port,
            inspector,
        })
    }

    fn remote(identity: &WorkspaceIdentity) -> Result<WorkspaceHandle> {
        let uri = identity.uri.clone().ok_or_else(|| {
            Error::InvalidArgument("remote mode requires -wspURI <uri>".to_string())
        })?;
        log::info!("Remote workspace at {} will be joined on demand", uri);
        Ok(WorkspaceHandle::Remote { uri })
    }

    fn inspector(&self, mode: DeploymentMode, debug: bool) -> Result<Option<Inspector>> {
        if !debug {
            return Ok(None);
        }
        self.provider
            .start_inspector()
            .map(Some)
            .map_err(|e| Error::bootstrap(mode, e))
    }
}
