use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use super::{DistributedEngine, LocalEngine, WorkspaceEngine};
use crate::api::{self, ApiErrorResponse, AppState, JoinRequest};
use crate::config::{Config, DEFAULT_PORT, DEFAULT_WORKSPACE_NAME};
use crate::inspector::LogSink;
use crate::locator::workspace_from_uri;
use crate::types::{AgentArch, AgentCredential, AgentSession, SessionEndpoint};

static SHARED: OnceLock<Arc<HttpDistributedEngine>> = OnceLock::new();

const SUPPORTED_SCHEMES: &[&str] = &["tcp", "http"];

struct Listener {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Distributed engine speaking JSON over HTTP. Workspaces it hosts live in
/// an embedded [`LocalEngine`] and are served on one listener per port.
pub struct HttpDistributedEngine {
    hosting: Arc<LocalEngine>,
    client: reqwest::Client,
    bind_host: String,
    listeners: Mutex<HashMap<u16, Listener>>,
}

impl HttpDistributedEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeout(&config.bind_host, config.join_timeout())
    }

    pub fn with_timeout(bind_host: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            hosting: Arc::new(LocalEngine::new()),
            client,
            bind_host: bind_host.to_string(),
            listeners: Mutex::new(HashMap::new()),
        })
    }

    /// The process-wide engine. The configuration of the first caller wins.
    pub fn shared(config: &Config) -> Result<Arc<HttpDistributedEngine>> {
        if let Some(engine) = SHARED.get() {
            return Ok(engine.clone());
        }
        let engine = Arc::new(Self::new(config)?);
        Ok(SHARED.get_or_init(|| engine).clone())
    }

    /// Address actually bound for a requested port. Differs from the request
    /// when port 0 asked the OS to pick one.
    pub async fn bound_addr(&self, port: u16) -> Option<SocketAddr> {
        self.listeners.lock().await.get(&port).map(|l| l.addr)
    }

    async fn listen(&self, port: u16) -> Result<Listener> {
        let listener = TcpListener::bind((self.bind_host.as_str(), port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", self.bind_host, port))?;
        let addr = listener.local_addr()?;

        let state = AppState {
            engine: self.hosting.clone() as Arc<dyn WorkspaceEngine>,
        };
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let stopped = async move {
                let _ = signal.await;
            };
            if let Err(e) = api::serve_until(listener, state, stopped).await {
                log::error!("Workspace node on {} stopped with error: {}", addr, e);
            }
        });

        Ok(Listener {
            addr,
            shutdown,
            task,
        })
    }
}

/// Maps a workspace URI (`tcp://host:port/name`) to the session endpoint of
/// the node hosting it.
pub fn sessions_endpoint(uri: &Url) -> Result<Url> {
    if !SUPPORTED_SCHEMES.contains(&uri.scheme()) {
        bail!("unsupported workspace URI scheme {}", uri.scheme());
    }
    let host = uri
        .host_str()
        .ok_or_else(|| anyhow!("workspace URI {} has no host", uri))?;
    let (name, port) = workspace_from_uri(uri);
    let name = name.unwrap_or_else(|| DEFAULT_WORKSPACE_NAME.to_string());
    let port = port.unwrap_or(DEFAULT_PORT);

    let mut endpoint = Url::parse(&format!("http://{}:{}/", host, port))
        .with_context(|| format!("Invalid workspace address in {}", uri))?;
    endpoint
        .path_segments_mut()
        .map_err(|_| anyhow!("workspace URI {} cannot carry a path", uri))?
        .pop_if_empty()
        .extend(["workspaces", name.as_str(), "sessions"]);
    Ok(endpoint)
}

async fn remote_failure(response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    match response.json::<ApiErrorResponse>().await {
        Ok(body) => anyhow!("{} ({})", body.error.message, status),
        Err(_) => anyhow!("workspace node answered {}", status),
    }
}

#[async_trait]
impl DistributedEngine for HttpDistributedEngine {
    async fn initialize_workspace(
        &self,
        name: &str,
        port: u16,
        sink: Option<LogSink>,
    ) -> Result<()> {
        let mut listeners = self.listeners.lock().await;
        let newly_bound = !listeners.contains_key(&port);
        if newly_bound {
            let listener = self.listen(port).await?;
            listeners.insert(port, listener);
        }

        if let Err(e) = self.hosting.initialize_workspace(name, sink).await {
            if newly_bound {
                if let Some(listener) = listeners.remove(&port) {
                    let _ = listener.shutdown.send(());
                    if let Err(join_err) = listener.task.await {
                        log::warn!("Listener on port {} did not stop cleanly: {}", port, join_err);
                    }
                }
            }
            return Err(e);
        }

        Ok(())
    }

    async fn start_session(
        &self,
        uri: &Url,
        credential: &AgentCredential,
        arch: &AgentArch,
    ) -> Result<AgentSession> {
        let endpoint = sessions_endpoint(uri)?;
        let request = JoinRequest {
            agent: credential.agent_name.clone(),
            arch: arch.clone(),
        };

        let response = self
            .client
            .post(endpoint.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Workspace at {} is unreachable", uri))?;

        if !response.status().is_success() {
            return Err(remote_failure(response).await);
        }

        let session: AgentSession = response
            .json()
            .await
            .with_context(|| format!("Malformed session from {}", endpoint))?;
        Ok(session.with_endpoint(SessionEndpoint::Remote { uri: uri.clone() }))
    }

    async fn end_session(&self, session: &AgentSession) -> Result<()> {
        let uri = match &session.endpoint {
            SessionEndpoint::Local => {
                return self
                    .hosting
                    .end_session(&session.workspace, &session.agent)
                    .await
            }
            SessionEndpoint::Remote { uri } => uri,
        };

        let mut endpoint = sessions_endpoint(uri)?;
        endpoint
            .path_segments_mut()
            .map_err(|_| anyhow!("workspace URI {} cannot carry a path", uri))?
            .push(&session.agent);

        let response = self
            .client
            .delete(endpoint)
            .send()
            .await
            .with_context(|| format!("Workspace at {} is unreachable", uri))?;

        if !response.status().is_success() {
            return Err(remote_failure(response).await);
        }
        Ok(())
    }

    fn hosting_engine(&self) -> Arc<dyn WorkspaceEngine> {
        self.hosting.clone()
    }

    async fn shutdown(&self) -> Result<()> {
        let drained: Vec<(u16, Listener)> = self.listeners.lock().await.drain().collect();
        let mut failures = Vec::new();

        for (port, listener) in drained {
            let _ = listener.shutdown.send(());
            if let Err(e) = listener.task.await {
                failures.push(format!("port {}: {}", port, e));
            }
        }

        self.hosting.clear()?;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "listeners did not stop cleanly: {}",
                failures.join(", ")
            ))
        }
    }
}
