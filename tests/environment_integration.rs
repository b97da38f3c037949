//! Integration tests for workspace bootstrap and session brokering
//!
//! Covers:
//! - Mode dispatch: exactly one bootstrap path per mode
//! - Identity resolution from the command line
//! - Local and remote joins through an initialized environment
//! - Shutdown ordering and ownership of network resources

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use agentspace::bootstrap::EngineProvider;
use agentspace::config::{BootstrapPolicy, Config};
use agentspace::engine::{DistributedEngine, HttpDistributedEngine, LocalEngine, WorkspaceEngine};
use agentspace::inspector::{Inspector, LogSink};
use agentspace::types::{AgentArch, AgentCredential, AgentSession, DeploymentMode, SessionEndpoint};
use agentspace::{Environment, ErrorKind};

#[derive(Default)]
struct Calls {
    local_inits: Vec<(String, bool)>,
    network_inits: Vec<(String, u16, bool)>,
    local_closes: Vec<String>,
    remote_joins: Vec<(String, String)>,
    shutdowns: usize,
    order: Vec<&'static str>,
}

/// Local engine that records initialization calls
struct RecordingLocal {
    inner: LocalEngine,
    calls: Arc<Mutex<Calls>>,
    fail: bool,
}

#[async_trait]
impl WorkspaceEngine for RecordingLocal {
    async fn initialize_workspace(&self, name: &str, sink: Option<LogSink>) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .local_inits
            .push((name.to_string(), sink.is_some()));
        if self.fail {
            return Err(anyhow!("engine offline"));
        }
        self.inner.initialize_workspace(name, sink).await
    }

    async fn start_session(
        &self,
        workspace: &str,
        credential: &AgentCredential,
        arch: &AgentArch,
    ) -> Result<AgentSession> {
        self.inner.start_session(workspace, credential, arch).await
    }

    async fn end_session(&self, workspace: &str, agent: &str) -> Result<()> {
        self.inner.end_session(workspace, agent).await
    }

    async fn close_workspace(&self, name: &str) -> Result<()> {
        self.calls.lock().unwrap().local_closes.push(name.to_string());
        self.inner.close_workspace(name).await
    }

    async fn workspaces(&self) -> Result<Vec<String>> {
        self.inner.workspaces().await
    }
}

/// Distributed engine that records calls and answers remote joins from a
/// canned decision
struct RecordingDistributed {
    hosting: Arc<LocalEngine>,
    calls: Arc<Mutex<Calls>>,
    fail: bool,
    accept_remote: bool,
}

#[async_trait]
impl DistributedEngine for RecordingDistributed {
    async fn initialize_workspace(
        &self,
        name: &str,
        port: u16,
        sink: Option<LogSink>,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .network_inits
            .push((name.to_string(), port, sink.is_some()));
        if self.fail {
            return Err(anyhow!("port {} in use", port));
        }
        self.hosting.initialize_workspace(name, sink).await
    }

    async fn start_session(
        &self,
        uri: &Url,
        credential: &AgentCredential,
        arch: &AgentArch,
    ) -> Result<AgentSession> {
        self.calls
            .lock()
            .unwrap()
            .remote_joins
            .push((uri.to_string(), credential.agent_name.clone()));
        if !self.accept_remote {
            return Err(anyhow!("credential rejected"));
        }
        Ok(AgentSession::new("wsp1", credential, arch.clone())
            .with_endpoint(SessionEndpoint::Remote { uri: uri.clone() }))
    }

    async fn end_session(&self, _session: &AgentSession) -> Result<()> {
        Ok(())
    }

    fn hosting_engine(&self) -> Arc<dyn WorkspaceEngine> {
        self.hosting.clone()
    }

    async fn shutdown(&self) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        calls.shutdowns += 1;
        calls.order.push("shutdown");
        Ok(())
    }
}

struct RecordingEngines {
    calls: Arc<Mutex<Calls>>,
    local: Arc<RecordingLocal>,
    distributed: Arc<RecordingDistributed>,
}

impl RecordingEngines {
    fn new() -> Self {
        Self::build(false, true)
    }

    fn build(fail_setup: bool, accept_remote: bool) -> Self {
        let calls = Arc::new(Mutex::new(Calls::default()));
        Self {
            local: Arc::new(RecordingLocal {
                inner: LocalEngine::new(),
                calls: calls.clone(),
                fail: fail_setup,
            }),
            distributed: Arc::new(RecordingDistributed {
                hosting: Arc::new(LocalEngine::new()),
                calls: calls.clone(),
                fail: fail_setup,
                accept_remote,
            }),
            calls,
        }
    }
}

impl EngineProvider for RecordingEngines {
    fn local_engine(&self) -> Result<Arc<dyn WorkspaceEngine>> {
        Ok(self.local.clone())
    }

    fn distributed_engine(&self) -> Result<Arc<dyn DistributedEngine>> {
        Ok(self.distributed.clone())
    }

    fn start_inspector(&self) -> Result<Inspector> {
        Ok(Inspector::start(16))
    }
}

fn environment(engines: RecordingEngines, policy: BootstrapPolicy) -> (Environment, Arc<Mutex<Calls>>) {
    let calls = engines.calls.clone();
    let config = Config {
        bootstrap_policy: policy,
        ..Config::default()
    };
    (Environment::with_provider(Arc::new(engines), config), calls)
}

#[tokio::test]
async fn test_standalone_invokes_only_local_path() {
    let (mut env, calls) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize::<&str>(&[]).await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.local_inits, vec![("main".to_string(), false)]);
    assert!(calls.network_inits.is_empty());
    assert_eq!(env.mode(), Some(DeploymentMode::Standalone));
}

#[tokio::test]
async fn test_infrastructure_scenario() {
    let (mut env, calls) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize(&["infrastructure", "-name", "wsp1", "-port", "3010"])
        .await
        .unwrap();

    let identity = env.identity().unwrap();
    assert_eq!(identity.name, "wsp1");
    assert_eq!(identity.port, 3010);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.network_inits, vec![("wsp1".to_string(), 3010, false)]);
    assert!(calls.local_inits.is_empty());
    assert!(env.owns_network_resource());
}

#[tokio::test]
async fn test_remote_scenario() {
    let (mut env, calls) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize(&["remote", "-wspURI", "tcp://10.0.0.2:3020/wsp1"])
        .await
        .unwrap();

    assert_eq!(env.mode(), Some(DeploymentMode::Remote));
    {
        let calls = calls.lock().unwrap();
        assert!(calls.local_inits.is_empty());
        assert!(calls.network_inits.is_empty());
    }

    let uri = env.workspace_uri().unwrap().clone();
    let session = env
        .join_remote(&uri, "a1", &AgentArch::default())
        .await
        .unwrap();

    assert!(session.is_remote());
    assert_eq!(
        calls.lock().unwrap().remote_joins,
        vec![("tcp://10.0.0.2:3020/wsp1".to_string(), "a1".to_string())]
    );
}

#[tokio::test]
async fn test_remote_join_rejected_by_collaborator() {
    let (mut env, _) = environment(RecordingEngines::build(false, false), BootstrapPolicy::Strict);

    env.initialize(&["remote", "-wspURI", "tcp://10.0.0.2:3020/wsp1"])
        .await
        .unwrap();

    let err = env.join("a1", &AgentArch::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Session);
    assert!(err.to_string().contains("credential rejected"));
}

#[tokio::test]
async fn test_debug_passes_inspector_sink() {
    let (mut env, calls) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize(&["standalone", "-debug"]).await.unwrap();
    env.join_local("a1", &AgentArch::default()).await.unwrap();

    assert_eq!(calls.lock().unwrap().local_inits, vec![("main".to_string(), true)]);
    assert_eq!(env.inspector().unwrap().history().len(), 2);
}

#[tokio::test]
async fn test_join_local_after_initialize() {
    let (mut env, _) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    let err = env.join_local("a1", &AgentArch::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);

    env.initialize(&["standalone"]).await.unwrap();
    let session = env.join_local("a1", &AgentArch::new("bdi")).await.unwrap();

    assert_eq!(session.agent, "a1");
    assert_eq!(session.workspace, "main");
    assert_eq!(session.arch.kind, "bdi");
}

#[tokio::test]
async fn test_infrastructure_agents_join_hosted_workspace() {
    let (mut env, _) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize(&["infrastructure", "-name", "wsp1"]).await.unwrap();
    let session = env.join("a1", &AgentArch::default()).await.unwrap();

    assert_eq!(session.workspace, "wsp1");
    assert!(!session.is_remote());
}

#[tokio::test]
async fn test_strict_bootstrap_failure_aborts_initialize() {
    let (mut env, _) = environment(RecordingEngines::build(true, true), BootstrapPolicy::Strict);

    let err = env.initialize(&["standalone"]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Bootstrap);
    assert!(!env.is_running());
}

#[tokio::test]
async fn test_lenient_bootstrap_failure_surfaces_on_join() {
    let (mut env, _) = environment(RecordingEngines::build(true, true), BootstrapPolicy::Lenient);

    env.initialize(&["standalone"]).await.unwrap();
    assert!(env.is_running());
    assert!(!env.handle().unwrap().is_available());

    let err = env.join_local("a1", &AgentArch::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Session);
}

#[tokio::test]
async fn test_stop_standalone_never_shuts_down_network() {
    let (mut env, calls) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize(&["standalone"]).await.unwrap();
    env.stop().await;

    {
        let calls = calls.lock().unwrap();
        assert_eq!(calls.shutdowns, 0);
        assert_eq!(calls.local_closes, vec!["main".to_string()]);
    }
    let err = env.join_local("a1", &AgentArch::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

#[tokio::test]
async fn test_stop_remote_never_shuts_down_network() {
    let (mut env, calls) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize(&["remote", "-wspURI", "tcp://10.0.0.2:3020/wsp1"])
        .await
        .unwrap();
    env.stop().await;

    assert_eq!(calls.lock().unwrap().shutdowns, 0);
}

#[tokio::test]
async fn test_stop_infrastructure_shuts_down_once_after_teardown() {
    let (mut env, calls) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);

    env.initialize(&["infrastructure"]).await.unwrap();
    let hook_calls = calls.clone();
    env.register_teardown(move || hook_calls.lock().unwrap().order.push("teardown"));

    env.stop().await;
    env.stop().await;

    let calls = calls.lock().unwrap();
    assert_eq!(calls.shutdowns, 1);
    assert_eq!(calls.order, vec!["teardown", "shutdown"]);
}

#[tokio::test]
async fn test_stop_infrastructure_after_lenient_failure() {
    let (mut env, calls) = environment(RecordingEngines::build(true, true), BootstrapPolicy::Lenient);

    env.initialize(&["infrastructure"]).await.unwrap();
    env.stop().await;

    assert_eq!(calls.lock().unwrap().shutdowns, 1);
}

#[tokio::test]
async fn test_concurrent_joins() {
    let (mut env, _) = environment(RecordingEngines::new(), BootstrapPolicy::Strict);
    env.initialize(&["standalone"]).await.unwrap();
    let env = Arc::new(env);

    let mut handles = Vec::new();
    for i in 0..8 {
        let env = env.clone();
        // Two attempts per agent name
        let name = format!("agent-{}", i / 2);
        handles.push(tokio::spawn(async move {
            env.join_local(&name, &AgentArch::default()).await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let joined = results
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|r| r.is_ok())
        .count();

    assert_eq!(joined, 4);
}

/// Provider wiring a real HTTP engine so the network path runs end to end
struct NetworkEngines {
    engine: Arc<HttpDistributedEngine>,
}

impl EngineProvider for NetworkEngines {
    fn local_engine(&self) -> Result<Arc<dyn WorkspaceEngine>> {
        Ok(Arc::new(LocalEngine::new()))
    }

    fn distributed_engine(&self) -> Result<Arc<dyn DistributedEngine>> {
        Ok(self.engine.clone())
    }

    fn start_inspector(&self) -> Result<Inspector> {
        Ok(Inspector::start(16))
    }
}

fn network_environment() -> (Environment, Arc<HttpDistributedEngine>) {
    network_environment_with(Config {
        join_timeout_secs: 5,
        bind_host: "127.0.0.1".to_string(),
        ..Config::default()
    })
}

fn network_environment_with(config: Config) -> (Environment, Arc<HttpDistributedEngine>) {
    let engine = Arc::new(HttpDistributedEngine::new(&config).unwrap());
    let provider = Arc::new(NetworkEngines {
        engine: engine.clone(),
    });
    (Environment::with_provider(provider, config), engine)
}

#[tokio::test]
async fn test_infrastructure_and_remote_over_http() {
    let (mut host, host_engine) = network_environment();
    host.initialize(&["infrastructure", "-name", "wsp1", "-port", "0", "-debug"])
        .await
        .unwrap();
    let addr = host_engine.bound_addr(0).await.unwrap();

    let uri = format!("tcp://127.0.0.1:{}/wsp1", addr.port());
    let (mut client, _) = network_environment();
    client
        .initialize(&["remote", "-wspURI", uri.as_str()])
        .await
        .unwrap();

    let session = client.join("a1", &AgentArch::new("bdi")).await.unwrap();
    assert_eq!(session.workspace, "wsp1");
    assert!(session.is_remote());

    let err = client.join("a1", &AgentArch::new("bdi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Session);

    client.leave(&session).await.unwrap();
    host.join_local("a1", &AgentArch::default()).await.unwrap();

    let history = host.inspector().unwrap().history();
    assert_eq!(history.len(), 4);

    client.stop().await;
    host.stop().await;
    assert!(host_engine.bound_addr(0).await.is_none());
}

#[tokio::test]
async fn test_remote_join_times_out_on_silent_node() {
    // Accepts connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let (mut client, _) = network_environment_with(Config {
        join_timeout_secs: 1,
        ..Config::default()
    });
    let uri = format!("tcp://127.0.0.1:{}/wsp1", port);
    client
        .initialize(&["remote", "-wspURI", uri.as_str()])
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        client.join("a1", &AgentArch::default()),
    )
    .await
    .expect("join should give up on its own");

    assert_eq!(outcome.unwrap_err().kind(), ErrorKind::Session);
    assert!(started.elapsed() < Duration::from_secs(5));

    silent.abort();
}

#[tokio::test]
async fn test_standalone_workspace_released_for_next_context() {
    let engines = Arc::new(RecordingEngines::new());
    let local = engines.local.clone();

    let mut first = Environment::with_provider(engines.clone(), Config::default());
    first.initialize(&["standalone", "-name", "wsp1"]).await.unwrap();
    first.stop().await;
    assert!(local.inner.workspaces().await.unwrap().is_empty());

    let mut second = Environment::with_provider(engines, Config::default());
    second.initialize(&["standalone", "-name", "wsp1"]).await.unwrap();
    assert!(second.join_local("a1", &AgentArch::default()).await.is_ok());
}
