use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::SessionId;

/// Identity an agent presents when asking a workspace for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentCredential {
    pub agent_name: String,
}

impl AgentCredential {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }
}

/// Descriptor of the architecture driving an agent. Passed through to the
/// engine untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentArch {
    pub kind: String,
}

impl AgentArch {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl Default for AgentArch {
    fn default() -> Self {
        Self::new("default")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEndpoint {
    Local,
    Remote { uri: Url },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: SessionId,
    pub agent: String,
    pub workspace: String,
    pub arch: AgentArch,
    pub endpoint: SessionEndpoint,
    pub started_at: DateTime<Utc>,
}

impl AgentSession {
    pub fn new(workspace: impl Into<String>, credential: &AgentCredential, arch: AgentArch) -> Self {
        Self {
            id: SessionId::new_v4(),
            agent: credential.agent_name.clone(),
            workspace: workspace.into(),
            arch,
            endpoint: SessionEndpoint::Local,
            started_at: Utc::now(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: SessionEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.endpoint, SessionEndpoint::Remote { .. })
    }
}
