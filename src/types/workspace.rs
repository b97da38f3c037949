use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{DEFAULT_PORT, DEFAULT_WORKSPACE_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceIdentity {
    pub name: String,
    pub port: u16,
    pub uri: Option<Url>,
}

impl Default for WorkspaceIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORKSPACE_NAME.to_string(),
            port: DEFAULT_PORT,
            uri: None,
        }
    }
}

/// Activity inside a workspace, reported to an attached log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkspaceEvent {
    WorkspaceCreated {
        workspace: String,
        at: DateTime<Utc>,
    },
    AgentJoined {
        workspace: String,
        agent: String,
        at: DateTime<Utc>,
    },
    AgentLeft {
        workspace: String,
        agent: String,
        at: DateTime<Utc>,
    },
}

impl WorkspaceEvent {
    pub fn workspace(&self) -> &str {
        match self {
            WorkspaceEvent::WorkspaceCreated { workspace, .. }
            | WorkspaceEvent::AgentJoined { workspace, .. }
            | WorkspaceEvent::AgentLeft { workspace, .. } => workspace,
        }
    }
}
