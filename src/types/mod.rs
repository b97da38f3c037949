pub mod session;
pub mod workspace;

pub use session::{AgentArch, AgentCredential, AgentSession, SessionEndpoint};
pub use workspace::{WorkspaceEvent, WorkspaceIdentity};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Standalone,     // Local workspace, not reachable from other processes
    Infrastructure, // Local workspace exposed on the network
    Remote,         // Workspace owned by another process
}

impl DeploymentMode {
    pub fn as_str(&self) -> &str {
        match self {
            DeploymentMode::Standalone => "standalone",
            DeploymentMode::Infrastructure => "infrastructure",
            DeploymentMode::Remote => "remote",
        }
    }

    /// Case-sensitive match against the mode keywords accepted on the command line.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "standalone" => Some(DeploymentMode::Standalone),
            "infrastructure" => Some(DeploymentMode::Infrastructure),
            "remote" => Some(DeploymentMode::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
