use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::{DEFAULT_PORT, DEFAULT_WORKSPACE_NAME};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::types::{DeploymentMode, WorkspaceIdentity};

/// Resolves which workspace this process creates, exposes or joins.
pub fn locate(mode: DeploymentMode, options: &Options) -> Result<WorkspaceIdentity> {
    let mut identity = WorkspaceIdentity {
        name: options
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_WORKSPACE_NAME.to_string()),
        port: options.port.unwrap_or(DEFAULT_PORT),
        uri: options.workspace_uri.clone(),
    };

    if mode == DeploymentMode::Remote {
        let uri = identity.uri.as_ref().ok_or_else(|| {
            Error::InvalidArgument("remote mode requires -wspURI <uri>".to_string())
        })?;
        let (name, port) = workspace_from_uri(uri);
        if let Some(name) = name {
            identity.name = name;
        }
        if let Some(port) = port {
            identity.port = port;
        }
    }

    Ok(identity)
}

/// Extracts the workspace name (first path segment, percent-decoded) and
/// port from a workspace URI such as `tcp://host:3020/wsp1`.
pub fn workspace_from_uri(uri: &Url) -> (Option<String>, Option<u16>) {
    let name = uri
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(|segment| match percent_decode_str(segment).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => segment.to_string(),
        });
    (name, uri.port())
}
