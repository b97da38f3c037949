use url::Url;

use crate::error::{Error, Result};
use crate::types::DeploymentMode;

pub const FLAG_PREFIX: char = '-';

const DEBUG_FLAG: &str = "-debug";
const NAME_FLAG: &str = "-name";
const PORT_FLAG: &str = "-port";
const URI_FLAG: &str = "-wspURI";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub debug: bool,
    pub name: Option<String>,
    pub port: Option<u16>,
    pub workspace_uri: Option<Url>,
}

/// Splits a raw argument vector into the deployment mode and its options.
///
/// Only the first token can name the mode, and only when it is not a flag.
/// Flags may appear anywhere. A value flag in last position has no value and
/// is ignored. Value tokens are not consumed, so `-name -debug` both sets the
/// name to `-debug` and turns debugging on.
pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<(DeploymentMode, Options)> {
    let mode = match args.first().map(|s| s.as_ref()) {
        Some(first) if !first.starts_with(FLAG_PREFIX) => DeploymentMode::from_keyword(first)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown mode {} (expected standalone, infrastructure or remote)",
                    first
                ))
            })?,
        _ => DeploymentMode::Standalone,
    };

    let mut options = Options::default();
    let mut raw_port: Option<&str> = None;
    let mut raw_uri: Option<&str> = None;

    for (i, token) in args.iter().enumerate() {
        let value = args.get(i + 1).map(|s| s.as_ref());
        match token.as_ref() {
            DEBUG_FLAG => options.debug = true,
            NAME_FLAG => {
                if options.name.is_none() {
                    options.name = value.map(str::to_string);
                }
            }
            PORT_FLAG => raw_port = raw_port.or(value),
            URI_FLAG => raw_uri = raw_uri.or(value),
            _ => {}
        }
    }

    if let Some(raw) = raw_port {
        let port = raw
            .parse::<u16>()
            .map_err(|_| Error::InvalidArgument(format!("invalid port {}", raw)))?;
        options.port = Some(port);
    }

    if let Some(raw) = raw_uri {
        let uri = Url::parse(raw).map_err(|e| Error::InvalidUri {
            raw: raw.to_string(),
            reason: e.to_string(),
        })?;
        options.workspace_uri = Some(uri);
    }

    Ok((mode, options))
}
