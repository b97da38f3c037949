use crate::types::DeploymentMode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid workspace URI {raw}: {reason}")]
    InvalidUri { raw: String, reason: String },

    #[error("{mode} setup failed: {reason}")]
    Bootstrap { mode: DeploymentMode, reason: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidUri,
    Bootstrap,
    Session,
    IllegalState,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::InvalidUri { .. } => ErrorKind::InvalidUri,
            Error::Bootstrap { .. } => ErrorKind::Bootstrap,
            Error::Session(_) => ErrorKind::Session,
            Error::IllegalState(_) => ErrorKind::IllegalState,
        }
    }

    pub(crate) fn session(message: impl Into<String>) -> Self {
        Error::Session(message.into())
    }

    pub(crate) fn bootstrap(mode: DeploymentMode, reason: impl std::fmt::Display) -> Self {
        Error::Bootstrap {
            mode,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
