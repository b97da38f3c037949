pub mod api;
pub mod bootstrap;
pub mod broker;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod inspector;
pub mod locator;
pub mod options;
pub mod types;

pub use config::Config;
pub use environment::Environment;
pub use error::{Error, ErrorKind, Result};
pub use types::*;
