//! Error taxonomy shared by the auth core and the context catalogue

use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable credential could be produced.
    #[error("{0}")]
    Authorization(String),

    #[error("context '{name}' not found (available: {})", list(.available))]
    ContextNotFound { name: String, available: Vec<String> },

    #[error("no active context (available: {})", list(.available))]
    NoActiveSession { available: Vec<String> },

    /// The active context cannot be deleted before switching away from it.
    #[error("context '{0}' is the active context; switch to another one first")]
    ActiveContext(String),

    #[error("context '{0}' already exists")]
    ContextExists(String),

    #[error("no context storage at {}", .0.display())]
    EmptyStorage(PathBuf),

    #[error("invalid context file layout in {location}: {reason}")]
    InvalidFileLayout { location: String, reason: String },

    #[error("callback listener at {addr} not ready after {timeout:?}")]
    ListenerNotReady { addr: String, timeout: Duration },

    #[error("no authorization callback received within {timeout:?}")]
    CallbackTimeout { timeout: Duration },

    #[error("identity provider error: {0}")]
    IdentityProvider(String),

    #[error("unsupported auth type '{0}'")]
    UnsupportedAuthType(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// True for failures of the persisted catalogue rather than of credentials.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::EmptyStorage(_) | Self::InvalidFileLayout { .. })
    }
}

fn list(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
