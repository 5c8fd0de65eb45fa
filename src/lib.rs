//! mkcli - authentication and context management for the managed Kubernetes CLI
//!
//! Keeps named connection profiles ("contexts") in a persisted catalogue and
//! turns the active one into an `Authorization` header, renewing OpenID
//! tokens through a refresh or a browser login as needed.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod session;

pub use error::{Error, Result};
