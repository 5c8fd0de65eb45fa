//! Authentication for control-plane API calls
//!
//! A context is turned into an [`AuthAdapter`], which produces the
//! `Authorization` header for every outbound request. API-key contexts send
//! a static key; OpenID contexts keep a token pair fresh, refreshing it
//! silently or running a browser login through a local redirect listener.

pub mod api_key;
pub mod browser;
pub mod callback;
pub mod oauth;
pub mod openid;
pub mod token;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

pub use api_key::ApiKeyAdapter;
pub use browser::{Browser, SystemBrowser};
pub use callback::{wait_until, CallbackListener, CallbackState};
pub use oauth::{AuthorizationUrl, IdentityProvider, KeycloakProvider};
pub use openid::OpenIdAdapter;
pub use token::{Token, TokenExchange};

use crate::context::Context;
use crate::error::{Error, Result};

/// How a context authenticates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthType {
    #[serde(rename = "api_key")]
    ApiKey,
    #[default]
    #[serde(rename = "openid")]
    OpenId,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::OpenId => "openid",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "api_key" => Ok(Self::ApiKey),
            "openid" => Ok(Self::OpenId),
            other => Err(Error::UnsupportedAuthType(other.to_string())),
        }
    }
}

/// Capability every adapter offers to the API client.
#[async_trait]
pub trait Authenticate: Send {
    /// Headers to attach to one outbound request. May renew credentials.
    async fn get_auth_header(&mut self) -> Result<HeaderMap>;

    /// Fail with [`Error::Authorization`] unless a usable credential exists.
    async fn validate(&mut self) -> Result<()>;
}

/// One of the supported authentication schemes.
pub enum AuthAdapter {
    ApiKey(ApiKeyAdapter),
    OpenId(OpenIdAdapter),
}

impl AuthAdapter {
    pub fn context(&self) -> &Context {
        match self {
            Self::ApiKey(a) => a.context(),
            Self::OpenId(a) => a.context(),
        }
    }

    /// The context, including any token renewed while authenticating.
    pub fn into_context(self) -> Context {
        match self {
            Self::ApiKey(a) => a.into_context(),
            Self::OpenId(a) => a.into_context(),
        }
    }
}

#[async_trait]
impl Authenticate for AuthAdapter {
    async fn get_auth_header(&mut self) -> Result<HeaderMap> {
        match self {
            Self::ApiKey(a) => a.get_auth_header().await,
            Self::OpenId(a) => a.get_auth_header().await,
        }
    }

    async fn validate(&mut self) -> Result<()> {
        match self {
            Self::ApiKey(a) => a.validate().await,
            Self::OpenId(a) => a.validate().await,
        }
    }
}

/// Single `Authorization` header, marked sensitive so it is redacted in
/// debug output.
pub(crate) fn authorization_header(value: &str) -> Result<HeaderMap> {
    let mut value = HeaderValue::from_str(value).map_err(|_| {
        Error::authorization("credential contains characters not allowed in an HTTP header")
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}
