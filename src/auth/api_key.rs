//! Static API key authentication

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use super::{authorization_header, Authenticate};
use crate::context::Context;
use crate::error::{Error, Result};

pub struct ApiKeyAdapter {
    ctx: Context,
    env_var: String,
    api_key: Option<String>,
}

impl ApiKeyAdapter {
    /// Use the context's key, or the one in `env_var` if the context has none.
    pub fn new(ctx: Context, env_var: impl Into<String>) -> Self {
        let env_var = env_var.into();
        let api_key = ctx
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                let key = std::env::var(&env_var).ok().filter(|k| !k.is_empty());
                if key.is_some() {
                    tracing::debug!("Using API key from ${}", env_var);
                }
                key
            });

        Self {
            ctx,
            env_var,
            api_key,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn into_context(self) -> Context {
        self.ctx
    }

    fn key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::authorization(format!(
                "no API key in context '{}' and ${} is not set",
                self.ctx.name, self.env_var
            ))
        })
    }
}

#[async_trait]
impl Authenticate for ApiKeyAdapter {
    async fn get_auth_header(&mut self) -> Result<HeaderMap> {
        let key = self.key()?;
        authorization_header(&format!("Token {key}"))
    }

    /// API keys are opaque to the client; only presence is checked.
    async fn validate(&mut self) -> Result<()> {
        self.key().map(|_| ())
    }
}
