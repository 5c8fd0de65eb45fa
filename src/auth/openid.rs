//! OpenID Connect authentication with proactive token renewal
//!
//! Reading the token drives a small state machine:
//!
//! ```text
//! EMPTY    --login-->                VALID
//! VALID    --renew_after passed-->   RENEWING
//! RENEWING --refresh token valid-->  VALID   (silent refresh)
//! RENEWING --refresh token expired--> login --> VALID
//! any      --clear-->                EMPTY
//! ```
//!
//! A failed login or refresh propagates and leaves the stored token as it was.

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use super::browser::{Browser, SystemBrowser};
use super::callback::{wait_until, CallbackListener};
use super::oauth::{IdentityProvider, KeycloakProvider};
use super::token::{Token, TokenExchange};
use super::{authorization_header, Authenticate};
use crate::config::CallbackSettings;
use crate::context::Context;
use crate::error::{Error, Result};

pub struct OpenIdAdapter {
    ctx: Context,
    provider: Box<dyn IdentityProvider>,
    browser: Box<dyn Browser>,
    callback: CallbackSettings,
}

impl OpenIdAdapter {
    /// Adapter talking to the context's Keycloak realm via the system browser.
    pub fn new(ctx: Context, callback: CallbackSettings) -> Self {
        let provider = KeycloakProvider::for_context(&ctx);
        Self {
            ctx,
            provider: Box::new(provider),
            browser: Box::new(SystemBrowser),
            callback,
        }
    }

    pub fn with_provider(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    pub fn with_browser(mut self, browser: impl Browser + 'static) -> Self {
        self.browser = Box::new(browser);
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn into_context(self) -> Context {
        self.ctx
    }

    /// Forget the token locally. Nothing is revoked server-side.
    pub fn clear(&mut self) {
        tracing::info!("Clearing token for context '{}'", self.ctx.name);
        self.ctx.token = Token::default();
    }

    /// Current token, renewed first if it is missing or due for renewal.
    pub async fn token(&mut self) -> Result<&Token> {
        if self.ctx.token.is_empty() {
            tracing::info!("No token for context '{}', logging in", self.ctx.name);
            self.login().await?;
        } else if self.ctx.token.should_renew() {
            if self.ctx.token.is_refresh_valid() {
                self.refresh().await?;
            } else {
                tracing::info!(
                    "Refresh token expired for context '{}', logging in",
                    self.ctx.name
                );
                self.login().await?;
            }
        }
        Ok(&self.ctx.token)
    }

    /// Exchange the refresh token for a new token pair. No browser involved.
    pub async fn refresh(&mut self) -> Result<()> {
        let refresh_token = self
            .ctx
            .token
            .refresh_token
            .clone()
            .ok_or_else(|| Error::authorization("no refresh token available"))?;

        tracing::info!(
            "Renewing token with refresh token for context: {}",
            self.ctx.name
        );
        let exchange = self.provider.refresh(&refresh_token).await?;
        self.install(&exchange);
        Ok(())
    }

    /// Interactive browser login through the local redirect listener.
    ///
    /// The listener is shut down on every path out of here, so a failed
    /// login never leaves the port bound.
    pub async fn login(&mut self) -> Result<()> {
        tracing::info!("Renewing token for context: {}", self.ctx.name);

        let mut listener = CallbackListener::new(&self.callback.host, self.callback.port);
        listener.start().await?;
        let result = self.authorize(&listener).await;
        listener.shutdown().await;

        self.install(&result?);
        Ok(())
    }

    async fn authorize(&self, listener: &CallbackListener) -> Result<TokenExchange> {
        let ready_timeout = self.callback.ready_timeout();
        if !wait_until(|| listener.ready(), ready_timeout, self.callback.ready_poll()).await {
            return Err(Error::ListenerNotReady {
                addr: listener.base_url(),
                timeout: ready_timeout,
            });
        }

        let redirect_uri = listener.redirect_uri();
        let auth = self.provider.auth_url(&redirect_uri, &self.ctx.scope)?;

        if let Err(e) = self.browser.open(&auth.url) {
            tracing::warn!("Could not open a browser: {}", e);
        }
        tracing::info!(
            "Complete the login in your browser. If it did not open, visit: {}",
            auth.url
        );

        let callback_timeout = self.callback.callback_timeout();
        let called = wait_until(
            || std::future::ready(listener.called()),
            callback_timeout,
            self.callback.callback_poll(),
        )
        .await;
        if !called {
            return Err(Error::CallbackTimeout {
                timeout: callback_timeout,
            });
        }

        if let Some(state) = listener.returned_state() {
            if state != auth.csrf_state {
                return Err(Error::IdentityProvider(
                    "authorization callback carried an unexpected state".into(),
                ));
            }
        }
        let code = listener
            .access_code()
            .ok_or_else(|| Error::IdentityProvider("callback carried no code".into()))?;

        self.provider.exchange_code(&code, &redirect_uri).await
    }

    fn install(&mut self, exchange: &TokenExchange) {
        tracing::info!("Setting new token to context: {}", self.ctx.name);
        self.ctx.token = Token::load_from_exchange(exchange);
    }
}

#[async_trait]
impl Authenticate for OpenIdAdapter {
    async fn get_auth_header(&mut self) -> Result<HeaderMap> {
        let token = self.token().await?;
        let access = token
            .access_token
            .as_deref()
            .ok_or_else(|| Error::authorization("no access token after renewal"))?;
        authorization_header(&format!("Bearer {access}"))
    }

    async fn validate(&mut self) -> Result<()> {
        match self.token().await?.access_token {
            Some(_) => Ok(()),
            None => Err(Error::authorization("no access token after renewal")),
        }
    }
}
