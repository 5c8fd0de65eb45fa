//! OAuth2 authorization-code and refresh-token exchange against Keycloak

use async_trait::async_trait;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, CsrfToken, ExtraTokenFields, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use super::token::TokenExchange;
use crate::context::Context;
use crate::error::{Error, Result};

/// Browser URL to start a login, and the CSRF `state` it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationUrl {
    pub url: String,
    pub csrf_state: String,
}

/// The OAuth2 endpoints a login needs.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn auth_url(&self, redirect_uri: &str, scope: &str) -> Result<AuthorizationUrl>;

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenExchange>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenExchange>;
}

/// Keycloak adds the refresh token lifetime to the standard response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeycloakFields {
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
}

impl ExtraTokenFields for KeycloakFields {}

type KeycloakTokenResponse = StandardTokenResponse<KeycloakFields, BasicTokenType>;

type KeycloakClient = Client<
    BasicErrorResponse,
    KeycloakTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Keycloak realm acting as the identity provider for a context.
#[derive(Debug, Clone)]
pub struct KeycloakProvider {
    server_url: String,
    realm: String,
    client_id: String,
}

impl KeycloakProvider {
    pub fn new(
        server_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
        }
    }

    pub fn for_context(ctx: &Context) -> Self {
        tracing::info!(
            "KeycloakProvider(server_url={}, client_id={}, realm={})",
            ctx.identity_server_url,
            ctx.client_id,
            ctx.realm
        );
        Self::new(&ctx.identity_server_url, &ctx.realm, &ctx.client_id)
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{}",
            self.server_url.trim_end_matches('/'),
            self.realm,
            name
        )
    }

    /// Build the OAuth2 client, optionally bound to a redirect URI
    fn build_client(&self, redirect_uri: Option<&str>) -> Result<KeycloakClient> {
        let auth_url = AuthUrl::new(self.endpoint("auth")).map_err(invalid_url)?;
        let token_url = TokenUrl::new(self.endpoint("token")).map_err(invalid_url)?;

        let client = KeycloakClient::new(
            ClientId::new(self.client_id.clone()),
            None,
            auth_url,
            Some(token_url),
        );
        match redirect_uri {
            Some(uri) => Ok(client
                .set_redirect_uri(RedirectUrl::new(uri.to_string()).map_err(invalid_url)?)),
            None => Ok(client),
        }
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    fn auth_url(&self, redirect_uri: &str, scope: &str) -> Result<AuthorizationUrl> {
        let client = self.build_client(Some(redirect_uri))?;
        let (url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scope.split_whitespace().map(|s| Scope::new(s.to_string())))
            .url();

        Ok(AuthorizationUrl {
            url: url.to_string(),
            csrf_state: csrf.secret().to_string(),
        })
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenExchange> {
        let client = self.build_client(Some(redirect_uri))?;
        tracing::debug!("Exchanging authorization code at {}", self.endpoint("token"));

        let response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| provider_error("authorization code exchange", e))?;

        into_exchange(response)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenExchange> {
        let client = self.build_client(None)?;
        tracing::debug!("Refreshing token at {}", self.endpoint("token"));

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| provider_error("refresh token exchange", e))?;

        into_exchange(response)
    }
}

fn into_exchange(response: KeycloakTokenResponse) -> Result<TokenExchange> {
    let expires_in = response
        .expires_in()
        .ok_or_else(|| Error::IdentityProvider("token response missing 'expires_in'".into()))?;

    Ok(TokenExchange {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response.refresh_token().map(|t| t.secret().to_string()),
        expires_in: expires_in.as_secs(),
        refresh_expires_in: response.extra_fields().refresh_expires_in.unwrap_or(0),
    })
}

fn provider_error<RE>(what: &str, err: RequestTokenError<RE, BasicErrorResponse>) -> Error
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => {
            let detail = resp
                .error_description()
                .map(|d| format!(": {d}"))
                .unwrap_or_default();
            Error::IdentityProvider(format!("{what} rejected ({}{detail})", resp.error()))
        }
        other => Error::IdentityProvider(format!("{what} failed: {other}")),
    }
}

fn invalid_url(err: url::ParseError) -> Error {
    Error::Config(format!("invalid identity server URL: {err}"))
}
