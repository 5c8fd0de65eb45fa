//! Named connection profiles and the catalogue that holds them

mod catalogue;
pub mod storage;

pub use catalogue::ContextCatalogue;
pub use storage::{CatalogueData, JsonStorage, MemoryStorage, Storage};

use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::{AuthType, Token};
use crate::config::{DefaultContext, Settings};

/// One control-plane endpoint plus the credentials used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    pub client_id: String,
    pub realm: String,
    pub scope: String,
    pub region: String,
    pub identity_server_url: String,
    #[serde(default)]
    pub auth_type: AuthType,
    /// Overrides the realm's default API URL.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub token: Token,
}

impl Context {
    pub fn new(
        name: impl Into<String>,
        client_id: impl Into<String>,
        realm: impl Into<String>,
        scope: impl Into<String>,
        region: impl Into<String>,
        identity_server_url: impl Into<String>,
        auth_type: AuthType,
    ) -> Self {
        Self {
            name: name.into(),
            client_id: client_id.into(),
            realm: realm.into(),
            scope: scope.into(),
            region: region.into(),
            identity_server_url: identity_server_url.into(),
            auth_type,
            api_url: None,
            api_key: None,
            token: Token::default(),
        }
    }

    /// A context named `name` with every other field from the defaults.
    pub fn from_defaults(name: impl Into<String>, defaults: &DefaultContext) -> Self {
        Self::new(
            name,
            &defaults.client_id,
            &defaults.realm,
            &defaults.scope,
            &defaults.region,
            &defaults.identity_server_url,
            defaults.auth_type,
        )
    }

    /// Explicit `api_url`, else the URL configured for the realm.
    pub fn resolved_api_url(&self, settings: &Settings) -> Option<String> {
        self.api_url
            .clone()
            .or_else(|| settings.api_url_for_realm(&self.realm).map(String::from))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Token, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Token>::deserialize(deserializer)?.unwrap_or_default())
}
