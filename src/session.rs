//! Wiring between settings, the persisted catalogue and the auth adapters

use crate::auth::{ApiKeyAdapter, AuthAdapter, AuthType, OpenIdAdapter};
use crate::config::Settings;
use crate::context::{Context, ContextCatalogue, JsonStorage, Storage};
use crate::error::Result;

/// Catalogue backed by the JSON file the settings point at, created on first use.
pub fn open_context_catalogue(settings: &Settings) -> Result<ContextCatalogue<JsonStorage>> {
    let path = settings.contexts_path()?;
    tracing::debug!("Opening context catalogue at {}", path.display());
    ContextCatalogue::open(JsonStorage::new(path))
}

/// Adapter matching the context's auth type.
pub fn auth_adapter(ctx: Context, settings: &Settings) -> AuthAdapter {
    match ctx.auth_type {
        AuthType::ApiKey => AuthAdapter::ApiKey(ApiKeyAdapter::new(ctx, &settings.api_key_env)),
        AuthType::OpenId => {
            AuthAdapter::OpenId(OpenIdAdapter::new(ctx, settings.callback.clone()))
        }
    }
}

/// Write a context handed back by an adapter into the catalogue, but only
/// when authenticating actually changed it.
pub fn persist_context<S: Storage>(cat: &mut ContextCatalogue<S>, ctx: Context) -> Result<bool> {
    if cat.get(&ctx.name)? == ctx {
        return Ok(false);
    }
    let name = ctx.name.clone();
    cat.edit(&name, ctx)?;
    tracing::debug!("Persisted renewed credentials for context '{}'", name);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Token, TokenExchange};
    use crate::context::MemoryStorage;
    use crate::error::Error;

    fn settings_in(dir: &tempfile::TempDir) -> Settings {
        Settings {
            contexts_path: Some(dir.path().join("nested").join("contexts.json")),
            ..Settings::default()
        }
    }

    #[test]
    fn test_open_creates_catalogue_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir);

        let mut cat = open_context_catalogue(&settings).unwrap();
        assert!(cat.list_available().is_empty());
        assert!(settings.contexts_path().unwrap().exists());

        cat.add(Context::from_defaults("default", &settings.default_context))
            .unwrap();
        cat.switch("default").unwrap();

        let reopened = open_context_catalogue(&settings).unwrap();
        assert_eq!(reopened.current_name(), Some("default"));
    }

    #[test]
    fn test_adapter_follows_auth_type() {
        let settings = Settings::default();
        let mut ctx = Context::from_defaults("a", &settings.default_context);

        assert!(matches!(
            auth_adapter(ctx.clone(), &settings),
            AuthAdapter::OpenId(_)
        ));

        ctx.auth_type = AuthType::ApiKey;
        let adapter = auth_adapter(ctx, &settings);
        assert!(matches!(adapter, AuthAdapter::ApiKey(_)));
        assert_eq!(adapter.context().name, "a");
    }

    #[test]
    fn test_persist_only_when_changed() {
        let settings = Settings::default();
        let ctx = Context::from_defaults("a", &settings.default_context);
        let mut cat = ContextCatalogue::open(MemoryStorage::default()).unwrap();
        cat.add(ctx.clone()).unwrap();
        let saves = cat.storage().saves();

        assert!(!persist_context(&mut cat, ctx.clone()).unwrap());
        assert_eq!(cat.storage().saves(), saves);

        let mut renewed = ctx;
        renewed.token = Token::load_from_exchange(&TokenExchange {
            access_token: "abc".into(),
            refresh_token: Some("def".into()),
            expires_in: 300,
            refresh_expires_in: 1800,
        });
        assert!(persist_context(&mut cat, renewed.clone()).unwrap());
        assert_eq!(cat.storage().saves(), saves + 1);
        assert_eq!(cat.get("a").unwrap().token, renewed.token);
    }

    #[test]
    fn test_persist_unknown_context() {
        let settings = Settings::default();
        let mut cat = ContextCatalogue::open(MemoryStorage::default()).unwrap();
        let ctx = Context::from_defaults("ghost", &settings.default_context);
        assert!(matches!(
            persist_context(&mut cat, ctx),
            Err(Error::ContextNotFound { .. })
        ));
    }
}
