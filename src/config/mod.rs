//! Application settings
//!
//! Defaults, overlaid by an optional `settings.toml` in the per-user config
//! directory, overlaid by a few environment variables. Settings are passed
//! explicitly to whatever needs them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::auth::AuthType;
use crate::error::{Error, Result};

/// Path of an alternative settings file.
pub const SETTINGS_ENV: &str = "MKCLI_SETTINGS";
/// Path of an alternative context catalogue file.
pub const CONTEXTS_ENV: &str = "MKCLI_CONTEXTS";

const SETTINGS_FILE: &str = "settings.toml";
const CONTEXTS_FILE: &str = "contexts.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Catalogue file; `None` means `contexts.json` in the config directory.
    pub contexts_path: Option<PathBuf>,
    /// Environment variable consulted when a context has no stored API key.
    pub api_key_env: String,
    pub callback: CallbackSettings,
    pub default_context: DefaultContext,
    /// Control-plane API URL per identity realm.
    pub api_urls: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        let api_urls = [
            (
                "Creodias-new",
                "https://managed-kubernetes.creodias.eu/api/v1",
            ),
            (
                "CloudFerro-Cloud",
                "https://managed-kubernetes.cloudferro.com/api/v1",
            ),
        ]
        .into_iter()
        .map(|(realm, url)| (realm.to_string(), url.to_string()))
        .collect();

        Self {
            contexts_path: None,
            api_key_env: "MK8S_API_KEY".to_string(),
            callback: CallbackSettings::default(),
            default_context: DefaultContext::default(),
            api_urls,
        }
    }
}

/// Local OAuth redirect listener and its two bounded waits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackSettings {
    pub host: String,
    pub port: u16,
    pub ready_timeout_ms: u64,
    pub ready_poll_ms: u64,
    pub callback_timeout_secs: u64,
    pub callback_poll_ms: u64,
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3333,
            ready_timeout_ms: 5_000,
            ready_poll_ms: 20,
            callback_timeout_secs: 60,
            callback_poll_ms: 50,
        }
    }
}

impl CallbackSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn callback_poll(&self) -> Duration {
        Duration::from_millis(self.callback_poll_ms)
    }
}

/// Values used for new contexts when the user does not provide them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultContext {
    pub name: String,
    pub realm: String,
    pub client_id: String,
    pub scope: String,
    pub region: String,
    pub identity_server_url: String,
    pub auth_type: AuthType,
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            realm: "Creodias-new".to_string(),
            client_id: "managed-kubernetes".to_string(),
            scope: "email profile openid".to_string(),
            region: "WAW4-1".to_string(),
            identity_server_url: "https://identity.cloudferro.com/auth/".to_string(),
            auth_type: AuthType::OpenId,
        }
    }
}

impl Settings {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "mkcli", "mkcli")
            .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Load settings from disk and the environment.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(SETTINGS_ENV) {
            Some(p) => PathBuf::from(p),
            None => Self::config_dir()?.join(SETTINGS_FILE),
        };

        let mut settings = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        if let Some(p) = std::env::var_os(CONTEXTS_ENV) {
            settings.contexts_path = Some(PathBuf::from(p));
        }

        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolved catalogue file location.
    pub fn contexts_path(&self) -> Result<PathBuf> {
        match &self.contexts_path {
            Some(p) => Ok(p.clone()),
            None => Ok(Self::config_dir()?.join(CONTEXTS_FILE)),
        }
    }

    pub fn api_url_for_realm(&self, realm: &str) -> Option<&str> {
        self.api_urls.get(realm).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.api_key_env, "MK8S_API_KEY");
        assert_eq!(s.callback.host, "localhost");
        assert_eq!(s.callback.port, 3333);
        assert_eq!(s.callback.ready_timeout(), Duration::from_secs(5));
        assert_eq!(s.callback.callback_timeout(), Duration::from_secs(60));
        assert_eq!(s.default_context.auth_type, AuthType::OpenId);
        assert_eq!(
            s.api_url_for_realm("CloudFerro-Cloud"),
            Some("https://managed-kubernetes.cloudferro.com/api/v1")
        );
        assert_eq!(s.api_url_for_realm("unknown"), None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
contexts_path = "/tmp/mkcli-test/contexts.json"

[callback]
port = 4444

[default_context]
realm = "CloudFerro-Cloud"
auth_type = "api_key"
"#
        )
        .unwrap();

        let s = Settings::from_file(file.path()).unwrap();
        assert_eq!(s.callback.port, 4444);
        assert_eq!(s.callback.host, "localhost");
        assert_eq!(s.default_context.realm, "CloudFerro-Cloud");
        assert_eq!(s.default_context.auth_type, AuthType::ApiKey);
        assert_eq!(s.default_context.client_id, "managed-kubernetes");
        assert_eq!(
            s.contexts_path().unwrap(),
            PathBuf::from("/tmp/mkcli-test/contexts.json")
        );
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "callback = 3").unwrap();
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
