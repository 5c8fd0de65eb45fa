//! Opening the authorization URL in the user's browser

use url::Url;

use crate::error::{Error, Result};

/// Something that can show the user an authorization URL.
pub trait Browser: Send + Sync {
    /// Fire-and-forget; must not wait for the browser to exit.
    fn open(&self, url: &str) -> Result<()>;
}

/// The platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let target = launch_target(url)?;
        tracing::debug!("Launching browser");
        open::that_detached(target.as_str())?;
        Ok(())
    }
}

/// The URL handed to the platform opener, query string intact.
fn launch_target(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::authorization(format!("invalid authorization URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::authorization(format!(
            "refusing to open URL with scheme '{}'",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_schemes() {
        let err = SystemBrowser.open("file:///etc/passwd").unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
        assert!(SystemBrowser.open("not a url").is_err());
    }

    #[test]
    fn test_launch_target_keeps_every_query_parameter() {
        let url = "https://identity.example/realms/r/protocol/openid-connect/auth\
                   ?response_type=code&client_id=managed-kubernetes&state=abc\
                   &redirect_uri=http%3A%2F%2Flocalhost%3A3333%2Fcallback&scope=email+openid";
        let target = launch_target(url).unwrap();
        assert_eq!(target.as_str(), url);

        let keys: Vec<String> = target.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(
            keys,
            ["response_type", "client_id", "state", "redirect_uri", "scope"]
        );
    }
}
