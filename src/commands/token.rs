//! `mkcli auth token ...`

use anyhow::{bail, Result};
use clap::Subcommand;

use mkcli::auth::{AuthAdapter, OpenIdAdapter};
use mkcli::config::Settings;
use mkcli::session::{auth_adapter, open_context_catalogue, persist_context};

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Print the access token, renewing it first if needed
    Show,

    /// Force an interactive login and store the new token
    Refresh,

    /// Forget the stored token
    Clear,
}

pub async fn run(command: TokenCommand, settings: &Settings) -> Result<()> {
    let mut cat = open_context_catalogue(settings)?;
    let mut adapter = openid_adapter(auth_adapter(cat.current_context()?, settings))?;

    match command {
        TokenCommand::Show => {
            let access = adapter.token().await?.access_token.clone();
            persist_context(&mut cat, adapter.into_context())?;
            match access {
                Some(token) => println!("{}", token),
                None => bail!("no access token available"),
            }
        }
        TokenCommand::Refresh => {
            adapter.login().await?;
            persist_context(&mut cat, adapter.into_context())?;
            println!("Token refreshed successfully.");
        }
        TokenCommand::Clear => {
            adapter.clear();
            persist_context(&mut cat, adapter.into_context())?;
            println!("Token cleared.");
        }
    }
    Ok(())
}

fn openid_adapter(adapter: AuthAdapter) -> Result<OpenIdAdapter> {
    match adapter {
        AuthAdapter::OpenId(a) => Ok(a),
        AuthAdapter::ApiKey(a) => bail!(
            "context '{}' uses API key authentication; manage it with `mkcli auth key`",
            a.context().name
        ),
    }
}
