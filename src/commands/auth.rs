//! `mkcli auth ...`

use anyhow::{Context as _, Result};
use clap::Subcommand;

use mkcli::auth::AuthType;
use mkcli::config::Settings;
use mkcli::context::Context;
use mkcli::session::open_context_catalogue;

use super::context::{self, ContextCommand};
use super::key::{self, KeyCommand};
use super::token::{self, TokenCommand};

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Initialize the first auth context and make it active
    Init {
        /// Realm name
        #[arg(long)]
        realm: String,

        /// Region name
        #[arg(long)]
        region: String,

        /// Auth type: api_key or openid
        #[arg(long, default_value = "openid")]
        auth_type: AuthType,

        /// API key to store in the context
        #[arg(long)]
        api_key: Option<String>,

        /// Control-plane API URL (defaults to the realm's URL)
        #[arg(long)]
        api_url: Option<String>,
    },

    /// End all auth sessions and remove every saved context
    End,

    /// Show the active context and the state of its credentials
    Status,

    /// Manage auth contexts
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },

    /// Manage the OpenID token of the active context
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },

    /// Manage the API key of the active context
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },
}

pub async fn run(command: AuthCommand, settings: &Settings) -> Result<()> {
    match command {
        AuthCommand::Init {
            realm,
            region,
            auth_type,
            api_key,
            api_url,
        } => init(settings, realm, region, auth_type, api_key, api_url),
        AuthCommand::End => end(settings),
        AuthCommand::Status => status(settings),
        AuthCommand::Context { command } => context::run(command, settings),
        AuthCommand::Token { command } => token::run(command, settings).await,
        AuthCommand::Key { command } => key::run(command, settings),
    }
}

fn init(
    settings: &Settings,
    realm: String,
    region: String,
    auth_type: AuthType,
    api_key: Option<String>,
    api_url: Option<String>,
) -> Result<()> {
    let mut ctx = Context::from_defaults(&settings.default_context.name, &settings.default_context);
    ctx.realm = realm;
    ctx.region = region;
    ctx.auth_type = auth_type;
    ctx.api_key = api_key;
    ctx.api_url = api_url;

    if ctx.resolved_api_url(settings).is_none() {
        tracing::warn!(
            "No API URL known for realm '{}'; set one with `mkcli auth context edit {} --api-url`",
            ctx.realm,
            ctx.name
        );
    }

    let mut cat = open_context_catalogue(settings)?;
    let name = ctx.name.clone();
    cat.add(ctx).context("Failed to store the new context")?;
    cat.switch(&name)?;

    println!("Initialized a new auth session in context '{}'.", name);
    Ok(())
}

fn end(settings: &Settings) -> Result<()> {
    let mut cat = open_context_catalogue(settings)?;
    cat.purge()?;
    println!("All saved auth sessions ended and cleared.");
    Ok(())
}

fn status(settings: &Settings) -> Result<()> {
    let cat = open_context_catalogue(settings)?;
    let ctx = cat.current_context()?;

    println!("Context:     {}", ctx.name);
    println!("Auth type:   {}", ctx.auth_type);
    println!("Realm:       {}", ctx.realm);
    println!("Region:      {}", ctx.region);
    println!(
        "API URL:     {}",
        ctx.resolved_api_url(settings).as_deref().unwrap_or("(none)")
    );

    match ctx.auth_type {
        AuthType::OpenId => {
            let token = &ctx.token;
            match token.expires_at {
                _ if token.is_empty() => println!("Token:       none"),
                Some(exp) if token.is_valid() => {
                    println!("Token:       valid");
                    println!("  expires_at: {}", exp.to_rfc3339());
                }
                _ => println!("Token:       expired"),
            }
            if token.refresh_token.is_none() {
                println!("Refresh tok: none");
            } else if token.is_refresh_valid() {
                println!("Refresh tok: valid");
            } else {
                println!("Refresh tok: expired");
            }
        }
        AuthType::ApiKey => {
            let from_env = std::env::var(&settings.api_key_env)
                .map(|k| !k.is_empty())
                .unwrap_or(false);
            match (&ctx.api_key, from_env) {
                (Some(k), _) if !k.is_empty() => println!("API key:     stored in context"),
                (_, true) => println!("API key:     from ${}", settings.api_key_env),
                _ => println!("API key:     none"),
            }
        }
    }

    Ok(())
}
