//! mkcli - managed Kubernetes command-line client
//!
//! Authentication and context management commands.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mkcli::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mkcli")]
#[command(about = "Command-line client for managed Kubernetes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorization and authentication management
    Auth {
        #[command(subcommand)]
        command: commands::auth::AuthCommand,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<mkcli::Error>().and_then(hint) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load()?;

    match cli.command {
        Commands::Auth { command } => commands::auth::run(command, &settings).await,
    }
}

fn hint(err: &mkcli::Error) -> Option<&'static str> {
    use mkcli::Error;

    match err {
        Error::Authorization(_) => Some(
            "log in again with `mkcli auth token refresh`, or store a key with `mkcli auth key set`",
        ),
        Error::ContextNotFound { .. }
        | Error::NoActiveSession { .. }
        | Error::ActiveContext(_)
        | Error::ContextExists(_) => Some(
            "see the available contexts with `mkcli auth context list` and select one with `mkcli auth context switch`",
        ),
        Error::EmptyStorage(_) | Error::InvalidFileLayout { .. } => Some(
            "fix or remove the context file, then reinitialise with `mkcli auth init`",
        ),
        Error::ListenerNotReady { .. } => {
            Some("make sure the callback port is free, then retry")
        }
        Error::CallbackTimeout { .. } => {
            Some("retry and complete the login in the browser before the timeout")
        }
        Error::IdentityProvider(_) => {
            Some("check the realm, client id and identity server of the context")
        }
        Error::UnsupportedAuthType(_) => Some("supported auth types are: api_key, openid"),
        Error::Config(_) => Some("check the settings file (override its path with $MKCLI_SETTINGS)"),
        Error::Io(_) => None,
    }
}
