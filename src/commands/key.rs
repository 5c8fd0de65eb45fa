//! `mkcli auth key ...`

use anyhow::Result;
use clap::Subcommand;

use mkcli::config::Settings;
use mkcli::session::open_context_catalogue;

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Show the API key of the active context
    Show,

    /// Store an API key in the active context
    Set { api_key: String },

    /// Remove the API key from the active context
    Clear,
}

pub fn run(command: KeyCommand, settings: &Settings) -> Result<()> {
    let mut cat = open_context_catalogue(settings)?;
    let mut ctx = cat.current_context()?;
    let name = ctx.name.clone();

    match command {
        KeyCommand::Show => match ctx.api_key.as_deref() {
            Some(key) if !key.is_empty() => println!("{}", key),
            _ => println!("No API key found in context '{}'.", name),
        },
        KeyCommand::Set { api_key } => {
            ctx.api_key = Some(api_key);
            cat.edit(&name, ctx)?;
            println!("API key set for context '{}'.", name);
        }
        KeyCommand::Clear => {
            ctx.api_key = None;
            cat.edit(&name, ctx)?;
            println!("API key cleared from context '{}'.", name);
        }
    }
    Ok(())
}
