//! `mkcli auth context ...`

use anyhow::{bail, Result};
use clap::{Args, Subcommand, ValueEnum};

use mkcli::auth::AuthType;
use mkcli::config::Settings;
use mkcli::context::{Context, ContextCatalogue, Storage};
use mkcli::session::open_context_catalogue;

#[derive(Subcommand)]
pub enum ContextCommand {
    /// Show the active context
    Show,

    /// List all contexts
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Add a new context; unset fields take the default values
    Add {
        name: String,

        #[command(flatten)]
        fields: ContextFields,
    },

    /// Delete one or more contexts
    Delete {
        #[arg(required = true)]
        names: Vec<String>,

        /// Do not ask for confirmation
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Copy a context under a new name
    Duplicate {
        source: String,

        /// Name of the copy
        #[arg(short, long)]
        name: String,
    },

    /// Make a context the active one
    Switch { name: String },

    /// Change fields of a context
    Edit {
        name: String,

        /// Rename the context
        #[arg(long)]
        new_name: Option<String>,

        #[command(flatten)]
        fields: ContextFields,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Context fields settable from the command line.
#[derive(Args, Debug, Default)]
pub struct ContextFields {
    #[arg(long)]
    client_id: Option<String>,

    #[arg(long)]
    realm: Option<String>,

    #[arg(long)]
    scope: Option<String>,

    #[arg(long)]
    region: Option<String>,

    /// Identity server URL
    #[arg(long)]
    identity_server: Option<String>,

    /// api_key or openid
    #[arg(long)]
    auth_type: Option<AuthType>,

    /// Control-plane API URL
    #[arg(long)]
    api_url: Option<String>,
}

impl ContextFields {
    fn apply(self, ctx: &mut Context) {
        if let Some(v) = self.client_id {
            ctx.client_id = v;
        }
        if let Some(v) = self.realm {
            ctx.realm = v;
        }
        if let Some(v) = self.scope {
            ctx.scope = v;
        }
        if let Some(v) = self.region {
            ctx.region = v;
        }
        if let Some(v) = self.identity_server {
            ctx.identity_server_url = v;
        }
        if let Some(v) = self.auth_type {
            ctx.auth_type = v;
        }
        if let Some(v) = self.api_url {
            ctx.api_url = Some(v);
        }
    }

    /// Whether a change invalidates a token issued for the old values.
    fn touches_identity(&self) -> bool {
        self.client_id.is_some()
            || self.realm.is_some()
            || self.scope.is_some()
            || self.identity_server.is_some()
    }
}

pub fn run(command: ContextCommand, settings: &Settings) -> Result<()> {
    let mut cat = open_context_catalogue(settings)?;

    match command {
        ContextCommand::Show => show(&cat),
        ContextCommand::List { output } => list(&cat, output),
        ContextCommand::Add { name, fields } => add(&mut cat, settings, name, fields),
        ContextCommand::Delete { names, yes } => delete(&mut cat, &names, yes),
        ContextCommand::Duplicate { source, name } => {
            cat.duplicate(&source, &name)?;
            println!("Duplicated context '{}' into '{}'.", source, name);
            Ok(())
        }
        ContextCommand::Switch { name } => {
            cat.switch(&name)?;
            println!("Switched to context '{}'.", name);
            Ok(())
        }
        ContextCommand::Edit {
            name,
            new_name,
            fields,
        } => edit(&mut cat, &name, new_name, fields),
    }
}

fn show<S: Storage>(cat: &ContextCatalogue<S>) -> Result<()> {
    let ctx = cat.current_context()?;
    println!("{}", serde_json::to_string_pretty(&redacted(ctx))?);
    println!("{:-<60}", "");
    println!("Current auth context is: {}", cat.current_name().unwrap_or_default());
    Ok(())
}

fn list<S: Storage>(cat: &ContextCatalogue<S>, output: OutputFormat) -> Result<()> {
    let contexts = cat.list_all();

    match output {
        OutputFormat::Json => {
            let contexts: Vec<Context> = contexts.into_iter().map(redacted).collect();
            println!("{}", serde_json::to_string_pretty(&contexts)?);
        }
        OutputFormat::Table => {
            println!("\nAvailable Auth Contexts:");
            println!("{:-<100}", "");
            if contexts.is_empty() {
                println!("  (no contexts found)");
                return Ok(());
            }
            println!(
                "  {:<16} {:<20} {:<18} {:<10} {:<8} {}",
                "NAME", "CLIENT_ID", "REALM", "REGION", "AUTH", "IDENTITY SERVER"
            );
            for ctx in &contexts {
                let marker = if cat.current_name() == Some(ctx.name.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!(
                    "{} {:<16} {:<20} {:<18} {:<10} {:<8} {}",
                    marker,
                    ctx.name,
                    ctx.client_id,
                    ctx.realm,
                    ctx.region,
                    ctx.auth_type,
                    ctx.identity_server_url
                );
            }
        }
    }
    Ok(())
}

fn add<S: Storage>(
    cat: &mut ContextCatalogue<S>,
    settings: &Settings,
    name: String,
    fields: ContextFields,
) -> Result<()> {
    if cat.contains(&name) {
        return Err(mkcli::Error::ContextExists(name).into());
    }

    let mut ctx = Context::from_defaults(name, &settings.default_context);
    fields.apply(&mut ctx);
    let name = ctx.name.clone();
    cat.add(ctx)?;

    println!("Context '{}' added.", name);
    if cat.current_name().is_none() {
        println!("Activate it with `mkcli auth context switch {}`.", name);
    }
    Ok(())
}

fn delete<S: Storage>(cat: &mut ContextCatalogue<S>, names: &[String], yes: bool) -> Result<()> {
    for name in names {
        // Validate before prompting
        cat.get(name)?;
        if cat.current_name() == Some(name.as_str()) {
            return Err(mkcli::Error::ActiveContext(name.clone()).into());
        }

        if !yes && !super::confirm(&format!("Delete auth context '{}'?", name))? {
            println!("Aborted.");
            return Ok(());
        }
        cat.delete(name)?;
        println!("Context '{}' deleted.", name);
    }
    Ok(())
}

fn edit<S: Storage>(
    cat: &mut ContextCatalogue<S>,
    name: &str,
    new_name: Option<String>,
    fields: ContextFields,
) -> Result<()> {
    let mut ctx = cat.get(name)?;
    if fields.touches_identity() {
        ctx.token.clear();
    }
    fields.apply(&mut ctx);
    if let Some(new_name) = new_name {
        if new_name.is_empty() {
            bail!("context name cannot be empty");
        }
        ctx.name = new_name;
    }

    let final_name = ctx.name.clone();
    cat.edit(name, ctx)?;
    println!("Context '{}' updated.", final_name);
    Ok(())
}

/// Context with secrets removed for display.
fn redacted(mut ctx: Context) -> Context {
    if ctx.api_key.is_some() {
        ctx.api_key = Some("********".into());
    }
    ctx.token.access_token = ctx.token.access_token.map(|_| "********".into());
    ctx.token.refresh_token = ctx.token.refresh_token.map(|_| "********".into());
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkcli::auth::{Token, TokenExchange};
    use mkcli::context::MemoryStorage;

    fn catalogue() -> ContextCatalogue<MemoryStorage> {
        let settings = Settings::default();
        let mut cat = ContextCatalogue::open(MemoryStorage::default()).unwrap();
        let mut ctx = Context::from_defaults("dev", &settings.default_context);
        ctx.token = Token::load_from_exchange(&TokenExchange {
            access_token: "secret_access".into(),
            refresh_token: Some("secret_refresh".into()),
            expires_in: 300,
            refresh_expires_in: 1800,
        });
        cat.add(ctx).unwrap();
        cat
    }

    #[test]
    fn test_add_rejects_existing_name() {
        let mut cat = catalogue();
        let err = add(
            &mut cat,
            &Settings::default(),
            "dev".into(),
            ContextFields::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<mkcli::Error>(),
            Some(mkcli::Error::ContextExists(_))
        ));
    }

    #[test]
    fn test_add_applies_fields() {
        let mut cat = catalogue();
        let fields = ContextFields {
            region: Some("WAW3-2".into()),
            auth_type: Some(AuthType::ApiKey),
            ..Default::default()
        };
        add(&mut cat, &Settings::default(), "prod".into(), fields).unwrap();

        let prod = cat.get("prod").unwrap();
        assert_eq!(prod.region, "WAW3-2");
        assert_eq!(prod.auth_type, AuthType::ApiKey);
        assert_eq!(prod.realm, "Creodias-new");
    }

    #[test]
    fn test_edit_identity_change_drops_token() {
        let mut cat = catalogue();
        let fields = ContextFields {
            realm: Some("CloudFerro-Cloud".into()),
            ..Default::default()
        };
        edit(&mut cat, "dev", None, fields).unwrap();

        let dev = cat.get("dev").unwrap();
        assert_eq!(dev.realm, "CloudFerro-Cloud");
        assert!(dev.token.is_empty());
    }

    #[test]
    fn test_edit_rename_keeps_token() {
        let mut cat = catalogue();
        cat.switch("dev").unwrap();
        edit(&mut cat, "dev", Some("staging".into()), ContextFields::default()).unwrap();

        assert!(!cat.contains("dev"));
        assert_eq!(cat.current_name(), Some("staging"));
        assert!(cat.get("staging").unwrap().token.is_valid());
    }

    #[test]
    fn test_delete_active_fails_before_prompt() {
        let mut cat = catalogue();
        cat.switch("dev").unwrap();
        let err = delete(&mut cat, &["dev".to_string()], false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<mkcli::Error>(),
            Some(mkcli::Error::ActiveContext(_))
        ));
        assert!(cat.contains("dev"));
    }

    #[test]
    fn test_delete_confirmed() {
        let mut cat = catalogue();
        delete(&mut cat, &["dev".to_string()], true).unwrap();
        assert!(cat.list_available().is_empty());
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let cat = catalogue();
        let json = serde_json::to_string(&redacted(cat.get("dev").unwrap())).unwrap();
        assert!(!json.contains("secret_access"));
        assert!(!json.contains("secret_refresh"));
    }
}
