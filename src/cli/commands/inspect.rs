use anyhow::anyhow;
use serde_json::json;

use crate::action::{ActionRegistry, Instance};
use crate::auth::{generate_token, Claims, GUEST_USER_ID};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::permissions::PermissionCatalog;

/// Print every registered action
pub fn actions(output_format: OutputFormat) -> anyhow::Result<()> {
    let registry = ActionRegistry::build()?;
    let empty = Instance::new();

    match output_format {
        OutputFormat::Json => {
            let listing: Vec<_> = registry
                .iter()
                .map(|registered| {
                    let action = &registered.action;
                    json!({
                        "name": action.name(),
                        "collection": action.collection().as_str(),
                        "kind": action.kind().to_string(),
                        "permission": action.permission(&empty, GUEST_USER_ID).to_string(),
                        "internal": action.is_internal(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            println!("{:<32} {:<8} {}", "ACTION", "KIND", "PERMISSION");
            for registered in registry.iter() {
                let action = &registered.action;
                let mut permission = action.permission(&empty, GUEST_USER_ID).to_string();
                if action.is_internal() {
                    permission.push_str(" (internal)");
                }
                println!("{:<32} {:<8} {}", action.name(), action.kind(), permission);
            }
        }
    }
    Ok(())
}

pub fn schema(name: &str) -> anyhow::Result<()> {
    let registry = ActionRegistry::build()?;
    let registered = registry
        .get(name)
        .ok_or_else(|| anyhow!("Action {} does not exist.", name))?;
    println!("{}", serde_json::to_string_pretty(registered.validator.schema())?);
    Ok(())
}

pub fn permissions(output_format: OutputFormat) -> anyhow::Result<()> {
    let catalog = PermissionCatalog::embedded()?;
    match output_format {
        OutputFormat::Text => print!("{}", catalog.render()),
        OutputFormat::Json => {
            let rendered = catalog.render();
            let lines: Vec<&str> = rendered.lines().map(str::trim).collect();
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
    }
    Ok(())
}

pub fn token(
    config: &AppConfig,
    user_id: u64,
    session_id: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let claims = Claims::new(user_id, session_id, config.security.token_expiry_hours);
    let token = generate_token(&config.security.token_secret, &claims)?;
    match output_format {
        OutputFormat::Text => println!("bearer {}", token),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "token": token, "expires": claims.exp }))?
        ),
    }
    Ok(())
}
