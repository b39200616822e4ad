use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::{GatekeeperConfig, KEYS};
use crate::paths;
use crate::ui;

pub fn run(_ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => init(force),
        ConfigCommand::Set { key, value } => set(&key, &value),
        ConfigCommand::Show => show(),
        ConfigCommand::Path => path(),
    }
}

fn init(force: bool) -> Result<()> {
    let path = paths::config_file()?;

    if path.exists() && !force {
        ui::warn(&format!("{} already exists", path.display()));
        ui::dim("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    GatekeeperConfig::default().save_to(&path)?;
    ui::success(&format!("Created {}", path.display()));
    ui::dim("Set the access configs next, e.g.:");
    ui::dim("  gatekeeper config set sql.users_config /opt/gatekeeper/sql-users.json");
    Ok(())
}

fn set(key: &str, value: &str) -> Result<()> {
    let path = paths::config_file()?;
    let mut config = GatekeeperConfig::load_from(&path)?;

    if let Err(e) = config.set(key, value) {
        ui::error(&e.to_string());
        ui::dim(&format!("Known keys: {}", KEYS.join(", ")));
        anyhow::bail!("{e}");
    }

    config.save_to(&path)?;
    ui::success(&format!("{key} = {value}"));
    Ok(())
}

fn show() -> Result<()> {
    let path = paths::config_file()?;
    let config = GatekeeperConfig::load_from(&path)?;

    ui::header("Gatekeeper Configuration");
    ui::kv("File", &path.display().to_string());

    ui::section("General");
    ui::kv("region", config.region());
    ui::kv("environment", &config.environment);
    ui::kv("secret_backend", &format!("{:?}", config.secret_backend).to_lowercase());
    ui::kv("slack_hook", display_value(&mask_hook(&config.slack_hook)));
    ui::kv("audit_log", display_value(&config.audit_log));

    ui::section("SQL");
    ui::kv("secret_name", display_value(&config.sql.secret_name));
    ui::kv("users_config", display_value(&config.sql.users_config));
    ui::kv("services_config", display_value(&config.sql.services_config));
    ui::kv(
        "critical_tables_config",
        display_value(&config.sql.critical_tables_config),
    );
    ui::kv("manage_users", &config.sql.manage_users.to_string());
    ui::kv("client", &config.sql.client);

    ui::section("Roles");
    ui::kv("secret_name", display_value(&config.roles.secret_name));
    ui::kv("users_config", display_value(&config.roles.users_config));
    ui::kv("roles_config", display_value(&config.roles.roles_config));
    ui::kv("scope", &config.roles.scope);

    Ok(())
}

fn path() -> Result<()> {
    println!("{}", paths::config_file()?.display());
    Ok(())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}

/// Hide the token part of a webhook URL
fn mask_hook(hook: &str) -> String {
    match hook.rsplit_once('/') {
        Some((base, token)) if !token.is_empty() => format!("{base}/****"),
        _ => hook.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_hook() {
        assert_eq!(
            mask_hook("https://hooks.slack.com/services/T0/B0/secret"),
            "https://hooks.slack.com/services/T0/B0/****"
        );
        assert_eq!(mask_hook(""), "");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(""), "(not set)");
        assert_eq!(display_value("db"), "db");
    }
}
