//! Tool configuration (`config.toml`)
//!
//! Holds the locations of the access configs, the secret identifiers used to
//! reach each external system, and the alert/audit sinks.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::paths;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unrecognized key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("{0} is not set; run `gatekeeper config set {0} <value>`")]
    Missing(&'static str),
}

/// Where secret material is fetched from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// AWS Secrets Manager through the `aws` CLI
    #[default]
    Aws,
    /// `GATEKEEPER_SECRET_<ID>` environment variables
    Env,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    pub region: String,
    /// Deployment name, shown on every alert
    pub environment: String,
    /// Chat webhook for alerts; empty means alerts are only logged
    pub slack_hook: String,
    /// Local audit trail; empty disables it
    pub audit_log: String,
    pub secret_backend: SecretBackend,
    pub sql: SqlConfig,
    pub roles: RolesConfig,
}

/// Database grants domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Secret holding `{"username", "password", "host", "dbname"}`
    pub secret_name: String,
    /// Access config for human users
    pub users_config: String,
    /// Access config for service accounts
    pub services_config: String,
    /// JSON array of table names whose grants raise an alert
    pub critical_tables_config: String,
    /// Create new users and drop removed ones
    pub manage_users: bool,
    /// Client binary used to run statements
    pub client: String,
}

/// Role assignment domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    /// Secret holding `{"username", "password", "host"}`
    pub secret_name: String,
    pub users_config: String,
    pub roles_config: String,
    /// Role type passed to the role service
    pub scope: String,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            environment: "staging".to_string(),
            slack_hook: String::new(),
            audit_log: "/opt/gatekeeper/audit_log".to_string(),
            secret_backend: SecretBackend::Aws,
            sql: SqlConfig::default(),
            roles: RolesConfig::default(),
        }
    }
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            secret_name: String::new(),
            users_config: String::new(),
            services_config: String::new(),
            critical_tables_config: String::new(),
            manage_users: false,
            client: "mysql".to_string(),
        }
    }
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            secret_name: String::new(),
            users_config: String::new(),
            roles_config: String::new(),
            scope: reconcile::GLOBAL_ROLES.to_string(),
        }
    }
}

/// Keys accepted by `config set`
pub const KEYS: &[&str] = &[
    "region",
    "environment",
    "slack_hook",
    "audit_log",
    "secret_backend",
    "sql.secret_name",
    "sql.users_config",
    "sql.services_config",
    "sql.critical_tables_config",
    "sql.manage_users",
    "sql.client",
    "roles.secret_name",
    "roles.users_config",
    "roles.roles_config",
    "roles.scope",
];

impl GatekeeperConfig {
    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "{} doesn't exist. Create one with `gatekeeper config init`",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save to a specific file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        log::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Set one key by its dotted name
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let target = match key {
            "region" => &mut self.region,
            "environment" => &mut self.environment,
            "slack_hook" => &mut self.slack_hook,
            "audit_log" => &mut self.audit_log,
            "sql.secret_name" => &mut self.sql.secret_name,
            "sql.users_config" => &mut self.sql.users_config,
            "sql.services_config" => &mut self.sql.services_config,
            "sql.critical_tables_config" => &mut self.sql.critical_tables_config,
            "sql.client" => &mut self.sql.client,
            "roles.secret_name" => &mut self.roles.secret_name,
            "roles.users_config" => &mut self.roles.users_config,
            "roles.roles_config" => &mut self.roles.roles_config,
            "roles.scope" => &mut self.roles.scope,
            "sql.manage_users" => {
                self.sql.manage_users = parse_bool(key, value)?;
                return Ok(());
            }
            "secret_backend" => {
                self.secret_backend = match value {
                    "aws" => SecretBackend::Aws,
                    "env" => SecretBackend::Env,
                    _ => return Err(invalid(key, value, "aws or env")),
                };
                return Ok(());
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };

        *target = value.to_string();
        Ok(())
    }

    /// Region, falling back to us-east-1 when blank
    pub fn region(&self) -> &str {
        if self.region.is_empty() {
            "us-east-1"
        } else {
            &self.region
        }
    }

    /// Audit log path, if auditing is enabled
    pub fn audit_path(&self) -> Option<PathBuf> {
        (!self.audit_log.is_empty()).then(|| paths::expand(&self.audit_log))
    }
}

/// Expand a configured path, failing with the key name when it is blank
pub fn required_path(value: &str, key: &'static str) -> Result<PathBuf, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    Ok(paths::expand(value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(key, value, "true or false")),
    }
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

// ============================================================================
// Tests
// ============================================================================
