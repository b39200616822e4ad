//! Secret resolution
//!
//! Credentials for the external systems are stored as JSON documents in a
//! secret store, keyed by the identifiers in `config.toml`.

use reconcile::Error;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{GatekeeperConfig, SecretBackend};
use crate::runner;

/// Prefix of the environment variables read by [`EnvSecrets`]
pub const ENV_PREFIX: &str = "GATEKEEPER_SECRET_";

/// Fetches raw secret material by identifier
pub trait SecretResolver {
    /// Return the secret payload for `id`
    fn fetch(&self, id: &str) -> reconcile::Result<String>;
}

/// AWS Secrets Manager, through the `aws` CLI
pub struct AwsCliSecrets {
    region: String,
}

impl AwsCliSecrets {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl SecretResolver for AwsCliSecrets {
    fn fetch(&self, id: &str) -> reconcile::Result<String> {
        if !runner::command_exists("aws") {
            return Err(Error::secret(id, "aws CLI not found in PATH"));
        }

        log::info!("Fetching secret {id}");
        runner::run_capture(
            "aws",
            &[
                "secretsmanager",
                "get-secret-value",
                "--secret-id",
                id,
                "--region",
                &self.region,
                "--query",
                "SecretString",
                "--output",
                "text",
            ],
        )
        .map_err(|e| Error::secret(id, format!("{e:#}")))
    }
}

/// Secrets from `GATEKEEPER_SECRET_<ID>` environment variables
///
/// The id is upper-cased and every character outside `[A-Z0-9]` becomes `_`,
/// so `prod/rds-admin` is read from `GATEKEEPER_SECRET_PROD_RDS_ADMIN`.
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn var_name(id: &str) -> String {
        let suffix: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{ENV_PREFIX}{suffix}")
    }
}

impl SecretResolver for EnvSecrets {
    fn fetch(&self, id: &str) -> reconcile::Result<String> {
        let name = Self::var_name(id);
        std::env::var(&name).map_err(|_| Error::secret(id, format!("{name} is not set")))
    }
}

/// Build the resolver selected in the config
pub fn from_config(config: &GatekeeperConfig) -> Box<dyn SecretResolver> {
    match config.secret_backend {
        SecretBackend::Aws => Box::new(AwsCliSecrets::new(config.region())),
        SecretBackend::Env => Box::new(EnvSecrets),
    }
}

/// Resolve and decode a JSON secret
///
/// A blank id, a failed fetch, an empty payload and undecodable JSON all
/// yield `SecretUnavailable`.
pub fn resolve<T: DeserializeOwned>(
    resolver: &dyn SecretResolver,
    id: &str,
    key: &str,
) -> reconcile::Result<T> {
    if id.trim().is_empty() {
        return Err(Error::secret(key, format!("{key} is not configured")));
    }

    let payload = resolver.fetch(id)?;
    if payload.trim().is_empty() {
        return Err(Error::secret(id, "secret is empty"));
    }

    serde_json::from_str(&payload).map_err(|e| Error::secret(id, e))
}

/// Database connection secret
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSecret {
    pub username: String,
    pub password: String,
    pub host: String,
    pub dbname: String,
}

/// Role service credentials
#[derive(Debug, Clone, Deserialize)]
pub struct RoleServiceSecret {
    pub username: String,
    #[serde(rename = "password")]
    pub token: String,
    pub host: String,
}
