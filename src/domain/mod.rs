//! Access domains
//!
//! Maps a `(domain, kind)` pair from the command line to its access config,
//! document codec, sensitivity list and permission executor.

pub mod roles;
pub mod sql;

use anyhow::Result;
use clap::ValueEnum;
use reconcile::{
    DocumentCodec, GrantCodec, PermissionExecutor, RoleCodec, SensitiveResources, StateStore,
};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{GatekeeperConfig, required_path};
use crate::secrets::{self, DatabaseSecret, RoleServiceSecret, SecretResolver};

/// External permission system
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Domain {
    /// Database table and column privileges
    Sql,
    /// Role assignments on the CI role-strategy service
    Roles,
}

/// Which access config of a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Users,
    Services,
    Roles,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql => write!(f, "sql"),
            Self::Roles => write!(f, "roles"),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Users => write!(f, "users"),
            Self::Services => write!(f, "services"),
            Self::Roles => write!(f, "roles"),
        }
    }
}

/// A resolved `(domain, kind)` with its access config path
#[derive(Debug, Clone)]
pub struct Target {
    pub domain: Domain,
    pub kind: Kind,
    pub path: PathBuf,
}

impl Target {
    /// Validate the pair and look up its access config
    pub fn resolve(config: &GatekeeperConfig, domain: Domain, kind: Kind) -> Result<Self> {
        let (value, key) = match (domain, kind) {
            (Domain::Sql, Kind::Users) => (&config.sql.users_config, "sql.users_config"),
            (Domain::Sql, Kind::Services) => (&config.sql.services_config, "sql.services_config"),
            (Domain::Roles, Kind::Users) => (&config.roles.users_config, "roles.users_config"),
            (Domain::Roles, Kind::Roles) => (&config.roles.roles_config, "roles.roles_config"),
            _ => anyhow::bail!("Invalid kind '{kind}' for {domain}"),
        };

        Ok(Self {
            domain,
            kind,
            path: required_path(value, key)?,
        })
    }

    pub fn store(&self) -> StateStore {
        StateStore::for_config(&self.path)
    }

    pub fn codec(&self, config: &GatekeeperConfig) -> Box<dyn DocumentCodec> {
        match self.domain {
            Domain::Sql => Box::new(GrantCodec),
            Domain::Roles => Box::new(RoleCodec::new(config.roles.scope.clone())),
        }
    }

    /// Resources whose grants raise an alert
    pub fn classifier(&self, config: &GatekeeperConfig) -> Result<SensitiveResources> {
        match self.domain {
            Domain::Sql => {
                let path = config.sql.critical_tables_config.trim();
                let path = (!path.is_empty()).then(|| crate::paths::expand(path));
                sql::load_critical_tables(path.as_deref())
            }
            Domain::Roles => Ok(SensitiveResources::default()),
        }
    }

    /// Fetch credentials and build the executor
    pub fn connect(
        &self,
        config: &GatekeeperConfig,
        resolver: &dyn SecretResolver,
    ) -> reconcile::Result<Box<dyn PermissionExecutor>> {
        match self.domain {
            Domain::Sql => {
                let secret: DatabaseSecret =
                    secrets::resolve(resolver, &config.sql.secret_name, "sql.secret_name")?;
                let dbname = secret.dbname.clone();
                let client = sql::MysqlCli::new(config.sql.client.clone(), secret);
                Ok(Box::new(
                    sql::SqlExecutor::new(dbname, client)
                        .with_user_management(config.sql.manage_users),
                ))
            }
            Domain::Roles => {
                let secret: RoleServiceSecret =
                    secrets::resolve(resolver, &config.roles.secret_name, "roles.secret_name")?;
                Ok(Box::new(roles::RoleExecutor::new(
                    roles::HttpRoleClient::new(&secret),
                )))
            }
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.store().lock_path().to_path_buf()
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.domain, self.kind)
    }
}
