//! Role assignments on a role-strategy service
//!
//! Each (subject, role) pair is one `POST` to `assignRole` or `unassignRole`.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use reconcile::{Error, Mode, PermissionExecutor, Resources};
use std::sync::LazyLock;

use crate::secrets::RoleServiceSecret;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.@-]+$").expect("name regex is valid"));

const ENDPOINT: &str = "/role-strategy/strategy";

/// Sends one role request
pub trait RoleClient {
    /// POST `path` (relative to the service host)
    fn post(&mut self, path: &str) -> Result<()>;
}

/// HTTP client with basic auth
pub struct HttpRoleClient {
    agent: ureq::Agent,
    host: String,
    authorization: String,
}

impl HttpRoleClient {
    pub fn new(secret: &RoleServiceSecret) -> Self {
        let credentials = STANDARD.encode(format!("{}:{}", secret.username, secret.token));
        Self {
            agent: ureq::Agent::new_with_defaults(),
            host: secret.host.trim_end_matches('/').to_string(),
            authorization: format!("Basic {credentials}"),
        }
    }
}

impl RoleClient for HttpRoleClient {
    fn post(&mut self, path: &str) -> Result<()> {
        let url = format!("{}{path}", self.host);
        log::debug!("POST {url}");

        match self
            .agent
            .post(&url)
            .header("Authorization", &self.authorization)
            .send_empty()
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => anyhow::bail!("HTTP {code}"),
            Err(e) => Err(e).context("Role service unreachable"),
        }
    }
}

/// Executor for role assignments
///
/// The document's resource is the role scope, each capability a role name.
pub struct RoleExecutor<C> {
    client: C,
}

impl<C: RoleClient> RoleExecutor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: RoleClient> PermissionExecutor for RoleExecutor<C> {
    fn render(
        &self,
        subject: &str,
        resources: &Resources,
        mode: Mode,
    ) -> reconcile::Result<Vec<String>> {
        check("sid", subject)?;

        let action = match mode {
            Mode::Grant => "assignRole",
            Mode::Revoke => "unassignRole",
        };

        let mut requests = Vec::new();
        for (scope, roles) in resources {
            check("scope", scope)?;
            for role in roles.keys() {
                check("role", role)?;
                requests.push(format!(
                    "{ENDPOINT}/{action}?type={scope}&roleName={role}&sid={subject}"
                ));
            }
        }
        Ok(requests)
    }

    fn execute(
        &mut self,
        subject: &str,
        operations: &[String],
        _mode: Mode,
    ) -> reconcile::Result<()> {
        let mut failures = Vec::new();
        for path in operations {
            if let Err(e) = self.client.post(path) {
                log::error!("POST {path}: {e:#}");
                failures.push(format!("{path}: {e:#}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::operation(subject, failures.join("; ")))
        }
    }
}

fn check(what: &str, value: &str) -> reconcile::Result<()> {
    if NAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(Error::Aborted(format!("invalid {what} '{value}'")))
    }
}
