//! SQL privilege grants
//!
//! A subject is a database user, a resource is a table in the secret's
//! database, a capability is a privilege and the qualifiers are columns.

use anyhow::Result;
use colored::Colorize;
use rand::Rng;
use regex::Regex;
use reconcile::sets::is_wildcard;
use reconcile::{Error, Mode, PermissionExecutor, Resources, SensitiveResources};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::runner;
use crate::secrets::DatabaseSecret;

static USER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.@-]+$").expect("user regex is valid"));
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_$]+$").expect("identifier regex is valid"));
static PRIVILEGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+( [A-Za-z]+)*$").expect("privilege regex is valid"));

const PASSWORD_LEN: usize = 40;
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#%*+-=?^_~";

/// Sends SQL to the database
pub trait SqlClient {
    /// Run one (possibly multi-statement) SQL string
    fn run(&mut self, sql: &str) -> Result<()>;
}

/// The `mysql` command-line client
///
/// Statements go over stdin and the password through `MYSQL_PWD`, so neither
/// shows up in the process list.
pub struct MysqlCli {
    program: String,
    secret: DatabaseSecret,
}

impl MysqlCli {
    pub fn new(program: impl Into<String>, secret: DatabaseSecret) -> Self {
        Self {
            program: program.into(),
            secret,
        }
    }
}

impl SqlClient for MysqlCli {
    fn run(&mut self, sql: &str) -> Result<()> {
        let output = runner::run_with_input(
            &self.program,
            &[
                "--batch",
                "--host",
                &self.secret.host,
                "--user",
                &self.secret.username,
                &self.secret.dbname,
            ],
            &[("MYSQL_PWD", &self.secret.password)],
            sql,
        )?;

        if !output.success {
            anyhow::bail!("{}", output.stderr);
        }
        if !output.stdout.is_empty() {
            log::debug!("{}", output.stdout);
        }
        Ok(())
    }
}

/// Executor for table and column privileges
pub struct SqlExecutor<C> {
    dbname: String,
    client: C,
    manage_users: bool,
}

impl<C: SqlClient> SqlExecutor<C> {
    pub fn new(dbname: impl Into<String>, client: C) -> Self {
        Self {
            dbname: dbname.into(),
            client,
            manage_users: false,
        }
    }

    /// Create and drop users along with their grants
    #[must_use]
    pub fn with_user_management(mut self, enabled: bool) -> Self {
        self.manage_users = enabled;
        self
    }

    fn statement(
        &self,
        subject: &str,
        table: &str,
        privilege: &str,
        columns: &[String],
        mode: Mode,
    ) -> reconcile::Result<String> {
        check(&IDENT_RE, "table", table)?;
        check(&PRIVILEGE_RE, "privilege", privilege)?;

        let direction = match mode {
            Mode::Grant => "TO",
            Mode::Revoke => "FROM",
        };
        let privilege = privilege.to_uppercase();
        let target = format!("{}.{table}", self.dbname);

        if is_wildcard(columns) {
            log::warn!("{subject} demands {privilege} on all columns of {target}");
            return Ok(format!("{mode} {privilege} ON {target} {direction} '{subject}'@'%'"));
        }

        for column in columns {
            check(&IDENT_RE, "column", column)?;
        }
        Ok(format!(
            "{mode} {privilege} ({}) ON {target} {direction} '{subject}'@'%'",
            columns.join(", ")
        ))
    }
}

impl<C: SqlClient> PermissionExecutor for SqlExecutor<C> {
    fn render(
        &self,
        subject: &str,
        resources: &Resources,
        mode: Mode,
    ) -> reconcile::Result<Vec<String>> {
        check(&USER_RE, "user", subject)?;

        let mut statements = Vec::new();
        for (table, privileges) in resources {
            for (privilege, columns) in privileges {
                statements.push(self.statement(subject, table, privilege, columns, mode)?);
            }
        }
        Ok(statements)
    }

    fn execute(
        &mut self,
        subject: &str,
        operations: &[String],
        _mode: Mode,
    ) -> reconcile::Result<()> {
        self.client
            .run(&operations.join(";"))
            .map_err(|e| Error::operation(subject, format!("{e:#}")))
    }

    fn manages_subjects(&self) -> bool {
        self.manage_users
    }

    fn create_subject(&mut self, subject: &str) -> reconcile::Result<()> {
        check(&USER_RE, "user", subject)?;
        let password = generate_password();

        self.client
            .run(&format!("CREATE USER '{subject}'@'%' IDENTIFIED BY '{password}'"))
            .map_err(|e| Error::operation(subject, format!("{e:#}")))?;

        log::info!("Created user {subject}");
        println!(
            "  {} created {} with password {}",
            "✓".green(),
            subject.bold(),
            password.yellow()
        );
        println!("    {}", "Shown once; hand it over now.".dimmed());
        Ok(())
    }

    fn drop_subject(&mut self, subject: &str) -> reconcile::Result<()> {
        check(&USER_RE, "user", subject)?;
        self.client
            .run(&format!("DROP USER '{subject}'@'%'"))
            .map_err(|e| Error::operation(subject, format!("{e:#}")))?;
        log::info!("Dropped user {subject}");
        Ok(())
    }
}

fn check(re: &Regex, what: &str, value: &str) -> reconcile::Result<()> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(Error::Aborted(format!("invalid {what} identifier '{value}'")))
    }
}

fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LEN)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

/// Load the critical tables list (a JSON array of table names)
///
/// Unset or missing means no table raises an alert.
pub fn load_critical_tables(path: Option<&Path>) -> Result<SensitiveResources> {
    let Some(path) = path else {
        return Ok(SensitiveResources::default());
    };
    if !path.exists() {
        log::warn!(
            "Critical tables list {} not found, no grant will raise an alert",
            path.display()
        );
        return Ok(SensitiveResources::default());
    }

    let content = fs::read_to_string(path).map_err(|e| Error::unreadable(path, e))?;
    let tables: Vec<String> =
        serde_json::from_str(&content).map_err(|e| Error::unreadable(path, e))?;

    log::debug!("{} critical table(s) from {}", tables.len(), path.display());
    Ok(SensitiveResources::new(tables))
}
