use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::domain::{Domain, Kind};

#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(author = "Gatekeeper Maintainers")]
#[command(version)]
#[command(about = "Declarative access control for databases and CI roles", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile access from an access config
    #[command(subcommand)]
    Access(AccessCommand),

    /// Manage the gatekeeper configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Access Commands
// ============================================================================

#[derive(Subcommand)]
pub enum AccessCommand {
    /// Apply changes in an access config to the external system
    #[command(after_help = "Kinds: sql → users, services; roles → users, roles")]
    Refresh {
        #[arg(value_enum)]
        domain: Domain,

        #[arg(value_enum)]
        kind: Kind,

        /// Show what would change without applying
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Treat the lock as empty and send every desired grant again
        #[arg(long)]
        ignore_lock: bool,
    },

    /// Preview what refresh would change
    Diff {
        #[arg(value_enum)]
        domain: Domain,

        #[arg(value_enum)]
        kind: Kind,
    },

    /// Show the lock state of an access config
    Status {
        #[arg(value_enum)]
        domain: Domain,

        #[arg(value_enum)]
        kind: Kind,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set a key (e.g. `sql.users_config`)
    Set { key: String, value: String },

    /// Show the current configuration
    Show,

    /// Print the config file path
    Path,
}
