//! Access commands
//!
//! - `refresh` - make the external system match an access config
//! - `diff` - preview what refresh would send
//! - `status` - show the lock state of an access config

use anyhow::Result;
use colored::Colorize;
use reconcile::{Error, checksum};
use std::fs;

use crate::Context;
use crate::cli::AccessCommand;
use crate::config::GatekeeperConfig;
use crate::domain::{Domain, Kind, Target};
use crate::engine::differ::{display_diff, display_text_diff};
use crate::engine::{self, ExecuteOptions};
use crate::ui;

pub fn run(ctx: &Context, cmd: AccessCommand) -> Result<()> {
    let config = GatekeeperConfig::load()?;

    match cmd {
        AccessCommand::Refresh {
            domain,
            kind,
            dry_run,
            yes,
            ignore_lock,
        } => {
            let opts = ExecuteOptions {
                dry_run,
                yes,
                ignore_lock,
                quiet: ctx.quiet,
            };
            refresh(&config, domain, kind, &opts)
        }
        AccessCommand::Diff { domain, kind } => diff(&config, domain, kind),
        AccessCommand::Status { domain, kind } => status(ctx, &config, domain, kind),
    }
}

// ============================================================================
// Refresh Command
// ============================================================================

fn refresh(
    config: &GatekeeperConfig,
    domain: Domain,
    kind: Kind,
    opts: &ExecuteOptions,
) -> Result<()> {
    let target = Target::resolve(config, domain, kind)?;
    ui::header(&format!("Refreshing {target}"));
    ui::kv("Config", &target.config_path().display().to_string());

    if opts.dry_run {
        ui::warn("Dry run - no changes will be made");
    }
    if opts.ignore_lock {
        ui::warn("Ignoring the lock - every desired grant will be sent again");
    }

    let preview = engine::execute(
        config,
        &target,
        &ExecuteOptions {
            dry_run: true,
            ..opts.clone()
        },
    )?;

    if preview.skipped {
        println!();
        ui::success("Access config unchanged since last refresh, nothing to do");
        return Ok(());
    }

    if let Some(diff) = &preview.diff {
        display_diff(diff);
    }

    if opts.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    let report = engine::execute(config, &target, opts)?;

    if report.declined {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    engine::print_summary(&report.summary);
    ui::dim(&format!("Lock written to {}", target.lock_path().display()));

    if !report.summary.is_success() {
        println!();
        ui::warn(&format!(
            "{} failed batch(es) are recorded as applied in the lock and will not be retried",
            report.summary.failed
        ));
        ui::dim(&format!(
            "Fix the cause, then run `gatekeeper access refresh {domain} {kind} --ignore-lock`"
        ));
        anyhow::bail!("{} batch(es) failed", report.summary.failed);
    }

    Ok(())
}

// ============================================================================
// Diff Command
// ============================================================================

fn diff(config: &GatekeeperConfig, domain: Domain, kind: Kind) -> Result<()> {
    let target = Target::resolve(config, domain, kind)?;
    ui::header(&format!("Diff for {target}"));

    let opts = ExecuteOptions {
        dry_run: true,
        quiet: true,
        ..Default::default()
    };
    let report = engine::execute(config, &target, &opts)?;

    if report.skipped {
        println!();
        ui::success("Access config unchanged since last refresh");
        return Ok(());
    }

    if let Some(diff) = &report.diff {
        display_diff(diff);
    }
    Ok(())
}

// ============================================================================
// Status Command
// ============================================================================

fn status(ctx: &Context, config: &GatekeeperConfig, domain: Domain, kind: Kind) -> Result<()> {
    let target = Target::resolve(config, domain, kind)?;
    let store = target.store();
    let codec = target.codec(config);

    ui::header(&format!("Status of {target}"));
    ui::kv("Config", &target.config_path().display().to_string());
    ui::kv("Lock", &store.lock_path().display().to_string());

    let raw = store.read_desired_raw()?;
    let locked = store.load_locked(codec.as_ref())?;

    ui::section("Checksum");
    if locked.checksum.is_empty() {
        println!(
            "  {} {}",
            "⚠".yellow(),
            "No lock yet; the next refresh grants everything".dimmed()
        );
    } else if checksum::should_proceed(&raw, &locked.checksum) {
        println!("  {} {}", "⚠".yellow(), "Changed since last refresh".bold());
    } else {
        println!("  {} {}", "✓".green(), "In sync with lock".bold());
    }

    if ctx.verbose > 0 {
        ui::dim(&format!("desired: {}", checksum::digest(&raw)));
        ui::dim(&format!("locked:  {}", locked.checksum));
    }

    ui::section("Locked vs desired");
    let locked_text = codec
        .encode(&locked.document)
        .map_err(|e| Error::unreadable(store.lock_path(), e))?;
    let desired_text = fs::read_to_string(store.desired_path())
        .map_err(|e| Error::unreadable(store.desired_path(), e))?;

    display_text_diff(&String::from_utf8_lossy(&locked_text), &desired_text);

    let subjects = codec
        .decode(&raw)
        .map(|doc| doc.len().to_string())
        .unwrap_or_else(|_| "unreadable".red().to_string());
    println!();
    ui::kv("Subjects", &subjects);
    ui::kv("Locked subjects", &locked.document.len().to_string());

    Ok(())
}
