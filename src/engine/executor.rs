//! Execution engine - runs a reconciliation pass with terminal UI, alerts and audit

use anyhow::Result;
use colored::Colorize;
use indicatif::ProgressBar;
use reconcile::{
    ApplyReporter, ApplySummary, AutoConfirm, ConfirmCallback, Mode, OperationOutcome,
    OperationResult, PassReport, ReconcileOptions, ReconcilePass,
};

use crate::audit::AuditLog;
use crate::config::GatekeeperConfig;
use crate::domain::Target;
use crate::notify::SlackNotifier;
use crate::progress;
use crate::secrets;
use crate::ui;

/// Options for a refresh
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Re-send everything desired, ignoring the lock
    pub ignore_lock: bool,
    /// Suppress per-batch output
    pub quiet: bool,
}

impl ExecuteOptions {
    fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: self.dry_run,
            ignore_lock: self.ignore_lock,
        }
    }
}

/// Reports batch outcomes on the terminal and in the audit log
pub struct TerminalReporter {
    audit: Option<AuditLog>,
    quiet: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalReporter {
    pub fn new(audit: Option<AuditLog>, quiet: bool) -> Self {
        Self {
            audit,
            quiet,
            spinner: None,
        }
    }

    fn audit(&self, line: &str) {
        if let Some(audit) = &self.audit {
            audit.record_or_warn(line);
        }
    }
}

impl ApplyReporter for TerminalReporter {
    fn on_phase_start(&mut self, phase: &str, count: usize) {
        if !self.quiet {
            println!();
            println!("  {} {} {} subject(s)...", "→".cyan(), phase_title(phase), count);
        }
    }

    fn on_batch_start(&mut self, subject: &str, mode: Mode) {
        if !self.quiet {
            let message = ui::truncate(&format!("{mode} {subject}"), 60);
            self.spinner = Some(progress::spinner(&message));
        }
    }

    fn on_result(&mut self, result: &OperationResult) {
        if let Some(pb) = self.spinner.take() {
            progress::finish_clear(&pb);
        }

        self.audit(&audit_line(result));

        if self.quiet && result.is_success() {
            return;
        }

        let (symbol, detail) = match &result.outcome {
            OperationOutcome::Applied => ("✓".green(), String::new()),
            OperationOutcome::Failed { error } => ("✗".red(), error.clone()),
            OperationOutcome::Skipped { reason } => ("⊘".dimmed(), reason.clone()),
        };

        println!("    {} {} {}", symbol, result.mode, result.subject.bold());
        for operation in &result.operations {
            println!("      {}", operation.dimmed());
        }
        if !detail.is_empty() {
            println!("      {}", detail.yellow());
        }
    }

    fn on_phase_complete(&mut self) {
        if let Some(pb) = self.spinner.take() {
            progress::finish_clear(&pb);
        }
    }
}

fn phase_title(phase: &str) -> &str {
    match phase {
        "create" => "Creating",
        "grant" => "Granting to",
        "revoke" => "Revoking from",
        "drop" => "Dropping",
        other => other,
    }
}

/// One audit entry per batch, with the exact operation text
pub fn audit_line(result: &OperationResult) -> String {
    let status = match &result.outcome {
        OperationOutcome::Applied => "applied".to_string(),
        OperationOutcome::Failed { error } => format!("failed: {error}"),
        OperationOutcome::Skipped { reason } => format!("skipped: {reason}"),
    };
    format!(
        "{} {} [{}] {}",
        result.mode,
        result.subject,
        status,
        result.operation_text()
    )
    .trim_end()
    .to_string()
}

/// Interactive confirmation
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}

/// Run one pass over a target with the configured alerts, audit and secrets
pub fn execute(
    config: &GatekeeperConfig,
    target: &Target,
    opts: &ExecuteOptions,
) -> Result<PassReport> {
    let store = target.store();
    let codec = target.codec(config);
    let classifier = target.classifier(config)?;
    let notifier =
        SlackNotifier::new(config.slack_hook.clone()).with_environment(config.environment.clone());
    let resolver = secrets::from_config(config);
    let audit = config.audit_path().map(AuditLog::new);

    let pass = ReconcilePass::new(&store, codec.as_ref())
        .with_classifier(&classifier)
        .with_alerts(&notifier)
        .with_options(opts.reconcile_options());

    let mut confirm: Box<dyn ConfirmCallback> = if opts.yes || !console::user_attended() {
        Box::new(AutoConfirm)
    } else {
        Box::new(PromptConfirm)
    };

    let mut reporter = TerminalReporter::new(audit, opts.quiet);
    let report = pass.run(
        || target.connect(config, resolver.as_ref()),
        &mut reporter,
        confirm.as_mut(),
    )?;

    if report.persisted() {
        reporter.audit(&format!(
            "{target} {}: {}",
            target.config_path().display(),
            summary_line(&report.summary)
        ));
    }

    Ok(report)
}

fn summary_line(summary: &ApplySummary) -> String {
    format!(
        "{} applied, {} failed, {} skipped, {} alert(s)",
        summary.applied, summary.failed, summary.skipped, summary.alerts_sent
    )
}

/// Print the final summary of an applied pass
pub fn print_summary(summary: &ApplySummary) {
    println!();
    if summary.is_success() {
        println!("  {} Access refreshed successfully!", "✓".green().bold());
    } else {
        println!("  {} Access refreshed with errors", "⚠".yellow().bold());
    }

    if summary.subjects_created > 0 {
        println!("    • {} subjects created", summary.subjects_created);
    }
    if summary.applied > 0 {
        println!("    • {} batches applied", summary.applied);
    }
    if summary.skipped > 0 {
        println!("    • {} batches skipped", summary.skipped);
    }
    if summary.subjects_dropped > 0 {
        println!("    • {} subjects dropped", summary.subjects_dropped);
    }
    if summary.alerts_sent > 0 {
        println!("    • {} alerts sent", summary.alerts_sent);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "batches".red());
    }
}
