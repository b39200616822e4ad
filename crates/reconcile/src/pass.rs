//! Reconciliation pass
//!
//! One pass walks `Start → ChecksumChecked → {Skip | Loaded} → Diffed →
//! Applied → Persisted → End`. There are no retries inside a pass; running the
//! command again is the retry.
//!
//! The lock is rewritten after every applied pass, including passes where some
//! batches failed. Those failures are not retried automatically because the
//! next pass sees a matching checksum; [`ReconcileOptions::ignore_lock`] is the
//! manual way to re-send everything.

use crate::checksum;
use crate::codec::DocumentCodec;
use crate::context::{
    AlertSink, ApplyReporter, ConfirmCallback, LogAlerts, NoSensitiveResources, PermissionExecutor,
    SensitivityClassifier,
};
use crate::diff::{Diff, DiffSummary};
use crate::error::{Error, Result};
use crate::executor::apply;
use crate::planner::ApplyPlan;
use crate::store::{LockedDocument, StateStore};
use crate::types::{ApplySummary, OperationResult, ReconcileOptions};
use serde::Serialize;
use std::fmt;

/// States visited by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassState {
    Start,
    ChecksumChecked,
    Skip,
    Loaded,
    Diffed,
    Applied,
    Persisted,
    End,
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::ChecksumChecked => "checksum-checked",
            Self::Skip => "skip",
            Self::Loaded => "loaded",
            Self::Diffed => "diffed",
            Self::Applied => "applied",
            Self::Persisted => "persisted",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// What a pass did
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// States in the order they were entered
    pub states: Vec<PassState>,
    /// The computed diff, absent when the gate skipped the pass
    pub diff: Option<Diff>,
    pub diff_summary: DiffSummary,
    /// Per-batch results, empty unless the pass applied
    pub results: Vec<OperationResult>,
    pub summary: ApplySummary,
    /// The checksum gate found nothing to do
    pub skipped: bool,
    /// The operator declined the confirmation prompt
    pub declined: bool,
}

impl PassReport {
    /// Last state reached
    pub fn state(&self) -> PassState {
        self.states.last().copied().unwrap_or(PassState::Start)
    }

    /// Whether a state was visited
    pub fn visited(&self, state: PassState) -> bool {
        self.states.contains(&state)
    }

    /// Whether the lock was rewritten
    pub fn persisted(&self) -> bool {
        self.visited(PassState::Persisted)
    }

    /// Results of batches that failed
    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    fn enter(&mut self, state: PassState) {
        log::debug!("pass: {state}");
        self.states.push(state);
    }
}

/// A single reconciliation pass over one access config
pub struct ReconcilePass<'a> {
    store: &'a StateStore,
    codec: &'a dyn DocumentCodec,
    classifier: &'a dyn SensitivityClassifier,
    alerts: &'a dyn AlertSink,
    options: ReconcileOptions,
}

impl<'a> ReconcilePass<'a> {
    /// Create a pass with no sensitive resources and log-only alerts
    pub fn new(store: &'a StateStore, codec: &'a dyn DocumentCodec) -> Self {
        Self {
            store,
            codec,
            classifier: &NoSensitiveResources,
            alerts: &LogAlerts,
            options: ReconcileOptions::default(),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: &'a dyn SensitivityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_alerts(mut self, alerts: &'a dyn AlertSink) -> Self {
        self.alerts = alerts;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the pass
    ///
    /// `executor` is called at most once, after the gate and the diff and
    /// before anything is sent, so a missing secret fails the pass closed.
    /// A dry run never calls it.
    ///
    /// # Errors
    /// `ConfigUnreadable` and `SecretUnavailable` abort before any external
    /// call. `WriteFailed` is returned after apply; applied changes stay.
    pub fn run<E, F, R, C>(
        &self,
        executor: F,
        reporter: &mut R,
        confirm: &mut C,
    ) -> Result<PassReport>
    where
        E: PermissionExecutor,
        F: FnOnce() -> Result<E>,
        R: ApplyReporter + ?Sized,
        C: ConfirmCallback + ?Sized,
    {
        let mut report = PassReport::default();
        report.enter(PassState::Start);

        let locked = if self.options.ignore_lock {
            log::info!("Ignoring {}", self.store.lock_path().display());
            LockedDocument::default()
        } else {
            self.store.load_locked(self.codec)?
        };
        let raw = self.store.read_desired_raw()?;

        let proceed = self.options.ignore_lock || checksum::should_proceed(&raw, &locked.checksum);
        report.enter(PassState::ChecksumChecked);

        if !proceed {
            log::info!(
                "{} unchanged since last pass, nothing to do",
                self.store.desired_path().display()
            );
            report.skipped = true;
            report.enter(PassState::Skip);
            report.enter(PassState::End);
            return Ok(report);
        }

        let desired = self
            .codec
            .decode(&raw)
            .map_err(|e| Error::unreadable(self.store.desired_path(), e))?;
        report.enter(PassState::Loaded);

        let mut diff = Diff::between(&desired, &locked.document);
        if self.options.ignore_lock {
            // Without the lock, which subjects already exist is unknown
            diff.new_subjects.clear();
        }
        report.diff_summary = DiffSummary::from_diff(&diff);
        report.enter(PassState::Diffed);
        log::info!(
            "{} grants to add, {} to remove",
            report.diff_summary.grants_to_add,
            report.diff_summary.grants_to_remove
        );

        if self.options.dry_run {
            report.diff = Some(diff);
            report.enter(PassState::End);
            return Ok(report);
        }

        let mut executor = executor()?;
        let plan = ApplyPlan::build(&diff, &executor, self.classifier);
        report.diff = Some(diff);

        if !plan.is_empty() {
            let prompt = format!(
                "Apply {} change(s) from {}?",
                plan.len(),
                self.store.desired_path().display()
            );
            let confirmed = confirm
                .confirm(&prompt)
                .map_err(|e| Error::Aborted(format!("{e:#}")))?;
            if !confirmed {
                log::info!("Declined, nothing applied");
                report.declined = true;
                report.enter(PassState::End);
                return Ok(report);
            }
        }

        let (results, summary) = apply(&plan, &mut executor, self.alerts, reporter);
        report.results = results;
        report.summary = summary;
        report.enter(PassState::Applied);

        if !report.summary.is_success() {
            log::warn!(
                "{} batch(es) failed; the lock is still rewritten",
                report.summary.failed
            );
        }

        let written = self.store.persist(self.codec, &desired)?;
        let locked = LockedDocument::from_applied(&written, desired);
        self.store.persist_lock(self.codec, &locked)?;
        report.enter(PassState::Persisted);
        report.enter(PassState::End);

        Ok(report)
    }
}
