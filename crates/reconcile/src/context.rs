//! Apply context and provider traits
//!
//! These traits allow the reconcile crate to be used without
//! depending on a specific database client, HTTP service, chat webhook or UI.

use crate::error::Result;
use crate::types::{Mode, OperationResult, Resources};
use std::collections::HashSet;

/// Executes grant/revoke batches against an external permission system
///
/// Implement this trait once per domain (SQL privileges, role assignments).
/// `render` is pure and used for planning and display; `execute` performs the
/// external call for one subject.
pub trait PermissionExecutor {
    /// Render the operations for one subject's batch, in the order they are sent
    ///
    /// An error rejects the whole batch for that subject (e.g. an identifier
    /// the external system cannot safely accept).
    fn render(&self, subject: &str, resources: &Resources, mode: Mode) -> Result<Vec<String>>;

    /// Send one subject's rendered batch
    ///
    /// Failures should be reported as [`crate::Error::OperationFailed`].
    fn execute(&mut self, subject: &str, operations: &[String], mode: Mode) -> Result<()>;

    /// Whether this executor creates subjects before their first grant and
    /// drops them once they disappear from the desired document
    fn manages_subjects(&self) -> bool {
        false
    }

    /// Create a subject that appears for the first time
    fn create_subject(&mut self, _subject: &str) -> Result<()> {
        Ok(())
    }

    /// Drop a subject that was removed from the desired document
    fn drop_subject(&mut self, _subject: &str) -> Result<()> {
        Ok(())
    }
}

impl<E: PermissionExecutor + ?Sized> PermissionExecutor for Box<E> {
    fn render(&self, subject: &str, resources: &Resources, mode: Mode) -> Result<Vec<String>> {
        (**self).render(subject, resources, mode)
    }

    fn execute(&mut self, subject: &str, operations: &[String], mode: Mode) -> Result<()> {
        (**self).execute(subject, operations, mode)
    }

    fn manages_subjects(&self) -> bool {
        (**self).manages_subjects()
    }

    fn create_subject(&mut self, subject: &str) -> Result<()> {
        (**self).create_subject(subject)
    }

    fn drop_subject(&mut self, subject: &str) -> Result<()> {
        (**self).drop_subject(subject)
    }
}

/// Classifier for resources whose grants must be announced
///
/// Implement this trait to define your sensitivity policy.
pub trait SensitivityClassifier {
    /// Check if granting on a resource requires an alert
    fn is_sensitive(&self, resource: &str) -> bool;
}

/// Default classifier that treats nothing as sensitive
pub struct NoSensitiveResources;

impl SensitivityClassifier for NoSensitiveResources {
    fn is_sensitive(&self, _resource: &str) -> bool {
        false
    }
}

/// Classifier backed by an explicit list of sensitive resource names
#[derive(Debug, Clone, Default)]
pub struct SensitiveResources {
    names: HashSet<String>,
}

impl SensitiveResources {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl SensitivityClassifier for SensitiveResources {
    fn is_sensitive(&self, resource: &str) -> bool {
        self.names.contains(resource)
    }
}

/// Out-of-band notification channel
///
/// Alerts are fire-and-forget: the applier logs a failed alert and carries on.
pub trait AlertSink {
    /// Deliver one alert message
    fn alert(&self, message: &str) -> anyhow::Result<()>;
}

/// Alert sink that only writes to the log
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn alert(&self, message: &str) -> anyhow::Result<()> {
        log::warn!("ALERT: {message}");
        Ok(())
    }
}

/// Progress callback for apply operations
///
/// Implement this trait to receive progress updates during apply.
pub trait ApplyReporter {
    /// Called when starting a phase (subject creation, grants, revokes, drops)
    fn on_phase_start(&mut self, phase: &str, count: usize);

    /// Called before a subject's batch is sent
    fn on_batch_start(&mut self, subject: &str, mode: Mode);

    /// Called with the outcome of every batch, including skipped ones
    fn on_result(&mut self, result: &OperationResult);

    /// Called when a phase completes
    fn on_phase_complete(&mut self);
}

/// No-op reporter
pub struct NoReport;

impl ApplyReporter for NoReport {
    fn on_phase_start(&mut self, _phase: &str, _count: usize) {}
    fn on_batch_start(&mut self, _subject: &str, _mode: Mode) {}
    fn on_result(&mut self, _result: &OperationResult) {}
    fn on_phase_complete(&mut self) {}
}

/// Confirmation callback for user interaction
///
/// Implement this trait to handle user confirmations.
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool>;
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}
