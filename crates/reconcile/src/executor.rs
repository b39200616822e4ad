//! Apply engine - runs a plan one subject at a time
//!
//! Every failure is isolated to the subject it belongs to: a rejected batch is
//! recorded and the remaining subjects are still processed.

use crate::context::{AlertSink, ApplyReporter, PermissionExecutor};
use crate::planner::{ApplyPlan, SubjectBatch};
use crate::types::{ApplySummary, Mode, OperationOutcome, OperationResult};
use std::collections::HashSet;

/// Execute a plan against the external system
///
/// Order: subject creation, grant batches, revoke batches, subject drops.
/// A grant batch touching a sensitive resource raises an alert before it is
/// sent, whatever its outcome. A subject whose creation failed has its grant
/// batch skipped.
///
/// # Returns
/// Per-batch results (skipped entries first) and the aggregate summary
pub fn apply<E, A, R>(
    plan: &ApplyPlan,
    executor: &mut E,
    alerts: &A,
    reporter: &mut R,
) -> (Vec<OperationResult>, ApplySummary)
where
    E: PermissionExecutor + ?Sized,
    A: AlertSink + ?Sized,
    R: ApplyReporter + ?Sized,
{
    let mut results = Vec::new();
    let mut summary = ApplySummary::default();
    let mut not_created: HashSet<&str> = HashSet::new();

    for skipped in &plan.skipped {
        reporter.on_result(skipped);
        summary.add_result(skipped);
        results.push(skipped.clone());
    }

    if !plan.create.is_empty() {
        reporter.on_phase_start("create", plan.create.len());
        for subject in &plan.create {
            match executor.create_subject(subject) {
                Ok(()) => summary.subjects_created += 1,
                Err(e) => {
                    log::error!("Failed to create {subject}: {e}");
                    not_created.insert(subject.as_str());
                    let result = lifecycle_failure(subject, Mode::Grant, "create", &e);
                    reporter.on_result(&result);
                    summary.add_result(&result);
                    results.push(result);
                }
            }
        }
        reporter.on_phase_complete();
    }

    if !plan.grants.is_empty() {
        reporter.on_phase_start("grant", plan.grants.len());
        for batch in &plan.grants {
            if not_created.contains(batch.subject.as_str()) {
                let result = OperationResult {
                    subject: batch.subject.clone(),
                    mode: batch.mode,
                    operations: batch.operations.clone(),
                    outcome: OperationOutcome::Skipped {
                        reason: "create failed".into(),
                    },
                };
                log::warn!("Not granting to {}: create failed", batch.subject);
                reporter.on_result(&result);
                summary.add_result(&result);
                results.push(result);
                continue;
            }
            if !batch.sensitive.is_empty() {
                send_alert(batch, alerts, &mut summary);
            }
            let result = run_batch(batch, executor, reporter);
            summary.add_result(&result);
            results.push(result);
        }
        reporter.on_phase_complete();
    }

    if !plan.revokes.is_empty() {
        reporter.on_phase_start("revoke", plan.revokes.len());
        for batch in &plan.revokes {
            let result = run_batch(batch, executor, reporter);
            summary.add_result(&result);
            results.push(result);
        }
        reporter.on_phase_complete();
    }

    if !plan.drop.is_empty() {
        reporter.on_phase_start("drop", plan.drop.len());
        for subject in &plan.drop {
            match executor.drop_subject(subject) {
                Ok(()) => summary.subjects_dropped += 1,
                Err(e) => {
                    log::error!("Failed to drop {subject}: {e}");
                    let result = lifecycle_failure(subject, Mode::Revoke, "drop", &e);
                    reporter.on_result(&result);
                    summary.add_result(&result);
                    results.push(result);
                }
            }
        }
        reporter.on_phase_complete();
    }

    (results, summary)
}

fn run_batch<E, R>(batch: &SubjectBatch, executor: &mut E, reporter: &mut R) -> OperationResult
where
    E: PermissionExecutor + ?Sized,
    R: ApplyReporter + ?Sized,
{
    reporter.on_batch_start(&batch.subject, batch.mode);

    let outcome = match &batch.rejected {
        Some(reason) => OperationOutcome::Failed {
            error: reason.clone(),
        },
        None if batch.operations.is_empty() => OperationOutcome::Skipped {
            reason: "nothing to do".into(),
        },
        None => match executor.execute(&batch.subject, &batch.operations, batch.mode) {
            Ok(()) => OperationOutcome::Applied,
            Err(e) => OperationOutcome::Failed {
                error: e.to_string(),
            },
        },
    };

    let result = OperationResult {
        subject: batch.subject.clone(),
        mode: batch.mode,
        operations: batch.operations.clone(),
        outcome,
    };

    match &result.outcome {
        OperationOutcome::Applied => {
            log::info!("{} {}: {}", batch.mode, batch.subject, result.operation_text());
        }
        OperationOutcome::Failed { error } => {
            log::error!("{} {} failed: {error}", batch.mode, batch.subject);
        }
        OperationOutcome::Skipped { reason } => {
            log::debug!("{} {} skipped: {reason}", batch.mode, batch.subject);
        }
    }

    reporter.on_result(&result);
    result
}

fn send_alert<A>(batch: &SubjectBatch, alerts: &A, summary: &mut ApplySummary)
where
    A: AlertSink + ?Sized,
{
    let message = format!(
        "{} is being granted access to sensitive resources: {}",
        batch.subject,
        batch.sensitive.join(", ")
    );
    match alerts.alert(&message) {
        Ok(()) => summary.alerts_sent += 1,
        Err(e) => log::warn!("Failed to send alert for {}: {e:#}", batch.subject),
    }
}

fn lifecycle_failure(
    subject: &str,
    mode: Mode,
    action: &str,
    error: &crate::Error,
) -> OperationResult {
    OperationResult {
        subject: subject.to_string(),
        mode,
        operations: vec![format!("{action} {subject}")],
        outcome: OperationOutcome::Failed {
            error: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LogAlerts, NoReport, NoSensitiveResources, SensitiveResources};
    use crate::diff::Diff;
    use crate::error::{Error, Result};
    use crate::types::{AccessDocument, Resources};
    use std::cell::RefCell;

    /// Records every call; fails the subjects listed in `fail`
    #[derive(Default)]
    struct MockExecutor {
        calls: Vec<String>,
        fail: Vec<String>,
        fail_create: Vec<String>,
        manages: bool,
    }

    impl PermissionExecutor for MockExecutor {
        fn render(&self, subject: &str, resources: &Resources, mode: Mode) -> Result<Vec<String>> {
            Ok(resources
                .keys()
                .map(|resource| format!("{mode} {resource} {subject}"))
                .collect())
        }

        fn execute(&mut self, subject: &str, operations: &[String], _mode: Mode) -> Result<()> {
            self.calls.push(operations.join("; "));
            if self.fail.iter().any(|s| s == subject) {
                return Err(Error::operation(subject, "access denied"));
            }
            Ok(())
        }

        fn manages_subjects(&self) -> bool {
            self.manages
        }

        fn create_subject(&mut self, subject: &str) -> Result<()> {
            self.calls.push(format!("create {subject}"));
            if self.fail_create.iter().any(|s| s == subject) {
                return Err(Error::operation(subject, "user exists"));
            }
            Ok(())
        }

        fn drop_subject(&mut self, subject: &str) -> Result<()> {
            self.calls.push(format!("drop {subject}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingAlerts {
        messages: RefCell<Vec<String>>,
        fail: bool,
    }

    impl AlertSink for RecordingAlerts {
        fn alert(&self, message: &str) -> anyhow::Result<()> {
            self.messages.borrow_mut().push(message.to_string());
            if self.fail {
                anyhow::bail!("webhook unreachable");
            }
            Ok(())
        }
    }

    fn doc(grants: &[(&str, &str, &str)]) -> AccessDocument {
        let mut d = AccessDocument::new();
        for (subject, resource, capability) in grants {
            d.insert(*subject, *resource, *capability, ["id".to_string()]);
        }
        d
    }

    fn plan_for(desired: &AccessDocument, locked: &AccessDocument, exec: &MockExecutor) -> ApplyPlan {
        ApplyPlan::build(&Diff::between(desired, locked), exec, &NoSensitiveResources)
    }

    #[test]
    fn test_empty_plan() {
        let mut exec = MockExecutor::default();
        let (results, summary) = apply(&ApplyPlan::default(), &mut exec, &LogAlerts, &mut NoReport);
        assert!(results.is_empty());
        assert_eq!(summary.total(), 0);
        assert!(exec.calls.is_empty());
    }

    #[test]
    fn test_grants_run_before_revokes() {
        let locked = doc(&[("bob", "users", "SELECT")]);
        let desired = doc(&[("alice", "orders", "SELECT")]);
        let mut exec = MockExecutor::default();
        let plan = plan_for(&desired, &locked, &exec);

        let (_, summary) = apply(&plan, &mut exec, &LogAlerts, &mut NoReport);

        assert_eq!(exec.calls, vec!["GRANT orders alice", "REVOKE users bob"]);
        assert_eq!(summary.applied, 2);
    }

    #[test]
    fn test_failure_is_isolated_per_subject() {
        let desired = doc(&[
            ("alice", "orders", "SELECT"),
            ("bob", "orders", "SELECT"),
            ("carol", "orders", "SELECT"),
        ]);
        let mut exec = MockExecutor {
            fail: vec!["bob".into()],
            ..Default::default()
        };
        let plan = plan_for(&desired, &AccessDocument::new(), &exec);

        let (results, summary) = apply(&plan, &mut exec, &LogAlerts, &mut NoReport);

        assert_eq!(exec.calls.len(), 3);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.failed, 1);
        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].subject, "bob");
        assert_eq!(failed[0].operations, vec!["GRANT orders bob"]);
    }

    #[test]
    fn test_lifecycle_ordering() {
        let locked = doc(&[("bob", "users", "SELECT")]);
        let desired = doc(&[("alice", "orders", "SELECT")]);
        let mut exec = MockExecutor {
            manages: true,
            ..Default::default()
        };
        let plan = plan_for(&desired, &locked, &exec);

        let (_, summary) = apply(&plan, &mut exec, &LogAlerts, &mut NoReport);

        assert_eq!(
            exec.calls,
            vec![
                "create alice",
                "GRANT orders alice",
                "REVOKE users bob",
                "drop bob"
            ]
        );
        assert_eq!(summary.subjects_created, 1);
        assert_eq!(summary.subjects_dropped, 1);
    }

    #[test]
    fn test_failed_create_skips_grant_batch() {
        let desired = doc(&[("alice", "payments", "SELECT"), ("bob", "orders", "SELECT")]);
        let mut exec = MockExecutor {
            manages: true,
            fail_create: vec!["alice".into()],
            ..Default::default()
        };
        let classifier = SensitiveResources::new(["payments"]);
        let plan = ApplyPlan::build(
            &Diff::between(&desired, &AccessDocument::new()),
            &exec,
            &classifier,
        );
        let alerts = RecordingAlerts::default();

        let (results, summary) = apply(&plan, &mut exec, &alerts, &mut NoReport);

        assert_eq!(
            exec.calls,
            vec!["create alice", "create bob", "GRANT orders bob"]
        );
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.applied, 1);
        assert!(alerts.messages.borrow().is_empty());
        let skipped = results
            .iter()
            .find(|r| matches!(r.outcome, OperationOutcome::Skipped { .. }))
            .unwrap();
        assert_eq!(skipped.subject, "alice");
        assert_eq!(
            skipped.outcome,
            OperationOutcome::Skipped {
                reason: "create failed".into()
            }
        );
    }

    #[test]
    fn test_alert_sent_before_sensitive_grant_even_on_failure() {
        let desired = doc(&[("alice", "payments", "SELECT"), ("bob", "orders", "SELECT")]);
        let mut exec = MockExecutor {
            fail: vec!["alice".into()],
            ..Default::default()
        };
        let classifier = SensitiveResources::new(["payments"]);
        let plan = ApplyPlan::build(
            &Diff::between(&desired, &AccessDocument::new()),
            &exec,
            &classifier,
        );
        let alerts = RecordingAlerts::default();

        let (_, summary) = apply(&plan, &mut exec, &alerts, &mut NoReport);

        let messages = alerts.messages.borrow();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("alice"));
        assert!(messages[0].contains("payments"));
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_alert_failure_is_not_fatal() {
        let desired = doc(&[("alice", "payments", "SELECT")]);
        let mut exec = MockExecutor::default();
        let classifier = SensitiveResources::new(["payments"]);
        let plan = ApplyPlan::build(
            &Diff::between(&desired, &AccessDocument::new()),
            &exec,
            &classifier,
        );
        let alerts = RecordingAlerts {
            fail: true,
            ..Default::default()
        };

        let (_, summary) = apply(&plan, &mut exec, &alerts, &mut NoReport);

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.alerts_sent, 0);
    }

    #[test]
    fn test_rejected_batch_is_not_sent() {
        let mut plan = ApplyPlan::default();
        plan.grants.push(SubjectBatch {
            subject: "alice".into(),
            mode: Mode::Grant,
            resources: Resources::new(),
            operations: Vec::new(),
            sensitive: Vec::new(),
            rejected: Some("invalid identifier".into()),
        });
        let mut exec = MockExecutor::default();

        let (results, summary) = apply(&plan, &mut exec, &LogAlerts, &mut NoReport);

        assert!(exec.calls.is_empty());
        assert_eq!(summary.failed, 1);
        assert_eq!(
            results[0].outcome,
            OperationOutcome::Failed {
                error: "invalid identifier".into()
            }
        );
    }
}
