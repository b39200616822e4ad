//! Apply planner - turns a diff into ordered per-subject batches

use crate::context::{PermissionExecutor, SensitivityClassifier};
use crate::diff::Diff;
use crate::types::{AccessDocument, Mode, OperationOutcome, OperationResult, Resources};

/// One subject's operations for one direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectBatch {
    pub subject: String,
    pub mode: Mode,
    /// The grants covered, with empty qualifier lists removed
    pub resources: Resources,
    /// Rendered operation text, in send order
    pub operations: Vec<String>,
    /// Sensitive resources touched by a grant batch
    pub sensitive: Vec<String>,
    /// Set when the executor refused to render the batch
    pub rejected: Option<String>,
}

/// An apply plan: lifecycle changes and grant/revoke batches in execution order
#[derive(Debug, Clone, Default)]
pub struct ApplyPlan {
    /// Subjects to create before any grant
    pub create: Vec<String>,
    /// Grant batches, executed before revokes
    pub grants: Vec<SubjectBatch>,
    /// Revoke batches
    pub revokes: Vec<SubjectBatch>,
    /// Subjects to drop after all revokes
    pub drop: Vec<String>,
    /// Subjects with nothing to send, reported without touching the executor
    pub skipped: Vec<OperationResult>,
}

impl ApplyPlan {
    /// Build a plan for a diff using the executor's rendering
    pub fn build<E, C>(diff: &Diff, executor: &E, classifier: &C) -> Self
    where
        E: PermissionExecutor + ?Sized,
        C: SensitivityClassifier + ?Sized,
    {
        let mut plan = Self::default();

        if executor.manages_subjects() {
            plan.create = non_empty(&diff.new_subjects);
            plan.drop = non_empty(&diff.removed_subjects);
        }

        plan.grants = plan.batches(&diff.to_add, Mode::Grant, executor, Some(classifier));
        plan.revokes = plan.batches::<E, C>(&diff.to_remove, Mode::Revoke, executor, None);
        plan
    }

    fn batches<E, C>(
        &mut self,
        document: &AccessDocument,
        mode: Mode,
        executor: &E,
        classifier: Option<&C>,
    ) -> Vec<SubjectBatch>
    where
        E: PermissionExecutor + ?Sized,
        C: SensitivityClassifier + ?Sized,
    {
        let mut batches = Vec::new();

        for (subject, resources) in document.iter() {
            if subject.trim().is_empty() {
                log::debug!("Ignoring {mode} entry with an empty subject");
                continue;
            }

            let resources = without_empty_qualifiers(subject, resources, mode);
            if resources.is_empty() {
                self.skipped.push(OperationResult {
                    subject: subject.clone(),
                    mode,
                    operations: Vec::new(),
                    outcome: OperationOutcome::Skipped {
                        reason: "nothing to do".into(),
                    },
                });
                continue;
            }

            let sensitive = classifier
                .map(|c| {
                    resources
                        .keys()
                        .filter(|r| c.is_sensitive(r))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            let (operations, rejected) = match executor.render(subject, &resources, mode) {
                Ok(operations) => (operations, None),
                Err(e) => (Vec::new(), Some(e.to_string())),
            };

            batches.push(SubjectBatch {
                subject: subject.clone(),
                mode,
                resources,
                operations,
                sensitive,
                rejected,
            });
        }

        batches
    }

    /// Number of external calls the plan will make (batches plus lifecycle changes)
    pub fn len(&self) -> usize {
        self.create.len() + self.grants.len() + self.revokes.len() + self.drop.len()
    }

    /// Check if plan has nothing to execute
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if any grant batch touches a sensitive resource
    pub fn has_sensitive(&self) -> bool {
        self.grants.iter().any(|b| !b.sensitive.is_empty())
    }
}

fn non_empty(subjects: &[String]) -> Vec<String> {
    subjects
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect()
}

fn without_empty_qualifiers(subject: &str, resources: &Resources, mode: Mode) -> Resources {
    let mut kept = Resources::new();

    for (resource, capabilities) in resources {
        for (capability, qualifiers) in capabilities {
            if qualifiers.is_empty() {
                log::warn!(
                    "Skipping {mode} {capability} on {resource} for {subject}: no qualifiers listed"
                );
                continue;
            }
            kept.entry(resource.clone())
                .or_default()
                .insert(capability.clone(), qualifiers.clone());
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{NoSensitiveResources, SensitiveResources};
    use crate::error::{Error, Result};

    struct Renderer {
        manages: bool,
    }

    impl PermissionExecutor for Renderer {
        fn render(&self, subject: &str, resources: &Resources, mode: Mode) -> Result<Vec<String>> {
            if subject.contains('\'') {
                return Err(Error::operation(subject, "invalid identifier"));
            }
            Ok(resources
                .iter()
                .flat_map(|(resource, caps)| {
                    caps.keys()
                        .map(move |cap| format!("{mode} {cap} ON {resource} {subject}"))
                })
                .collect())
        }

        fn execute(&mut self, _subject: &str, _ops: &[String], _mode: Mode) -> Result<()> {
            Ok(())
        }

        fn manages_subjects(&self) -> bool {
            self.manages
        }
    }

    fn doc(grants: &[(&str, &str, &str, &[&str])]) -> AccessDocument {
        let mut d = AccessDocument::new();
        for (subject, resource, capability, qualifiers) in grants {
            d.insert(
                *subject,
                *resource,
                *capability,
                qualifiers.iter().map(|s| (*s).to_string()),
            );
        }
        d
    }

    #[test]
    fn test_grants_and_revokes_are_split() {
        let locked = doc(&[("bob", "users", "SELECT", &["id"])]);
        let desired = doc(&[("alice", "orders", "SELECT", &["id"])]);
        let diff = Diff::between(&desired, &locked);

        let plan = ApplyPlan::build(&diff, &Renderer { manages: false }, &NoSensitiveResources);

        assert_eq!(plan.grants.len(), 1);
        assert_eq!(plan.grants[0].subject, "alice");
        assert_eq!(plan.grants[0].operations, vec!["GRANT SELECT ON orders alice"]);
        assert_eq!(plan.revokes.len(), 1);
        assert_eq!(plan.revokes[0].subject, "bob");
        assert!(plan.create.is_empty() && plan.drop.is_empty());
    }

    #[test]
    fn test_lifecycle_only_when_managed() {
        let locked = doc(&[("bob", "users", "SELECT", &["id"])]);
        let desired = doc(&[("alice", "orders", "SELECT", &["id"])]);
        let diff = Diff::between(&desired, &locked);

        let plan = ApplyPlan::build(&diff, &Renderer { manages: true }, &NoSensitiveResources);
        assert_eq!(plan.create, vec!["alice".to_string()]);
        assert_eq!(plan.drop, vec!["bob".to_string()]);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_empty_subject_is_skipped_silently() {
        let desired = doc(&[("", "orders", "SELECT", &["id"])]);
        let diff = Diff::between(&desired, &AccessDocument::new());

        let plan = ApplyPlan::build(&diff, &Renderer { manages: true }, &NoSensitiveResources);
        assert!(plan.is_empty());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_empty_qualifiers_are_dropped() {
        let desired = doc(&[
            ("alice", "orders", "SELECT", &[]),
            ("alice", "orders", "UPDATE", &["status"]),
            ("bob", "users", "SELECT", &[]),
        ]);
        let diff = Diff::between(&desired, &AccessDocument::new());

        let plan = ApplyPlan::build(&diff, &Renderer { manages: false }, &NoSensitiveResources);

        assert_eq!(plan.grants.len(), 1);
        assert_eq!(plan.grants[0].operations, vec!["GRANT UPDATE ON orders alice"]);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].subject, "bob");
        assert!(matches!(plan.skipped[0].outcome, OperationOutcome::Skipped { .. }));
    }

    #[test]
    fn test_sensitive_resources_recorded_on_grants_only() {
        let locked = doc(&[("bob", "payments", "SELECT", &["id"])]);
        let desired = doc(&[
            ("alice", "payments", "SELECT", &["*"]),
            ("alice", "orders", "SELECT", &["id"]),
        ]);
        let diff = Diff::between(&desired, &locked);
        let classifier = SensitiveResources::new(["payments"]);

        let plan = ApplyPlan::build(&diff, &Renderer { manages: false }, &classifier);

        assert_eq!(plan.grants[0].sensitive, vec!["payments".to_string()]);
        assert!(plan.revokes[0].sensitive.is_empty());
        assert!(plan.has_sensitive());
    }

    #[test]
    fn test_render_failure_rejects_batch() {
        let desired = doc(&[("o'brien", "orders", "SELECT", &["id"])]);
        let diff = Diff::between(&desired, &AccessDocument::new());

        let plan = ApplyPlan::build(&diff, &Renderer { manages: false }, &NoSensitiveResources);
        assert!(plan.grants[0].rejected.is_some());
        assert!(plan.grants[0].operations.is_empty());
    }
}
