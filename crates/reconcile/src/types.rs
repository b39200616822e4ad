//! Core types for access reconciliation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sub-scopes narrowing a capability (e.g. column names).
///
/// Kept in file order so documents round-trip byte-for-byte; compared as sets.
pub type Qualifiers = Vec<String>;

/// Capability name → qualifiers granted under it
pub type Capabilities = BTreeMap<String, Qualifiers>;

/// Resource name → capabilities held on it
pub type Resources = BTreeMap<String, Capabilities>;

/// Desired or locked access state: subject → resource → capability → qualifiers
///
/// Ordered maps keep iteration, log output and serialized key order stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessDocument {
    subjects: BTreeMap<String, Resources>,
}

impl AccessDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the document holds no subjects
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Number of subjects in the document
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Whether a subject appears in the document (even with no grants)
    pub fn contains_subject(&self, subject: &str) -> bool {
        self.subjects.contains_key(subject)
    }

    /// Resources held by a subject
    pub fn get(&self, subject: &str) -> Option<&Resources> {
        self.subjects.get(subject)
    }

    /// Subject names in sorted order
    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }

    /// Iterate over subjects and their resources
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resources)> {
        self.subjects.iter()
    }

    /// Set the full resource map of a subject, replacing what was there
    pub fn insert_subject(&mut self, subject: impl Into<String>, resources: Resources) {
        self.subjects.insert(subject.into(), resources);
    }

    /// Set the capability map of one resource held by a subject
    pub fn insert_resource(
        &mut self,
        subject: impl Into<String>,
        resource: impl Into<String>,
        capabilities: Capabilities,
    ) {
        self.subjects
            .entry(subject.into())
            .or_default()
            .insert(resource.into(), capabilities);
    }

    /// Add qualifiers under one capability, keeping existing ones and skipping duplicates
    pub fn insert(
        &mut self,
        subject: impl Into<String>,
        resource: impl Into<String>,
        capability: impl Into<String>,
        qualifiers: impl IntoIterator<Item = String>,
    ) {
        let existing = self
            .subjects
            .entry(subject.into())
            .or_default()
            .entry(resource.into())
            .or_default()
            .entry(capability.into())
            .or_default();

        for qualifier in qualifiers {
            if !existing.contains(&qualifier) {
                existing.push(qualifier);
            }
        }
    }

    /// Flatten into individual grants
    pub fn grants(&self) -> Vec<Grant> {
        self.subjects
            .iter()
            .flat_map(|(subject, resources)| {
                resources.iter().flat_map(move |(resource, capabilities)| {
                    capabilities
                        .iter()
                        .map(move |(capability, qualifiers)| Grant {
                            subject: subject.clone(),
                            resource: resource.clone(),
                            capability: capability.clone(),
                            qualifiers: qualifiers.clone(),
                        })
                })
            })
            .collect()
    }

    /// Total number of (subject, resource, capability) grants
    pub fn grant_count(&self) -> usize {
        self.subjects
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    /// Rebuild a document from flattened grants
    pub fn from_grants(grants: impl IntoIterator<Item = Grant>) -> Self {
        let mut document = Self::new();
        for grant in grants {
            document.insert(
                grant.subject,
                grant.resource,
                grant.capability,
                grant.qualifiers,
            );
        }
        document
    }
}

impl FromIterator<(String, Resources)> for AccessDocument {
    fn from_iter<I: IntoIterator<Item = (String, Resources)>>(iter: I) -> Self {
        Self {
            subjects: iter.into_iter().collect(),
        }
    }
}

/// A single grant, identified by (subject, resource, capability)
///
/// The qualifiers are the grant's value, not part of its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub subject: String,
    pub resource: String,
    pub capability: String,
    pub qualifiers: Qualifiers,
}

impl Grant {
    /// Identity key of this grant
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.subject, &self.resource, &self.capability)
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}({}) on {}",
            self.subject,
            self.capability,
            self.qualifiers.join(", "),
            self.resource
        )
    }
}

/// Direction of an apply batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Grant,
    Revoke,
}

impl Mode {
    /// Upper-case verb used in operation text and logs
    pub fn verb(self) -> &'static str {
        match self {
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Outcome of one subject's batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    /// Every operation in the batch was accepted by the external system
    Applied,
    /// The batch (or part of it) was rejected
    Failed { error: String },
    /// Nothing was sent
    Skipped { reason: String },
}

/// Result of applying one subject's batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub subject: String,
    pub mode: Mode,
    /// Exact operation text that was (or would have been) sent
    pub operations: Vec<String>,
    pub outcome: OperationOutcome,
}

impl OperationResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, OperationOutcome::Failed { .. })
    }

    /// Operations joined the way they are sent for a combined batch
    pub fn operation_text(&self) -> String {
        self.operations.join("; ")
    }
}

/// Summary of an apply phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub alerts_sent: usize,
    pub subjects_created: usize,
    pub subjects_dropped: usize,
}

impl ApplySummary {
    /// Check if the apply phase was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of batches processed
    pub fn total(&self) -> usize {
        self.applied + self.failed + self.skipped
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ApplySummary) {
        self.applied += other.applied;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.alerts_sent += other.alerts_sent;
        self.subjects_created += other.subjects_created;
        self.subjects_dropped += other.subjects_dropped;
    }

    /// Add a batch result to the summary
    pub fn add_result(&mut self, result: &OperationResult) {
        match result.outcome {
            OperationOutcome::Applied => self.applied += 1,
            OperationOutcome::Failed { .. } => self.failed += 1,
            OperationOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Compute and report the diff, but apply and persist nothing
    pub dry_run: bool,
    /// Bypass the checksum gate and treat the locked state as empty
    pub ignore_lock: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_insert_merges_qualifiers() {
        let mut doc = AccessDocument::new();
        doc.insert("alice", "orders", "SELECT", q(&["id"]));
        doc.insert("alice", "orders", "SELECT", q(&["id", "status"]));

        assert_eq!(doc.get("alice").unwrap()["orders"]["SELECT"], q(&["id", "status"]));
        assert_eq!(doc.grant_count(), 1);
    }

    #[test]
    fn test_grants_round_trip() {
        let mut doc = AccessDocument::new();
        doc.insert("alice", "orders", "SELECT", q(&["id", "status"]));
        doc.insert("alice", "orders", "UPDATE", q(&["status"]));
        doc.insert("bob", "users", "SELECT", q(&["*"]));

        let grants = doc.grants();
        assert_eq!(grants.len(), 3);
        assert_eq!(grants[0].key(), ("alice", "orders", "SELECT"));
        assert_eq!(AccessDocument::from_grants(grants), doc);
    }

    #[test]
    fn test_document_serializes_as_plain_map() {
        let mut doc = AccessDocument::new();
        doc.insert("alice", "orders", "SELECT", q(&["id"]));

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"alice":{"orders":{"SELECT":["id"]}}}"#);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ApplySummary::default();
        summary.add_result(&OperationResult {
            subject: "alice".into(),
            mode: Mode::Grant,
            operations: vec!["GRANT x".into()],
            outcome: OperationOutcome::Applied,
        });
        summary.add_result(&OperationResult {
            subject: "bob".into(),
            mode: Mode::Revoke,
            operations: vec!["REVOKE y".into()],
            outcome: OperationOutcome::Failed {
                error: "denied".into(),
            },
        });

        assert_eq!(summary.total(), 2);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_grant_display() {
        let grant = Grant {
            subject: "alice".into(),
            resource: "orders".into(),
            capability: "SELECT".into(),
            qualifiers: q(&["id", "status"]),
        };
        assert_eq!(grant.to_string(), "alice SELECT(id, status) on orders");
    }
}
