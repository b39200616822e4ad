//! Diff computation between desired and locked documents
//!
//! [`diff`] is applied twice per pass: `diff(desired, locked)` yields what to
//! grant, `diff(locked, desired)` yields what to revoke.

use crate::sets::{is_wildcard, set_difference, set_equal};
use crate::types::{AccessDocument, Capabilities, Resources};
use serde::{Deserialize, Serialize};

/// Everything present in `target` that `source` lacks
///
/// - subjects missing from `source` are taken wholesale
/// - resources missing under a shared subject are taken wholesale
/// - capabilities missing under a shared resource are taken with all qualifiers
/// - shared capabilities contribute `target − source` qualifiers; wildcard sets
///   are compared as whole values and contribute `target` in full when unequal
///
/// Entities that end up empty are omitted. An empty qualifier list on a
/// capability that `source` lacks is kept, so the applier can warn about it.
pub fn diff(target: &AccessDocument, source: &AccessDocument) -> AccessDocument {
    target
        .iter()
        .filter_map(|(subject, target_resources)| {
            let resources = match source.get(subject) {
                None => target_resources.clone(),
                Some(source_resources) => {
                    let resources = diff_resources(target_resources, source_resources);
                    if resources.is_empty() {
                        return None;
                    }
                    resources
                }
            };
            Some((subject.clone(), resources))
        })
        .collect()
}

fn diff_resources(target: &Resources, source: &Resources) -> Resources {
    let mut result = Resources::new();

    for (resource, target_caps) in target {
        match source.get(resource) {
            None => {
                result.insert(resource.clone(), target_caps.clone());
            }
            Some(source_caps) => {
                let caps = diff_capabilities(target_caps, source_caps);
                if !caps.is_empty() {
                    result.insert(resource.clone(), caps);
                }
            }
        }
    }

    result
}

fn diff_capabilities(target: &Capabilities, source: &Capabilities) -> Capabilities {
    let mut result = Capabilities::new();

    for (capability, target_qualifiers) in target {
        let Some(source_qualifiers) = source.get(capability) else {
            result.insert(capability.clone(), target_qualifiers.clone());
            continue;
        };

        if set_equal(target_qualifiers, source_qualifiers) {
            continue;
        }

        let qualifiers = if is_wildcard(target_qualifiers) || is_wildcard(source_qualifiers) {
            target_qualifiers.clone()
        } else {
            set_difference(target_qualifiers, source_qualifiers)
        };

        if !qualifiers.is_empty() {
            result.insert(capability.clone(), qualifiers);
        }
    }

    result
}

/// Grants to add and to remove for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub to_add: AccessDocument,
    pub to_remove: AccessDocument,
    /// Subjects present in desired but absent from locked
    pub new_subjects: Vec<String>,
    /// Subjects present in locked but absent from desired
    pub removed_subjects: Vec<String>,
}

impl Diff {
    /// Compute both directions between the desired and locked documents
    pub fn between(desired: &AccessDocument, locked: &AccessDocument) -> Self {
        Self {
            to_add: diff(desired, locked),
            to_remove: diff(locked, desired),
            new_subjects: missing_subjects(desired, locked),
            removed_subjects: missing_subjects(locked, desired),
        }
    }

    /// Check if there is nothing to add, remove, create or drop
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty()
            && self.to_remove.is_empty()
            && self.new_subjects.is_empty()
            && self.removed_subjects.is_empty()
    }
}

fn missing_subjects(target: &AccessDocument, source: &AccessDocument) -> Vec<String> {
    target
        .subjects()
        .filter(|s| !source.contains_subject(s))
        .map(str::to_string)
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Number of (subject, resource, capability) grants with something to add
    pub grants_to_add: usize,
    /// Number of (subject, resource, capability) grants with something to remove
    pub grants_to_remove: usize,
    /// Number of subjects appearing for the first time
    pub new_subjects: usize,
    /// Number of subjects removed wholesale
    pub removed_subjects: usize,
}

impl DiffSummary {
    /// Create a summary from a diff
    pub fn from_diff(diff: &Diff) -> Self {
        Self {
            grants_to_add: diff.to_add.grant_count(),
            grants_to_remove: diff.to_remove.grant_count(),
            new_subjects: diff.new_subjects.len(),
            removed_subjects: diff.removed_subjects.len(),
        }
    }

    /// Total number of grant changes
    pub fn total(&self) -> usize {
        self.grants_to_add + self.grants_to_remove
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0 || self.new_subjects > 0 || self.removed_subjects > 0
    }
}
