//! # Reconcile
//!
//! Declarative access reconciliation.
//!
//! An access config describes who should hold which grants. After each pass a
//! lock file records the checksum of that config and a copy of what was
//! applied. The next pass diffs the config against the lock and sends only the
//! difference to the external permission system.
//!
//! ## Core Concepts
//!
//! - **AccessDocument**: `subject → resource → capability → qualifiers`
//! - **Checksum gate**: skips a pass when the config bytes are unchanged
//! - **StateStore**: loads the config and its lock, writes both back
//! - **Diff**: grants to add and to remove, at qualifier granularity
//! - **ApplyPlan** / [`apply`]: per-subject batches, grants before revokes
//! - **ReconcilePass**: the whole pass, from gate to lock
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{
//!     AutoConfirm, GrantCodec, NoReport, PermissionExecutor, ReconcilePass, StateStore,
//! };
//!
//! let store = StateStore::for_config("sql-access.json");
//! let report = ReconcilePass::new(&store, &GrantCodec).run(
//!     || Ok(MyExecutor::connect()?),
//!     &mut NoReport,
//!     &mut AutoConfirm,
//! )?;
//!
//! if report.skipped {
//!     println!("nothing to do");
//! }
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`PermissionExecutor`]: renders and sends grant/revoke batches
//! - [`SensitivityClassifier`]: flags resources whose grants raise an alert
//! - [`AlertSink`]: delivers those alerts
//! - [`ApplyReporter`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations

pub mod checksum;
pub mod codec;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod pass;
pub mod planner;
pub mod sets;
pub mod store;
pub mod types;

// Re-export main types at crate root
pub use codec::{DocumentCodec, GLOBAL_ROLES, GrantCodec, RoleCodec};
pub use context::{
    AlertSink, ApplyReporter, AutoConfirm, AutoDecline, ConfirmCallback, LogAlerts, NoReport,
    NoSensitiveResources, PermissionExecutor, SensitiveResources, SensitivityClassifier,
};
pub use diff::{Diff, DiffSummary, diff};
pub use error::{Error, Result};
pub use executor::apply;
pub use pass::{PassReport, PassState, ReconcilePass};
pub use planner::{ApplyPlan, SubjectBatch};
pub use store::{LockedDocument, StateStore};
pub use types::{
    AccessDocument, ApplySummary, Capabilities, Grant, Mode, OperationOutcome, OperationResult,
    Qualifiers, ReconcileOptions, Resources,
};
