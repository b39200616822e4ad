//! Execution engine for gatekeeper
//!
//! The engine wires a reconciliation pass to the terminal:
//! 1. Previewing - show what a refresh would change
//! 2. Confirming - ask before anything is sent
//! 3. Executing - run the pass, alerting and auditing as it goes

pub mod differ;
pub mod executor;

pub use executor::{ExecuteOptions, execute, print_summary};
