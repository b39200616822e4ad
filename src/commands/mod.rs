// Access reconciliation
pub mod access;

// Tool configuration
pub mod config;
