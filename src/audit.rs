//! Local audit trail
//!
//! One line per attempted operation: `<RFC3339 timestamp> <message>`. The file
//! is rotated to `<file>.1` once it grows past [`MAX_SIZE`].

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Size above which the log is rotated before the next write
pub const MAX_SIZE: u64 = 1_000_000;

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry
    pub fn record(&self, message: &str) -> Result<()> {
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        writeln!(file, "{timestamp} {message}")
            .with_context(|| format!("Failed to write audit log: {}", self.path.display()))?;
        Ok(())
    }

    /// Append one entry, logging instead of failing
    pub fn record_or_warn(&self, message: &str) {
        if let Err(e) = self.record(message) {
            log::warn!("{e:#}");
        }
    }

    fn rotated_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".1");
        PathBuf::from(name)
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let Ok(meta) = fs::metadata(&self.path) else {
            return Ok(());
        };
        if meta.len() <= MAX_SIZE {
            return Ok(());
        }

        let rotated = self.rotated_path();
        log::info!("Rotating audit log to {}", rotated.display());
        fs::rename(&self.path, &rotated)
            .with_context(|| format!("Failed to rotate audit log: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends_timestamped_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit_log");
        let log = AuditLog::new(&path);

        log.record("GRANT alice").unwrap();
        log.record("REVOKE bob").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" GRANT alice"));
        assert!(lines[1].ends_with(" REVOKE bob"));

        let (timestamp, _) = lines[0].split_once(' ').unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn test_rotates_large_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit_log");
        fs::write(&path, vec![b'x'; (MAX_SIZE + 1) as usize]).unwrap();

        let log = AuditLog::new(&path);
        log.record("fresh").unwrap();

        assert!(dir.path().join("audit_log.1").exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with(" fresh\n"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_record_or_warn_swallows_errors() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("missing").join("audit_log"));
        log.record_or_warn("ignored");
        assert!(log.record("ignored").is_err());
    }
}
