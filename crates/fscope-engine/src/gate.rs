//! Change-safety gate.
//!
//! Process-wide write policy: the editor is read-only until explicitly
//! unlocked, a mounted device is refused at open time unless the read
//! override is set, and successful writes are appended to an audit log.
//! The ordering is deliberate: device write first, audit record second, and
//! a failure to write the record never aborts the write that already
//! succeeded.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::EngineError;

pub struct SafetyGate {
    write_enabled: bool,
    allow_mounted_read: bool,
    log_path: Option<PathBuf>,
}

impl SafetyGate {
    /// Read-only, no mounted-read override, no audit log.
    pub fn new() -> Self {
        Self {
            write_enabled: false,
            allow_mounted_read: false,
            log_path: None,
        }
    }

    pub fn with_allow_mounted_read(mut self, allow: bool) -> Self {
        self.allow_mounted_read = allow;
        self
    }

    pub fn with_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.log_path = path;
        self
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    pub fn set_write_enabled(&mut self, enabled: bool) {
        self.write_enabled = enabled;
    }

    pub fn logging_enabled(&self) -> bool {
        self.log_path.is_some()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Mutating handlers call this before touching device bytes.
    pub fn check_write_allowed(&self) -> Result<(), EngineError> {
        if self.write_enabled {
            Ok(())
        } else {
            Err(EngineError::WriteDisabled)
        }
    }

    /// Evaluated once at device-open time, not on every read.
    pub fn check_open_policy(&self, mounted: bool, device: &str) -> Result<(), EngineError> {
        if mounted && !self.allow_mounted_read {
            return Err(EngineError::MountedDeviceRefused {
                device: device.to_string(),
            });
        }
        Ok(())
    }

    /// Append one timestamped line to the audit log. Call only after the
    /// device write succeeded. A log failure is the caller's to report as a
    /// warning; it must not undo or fail the write.
    pub fn record(&self, description: &str) -> io::Result<()> {
        let Some(path) = &self.log_path else {
            return Ok(());
        };
        tracing::debug!(path = %path.display(), description, "appending audit record");
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        writeln!(file, "{stamp}  {description}")
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_disabled_by_default() {
        let gate = SafetyGate::new();
        assert!(matches!(
            gate.check_write_allowed(),
            Err(EngineError::WriteDisabled)
        ));

        let mut gate = gate;
        gate.set_write_enabled(true);
        assert!(gate.check_write_allowed().is_ok());
    }

    #[test]
    fn mounted_open_requires_override() {
        let gate = SafetyGate::new();
        assert!(gate.check_open_policy(false, "/dev/sda1").is_ok());
        assert!(matches!(
            gate.check_open_policy(true, "/dev/sda1"),
            Err(EngineError::MountedDeviceRefused { .. })
        ));

        let gate = SafetyGate::new().with_allow_mounted_read(true);
        assert!(gate.check_open_policy(true, "/dev/sda1").is_ok());
    }

    #[test]
    fn record_appends_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("audit.log");
        let gate = SafetyGate::new().with_log_path(Some(log.clone()));

        gate.record("patched s_magic at 0x438").unwrap();
        gate.record("patched s_inodes_count at 0x400").unwrap();

        let text = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("patched s_magic at 0x438"));
    }

    #[test]
    fn record_without_log_path_is_a_no_op() {
        let gate = SafetyGate::new();
        gate.record("anything").unwrap();
    }
}
