//! Append-only activity log.
//!
//! The log is a plain value built once at startup and handed to the components
//! that record events. Each write opens the file in append mode and closes it
//! again; failures are dropped so logging can never break a run.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// A log appending to `path`. Parent directories are created on first write.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends one timestamped line. Best effort.
    pub fn record(&self, event: &str) {
        let Some(path) = &self.path else {
            return;
        };

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            // Keep one event per line even for multi-line payloads.
            let _ = writeln!(file, "[{}] {}", timestamp, event.replace('\n', " "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_log_writes_nothing() {
        let log = ActivityLog::disabled();
        assert!(!log.is_enabled());
        log.record("ignored");
        assert!(log.path().is_none());
    }

    #[test]
    fn test_records_append_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("psgen.log");
        let log = ActivityLog::to_file(&path);

        log.record("first event");
        log.record("second\nevent");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] first event"));
        assert!(lines[1].ends_with("] second event"));
    }

    #[test]
    fn test_unwritable_path_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for append.
        let log = ActivityLog::to_file(dir.path());
        log.record("dropped");
    }
}
