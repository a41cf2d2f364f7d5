//! Audit logging for driver lifecycle events.
//!
//! Persistent JSONL trail of startup, shutdown and fatal initialization
//! failures, written append-only so restarts preserve history.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Types of events that are logged in the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Driver process started
    DriverStart,
    /// Driver process shut down
    DriverShutdown,
    /// One-shot device initialization failed; driver refused to cycle
    InitFailure,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Wall-clock Unix timestamp in microseconds
    pub unix_us: u64,
    /// Type of event being logged
    pub event_type: AuditEventType,
    /// Additional event-specific details
    pub details: serde_json::Value,
}

/// Thread-safe audit logger that writes to a JSONL file
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Create a new audit logger writing to the specified path.
    /// The file is opened in append mode to preserve existing logs.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    /// Log an audit entry. This is thread-safe and can be called from any thread.
    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Convenience method to log with just event type and details
    pub fn log_event(
        &self,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            unix_us: unix_us(),
            event_type,
            details,
        })
    }
}

fn unix_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
