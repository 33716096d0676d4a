//! Audit trail for hub lifecycle events.
//!
//! One JSON object per line: service start/stop, bulk connect/close
//! outcomes and reconnects made by the supervisor.

use chrono::{DateTime, Utc};
use hub_core::BulkOutcome;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Types of events that are logged in the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SystemStart,
    SystemShutdown,
    /// Startup connect across all hubs
    HubsConnected,
    /// Shutdown close across all hubs
    HubsClosed,
    /// Supervisor re-established a dropped session
    HubReconnected,
    HubReconnectFailed,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Additional event-specific details
    pub details: serde_json::Value,
}

/// Thread-safe audit logger that writes to a JSONL file
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Log an event stamped with the current wall-clock time.
    pub fn log_event(
        &self,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            timestamp: Utc::now(),
            event_type,
            details,
        })
    }
}

/// Per-hub results of a bulk action, as audit details.
pub fn outcome_details(outcome: &BulkOutcome) -> serde_json::Value {
    let hubs: Vec<_> = outcome
        .iter()
        .map(|(hub, result)| match result {
            Ok(()) => serde_json::json!({ "hub": hub, "ok": true }),
            Err(e) => serde_json::json!({ "hub": hub, "ok": false, "error": e.to_string() }),
        })
        .collect();
    serde_json::json!({ "hubs": hubs })
}
