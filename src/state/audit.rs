//! Audit trail for registry mutations.
//!
//! Each vhost holds an [`AuditSink`] injected at construction time. Successful
//! mutations of the user, channel, and vhost registries are reported as
//! [`AuditEvent`]s and rendered as lines of the form
//! `vhost[<path>]: <EVENT> key='value' ...`.

use parking_lot::Mutex;
use std::fmt;
use tracing::info;

/// A successful registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    AddUser { name: String, permission: u32 },
    DeleteUser { name: String },
    SetUserPermission { name: String, permission: u32 },
    CreateChannel { name: String },
    AddVhost,
    DeleteVhost,
}

impl AuditEvent {
    /// Event name as it appears in the audit line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddUser { .. } => "ADD_USER",
            Self::DeleteUser { .. } => "DELETE_USER",
            Self::SetUserPermission { .. } => "SET_USER_PERMISSION",
            Self::CreateChannel { .. } => "CREATE_CHANNEL",
            Self::AddVhost => "ADD_VHOST",
            Self::DeleteVhost => "DELETE_VHOST",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Self::AddUser { name, permission } | Self::SetUserPermission { name, permission } => {
                write!(f, " name='{name}' permission={permission}")
            }
            Self::DeleteUser { name } | Self::CreateChannel { name } => write!(f, " name='{name}'"),
            Self::AddVhost | Self::DeleteVhost => Ok(()),
        }
    }
}

/// Render the full audit line for a vhost.
pub fn audit_line(vhost: &str, event: &AuditEvent) -> String {
    format!("vhost[{vhost}]: {event}")
}

/// Sink receiving audit events.
pub trait AuditSink: Send + Sync {
    /// Called after a registry mutation succeeded.
    fn record(&self, vhost: &str, event: &AuditEvent);
}

/// Default sink: emits each line as an `info` event on the
/// `slbroker::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, vhost: &str, event: &AuditEvent) {
        info!(
            target: "slbroker::audit",
            vhost = %vhost,
            event = event.name(),
            "{}",
            audit_line(vhost, event)
        );
    }
}

/// Sink keeping every line in memory.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    lines: Mutex<Vec<String>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Whether a line containing every fragment was recorded.
    pub fn contains(&self, fragments: &[&str]) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|line| fragments.iter().all(|f| line.contains(f)))
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, vhost: &str, event: &AuditEvent) {
        self.lines.lock().push(audit_line(vhost, event));
    }
}
