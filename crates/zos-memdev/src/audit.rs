//! Device audit log
//!
//! Records every file operation routed through the dispatcher (request and
//! response) for an audit trail. Append-only with monotonic IDs; the oldest
//! events are trimmed once the log reaches capacity.

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Event identifier (monotonic)
pub type EventId = u64;

/// Maximum number of events to keep in memory
pub const MAX_AUDIT_EVENTS: usize = 4096;

/// File operation codes, as the host routes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    Open,
    Read,
    Write,
    Seek,
    Ioctl,
    Release,
}

/// A device event (operation request or response).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID (monotonic)
    pub id: EventId,
    /// Session the operation ran against, if any
    pub session: Option<SessionId>,
    /// Timestamp (nanos since the dispatcher started)
    pub timestamp: u64,
    /// Event type (request or response)
    pub event_type: AuditEventType,
}

/// Type of device event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    /// Operation request from the host
    Request {
        /// Operation code
        op: OpCode,
        /// Operation arguments (minor / count / command, length)
        args: [u64; 2],
    },
    /// Operation response to the host
    Response {
        /// ID of the request this responds to
        request_id: EventId,
        /// Return code (negative = -errno)
        result: i64,
    },
}

/// Audit log for device operations.
pub struct AuditLog {
    /// Event entries (append-only)
    events: Vec<AuditEvent>,
    /// Next event ID to assign
    next_id: EventId,
    /// Retained event cap
    capacity: usize,
}

impl AuditLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        Self::with_capacity(MAX_AUDIT_EVENTS)
    }

    /// Create a log that retains at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 0,
            capacity,
        }
    }

    /// Log an operation request.
    ///
    /// Returns the event ID for correlating with the response.
    pub fn log_request(
        &mut self,
        session: Option<SessionId>,
        op: OpCode,
        args: [u64; 2],
        timestamp: u64,
    ) -> EventId {
        self.push(session, timestamp, AuditEventType::Request { op, args })
    }

    /// Log an operation response.
    pub fn log_response(
        &mut self,
        session: Option<SessionId>,
        request_id: EventId,
        result: i64,
        timestamp: u64,
    ) {
        self.push(
            session,
            timestamp,
            AuditEventType::Response { request_id, result },
        );
    }

    fn push(&mut self, session: Option<SessionId>, timestamp: u64, event_type: AuditEventType) -> EventId {
        let id = self.next_id;
        self.next_id += 1;

        self.events.push(AuditEvent {
            id,
            session,
            timestamp,
            event_type,
        });

        self.trim_if_needed();
        id
    }

    /// Get all events.
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Get the most recent N events, newest first.
    pub fn get_recent(&self, count: usize) -> Vec<&AuditEvent> {
        self.events.iter().rev().take(count).collect()
    }

    /// Response recorded for a request, if any.
    pub fn response_for(&self, request_id: EventId) -> Option<i64> {
        self.events.iter().find_map(|e| match e.event_type {
            AuditEventType::Response {
                request_id: rid,
                result,
            } if rid == request_id => Some(result),
            _ => None,
        })
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the next event ID.
    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    /// Serialize the retained events as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.events)
    }

    /// Trim old events if exceeding capacity.
    fn trim_if_needed(&mut self) {
        if self.events.len() > self.capacity {
            let drain_count = self.events.len() - self.capacity;
            self.events.drain(0..drain_count);
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_creation() {
        let log = AuditLog::new();
        assert!(log.is_empty());
        assert_eq!(log.next_id(), 0);
    }

    #[test]
    fn test_request_response() {
        let mut log = AuditLog::new();
        let req_id = log.log_request(Some(SessionId(3)), OpCode::Read, [100, 0], 1000);
        log.log_response(Some(SessionId(3)), req_id, 16, 1100);

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.events()[0].event_type,
            AuditEventType::Request {
                op: OpCode::Read,
                args: [100, 0]
            }
        );
        assert_eq!(log.response_for(req_id), Some(16));
    }

    #[test]
    fn test_trims_oldest() {
        let mut log = AuditLog::with_capacity(4);
        for i in 0..10 {
            log.log_request(None, OpCode::Open, [i, 0], i);
        }
        assert_eq!(log.len(), 4);
        assert_eq!(log.events()[0].id, 6);
        assert_eq!(log.next_id(), 10);
    }

    #[test]
    fn test_get_recent() {
        let mut log = AuditLog::new();
        for i in 0..5 {
            log.log_request(None, OpCode::Open, [i, 0], i);
        }
        let recent = log.get_recent(2);
        assert_eq!(recent[0].id, 4);
        assert_eq!(recent[1].id, 3);
    }

    #[test]
    fn test_json_export() {
        let mut log = AuditLog::new();
        log.log_request(None, OpCode::Ioctl, [0, 16], 5);
        let json = log.to_json().unwrap();
        assert!(json.contains("Ioctl"));
    }
}
