//! Host dispatcher - file operations in, return codes out
//!
//! The host routes every call on a device node through [`Dispatcher::dispatch`],
//! the in-process equivalent of a driver's file-operations table. The
//! dispatcher owns open sessions, converts errors to `-errno` return codes and
//! records each request/response pair in the audit log.
//!
//! # Return codes
//!
//! | Operation | Success                    |
//! |-----------|----------------------------|
//! | Open      | session id                 |
//! | Read      | byte count (bytes in data) |
//! | Write     | byte count                 |
//! | Seek      | new position               |
//! | Ioctl     | 0                          |
//! | Release   | 0                          |
//!
//! Failures return `-errno`; an unknown session id is `-EBADF`.

use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;
use zos_memdev_core::{errno, MemDevError};

use crate::audit::{AuditEvent, AuditLog, OpCode};
use crate::device::{DeviceIdentity, MemDevice};
use crate::session::{Session, SessionId};

/// A file operation routed from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    /// Open a device node
    Open { major: u32, minor: u32 },
    /// Read at the session cursor
    Read { session: SessionId, max_count: usize },
    /// Write at the session cursor
    Write { session: SessionId, data: Vec<u8> },
    /// Move the session cursor
    Seek { session: SessionId, from: SeekFrom },
    /// Configure command with an optional raw payload
    Ioctl { cmd: u32, payload: Option<Vec<u8>> },
    /// Close a session
    Release { session: SessionId },
}

impl FileOp {
    fn op_code(&self) -> OpCode {
        match self {
            FileOp::Open { .. } => OpCode::Open,
            FileOp::Read { .. } => OpCode::Read,
            FileOp::Write { .. } => OpCode::Write,
            FileOp::Seek { .. } => OpCode::Seek,
            FileOp::Ioctl { .. } => OpCode::Ioctl,
            FileOp::Release { .. } => OpCode::Release,
        }
    }

    fn session(&self) -> Option<SessionId> {
        match self {
            FileOp::Read { session, .. }
            | FileOp::Write { session, .. }
            | FileOp::Seek { session, .. }
            | FileOp::Release { session } => Some(*session),
            FileOp::Open { .. } | FileOp::Ioctl { .. } => None,
        }
    }

    /// Two audit arguments per operation.
    fn audit_args(&self) -> [u64; 2] {
        match self {
            FileOp::Open { major, minor } => [*major as u64, *minor as u64],
            FileOp::Read { max_count, .. } => [*max_count as u64, 0],
            FileOp::Write { data, .. } => [data.len() as u64, 0],
            FileOp::Seek { from, .. } => match *from {
                SeekFrom::Start(offset) => [0, offset],
                SeekFrom::Current(delta) => [1, delta as u64],
                SeekFrom::End(delta) => [2, delta as u64],
            },
            FileOp::Ioctl { cmd, payload } => {
                [*cmd as u64, payload.as_ref().map_or(0, |p| p.len() as u64)]
            }
            FileOp::Release { .. } => [0, 0],
        }
    }
}

/// Outcome of a dispatched operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpResult {
    /// Non-negative on success, `-errno` on failure
    pub code: i64,
    /// Bytes returned by a read
    pub data: Vec<u8>,
}

impl OpResult {
    fn ok(code: i64) -> Self {
        Self {
            code,
            data: Vec::new(),
        }
    }

    fn with_data(data: Vec<u8>) -> Self {
        Self {
            code: data.len() as i64,
            data,
        }
    }

    fn errno(errno: i32) -> Self {
        Self::ok(-(errno as i64))
    }

    /// True for a non-negative return code.
    pub fn is_ok(&self) -> bool {
        self.code >= 0
    }

    /// Errno carried by a failed result.
    pub fn error(&self) -> Option<i32> {
        (self.code < 0).then(|| (-self.code) as i32)
    }
}

impl From<MemDevError> for OpResult {
    fn from(e: MemDevError) -> Self {
        OpResult::errno(e.errno())
    }
}

/// Routes host file operations to a [`MemDevice`].
pub struct Dispatcher {
    device: MemDevice,
    sessions: Mutex<BTreeMap<SessionId, Arc<Mutex<Session>>>>,
    audit: Mutex<AuditLog>,
    started: Instant,
}

impl Dispatcher {
    /// Wrap a device.
    pub fn new(device: MemDevice) -> Self {
        Self {
            device,
            sessions: Mutex::new(BTreeMap::new()),
            audit: Mutex::new(AuditLog::new()),
            started: Instant::now(),
        }
    }

    /// The wrapped device.
    pub fn device(&self) -> &MemDevice {
        &self.device
    }

    /// Number of open sessions.
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Copy of the retained audit events.
    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit.lock().events().to_vec()
    }

    /// Audit trail as JSON.
    pub fn audit_json(&self) -> Result<String, serde_json::Error> {
        self.audit.lock().to_json()
    }

    fn now_nanos(&self) -> u64 {
        self.started.elapsed().as_nanos() as u64
    }

    /// Execute one file operation.
    pub fn dispatch(&self, op: FileOp) -> OpResult {
        let session = op.session();
        let request_id =
            self.audit
                .lock()
                .log_request(session, op.op_code(), op.audit_args(), self.now_nanos());

        let result = match op {
            FileOp::Open { major, minor } => self.do_open(DeviceIdentity::new(major, minor)),
            FileOp::Read { session, max_count } => self.with_session(session, |s| {
                self.device
                    .read(s, max_count)
                    .map_or_else(OpResult::from, |(bytes, _)| OpResult::with_data(bytes))
            }),
            FileOp::Write { session, data } => self.with_session(session, |s| {
                self.device
                    .write(s, &data)
                    .map_or_else(OpResult::from, |(count, _)| OpResult::ok(count as i64))
            }),
            FileOp::Seek { session, from } => self.with_session(session, |s| {
                self.device
                    .seek(s, from)
                    .map_or_else(OpResult::from, |pos| OpResult::ok(pos as i64))
            }),
            FileOp::Ioctl { cmd, payload } => self
                .device
                .ioctl(cmd, payload.as_deref())
                .map_or_else(OpResult::from, |()| OpResult::ok(0)),
            FileOp::Release { session } => self.do_release(session),
        };

        self.audit
            .lock()
            .log_response(session, request_id, result.code, self.now_nanos());
        result
    }

    fn do_open(&self, identity: DeviceIdentity) -> OpResult {
        match self.device.open(identity) {
            Ok(session) => {
                let id = session.id();
                self.sessions
                    .lock()
                    .insert(id, Arc::new(Mutex::new(session)));
                OpResult::ok(id.0 as i64)
            }
            Err(e) => e.into(),
        }
    }

    fn do_release(&self, id: SessionId) -> OpResult {
        let Some(entry) = self.sessions.lock().remove(&id) else {
            debug!(session = id.0, "release of unknown session");
            return OpResult::errno(errno::EBADF);
        };
        // An operation still in flight holds the other reference and drops it
        // when it finishes.
        if let Ok(session) = Arc::try_unwrap(entry) {
            self.device.close(session.into_inner());
        }
        OpResult::ok(0)
    }

    /// Run `f` on a session without holding the session map lock.
    fn with_session(&self, id: SessionId, f: impl FnOnce(&mut Session) -> OpResult) -> OpResult {
        let Some(entry) = self.sessions.lock().get(&id).cloned() else {
            debug!(session = id.0, "operation on unknown session");
            return OpResult::errno(errno::EBADF);
        };
        let mut session = entry.lock();
        f(&mut session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEventType;
    use zos_memdev_core::{MemInit, CMD_CONFIGURE};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(MemDevice::default())
    }

    fn open(d: &Dispatcher, minor: u32) -> SessionId {
        let result = d.dispatch(FileOp::Open { major: 0, minor });
        assert!(result.is_ok());
        SessionId(result.code as u64)
    }

    fn configure(d: &Dispatcher, idx: u32, len: u32) -> OpResult {
        d.dispatch(FileOp::Ioctl {
            cmd: CMD_CONFIGURE,
            payload: Some(MemInit { idx, len }.to_bytes().to_vec()),
        })
    }

    #[test]
    fn test_open_bad_minor_is_enodev() {
        let d = dispatcher();
        let result = d.dispatch(FileOp::Open { major: 0, minor: 3 });
        assert_eq!(result.error(), Some(errno::ENODEV));
        assert_eq!(d.open_sessions(), 0);
    }

    #[test]
    fn test_read_unconfigured_is_efault() {
        let d = dispatcher();
        let session = open(&d, 0);
        let result = d.dispatch(FileOp::Read {
            session,
            max_count: 4,
        });
        assert_eq!(result.code, -14);
    }

    #[test]
    fn test_write_read_cycle() {
        let d = dispatcher();
        assert_eq!(configure(&d, 0, 16).code, 0);
        let session = open(&d, 0);

        let written = d.dispatch(FileOp::Write {
            session,
            data: vec![0xAA; 16],
        });
        assert_eq!(written.code, 16);

        let pos = d.dispatch(FileOp::Seek {
            session,
            from: SeekFrom::Start(0),
        });
        assert_eq!(pos.code, 0);

        let read = d.dispatch(FileOp::Read {
            session,
            max_count: 100,
        });
        assert_eq!(read.code, 16);
        assert_eq!(read.data, vec![0xAA; 16]);
    }

    #[test]
    fn test_past_end_is_enomem() {
        let d = dispatcher();
        configure(&d, 1, 4);
        let session = open(&d, 1);
        d.dispatch(FileOp::Seek {
            session,
            from: SeekFrom::Start(5),
        });
        let result = d.dispatch(FileOp::Read {
            session,
            max_count: 1,
        });
        assert_eq!(result.error(), Some(errno::ENOMEM));
    }

    #[test]
    fn test_ioctl_errors_are_einval() {
        let d = dispatcher();
        let null = d.dispatch(FileOp::Ioctl {
            cmd: CMD_CONFIGURE,
            payload: None,
        });
        assert_eq!(null.error(), Some(errno::EINVAL));
        assert_eq!(configure(&d, 0, 0).error(), Some(errno::EINVAL));
        assert_eq!(configure(&d, 999, 16).error(), Some(errno::EINVAL));
    }

    #[test]
    fn test_unknown_session_is_ebadf() {
        let d = dispatcher();
        let result = d.dispatch(FileOp::Read {
            session: SessionId(42),
            max_count: 1,
        });
        assert_eq!(result.error(), Some(errno::EBADF));
        assert_eq!(
            d.dispatch(FileOp::Release {
                session: SessionId(42)
            })
            .error(),
            Some(errno::EBADF)
        );
    }

    #[test]
    fn test_release_removes_session() {
        let d = dispatcher();
        let session = open(&d, 2);
        assert_eq!(d.open_sessions(), 1);
        assert_eq!(d.dispatch(FileOp::Release { session }).code, 0);
        assert_eq!(d.open_sessions(), 0);
        let result = d.dispatch(FileOp::Read {
            session,
            max_count: 1,
        });
        assert_eq!(result.error(), Some(errno::EBADF));
    }

    #[test]
    fn test_audit_pairs_requests_and_responses() {
        let d = dispatcher();
        configure(&d, 0, 8);
        let session = open(&d, 0);
        d.dispatch(FileOp::Write {
            session,
            data: vec![1, 2, 3],
        });

        let events = d.audit_events();
        assert_eq!(events.len(), 6);
        assert!(matches!(
            events[4].event_type,
            AuditEventType::Request {
                op: OpCode::Write,
                args: [3, 0]
            }
        ));
        assert!(matches!(
            events[5].event_type,
            AuditEventType::Response {
                request_id: 4,
                result: 3
            }
        ));
        assert_eq!(events[5].session, Some(session));
        assert!(d.audit_json().unwrap().contains("Write"));
    }
}
