//! All sessions of one host, keyed by id.
//!
//! Sessions share the host bindings and a single event channel. Running two
//! sessions against the same client at once is not supported: their commands
//! would interleave in one queue with no coordination beyond snapshot
//! atomicity.

use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::events::{SessionEvent, SessionId};
use crate::host::HostBindings;
use crate::session::{DebuggerStatus, ScriptSession, SessionControl, DEFAULT_STOP_GRACE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub status: DebuggerStatus,
}

pub struct SessionRegistry {
    bindings: HostBindings,
    events: mpsc::Sender<SessionEvent>,
    stop_grace: Duration,
    sessions: Mutex<Vec<Arc<ScriptSession>>>,
}

impl SessionRegistry {
    pub fn new(bindings: HostBindings, events: mpsc::Sender<SessionEvent>) -> Self {
        Self { bindings, events, stop_grace: DEFAULT_STOP_GRACE, sessions: Mutex::new(Vec::new()) }
    }

    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    /// Create an idle session.
    pub fn create(&self, name: impl Into<String>) -> Arc<ScriptSession> {
        let session = Arc::new(
            ScriptSession::new(name, self.bindings.clone(), self.events.clone())
                .with_stop_grace(self.stop_grace),
        );
        self.lock().push(session.clone());
        log::debug!("created session {} ({})", session.id(), session.name());
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<ScriptSession>> {
        self.lock().iter().find(|s| s.id() == id).cloned()
    }

    /// Sessions whose name matches, in creation order.
    pub fn find_by_name(&self, name: &str) -> Vec<Arc<ScriptSession>> {
        self.lock().iter().filter(|s| s.name() == name).cloned().collect()
    }

    /// Stop and forget a session.
    pub fn remove(&self, id: SessionId) -> Option<Arc<ScriptSession>> {
        let removed = {
            let mut sessions = self.lock();
            let index = sessions.iter().position(|s| s.id() == id)?;
            sessions.remove(index)
        };
        removed.stop();
        Some(removed)
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        self.lock()
            .iter()
            .map(|s| SessionSummary { id: s.id(), name: s.name().to_string(), status: s.status() })
            .collect()
    }

    /// Sessions currently Running or Paused.
    pub fn active_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|s| matches!(s.status(), DebuggerStatus::Running | DebuggerStatus::Paused))
            .count()
    }

    pub fn stop_all(&self) {
        let sessions: Vec<_> = self.lock().clone();
        for session in sessions {
            session.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<ScriptSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").field("sessions", &self.list()).finish()
    }
}
