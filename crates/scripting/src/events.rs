use std::fmt;

use uuid::Uuid;

use crate::driver::ScriptFault;
use crate::session::DebuggerStatus;

/// Unique identifier for a script session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An event sent from a session's worker (or controller) to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub payload: SessionEventPayload,
}

/// The payload of a session event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventPayload {
    /// One print() line.
    Output(String),
    /// Syntax or runtime fault. Sent at most once per run.
    Fault(ScriptFault),
    /// The session moved to a new state.
    StatusChanged(DebuggerStatus),
}
