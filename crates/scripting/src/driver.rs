//! The step-driver contract the Lua host talks to.

use std::fmt;

use bitflags::bitflags;

use crate::watch::{WatchItem, WatchScope};

bitflags! {
    /// What a step driver can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebuggerCaps: u32 {
        const CAN_DEBUG_SOURCE_CODE = 1 << 0;
        const CAN_DEBUG_BYTE_CODE = 1 << 1;
        const HAS_LINE_BASED_BREAKPOINTS = 1 << 2;
    }
}

/// What the host should do at a step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerAction {
    /// Hold: do not advance, ask again shortly.
    None,
    Run,
}

/// Where the host is about to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub chunk: String,
    pub line: Option<u32>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.chunk, line),
            None => f.write_str(&self.chunk),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Syntax,
    Runtime,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::Syntax => "syntax error",
            FaultKind::Runtime => "runtime error",
        })
    }
}

/// A script failure shown to the user. Terminates the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ScriptFault {
    pub kind: FaultKind,
    pub message: String,
}

impl ScriptFault {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self { kind: FaultKind::Syntax, message: message.into() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self { kind: FaultKind::Runtime, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported operation: {0}")]
pub struct Unsupported(pub &'static str);

/// Controls a running script one step at a time.
///
/// Called from the worker thread. Implementations return promptly; the host
/// does its own waiting around [`StepDriver::get_action`].
pub trait StepDriver: Send + Sync {
    fn capabilities(&self) -> DebuggerCaps;

    /// Queried before every line. `ip` increases by one per step.
    fn get_action(&self, ip: u64, location: &SourceLocation) -> DebuggerAction;

    /// Report the bindings visible at the current step.
    fn update(&self, scope: WatchScope, items: &[WatchItem]);

    /// Report a runtime fault. The returned fault is re-raised by the host
    /// and ends the run.
    fn signal_runtime_fault(&self, fault: ScriptFault) -> ScriptFault;

    fn set_source_code(&self, _chunk: &str, _source: &str) {}

    fn set_byte_code(&self, _chunk: &str, _byte_code: &[String]) {}

    fn signal_execution_ended(&self) {}

    fn refresh_breakpoints(&self, _lines: &[SourceLocation]) -> Result<(), Unsupported> {
        Err(Unsupported("breakpoint refresh"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let fault = ScriptFault::runtime("boom:3: attempt to call a nil value");
        assert_eq!(fault.to_string(), "runtime error: boom:3: attempt to call a nil value");
        assert_eq!(ScriptFault::syntax("x").kind, FaultKind::Syntax);
    }

    #[test]
    fn test_location_display() {
        let at = SourceLocation { chunk: "walk".to_string(), line: Some(12) };
        assert_eq!(at.to_string(), "walk:12");
        let nowhere = SourceLocation { chunk: "walk".to_string(), line: None };
        assert_eq!(nowhere.to_string(), "walk");
    }

    #[test]
    fn test_caps_combine() {
        let caps = DebuggerCaps::CAN_DEBUG_SOURCE_CODE | DebuggerCaps::HAS_LINE_BASED_BREAKPOINTS;
        assert!(caps.contains(DebuggerCaps::HAS_LINE_BASED_BREAKPOINTS));
        assert!(!caps.contains(DebuggerCaps::CAN_DEBUG_BYTE_CODE));
    }
}
