//! Script sessions driving a client through the shared command queue.
//!
//! # Architecture
//!
//! - [`ScriptSession`] owns one worker thread at a time and exposes
//!   play/pause/resume/stop through [`SessionControl`]
//! - The worker builds its own Lua VM (see `host`), binds one global per
//!   [`CommandKind`](clientlink_protocol::CommandKind) to the
//!   [`CommandDispatcher`](clientlink_queue::CommandDispatcher), and routes
//!   unknown global reads to the [`ProcessStateView`](clientlink_state::ProcessStateView)
//! - A per-line hook consults the session's [`StepDriver`] before every
//!   line; this is where pause and stop take effect
//! - Output, faults and status changes reach the UI as [`SessionEvent`]s

mod driver;
mod events;
mod host;
mod registry;
mod session;
mod watch;

pub use driver::{
    DebuggerAction, DebuggerCaps, FaultKind, ScriptFault, SourceLocation, StepDriver, Unsupported,
};
pub use events::{SessionEvent, SessionEventPayload, SessionId};
pub use host::{lua_value_to_string, HostBindings};
pub use registry::{SessionRegistry, SessionSummary};
pub use session::{DebuggerStatus, ScriptSession, SessionControl, SessionError, DEFAULT_STOP_GRACE};
pub use watch::{collect_variables, VariableSnapshot, WatchItem, WatchScope, WatchValue, VARARGS_NAME};
