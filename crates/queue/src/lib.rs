//! Shared command queue between the script host and the client process.
//!
//! # Architecture
//!
//! ```text
//!   script worker                         client process
//!   ─────────────                         ──────────────
//!   CommandDispatcher::submit()
//!     read snapshot ──────┐
//!     admission check     │   CommandQueueStore   ┌── QueueConsumer::process_next()
//!     append + write ─────┼──▶ {lastProcessedId, ◀─┤     pop oldest, execute
//!     poll lastProcessedId│     pending[]}        └──   advance id, write
//!     ... until id ≥ assigned or timeout
//! ```
//!
//! The snapshot is the only shared mutable resource. Both sides read and
//! replace it whole; neither side ever patches individual fields in place.

mod cancel;
mod consumer;
mod dispatcher;
mod error;
mod shared;
mod store;
mod target;

pub use cancel::CancelToken;
pub use consumer::{Consumed, QueueConsumer};
pub use dispatcher::{
    CommandDispatcher, DispatchConfig, Receipt, DEFAULT_MAX_PENDING, DEFAULT_POLL_INTERVAL,
    DEFAULT_TIMEOUT,
};
pub use error::{DispatchError, StoreError};
pub use shared::{default_queue_dir, default_queue_path, SharedFileStore, DEFAULT_QUEUE_FILE};
pub use store::{CommandQueueStore, MemoryQueueStore};
pub use target::{AttachedClient, ClientTarget};

pub use clientlink_protocol::{Command, CommandId, CommandKind, CommandParams, QueueSnapshot};
