use std::path::PathBuf;
use std::time::Duration;

use clientlink_protocol::CommandId;

/// Failure reading or publishing a queue snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system error on the shared snapshot.
    #[error("queue store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The stored snapshot could not be parsed.
    #[error("queue snapshot at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The snapshot could not be serialized.
    #[error("failed to encode queue snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    /// A writer panicked while holding the in-memory snapshot.
    #[error("queue store lock poisoned")]
    Poisoned,
    /// `lastProcessedId` is too large to number another command.
    #[error("command id overflow: lastProcessedId {last_processed_id} cannot be advanced")]
    IdOverflow { last_processed_id: CommandId },
    /// The head of the queue changed while its command was executing, so it
    /// was not acknowledged.
    #[error("queue changed while command {id} was executing; not acknowledged")]
    Changed { id: CommandId },
}

/// Failure submitting a command.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Admission control: the queue already holds `limit` unprocessed
    /// commands. The snapshot was left untouched.
    #[error("too many commands in the queue ({pending} pending, limit {limit}); cannot continue")]
    QueueFull { pending: usize, limit: usize },
    /// The consumer did not reach `assigned_id` in time. The command stays
    /// queued and may still execute.
    #[error(
        "command {assigned_id} not acknowledged after {}ms (last processed: {last_processed_id})",
        waited.as_millis()
    )]
    Timeout {
        assigned_id: CommandId,
        last_processed_id: CommandId,
        waited: Duration,
    },
    /// The wait was abandoned because the caller's token was cancelled.
    /// The command stays queued.
    #[error("command submission cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Whether the caller may carry on as if the command was sent.
    pub fn is_absorbable(&self) -> bool {
        matches!(self, DispatchError::Timeout { .. })
    }
}
