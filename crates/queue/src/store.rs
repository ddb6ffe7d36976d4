use std::sync::RwLock;

use clientlink_protocol::{Command, CommandId, QueueSnapshot};

use crate::error::StoreError;

/// Backing storage for the shared queue snapshot.
///
/// Implementations publish whole snapshots: a reader observes either the
/// previous or the new state, never a partial one.
pub trait CommandQueueStore: Send + Sync {
    /// Read the current snapshot. An absent store reads as the empty one.
    fn read_snapshot(&self) -> Result<QueueSnapshot, StoreError>;

    /// Replace the stored snapshot.
    fn write_snapshot(
        &self,
        last_processed_id: CommandId,
        pending: &[Command],
    ) -> Result<(), StoreError>;
}

/// In-process store. Used when host and consumer share an address space,
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    snapshot: RwLock<QueueSnapshot>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: QueueSnapshot) -> Self {
        Self { snapshot: RwLock::new(snapshot) }
    }
}

impl CommandQueueStore for MemoryQueueStore {
    fn read_snapshot(&self) -> Result<QueueSnapshot, StoreError> {
        let guard = self.snapshot.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn write_snapshot(
        &self,
        last_processed_id: CommandId,
        pending: &[Command],
    ) -> Result<(), StoreError> {
        let mut guard = self.snapshot.write().map_err(|_| StoreError::Poisoned)?;
        *guard = QueueSnapshot::new(last_processed_id, pending.to_vec());
        Ok(())
    }
}
