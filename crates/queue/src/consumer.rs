//! Client side of the queue: pop, execute, acknowledge.

use std::sync::Arc;

use clientlink_protocol::{Command, CommandId};

use crate::error::StoreError;
use crate::store::CommandQueueStore;

/// A command taken off the queue and acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumed {
    pub id: CommandId,
    pub command: Command,
}

/// Processes queued commands oldest first, advancing `lastProcessedId` by
/// one per command.
///
/// The consumer only writes after taking a command, so an idle consumer
/// never races a producer's append. The acknowledgement is written against
/// a snapshot re-read after the handler ran; commands appended meanwhile are
/// kept. Only the read-to-write window of that last step stays open, which
/// whole-file publication cannot close.
#[derive(Clone)]
pub struct QueueConsumer {
    store: Arc<dyn CommandQueueStore>,
}

impl QueueConsumer {
    pub fn new(store: Arc<dyn CommandQueueStore>) -> Self {
        Self { store }
    }

    /// Run `handler` on the oldest pending command and acknowledge it.
    /// Returns `None` when nothing is pending.
    ///
    /// Fails with [`StoreError::Changed`] without writing if another writer
    /// removed or replaced the command while the handler ran.
    pub fn process_next<F>(&self, handler: F) -> Result<Option<Consumed>, StoreError>
    where
        F: FnOnce(CommandId, &Command),
    {
        let snapshot = self.store.read_snapshot()?;
        let Some(command) = snapshot.pending.first().cloned() else {
            return Ok(None);
        };
        let id = snapshot.pending_id(0).ok_or(StoreError::IdOverflow {
            last_processed_id: snapshot.last_processed_id,
        })?;
        handler(id, &command);

        let mut current = self.store.read_snapshot()?;
        if current.last_processed_id != snapshot.last_processed_id
            || current.pending.first() != Some(&command)
        {
            log::warn!("queue changed while executing command {id}; not acknowledging it");
            return Err(StoreError::Changed { id });
        }
        current.pending.remove(0);
        self.store.write_snapshot(id, &current.pending)?;
        log::debug!("processed command {id}: {command}");
        Ok(Some(Consumed { id, command }))
    }

    /// Process until the queue is empty. Returns how many were handled.
    pub fn drain<F>(&self, mut handler: F) -> Result<usize, StoreError>
    where
        F: FnMut(CommandId, &Command),
    {
        let mut count = 0;
        while self.process_next(&mut handler)?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}
