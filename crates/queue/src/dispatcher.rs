//! Submission side of the queue: admission, id assignment, acknowledgement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clientlink_protocol::{Command, CommandId};

use crate::cancel::CancelToken;
use crate::error::{DispatchError, StoreError};
use crate::store::CommandQueueStore;
use crate::target::ClientTarget;

/// Most unprocessed commands the queue admits.
pub const DEFAULT_MAX_PENDING: usize = 100;
/// Delay between acknowledgement checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long a submission waits for the consumer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub max_pending: usize,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// No client was attached; nothing was queued.
    Untargeted,
    /// The consumer processed the command with this id.
    Processed { id: CommandId },
}

/// Appends commands to the shared queue and waits for the consumer to
/// acknowledge them.
///
/// Submissions from one dispatcher are expected to be sequential. The
/// read-modify-write on the snapshot is not guarded against a second
/// concurrent producer.
#[derive(Clone)]
pub struct CommandDispatcher {
    store: Arc<dyn CommandQueueStore>,
    target: Arc<dyn ClientTarget>,
    config: DispatchConfig,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<dyn CommandQueueStore>,
        target: Arc<dyn ClientTarget>,
        config: DispatchConfig,
    ) -> Self {
        Self { store, target, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CommandQueueStore> {
        &self.store
    }

    pub fn target(&self) -> &Arc<dyn ClientTarget> {
        &self.target
    }

    /// Queue `command` and block until the consumer has processed it.
    ///
    /// Returns [`Receipt::Untargeted`] without touching the queue when no
    /// client is attached. On success or timeout the target is asked to
    /// refresh its status once. A timed-out or cancelled command stays
    /// queued.
    pub fn submit(&self, command: Command, cancel: &CancelToken) -> Result<Receipt, DispatchError> {
        if !self.target.is_attached() {
            log::debug!("no client attached, dropping {command}");
            return Ok(Receipt::Untargeted);
        }

        let assigned_id = self.enqueue(command)?;
        let outcome = self.wait_for(assigned_id, cancel);

        if matches!(outcome, Ok(()) | Err(DispatchError::Timeout { .. })) {
            self.target.refresh_status();
        }
        outcome.map(|()| Receipt::Processed { id: assigned_id })
    }

    /// Append to pending and publish. Returns the id the command will carry
    /// once processed.
    fn enqueue(&self, command: Command) -> Result<CommandId, DispatchError> {
        let mut snapshot = self.store.read_snapshot()?;
        let pending = snapshot.pending.len();
        if pending >= self.config.max_pending {
            log::warn!(
                "queue full ({pending} pending, limit {}), rejecting {command}",
                self.config.max_pending
            );
            return Err(DispatchError::QueueFull { pending, limit: self.config.max_pending });
        }

        log::debug!("queueing {command}");
        let assigned_id = snapshot.pending_id(pending).ok_or(StoreError::IdOverflow {
            last_processed_id: snapshot.last_processed_id,
        })?;
        snapshot.pending.push(command);
        self.store.write_snapshot(snapshot.last_processed_id, &snapshot.pending)?;
        log::debug!("command inserted, assigned id {assigned_id}");
        Ok(assigned_id)
    }

    fn wait_for(&self, assigned_id: CommandId, cancel: &CancelToken) -> Result<(), DispatchError> {
        let start = Instant::now();
        loop {
            let snapshot = self.store.read_snapshot()?;
            if snapshot.has_processed(assigned_id) {
                log::debug!(
                    "command {assigned_id} processed after {}ms",
                    start.elapsed().as_millis()
                );
                return Ok(());
            }

            let waited = start.elapsed();
            if waited >= self.config.timeout {
                log::warn!(
                    "command {assigned_id} not processed within {}ms (last processed: {})",
                    self.config.timeout.as_millis(),
                    snapshot.last_processed_id
                );
                return Err(DispatchError::Timeout {
                    assigned_id,
                    last_processed_id: snapshot.last_processed_id,
                    waited,
                });
            }

            log::trace!(
                "waiting for command {assigned_id} (last processed: {})",
                snapshot.last_processed_id
            );
            let nap = self.config.poll_interval.min(self.config.timeout - waited);
            if !cancel.sleep(nap) {
                log::debug!("wait for command {assigned_id} cancelled");
                return Err(DispatchError::Cancelled);
            }
        }
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryQueueStore;
    use crate::target::AttachedClient;
    use clientlink_protocol::{CommandKind, QueueSnapshot};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick() -> DispatchConfig {
        DispatchConfig {
            max_pending: DEFAULT_MAX_PENDING,
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(40),
        }
    }

    fn counting_target() -> (Arc<AttachedClient>, Arc<AtomicUsize>) {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let seen = refreshes.clone();
        let target = AttachedClient::attached(99).with_refresh(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (Arc::new(target), refreshes)
    }

    #[test]
    fn test_untargeted_is_a_no_op() {
        let store = Arc::new(MemoryQueueStore::new());
        let (target, refreshes) = counting_target();
        target.detach();
        let dispatcher = CommandDispatcher::new(store.clone(), target, quick());

        let receipt = dispatcher.submit(Command::bare(CommandKind::Stop), &CancelToken::new());
        assert_eq!(receipt.unwrap(), Receipt::Untargeted);
        assert_eq!(store.read_snapshot().unwrap(), QueueSnapshot::default());
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queue_full_leaves_snapshot_untouched() {
        let pending = vec![Command::bare(CommandKind::Macro); DEFAULT_MAX_PENDING];
        let before = QueueSnapshot::new(12, pending);
        let store = Arc::new(MemoryQueueStore::with_snapshot(before.clone()));
        let (target, refreshes) = counting_target();
        let dispatcher = CommandDispatcher::new(store.clone(), target, quick());

        let err = dispatcher
            .submit(Command::bare(CommandKind::Stop), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, DispatchError::QueueFull { pending: 100, limit: 100 }));
        assert_eq!(store.read_snapshot().unwrap(), before);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_id_overflow_is_rejected_without_writing() {
        let before = QueueSnapshot::new(CommandId::MAX, vec![]);
        let store = Arc::new(MemoryQueueStore::with_snapshot(before.clone()));
        let (target, refreshes) = counting_target();
        let dispatcher = CommandDispatcher::new(store.clone(), target, quick());

        let err = dispatcher
            .submit(Command::bare(CommandKind::Stop), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, DispatchError::Store(StoreError::IdOverflow { .. })), "{err:?}");
        assert!(!err.is_absorbable());
        assert_eq!(store.read_snapshot().unwrap(), before);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_one_below_limit_is_admitted() {
        let pending = vec![Command::bare(CommandKind::Macro); DEFAULT_MAX_PENDING - 1];
        let store = Arc::new(MemoryQueueStore::with_snapshot(QueueSnapshot::new(0, pending)));
        let (target, _) = counting_target();
        let dispatcher = CommandDispatcher::new(store.clone(), target, quick());

        let err = dispatcher
            .submit(Command::bare(CommandKind::Stop), &CancelToken::new())
            .unwrap_err();
        // Admitted, then timed out because nothing consumes.
        assert!(matches!(err, DispatchError::Timeout { assigned_id: 100, .. }));
        assert_eq!(store.read_snapshot().unwrap().pending.len(), DEFAULT_MAX_PENDING);
    }

    #[test]
    fn test_timeout_keeps_command_queued_and_refreshes() {
        let store = Arc::new(MemoryQueueStore::with_snapshot(QueueSnapshot::new(4, vec![])));
        let (target, refreshes) = counting_target();
        let dispatcher = CommandDispatcher::new(store.clone(), target, quick());

        let start = Instant::now();
        let err = dispatcher
            .submit(Command::bare(CommandKind::ToggleWarPeace), &CancelToken::new())
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(40));
        match err {
            DispatchError::Timeout { assigned_id, last_processed_id, .. } => {
                assert_eq!(assigned_id, 5);
                assert_eq!(last_processed_id, 4);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        let snapshot = store.read_snapshot().unwrap();
        assert_eq!(snapshot.pending, vec![Command::bare(CommandKind::ToggleWarPeace)]);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_only_timeout_is_absorbable() {
        let timeout =
            DispatchError::Timeout { assigned_id: 1, last_processed_id: 0, waited: Duration::ZERO };
        assert!(timeout.is_absorbable());
        assert!(!DispatchError::Cancelled.is_absorbable());
        assert!(!DispatchError::QueueFull { pending: 100, limit: 100 }.is_absorbable());
    }

    #[test]
    fn test_ids_follow_queue_position() {
        let store = Arc::new(MemoryQueueStore::new());
        let (target, _) = counting_target();
        let dispatcher = CommandDispatcher::new(store.clone(), target, quick());
        let cancel = CancelToken::new();

        let kinds = [CommandKind::Say, CommandKind::Move, CommandKind::Key];
        let mut assigned = Vec::new();
        for kind in kinds {
            match dispatcher.submit(Command::bare(kind), &cancel) {
                Err(DispatchError::Timeout { assigned_id, .. }) => assigned.push(assigned_id),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(assigned, vec![1, 2, 3]);
        let pending: Vec<_> =
            store.read_snapshot().unwrap().pending.iter().map(Command::kind).collect();
        assert_eq!(pending, kinds);
    }

    #[test]
    fn test_acknowledged_command_returns_processed() {
        let store = Arc::new(MemoryQueueStore::with_snapshot(QueueSnapshot::new(9, vec![])));
        let (target, refreshes) = counting_target();
        let config = DispatchConfig { timeout: Duration::from_secs(5), ..quick() };
        let dispatcher = CommandDispatcher::new(store.clone(), target, config);

        let consumer_store = store.clone();
        let consumer = std::thread::spawn(move || loop {
            let snapshot = consumer_store.read_snapshot().unwrap();
            if let Some((_, rest)) = snapshot.pending.split_first() {
                consumer_store.write_snapshot(snapshot.last_processed_id + 1, rest).unwrap();
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        });

        let receipt = dispatcher.submit(Command::bare(CommandKind::Say), &CancelToken::new());
        consumer.join().unwrap();
        assert_eq!(receipt.unwrap(), Receipt::Processed { id: 10 });
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert!(store.read_snapshot().unwrap().pending.is_empty());
    }

    #[test]
    fn test_cancel_abandons_wait() {
        let store = Arc::new(MemoryQueueStore::new());
        let (target, refreshes) = counting_target();
        let config = DispatchConfig { timeout: Duration::from_secs(30), ..quick() };
        let dispatcher = CommandDispatcher::new(store.clone(), target, config);

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        let start = Instant::now();
        let err = dispatcher.submit(Command::bare(CommandKind::Stop), &cancel).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, DispatchError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(store.read_snapshot().unwrap().pending.len(), 1);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_pending, 100);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.timeout, Duration::from_millis(3000));
    }
}
