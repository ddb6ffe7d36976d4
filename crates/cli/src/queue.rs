//! `clink queue` and `clink serve`.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clientlink_queue::{CommandQueueStore, QueueConsumer, SharedFileStore, StoreError};

use crate::CliError;

pub fn cmd_show(path: &Path, json: bool) -> Result<(), CliError> {
    let store = SharedFileStore::new(path);
    let snapshot = store.read_snapshot().map_err(CliError::store)?;

    if json {
        let out = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CliError::general(format!("cannot encode snapshot: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    println!("queue:          {}", path.display());
    println!("last processed: {}", snapshot.last_processed_id);
    println!("pending:        {}", snapshot.pending.len());
    for (position, command) in snapshot.pending.iter().enumerate() {
        let id = snapshot.pending_id(position).ok_or(StoreError::IdOverflow {
            last_processed_id: snapshot.last_processed_id,
        });
        println!("  {:>6}  {}", id.map_err(CliError::store)?, command);
    }
    Ok(())
}

pub fn cmd_clear(path: &Path) -> Result<(), CliError> {
    let store = SharedFileStore::new(path);
    let snapshot = store.read_snapshot().map_err(CliError::store)?;
    store
        .write_snapshot(snapshot.last_processed_id, &[])
        .map_err(CliError::store)?;
    println!("cleared {} pending command(s)", snapshot.pending.len());
    Ok(())
}

/// Consume commands as the client would. Each one is printed as
/// `<id>\t<command>` once it has been acknowledged.
pub fn cmd_serve(path: &Path, delay: Duration, poll: Duration, once: bool) -> Result<(), CliError> {
    let consumer = QueueConsumer::new(Arc::new(SharedFileStore::new(path)));
    log::info!("serving {}", path.display());

    loop {
        let consumed = consumer.process_next(|id, command| {
            log::debug!("executing #{}: {}", id, command);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        });

        match consumed {
            Ok(Some(done)) => println!("{}\t{}", done.id, done.command),
            Ok(None) if once => return Ok(()),
            Ok(None) => thread::sleep(poll),
            // Someone else rewrote the queue; start over from what is there now.
            Err(StoreError::Changed { id }) => log::warn!("command {} was not acknowledged", id),
            Err(e) => return Err(CliError::store(e)),
        }
    }
}
