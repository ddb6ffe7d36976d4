//! File-backed store shared with the client process.
//!
//! Snapshots are written to a sibling temp file and renamed over the target,
//! so the consumer never reads a half-written queue.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use clientlink_protocol::{Command, CommandId, QueueSnapshot};

use crate::error::StoreError;
use crate::store::CommandQueueStore;

pub const DEFAULT_QUEUE_FILE: &str = "queue.json";

/// Directory holding the shared queue.
///
/// Prefers the RAM-backed `/dev/shm` on Linux, falling back to the system
/// temp dir elsewhere.
pub fn default_queue_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm = Path::new("/dev/shm");
        if shm.is_dir() {
            return shm.join("clientlink");
        }
    }
    std::env::temp_dir().join("clientlink")
}

pub fn default_queue_path() -> PathBuf {
    default_queue_dir().join(DEFAULT_QUEUE_FILE)
}

/// Borrowed view serialized in the same shape as [`QueueSnapshot`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    last_processed_id: CommandId,
    pending: &'a [Command],
}

/// Queue snapshot stored as a JSON file.
#[derive(Debug, Clone)]
pub struct SharedFileStore {
    path: PathBuf,
}

impl SharedFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`default_queue_path`].
    pub fn open_default() -> Self {
        Self::new(default_queue_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }
}

impl CommandQueueStore for SharedFileStore {
    fn read_snapshot(&self) -> Result<QueueSnapshot, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(QueueSnapshot::default()),
            Err(e) => return Err(self.io_error(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(QueueSnapshot::default());
        }
        serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path: self.path.clone(), source })
    }

    fn write_snapshot(
        &self,
        last_processed_id: CommandId,
        pending: &[Command],
    ) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let tmp = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &SnapshotRef { last_processed_id, pending })
                .map_err(StoreError::Encode)?;
            writer.flush().map_err(|e| self.io_error(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        log::trace!(
            "queue snapshot written to {} ({} pending)",
            self.path.display(),
            pending.len()
        );
        Ok(())
    }
}
