//! Status snapshots written by an external status collector.
//!
//! The file is a JSON object keyed by bucket name:
//!
//! ```json
//! { "CharacterInfo": { "CHARNAME": "Bob" }, "StatusBar": { "HITS": "25" } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bucket::{BucketKind, ClientStatus};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("failed to read status file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid status file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSnapshot {
    pub buckets: BTreeMap<String, BTreeMap<String, String>>,
}

impl StatusSnapshot {
    pub fn load(path: &Path) -> Result<Self, StatusError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| StatusError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&content)
            .map_err(|source| StatusError::Parse { path: path.to_path_buf(), source })
    }
}

impl ClientStatus {
    /// Replace the buckets named in `snapshot`. Buckets it does not mention
    /// keep their contents; unknown bucket names are skipped.
    pub fn apply_snapshot(&self, snapshot: StatusSnapshot) {
        for (name, entries) in snapshot.buckets {
            match name.parse::<BucketKind>() {
                Ok(kind) => self.bucket(kind).replace(entries.into_iter().collect()),
                Err(e) => log::warn!("ignoring status entries: {e}"),
            }
        }
    }

    pub fn to_snapshot(&self) -> StatusSnapshot {
        let buckets = self
            .buckets()
            .filter(|bucket| !bucket.is_empty())
            .map(|bucket| (bucket.kind().name().to_string(), bucket.to_map()))
            .collect();
        StatusSnapshot { buckets }
    }

    /// Load `path` and apply it.
    pub fn load_file(&self, path: &Path) -> Result<(), StatusError> {
        let snapshot = StatusSnapshot::load(path)?;
        self.apply_snapshot(snapshot);
        log::debug!("status loaded from {}", path.display());
        Ok(())
    }
}
