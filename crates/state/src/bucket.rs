use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::view::StateSource;

/// One of the client's status categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKind {
    CharacterInfo,
    StatusBar,
    ContainerInfo,
    LastAction,
    Find,
    ShopInfo,
    ExtendedInfo,
    ClientInfo,
    CombatInfo,
    TileInfo,
    TimeInfo,
    Miscellaneous,
}

impl BucketKind {
    /// Lookup order. Earlier buckets shadow later ones.
    pub const PRIORITY: [BucketKind; 12] = [
        BucketKind::CharacterInfo,
        BucketKind::StatusBar,
        BucketKind::ContainerInfo,
        BucketKind::LastAction,
        BucketKind::Find,
        BucketKind::ShopInfo,
        BucketKind::ExtendedInfo,
        BucketKind::ClientInfo,
        BucketKind::CombatInfo,
        BucketKind::TileInfo,
        BucketKind::TimeInfo,
        BucketKind::Miscellaneous,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BucketKind::CharacterInfo => "CharacterInfo",
            BucketKind::StatusBar => "StatusBar",
            BucketKind::ContainerInfo => "ContainerInfo",
            BucketKind::LastAction => "LastAction",
            BucketKind::Find => "Find",
            BucketKind::ShopInfo => "ShopInfo",
            BucketKind::ExtendedInfo => "ExtendedInfo",
            BucketKind::ClientInfo => "ClientInfo",
            BucketKind::CombatInfo => "CombatInfo",
            BucketKind::TileInfo => "TileInfo",
            BucketKind::TimeInfo => "TimeInfo",
            BucketKind::Miscellaneous => "Miscellaneous",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status bucket: {0}")]
pub struct ParseBucketKindError(pub String);

impl FromStr for BucketKind {
    type Err = ParseBucketKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BucketKind::PRIORITY
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ParseBucketKindError(s.to_string()))
    }
}

/// A named string map behind its own lock.
#[derive(Debug)]
pub struct Bucket {
    kind: BucketKind,
    entries: RwLock<HashMap<String, String>>,
}

impl Bucket {
    pub fn new(kind: BucketKind) -> Self {
        Self { kind, entries: RwLock::new(HashMap::new()) }
    }

    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.into(), value.into());
    }

    /// Swap in a whole new set of entries.
    pub fn replace(&self, new_entries: HashMap<String, String>) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        *entries = new_entries;
    }

    pub fn clear(&self) {
        self.replace(HashMap::new());
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the entries.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl StateSource for Bucket {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn get(&self, key: &str) -> Option<String> {
        Bucket::get(self, key)
    }
}

/// The full set of status buckets for one client.
#[derive(Debug)]
pub struct ClientStatus {
    buckets: Vec<Arc<Bucket>>,
}

impl Default for ClientStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientStatus {
    pub fn new() -> Self {
        let buckets = BucketKind::PRIORITY
            .into_iter()
            .map(|kind| Arc::new(Bucket::new(kind)))
            .collect();
        Self { buckets }
    }

    pub fn bucket(&self, kind: BucketKind) -> &Arc<Bucket> {
        &self.buckets[kind.index()]
    }

    /// Buckets in lookup priority order.
    pub fn buckets(&self) -> impl Iterator<Item = &Arc<Bucket>> {
        self.buckets.iter()
    }

    pub fn clear(&self) {
        for bucket in &self.buckets {
            bucket.clear();
        }
    }
}
