use std::sync::Arc;

use crate::bucket::ClientStatus;

/// Something a script variable can be resolved against.
pub trait StateSource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<String>;
}

/// Prioritized read-only view over a list of sources.
///
/// Cheap to clone; clones share the underlying sources.
#[derive(Clone, Default)]
pub struct ProcessStateView {
    sources: Vec<Arc<dyn StateSource>>,
}

impl ProcessStateView {
    /// The canonical view over all twelve client buckets.
    pub fn from_status(status: &ClientStatus) -> Self {
        let sources = status
            .buckets()
            .map(|bucket| bucket.clone() as Arc<dyn StateSource>)
            .collect();
        Self { sources }
    }

    pub fn with_sources(sources: Vec<Arc<dyn StateSource>>) -> Self {
        Self { sources }
    }

    /// Append a source with the lowest priority.
    pub fn push_source(&mut self, source: Arc<dyn StateSource>) {
        self.sources.push(source);
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// First value for `key` in priority order. No merging across sources.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.get(key))
    }
}

impl std::fmt::Debug for ProcessStateView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessStateView").field("sources", &self.source_names()).finish()
    }
}
