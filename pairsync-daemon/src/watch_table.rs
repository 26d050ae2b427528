//! Bidirectional mapping between watch handles and source directories.
//!
//! A binding is created together with an active registry entry and
//! removed on `cancel`; a handle resolves to at most one source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

#[derive(Debug, Default)]
pub struct WatchTable {
    next_id: u64,
    by_id: HashMap<WatchId, PathBuf>,
    by_path: HashMap<PathBuf, WatchId>,
}

impl WatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a freshly watched source, returning its handle. Rebinding
    /// a path that is already bound returns the existing handle.
    pub fn bind(&mut self, source: PathBuf) -> WatchId {
        if let Some(id) = self.by_path.get(&source) {
            return *id;
        }
        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.by_id.insert(id, source.clone());
        self.by_path.insert(source, id);
        id
    }

    /// Drop the binding for a source, returning its handle if one
    /// existed.
    pub fn unbind(&mut self, source: &Path) -> Option<WatchId> {
        let id = self.by_path.remove(source)?;
        self.by_id.remove(&id);
        Some(id)
    }

    pub fn source_of(&self, id: WatchId) -> Option<&Path> {
        self.by_id.get(&id).map(PathBuf::as_path)
    }

    pub fn id_of(&self, source: &Path) -> Option<WatchId> {
        self.by_path.get(source).copied()
    }

    pub fn is_bound(&self, source: &Path) -> bool {
        self.by_path.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
