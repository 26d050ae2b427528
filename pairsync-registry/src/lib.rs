//! Per-source synchronization state.
//!
//! The registry is a chained hash table keyed by source path. The
//! bucket count is fixed at construction from an expected-cardinality
//! hint and the table never rehashes; chains are short in practice and
//! every traversal is iterative.

use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// State tracked for one monitored source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    /// Directory changes are propagated to.
    pub target: PathBuf,
    /// Cleared by `cancel`; inactive entries are never scheduled.
    pub active: bool,
    /// Completion time of the most recent worker for this source.
    pub last_sync: Option<DateTime<Local>>,
    /// Number of workers that reported ERROR for this source.
    pub error_count: u32,
}

impl SyncEntry {
    pub fn new(target: PathBuf) -> Self {
        SyncEntry {
            target,
            active: true,
            last_sync: None,
            error_count: 0,
        }
    }
}

struct Node {
    key: PathBuf,
    entry: SyncEntry,
    next: Option<Box<Node>>,
}

/// Fixed-bucket chained hash table of [`SyncEntry`] keyed by source
/// path. At most one entry exists per key.
pub struct Registry {
    buckets: Vec<Option<Box<Node>>>,
    len: usize,
}

/// Prime multiplier of the rolling hash.
const HASH_BASE: u64 = 127;

impl Registry {
    /// Size the table for roughly `expected` entries. The divisor
    /// trades bucket-array space against chain length.
    pub fn with_expected(expected: usize) -> Self {
        let buckets = (expected / 5).max(1);
        Registry {
            buckets: (0..buckets).map(|_| None).collect(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Horner rolling hash over the key bytes, reduced mod the bucket
    /// count at each step.
    fn bucket_of(&self, key: &Path) -> usize {
        let m = self.buckets.len() as u64;
        let mut h: u64 = 0;
        for &b in key.as_os_str().as_bytes() {
            h = (h * HASH_BASE + u64::from(b)) % m;
        }
        h as usize
    }

    /// Insert an entry for `source`, replacing any existing one so the
    /// one-entry-per-key contract holds.
    pub fn insert(&mut self, source: &Path, entry: SyncEntry) {
        if let Some(existing) = self.get_mut(source) {
            *existing = entry;
            return;
        }
        let idx = self.bucket_of(source);
        let node = Box::new(Node {
            key: source.to_path_buf(),
            entry,
            next: self.buckets[idx].take(),
        });
        self.buckets[idx] = Some(node);
        self.len += 1;
    }

    pub fn get(&self, source: &Path) -> Option<&SyncEntry> {
        let mut cur = self.buckets[self.bucket_of(source)].as_deref();
        while let Some(node) = cur {
            if node.key == source {
                return Some(&node.entry);
            }
            cur = node.next.as_deref();
        }
        None
    }

    pub fn get_mut(&mut self, source: &Path) -> Option<&mut SyncEntry> {
        let idx = self.bucket_of(source);
        let mut cur = self.buckets[idx].as_deref_mut();
        while let Some(node) = cur {
            if node.key == source {
                return Some(&mut node.entry);
            }
            cur = node.next.as_deref_mut();
        }
        None
    }

    /// Unlink and return the entry for `source`, if present.
    pub fn remove(&mut self, source: &Path) -> Option<SyncEntry> {
        let idx = self.bucket_of(source);
        let mut link = &mut self.buckets[idx];
        loop {
            match link.take() {
                None => return None,
                Some(mut node) => {
                    if node.key == source {
                        *link = node.next.take();
                        self.len -= 1;
                        return Some(node.entry);
                    }
                    *link = Some(node);
                    link = &mut link.as_mut().expect("just restored").next;
                }
            }
        }
    }

    /// Visit every entry, bucket by bucket.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buckets: &self.buckets,
            bucket: 0,
            node: None,
        }
    }

    /// Drop every entry, keeping the bucket array.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            // Unlink iteratively so a long chain cannot overflow the
            // stack through nested Box drops.
            let mut cur = bucket.take();
            while let Some(mut node) = cur {
                cur = node.next.take();
            }
        }
        self.len = 0;
    }
}

pub struct Iter<'a> {
    buckets: &'a [Option<Box<Node>>],
    bucket: usize,
    node: Option<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Path, &'a SyncEntry);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                return Some((node.key.as_path(), &node.entry));
            }
            if self.bucket >= self.buckets.len() {
                return None;
            }
            self.node = self.buckets[self.bucket].as_deref();
            self.bucket += 1;
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.clear();
    }
}
