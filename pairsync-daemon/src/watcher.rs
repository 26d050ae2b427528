//! Filesystem change source.
//!
//! One `notify` watcher carries a non-recursive watch per monitored
//! source directory. Raw events are forwarded from notify's callback
//! thread into an unbounded channel that the control loop multiplexes,
//! then converted into per-file [`FileChange`]s here.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use pairsync_proto::SyncOperation;

use crate::errors::Result;

/// One file-level change, before watch-table resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub operation: SyncOperation,
}

pub struct SourceWatcher {
    inner: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl SourceWatcher {
    /// Create the watch facility. Failure here is fatal at startup.
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The control loop may already be gone during teardown.
            let _ = tx.send(res);
        })?;
        Ok(SourceWatcher { inner, rx })
    }

    pub fn watch(&mut self, dir: &Path) -> Result<()> {
        self.inner.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    pub fn unwatch(&mut self, dir: &Path) -> Result<()> {
        self.inner.unwatch(dir)?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Option<notify::Result<Event>> {
        self.rx.recv().await
    }

    /// Non-blocking receive, used to drain a burst in one pass.
    pub fn try_recv(&mut self) -> Option<notify::Result<Event>> {
        self.rx.try_recv().ok()
    }
}

/// Names that editors and tooling churn through; syncing them only
/// spreads noise to the target.
fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.')
        || name.ends_with('~')
        || name.ends_with(".tmp")
        || name.ends_with(".swp")
        || (name.starts_with('#') && name.ends_with('#'))
}

/// Flatten a notify event into per-file changes.
///
/// Close/open style access notifications are not changes and produce
/// nothing; any other unrecognized kind maps to
/// [`SyncOperation::Unknown`] and is left for the worker to reject.
pub fn convert_event(event: Event) -> Vec<FileChange> {
    let operation = match event.kind {
        EventKind::Create(_) => SyncOperation::Added,
        EventKind::Modify(_) => SyncOperation::Modified,
        EventKind::Remove(_) => SyncOperation::Deleted,
        EventKind::Access(_) => return Vec::new(),
        _ => SyncOperation::Unknown,
    };

    event
        .paths
        .into_iter()
        .filter(|path| {
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => !is_ignored_name(name),
                // Nameless paths cannot be resolved to a file; the
                // control loop drops them as directory-level events.
                None => true,
            }
        })
        .map(|path| FileChange { path, operation })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn create_modify_delete_map_to_operations() {
        let cases = [
            (EventKind::Create(CreateKind::File), SyncOperation::Added),
            (
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                SyncOperation::Modified,
            ),
            (EventKind::Remove(RemoveKind::File), SyncOperation::Deleted),
        ];
        for (kind, expected) in cases {
            let changes = convert_event(event(kind, "/src/f.txt"));
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].operation, expected);
            assert_eq!(changes[0].path, PathBuf::from("/src/f.txt"));
        }
    }

    #[test]
    fn unclassified_kinds_become_unknown() {
        let changes = convert_event(event(EventKind::Other, "/src/f.txt"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, SyncOperation::Unknown);
    }

    #[test]
    fn access_events_produce_nothing() {
        use notify::event::{AccessKind, AccessMode};
        let changes = convert_event(event(
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
            "/src/f.txt",
        ));
        assert!(changes.is_empty());
    }

    #[test]
    fn temporary_and_hidden_files_are_filtered() {
        for name in [".hidden", "f.txt~", "f.tmp", "f.swp", "#f.txt#"] {
            let changes = convert_event(event(
                EventKind::Create(CreateKind::File),
                &format!("/src/{name}"),
            ));
            assert!(changes.is_empty(), "{name} should be ignored");
        }
    }

    #[test]
    fn multi_path_events_fan_out() {
        let ev = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/src/a.txt"))
            .add_path(PathBuf::from("/src/b.txt"));
        let changes = convert_event(ev);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.operation == SyncOperation::Deleted));
    }
}
