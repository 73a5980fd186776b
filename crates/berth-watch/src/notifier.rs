//! The directory notifier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Result type alias for notifier operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors returned by the directory notifier.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The underlying watch could not be established or maintained.
    #[error("filesystem watch failed: {0}")]
    Notify(#[from] notify::Error),

    /// A pending signal is already registered for the path.
    #[error("watch already registered for {}", .0.display())]
    DuplicateWatch(PathBuf),
}

/// Filesystem operations a notifier can be configured to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    /// A file was created.
    Create,
    /// A file's contents changed.
    Write,
    /// A file was removed.
    Remove,
    /// A file was renamed.
    Rename,
}

impl WatchOp {
    /// Tests whether an event kind matches this operation.
    ///
    /// Each configured operation value is tested individually against the
    /// event; there is no positional coupling to the configuration order.
    fn matches(self, kind: &EventKind) -> bool {
        match self {
            Self::Create => kind.is_create(),
            Self::Write => matches!(
                kind,
                EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other)
            ),
            Self::Remove => kind.is_remove(),
            Self::Rename => matches!(kind, EventKind::Modify(ModifyKind::Name(_))),
        }
    }
}

type PendingMap = Arc<Mutex<HashMap<PathBuf, oneshot::Sender<()>>>>;

/// Multiplexes filesystem events under one directory into per-file one-shot
/// signals.
///
/// The watch is non-recursive. Exactly one spawned task consumes the event
/// stream for the notifier's lifetime; registration only touches the pending
/// map, so it is safe from any number of concurrent callers.
///
/// There is no internal timeout: if the event stream breaks, pending signals
/// are never fired, and waiters must bound their own waits.
pub struct DirectoryNotifier {
    dir: PathBuf,
    pending: PendingMap,
    // Dropping the watcher tears down the watch, so it lives as long as the
    // notifier.
    _watcher: RecommendedWatcher,
}

impl DirectoryNotifier {
    /// Starts watching `dir` for the given operations.
    ///
    /// Must be called from within a tokio runtime: the dispatch task is
    /// spawned here.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the directory does not exist or the
    /// watch cannot be established. There is no automatic retry.
    pub fn new(dir: impl Into<PathBuf>, ops: &[WatchOp]) -> Result<Self> {
        let dir = dir.into();
        let (event_tx, event_rx) = mpsc::channel::<notify::Result<notify::Event>>(16);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // The send only fails once the dispatch task is gone, which
                // means the notifier itself has been dropped.
                let _ = event_tx.blocking_send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(dispatch(event_rx, Arc::clone(&pending), ops.to_vec()));

        tracing::debug!("watching directory {}", dir.display());
        Ok(Self {
            dir,
            pending,
            _watcher: watcher,
        })
    }

    /// Registers a fresh one-shot signal for `path`.
    ///
    /// The receiver resolves when a matching event is observed for exactly
    /// this path. Paths are compared verbatim against event paths, so
    /// register the same absolute form the watcher will report.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::DuplicateWatch`] if a signal for `path` is
    /// already registered and has not fired yet.
    pub fn notifier_for_file(&self, path: impl Into<PathBuf>) -> Result<oneshot::Receiver<()>> {
        let path = path.into();
        let mut pending = self.pending.lock();
        if pending.contains_key(&path) {
            return Err(WatchError::DuplicateWatch(path));
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(path, tx);
        Ok(rx)
    }

    /// Returns the watched directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }
}

/// Single consumer of the event stream.
///
/// Events whose kind matches no configured operation, and events for paths
/// with no pending signal, are dropped silently.
async fn dispatch(
    mut events: mpsc::Receiver<notify::Result<notify::Event>>,
    pending: PendingMap,
    ops: Vec<WatchOp>,
) {
    while let Some(res) = events.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("directory watch error: {err}");
                continue;
            }
        };

        if !ops.iter().any(|op| op.matches(&event.kind)) {
            continue;
        }

        let mut pending = pending.lock();
        for path in &event.paths {
            if let Some(tx) = pending.remove(path) {
                tracing::debug!("firing completion signal for {}", path.display());
                // A dropped receiver just means the waiter gave up.
                let _ = tx.send(());
            }
        }
    }
    tracing::debug!("directory event stream closed");
}
