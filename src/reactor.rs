//! Post-commit reactors: best-effort side effects after a successful submit.
//!
//! Reactors are how outward calls (document archives, notifications,
//! collaboration tools) hang off the write path without being part of it.
//! A submit hands each commit to a bounded queue and returns; a background
//! task delivers it to every reactor in registration order. A reactor
//! failure, or a full queue, is logged and written to a dead-letter log,
//! never reported to the submitter.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ReactorError;
use crate::event::{CaseId, StoredEvent, Timestamp, now_millis};

/// Boxed future returned by [`Reactor::react`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default bound on undelivered notifications.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Name used in the dead-letter log for notifications dropped before any
/// reactor saw them.
const QUEUE_DEAD_LETTER_NAME: &str = "queue";

/// One successful append, as seen by reactors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Committed {
    pub case_id: CaseId,
    /// Log version after the append.
    pub version: u64,
    /// The appended events, in log order.
    pub events: Vec<StoredEvent>,
}

/// A side effect triggered by committed events.
///
/// # Examples
///
/// ```
/// use koe_es::{BoxFuture, Committed, Reactor, ReactorError};
///
/// struct AuditLog;
///
/// impl Reactor for AuditLog {
///     fn name(&self) -> &str {
///         "audit-log"
///     }
///
///     fn react<'a>(
///         &'a self,
///         committed: &'a Committed,
///     ) -> BoxFuture<'a, Result<(), ReactorError>> {
///         Box::pin(async move {
///             println!("{} is now at version {}", committed.case_id, committed.version);
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Reactor: Send + Sync + 'static {
    /// Used for logging and as the dead-letter file name.
    fn name(&self) -> &str;

    fn react<'a>(&'a self, committed: &'a Committed) -> BoxFuture<'a, Result<(), ReactorError>>;
}

/// Tuning for the reactor task.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Notifications buffered before new ones are dropped.
    ///
    /// Default: 256.
    pub queue_capacity: usize,
    /// Where dead-letter logs are written. `None` only logs failures.
    pub dead_letter_dir: Option<PathBuf>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dead_letter_dir: None,
        }
    }
}

/// Delivery counters since the reactor task started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactorReport {
    /// Successful reactor invocations.
    pub delivered: usize,
    /// Failed invocations plus dropped notifications.
    pub dead_lettered: usize,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicUsize,
    dead_lettered: AtomicUsize,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DeadLetterEntry {
    pub reactor: String,
    pub committed: Committed,
    pub error: String,
    pub ts: Timestamp,
}

/// `<dir>/<reactor name>.dead_letters.jsonl`
pub(crate) fn dead_letter_path(dir: &Path, reactor: &str) -> PathBuf {
    dir.join(format!("{reactor}.dead_letters.jsonl"))
}

/// Append a single dead-letter entry to the JSONL log at `path`.
///
/// Creates the file and its parent directory if needed.
///
/// # Errors
///
/// Returns `io::Error` if file I/O fails.
pub(crate) fn append_dead_letter(
    path: &Path,
    reactor: &str,
    committed: &Committed,
    error: &str,
) -> io::Result<()> {
    use std::io::Write;
    let entry = DeadLetterEntry {
        reactor: reactor.to_owned(),
        committed: committed.clone(),
        error: error.to_owned(),
        ts: now_millis(),
    };
    let json = serde_json::to_string(&entry).map_err(io::Error::other)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{json}")?;
    Ok(())
}

fn dead_letter(
    dir: Option<&Path>,
    counters: &Counters,
    reactor: &str,
    committed: &Committed,
    error: &str,
) {
    counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
    let Some(dir) = dir else {
        return;
    };
    let path = dead_letter_path(dir, reactor);
    if let Err(e) = append_dead_letter(&path, reactor, committed, error) {
        tracing::error!(
            reactor,
            path = %path.display(),
            error = %e,
            "failed to write dead letter"
        );
    }
}

/// Write side of the reactor queue, held by the service.
#[derive(Clone)]
pub(crate) struct ReactorSender {
    tx: mpsc::Sender<Committed>,
    dead_letter_dir: Option<PathBuf>,
    counters: Arc<Counters>,
}

impl ReactorSender {
    /// Queue a commit for delivery without waiting.
    pub(crate) fn notify(&self, committed: Committed) {
        let (committed, reason) = match self.tx.try_send(committed) {
            Ok(()) => return,
            Err(TrySendError::Full(c)) => (c, "reactor queue full"),
            Err(TrySendError::Closed(c)) => (c, "reactor task stopped"),
        };
        tracing::warn!(
            case_id = %committed.case_id,
            version = committed.version,
            reason,
            "dropping reactor notification"
        );
        dead_letter(
            self.dead_letter_dir.as_deref(),
            &self.counters,
            QUEUE_DEAD_LETTER_NAME,
            &committed,
            reason,
        );
    }
}

/// Handle for the background reactor task.
///
/// Dropping the handle does not stop the task; it stops when the service
/// is dropped or [`shutdown`](ReactorHandle::shutdown) is called.
///
/// `Clone` is cheap: all fields are `Arc`-wrapped.
#[derive(Clone)]
pub struct ReactorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
    counters: Arc<Counters>,
}

impl ReactorHandle {
    pub fn report(&self) -> ReactorReport {
        ReactorReport {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dead_lettered: self.counters.dead_lettered.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting notifications, deliver everything already queued,
    /// and wait for the task to finish.
    ///
    /// Calling `shutdown` more than once is safe.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the task panicked.
    pub async fn shutdown(&self) -> io::Result<()> {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().await.take();
        match task {
            Some(join_handle) => join_handle
                .await
                .map_err(|e| io::Error::other(format!("reactor task panicked: {e}"))),
            None => Ok(()),
        }
    }
}

/// Spawn the reactor task on the current tokio runtime.
pub(crate) fn spawn(
    reactors: Vec<Arc<dyn Reactor>>,
    config: ReactorConfig,
) -> (ReactorSender, ReactorHandle) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let counters = Arc::new(Counters::default());

    let task = tokio::spawn(run_reactor_loop(
        reactors,
        rx,
        shutdown_rx,
        config.dead_letter_dir.clone(),
        Arc::clone(&counters),
    ));

    let sender = ReactorSender {
        tx,
        dead_letter_dir: config.dead_letter_dir,
        counters: Arc::clone(&counters),
    };
    let handle = ReactorHandle {
        shutdown_tx,
        task: Arc::new(tokio::sync::Mutex::new(Some(task))),
        counters,
    };
    (sender, handle)
}

async fn run_reactor_loop(
    reactors: Vec<Arc<dyn Reactor>>,
    mut rx: mpsc::Receiver<Committed>,
    mut shutdown_rx: watch::Receiver<bool>,
    dead_letter_dir: Option<PathBuf>,
    counters: Arc<Counters>,
) {
    tracing::info!(reactors = reactors.len(), "reactor task started");
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(committed) => {
                    deliver(&reactors, &committed, dead_letter_dir.as_deref(), &counters).await;
                }
                None => break,
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    rx.close();
                    while let Some(committed) = rx.recv().await {
                        deliver(&reactors, &committed, dead_letter_dir.as_deref(), &counters)
                            .await;
                    }
                    break;
                }
            }
        }
    }
    tracing::info!("reactor task stopped");
}

async fn deliver(
    reactors: &[Arc<dyn Reactor>],
    committed: &Committed,
    dead_letter_dir: Option<&Path>,
    counters: &Counters,
) {
    for reactor in reactors {
        match reactor.react(committed).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    reactor = reactor.name(),
                    case_id = %committed.case_id,
                    version = committed.version,
                    "reactor notified"
                );
            }
            Err(e) => {
                tracing::warn!(
                    reactor = reactor.name(),
                    case_id = %committed.case_id,
                    version = committed.version,
                    error = %e,
                    "reactor failed, dead-lettering"
                );
                dead_letter(
                    dead_letter_dir,
                    counters,
                    reactor.name(),
                    committed,
                    &e.to_string(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::Script;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(CaseId, u64)>>,
    }

    impl Reactor for Arc<Recorder> {
        fn name(&self) -> &str {
            "recorder"
        }

        fn react<'a>(
            &'a self,
            committed: &'a Committed,
        ) -> BoxFuture<'a, Result<(), ReactorError>> {
            Box::pin(async move {
                self.seen
                    .lock()
                    .expect("recorder lock")
                    .push((committed.case_id.clone(), committed.version));
                Ok(())
            })
        }
    }

    struct Failing;

    impl Reactor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn react<'a>(
            &'a self,
            _committed: &'a Committed,
        ) -> BoxFuture<'a, Result<(), ReactorError>> {
            Box::pin(async { Err(ReactorError::new("archive unavailable")) })
        }
    }

    fn committed(case_id: &str, version: u64) -> Committed {
        Committed {
            case_id: CaseId::new(case_id),
            version,
            events: Script::standard(case_id).events().to_vec(),
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_drains_on_shutdown() {
        let recorder = Arc::new(Recorder::default());
        let (sender, handle) = spawn(
            vec![Arc::new(Arc::clone(&recorder))],
            ReactorConfig::default(),
        );

        for version in 1..=3 {
            sender.notify(committed("KOE-1", version));
        }
        handle.shutdown().await.expect("clean shutdown");

        let seen = recorder.seen.lock().expect("recorder lock").clone();
        assert_eq!(
            seen,
            vec![
                (CaseId::new("KOE-1"), 1),
                (CaseId::new("KOE-1"), 2),
                (CaseId::new("KOE-1"), 3),
            ]
        );
        assert_eq!(handle.report().delivered, 3);
        handle.shutdown().await.expect("second shutdown is a no-op");
    }

    #[tokio::test]
    async fn failures_are_dead_lettered() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let recorder = Arc::new(Recorder::default());
        let (sender, handle) = spawn(
            vec![Arc::new(Failing), Arc::new(Arc::clone(&recorder))],
            ReactorConfig {
                dead_letter_dir: Some(tmp.path().to_path_buf()),
                ..ReactorConfig::default()
            },
        );

        sender.notify(committed("KOE-1", 1));
        handle.shutdown().await.expect("clean shutdown");

        assert_eq!(
            handle.report(),
            ReactorReport {
                delivered: 1,
                dead_lettered: 1,
            }
        );
        let contents = std::fs::read_to_string(dead_letter_path(tmp.path(), "failing"))
            .expect("dead letter log");
        let entry: DeadLetterEntry =
            serde_json::from_str(contents.trim()).expect("valid dead letter");
        assert_eq!(entry.reactor, "failing");
        assert_eq!(entry.error, "archive unavailable");
        assert_eq!(entry.committed.case_id, CaseId::new("KOE-1"));
    }

    #[tokio::test]
    async fn notify_after_shutdown_is_dead_lettered() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let (sender, handle) = spawn(
            Vec::new(),
            ReactorConfig {
                dead_letter_dir: Some(tmp.path().to_path_buf()),
                ..ReactorConfig::default()
            },
        );
        handle.shutdown().await.expect("clean shutdown");

        sender.notify(committed("KOE-1", 1));
        assert_eq!(handle.report().dead_lettered, 1);
        assert!(dead_letter_path(tmp.path(), QUEUE_DEAD_LETTER_NAME).is_file());
    }
}
