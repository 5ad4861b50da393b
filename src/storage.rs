//! File-backed event store and its on-disk layout.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::{
    ActorRole, CaseEvent, CaseId, EventId, EventKind, StoredEvent, Timestamp, now_millis,
};
use crate::store::{EventStore, EventStream, check_append, number_events};

/// Namespace for deriving case directory names from case ids.
const CASE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x4b, 0x4f, 0x45, 0x2d, 0x8a, 0x37, 0x4e, 0x07, 0x9f, 0x12, 0x6d, 0x0c, 0x51, 0xe3, 0x2a, 0x90,
]);

/// How long a writer waits for another process's case lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Stable directory name for a case.
///
/// Case ids are free-form strings; hashing them into a UUID v5 keeps
/// separators and `..` out of filesystem paths.
pub fn case_stream_uuid(case_id: &CaseId) -> Uuid {
    Uuid::new_v5(&CASE_NAMESPACE, case_id.as_str().as_bytes())
}

/// Manages the on-disk directory layout for case logs.
///
/// ```text
/// <base_dir>/
///     cases/
///         <uuid-v5 of case id>/
///             events.jsonl        -- one commit record per line
///             events.lock         -- OS-locked while a writer appends
///     projections/
///         <projection_name>/
///     reactors/
///         <reactor_name>.dead_letters.jsonl
///     meta/
///         cases.jsonl             -- case registry
/// ```
#[derive(Debug, Clone)]
pub struct StreamLayout {
    base_dir: PathBuf,
}

impl StreamLayout {
    /// Create a layout rooted at `base_dir`. Nothing is created on disk.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base_dir>/cases/<uuid>`
    pub fn case_dir(&self, case_id: &CaseId) -> PathBuf {
        self.base_dir
            .join("cases")
            .join(case_stream_uuid(case_id).to_string())
    }

    /// `<base_dir>/cases/<uuid>/events.jsonl`
    pub fn log_path(&self, case_id: &CaseId) -> PathBuf {
        self.case_dir(case_id).join("events.jsonl")
    }

    /// `<base_dir>/cases/<uuid>/events.lock`
    pub fn lock_path(&self, case_id: &CaseId) -> PathBuf {
        self.case_dir(case_id).join("events.lock")
    }

    /// `<base_dir>/projections`
    pub fn projections_dir(&self) -> PathBuf {
        self.base_dir.join("projections")
    }

    /// `<base_dir>/reactors`
    pub fn reactors_dir(&self) -> PathBuf {
        self.base_dir.join("reactors")
    }

    /// `<base_dir>/meta`
    pub fn meta_dir(&self) -> PathBuf {
        self.base_dir.join("meta")
    }

    fn registry_path(&self) -> PathBuf {
        self.meta_dir().join("cases.jsonl")
    }

    /// Ensures the case directory and registry entry exist.
    ///
    /// Idempotent: repeated calls never duplicate registry entries.
    ///
    /// # Returns
    ///
    /// The case directory path.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if directory creation or file I/O fails.
    pub fn ensure_case(&self, case_id: &CaseId) -> std::io::Result<PathBuf> {
        let dir = self.case_dir(case_id);
        fs::create_dir_all(&dir)?;
        fs::create_dir_all(self.meta_dir())?;

        if !self.list_cases()?.contains(case_id) {
            let entry = RegistryEntry {
                case_id: case_id.clone(),
                stream: case_stream_uuid(case_id),
                ts: now_millis(),
            };
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.registry_path())?;
            let line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
            writeln!(file, "{line}")?;
        }

        Ok(dir)
    }

    /// Lists every registered case id, sorted and deduplicated.
    ///
    /// Returns an empty vector if the registry does not exist yet.
    /// Unreadable registry lines are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the registry exists but cannot be read.
    pub fn list_cases(&self) -> std::io::Result<Vec<CaseId>> {
        let file = match fs::File::open(self.registry_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RegistryEntry>(&line) {
                Ok(entry) => ids.push(entry.case_id),
                Err(e) => warn!(error = %e, "skipping unreadable case registry entry"),
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryEntry {
    case_id: CaseId,
    stream: Uuid,
    ts: Timestamp,
}

/// Persisted form of one event: the tagged union split into a
/// discriminator and a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EventRecord {
    position: u64,
    event_id: EventId,
    case_id: CaseId,
    event_type: String,
    timestamp: Timestamp,
    actor_name: String,
    actor_role: ActorRole,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_to_event_id: Option<EventId>,
}

/// One line of a case log: every event of a single append.
#[derive(Debug, Serialize, Deserialize)]
struct CommitRecord {
    /// Log version after this commit.
    version: u64,
    committed_at: Timestamp,
    events: Vec<EventRecord>,
}

fn encode_event(stored: &StoredEvent) -> Result<EventRecord, serde_json::Error> {
    let event = &stored.event;
    let mut tagged = serde_json::to_value(&event.kind)?;
    let payload = tagged
        .get_mut("data")
        .map(serde_json::Value::take)
        .unwrap_or(serde_json::Value::Null);
    Ok(EventRecord {
        position: stored.position,
        event_id: event.event_id,
        case_id: event.case_id.clone(),
        event_type: event.event_type().as_str().to_owned(),
        timestamp: event.timestamp,
        actor_name: event.actor_name.clone(),
        actor_role: event.actor_role,
        payload,
        comment: event.comment.clone(),
        reference_to_event_id: event.reference_to_event_id,
    })
}

fn decode_event(record: EventRecord) -> Result<StoredEvent, serde_json::Error> {
    let tagged = if record.payload.is_null() {
        serde_json::json!({ "type": record.event_type })
    } else {
        serde_json::json!({ "type": record.event_type, "data": record.payload })
    };
    let kind: EventKind = serde_json::from_value(tagged)?;
    Ok(StoredEvent {
        position: record.position,
        event: CaseEvent {
            event_id: record.event_id,
            case_id: record.case_id,
            timestamp: record.timestamp,
            actor_name: record.actor_name,
            actor_role: record.actor_role,
            kind,
            comment: record.comment,
            reference_to_event_id: record.reference_to_event_id,
        },
    })
}

/// Decoded contents of a case log file.
#[derive(Debug, Default)]
struct LogContents {
    events: Vec<StoredEvent>,
    version: u64,
    /// Byte length of the complete lines.
    valid_len: u64,
    file_len: u64,
}

fn read_log(path: &Path) -> Result<LogContents, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogContents::default()),
        Err(e) => return Err(e.into()),
    };
    let corrupt = |line: usize, message: String| StoreError::Corrupt {
        path: path.display().to_string(),
        line,
        message,
    };

    let mut contents = LogContents {
        file_len: bytes.len() as u64,
        ..LogContents::default()
    };
    for (index, line) in bytes.split_inclusive(|b| *b == b'\n').enumerate() {
        let Some(body) = line.strip_suffix(b"\n") else {
            // A crash mid-append leaves a final line without its newline.
            warn!(
                path = %path.display(),
                torn_bytes = line.len(),
                "ignoring torn trailing commit"
            );
            break;
        };
        contents.valid_len += line.len() as u64;
        if body.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let commit: CommitRecord =
            serde_json::from_slice(body).map_err(|e| corrupt(index + 1, e.to_string()))?;
        let expected = contents.version + commit.events.len() as u64;
        if commit.version != expected {
            return Err(corrupt(
                index + 1,
                format!(
                    "commit claims version {} but holds events up to {expected}",
                    commit.version
                ),
            ));
        }
        for record in commit.events {
            let stored = decode_event(record).map_err(|e| corrupt(index + 1, e.to_string()))?;
            if stored.position != contents.version + 1 {
                return Err(corrupt(
                    index + 1,
                    format!(
                        "event position {} does not follow version {}",
                        stored.position, contents.version
                    ),
                ));
            }
            contents.version = stored.position;
            contents.events.push(stored);
        }
    }
    Ok(contents)
}

/// Exclusive cross-process lock on one case log.
///
/// An OS file lock on `events.lock`, released when the handle is closed,
/// including when the owning process dies. The file itself is never
/// removed.
struct CaseLock {
    _file: fs::File,
}

impl CaseLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { _file: file }),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockBusy {
                            path: path.display().to_string(),
                        });
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Write one commit line at `offset` and sync it.
///
/// If any step fails the file is cut back to `offset`, so a commit
/// reported as failed never shows up in a later read.
fn write_commit(file: &mut fs::File, offset: u64, line: &[u8]) -> std::io::Result<()> {
    let result = write_and_sync(file, offset, line);
    if let Err(e) = &result {
        warn!(error = %e, offset, "commit write failed, discarding partial line");
        discard_tail(file, offset);
    }
    result
}

fn write_and_sync(file: &mut fs::File, offset: u64, line: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(line)?;
    file.sync_data()
}

/// Best-effort truncation of everything past `len`.
fn discard_tail(file: &fs::File, len: u64) {
    if let Err(e) = file.set_len(len).and_then(|()| file.sync_data()) {
        warn!(error = %e, len, "failed to discard uncommitted bytes");
    }
}

/// Durable store: one JSONL file per case.
///
/// Each append writes exactly one line holding every event of the append
/// and calls `fsync` before returning, so a batch is all-or-nothing even
/// across a crash. Writers to the same case are serialized by an
/// in-process mutex and, across processes, by an OS file lock held only
/// for the check-and-write. Readers take no lock at all: a half-written
/// final line is simply not yet part of the log.
#[derive(Debug)]
pub struct FileEventStore {
    layout: StreamLayout,
    /// One mutex per case written through this handle. Entries are kept
    /// for the life of the store, so the map is bounded by the number of
    /// cases.
    writers: Mutex<HashMap<CaseId, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

impl FileEventStore {
    /// Open (or create) a store rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the base directories cannot be created.
    pub fn open(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let layout = StreamLayout::new(base_dir);
        fs::create_dir_all(layout.base_dir().join("cases"))?;
        fs::create_dir_all(layout.meta_dir())?;
        Ok(Self {
            layout,
            writers: Mutex::new(HashMap::new()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// How long to wait for another process's case lock before failing
    /// with [`StoreError::LockBusy`].
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    fn writer(&self, case_id: &CaseId) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(writers.entry(case_id.clone()).or_default())
    }
}

impl EventStore for FileEventStore {
    fn append_batch(
        &self,
        case_id: &CaseId,
        events: Vec<CaseEvent>,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let writer = self.writer(case_id);
        let _exclusive = writer.lock().unwrap_or_else(PoisonError::into_inner);

        fs::create_dir_all(self.layout.case_dir(case_id))?;
        let _lock = CaseLock::acquire(&self.layout.lock_path(case_id), self.lock_timeout)?;

        let log_path = self.layout.log_path(case_id);
        let contents = read_log(&log_path)?;
        check_append(case_id, contents.version, expected_version, &events)?;
        if events.is_empty() {
            return Ok(contents.version);
        }
        if contents.version == 0 {
            self.layout.ensure_case(case_id)?;
        }

        let stored = number_events(contents.version, events);
        let version = contents.version + stored.len() as u64;
        let commit = CommitRecord {
            version,
            committed_at: now_millis(),
            events: stored
                .iter()
                .map(encode_event)
                .collect::<Result<_, _>>()?,
        };
        let mut line = serde_json::to_vec(&commit)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&log_path)?;
        if contents.file_len > contents.valid_len {
            warn!(
                case_id = %case_id,
                torn_bytes = contents.file_len - contents.valid_len,
                "truncating torn trailing commit"
            );
            file.set_len(contents.valid_len)?;
        }
        write_commit(&mut file, contents.valid_len, &line)?;

        if contents.version == 0 {
            info!(case_id = %case_id, version, "case log created");
        } else {
            debug!(case_id = %case_id, count = stored.len(), version, "commit written");
        }
        Ok(version)
    }

    fn get_events(&self, case_id: &CaseId) -> Result<EventStream, StoreError> {
        let contents = read_log(&self.layout.log_path(case_id))?;
        Ok(EventStream::new(contents.events, contents.version))
    }

    fn case_ids(&self) -> Result<Vec<CaseId>, StoreError> {
        Ok(self.layout.list_cases()?)
    }
}
