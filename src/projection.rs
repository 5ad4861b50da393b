//! Cross-case projections (read models) built by scanning every case log.
//!
//! A projection keeps one cursor per case: the log version it has applied
//! up to. Catching up reads only the tail of each log past its cursor.
//! With a file store the state and cursors are checkpointed to disk and a
//! corrupt checkpoint is rebuilt from scratch.

use std::any::Any;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::event::{CaseId, EventKind, StoredEvent};
use crate::payload::{RelatedCase, RelationKind};
use crate::store::EventStore;

/// A read model derived from the events of all cases.
///
/// # Contract
///
/// - [`apply`](Projection::apply) must be deterministic.
/// - Events of no interest are ignored in the body.
pub trait Projection:
    Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Used as the checkpoint directory name.
    const NAME: &'static str;

    fn apply(&mut self, event: &StoredEvent);
}

/// Persisted projection state and per-case cursors.
///
/// Serialized as `{ "state": <P>, "cursors": { "<case id>": <version> } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProjectionCheckpoint<P> {
    pub state: P,
    #[serde(default)]
    pub cursors: BTreeMap<CaseId, u64>,
}

impl<P: Default> Default for ProjectionCheckpoint<P> {
    fn default() -> Self {
        Self {
            state: P::default(),
            cursors: BTreeMap::new(),
        }
    }
}

/// Save a projection checkpoint atomically.
///
/// Writes to a temporary file then renames to `checkpoint.json` in `dir`.
/// Creates `dir` if it does not exist.
///
/// # Errors
///
/// Returns `io::Error` if directory creation, file writing, or renaming fails.
pub(crate) fn save_checkpoint<P: Projection>(
    dir: &Path,
    checkpoint: &ProjectionCheckpoint<P>,
) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("checkpoint.json");
    let tmp_path = dir.join("checkpoint.json.tmp");
    let json = serde_json::to_string_pretty(checkpoint).map_err(io::Error::other)?;
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// Load a projection checkpoint from disk.
///
/// Returns `Ok(None)` if the file does not exist or is corrupt; a corrupt
/// checkpoint is not a hard error, the projection rebuilds.
///
/// # Errors
///
/// Returns `io::Error` for I/O failures other than file-not-found.
pub(crate) fn load_checkpoint<P: Projection>(
    dir: &Path,
) -> io::Result<Option<ProjectionCheckpoint<P>>> {
    let path = dir.join("checkpoint.json");
    match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupt projection checkpoint, will rebuild"
                );
                Ok(None)
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Drives one [`Projection`] over an [`EventStore`].
pub(crate) struct ProjectionRunner<P: Projection> {
    checkpoint: ProjectionCheckpoint<P>,
    /// `None` keeps the checkpoint in memory only.
    checkpoint_dir: Option<PathBuf>,
}

impl<P: Projection> ProjectionRunner<P> {
    /// Create a runner, loading an existing checkpoint if one is found.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if an existing checkpoint cannot be read.
    pub(crate) fn new(checkpoint_dir: Option<PathBuf>) -> io::Result<Self> {
        let checkpoint = match &checkpoint_dir {
            Some(dir) => load_checkpoint::<P>(dir)?.unwrap_or_default(),
            None => ProjectionCheckpoint::default(),
        };
        Ok(Self {
            checkpoint,
            checkpoint_dir,
        })
    }

    /// A runner that never touches disk.
    pub(crate) fn in_memory() -> Self {
        Self {
            checkpoint: ProjectionCheckpoint::default(),
            checkpoint_dir: None,
        }
    }

    pub(crate) fn state(&self) -> &P {
        &self.checkpoint.state
    }

    /// Apply every event committed since the last catch-up, then save the
    /// checkpoint if anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a log cannot be read or the checkpoint
    /// cannot be written.
    pub(crate) fn catch_up(&mut self, store: &dyn EventStore) -> Result<(), StoreError> {
        let mut applied = 0_usize;
        for case_id in store.case_ids()? {
            let cursor = self.checkpoint.cursors.get(&case_id).copied().unwrap_or(0);
            let tail = store.get_events_after(&case_id, cursor)?;
            if tail.events.is_empty() {
                continue;
            }
            let mut events = tail.events;
            events.sort_by_key(|e| e.position);
            for event in &events {
                self.checkpoint.state.apply(event);
            }
            applied += events.len();
            self.checkpoint.cursors.insert(case_id, tail.version);
        }

        if applied > 0 {
            tracing::debug!(projection_name = P::NAME, applied, "projection caught up");
            if let Some(dir) = &self.checkpoint_dir {
                save_checkpoint::<P>(dir, &self.checkpoint)?;
            }
        }
        Ok(())
    }
}

/// Type-erased interface so the service can hold heterogeneous runners.
pub(crate) trait ProjectionCatchUp: Send + Sync {
    fn catch_up(&mut self, store: &dyn EventStore) -> Result<(), StoreError>;

    /// Clone the current state into a box the caller downcasts to `P`.
    fn state_any(&self) -> Box<dyn Any + Send>;
}

impl<P: Projection> ProjectionCatchUp for ProjectionRunner<P> {
    fn catch_up(&mut self, store: &dyn EventStore) -> Result<(), StoreError> {
        ProjectionRunner::catch_up(self, store)
    }

    fn state_any(&self) -> Box<dyn Any + Send> {
        Box::new(self.state().clone())
    }
}

/// A satellite case pointing at a base case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Referrer {
    pub case_id: CaseId,
    pub relation: RelationKind,
}

/// Reverse index of case references: base case to the satellite cases
/// that name it.
///
/// Cases only store outgoing references; this index is the only place
/// incoming references are known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedCasesIndex {
    referrers: BTreeMap<CaseId, Vec<Referrer>>,
}

impl RelatedCasesIndex {
    /// Satellite cases referencing `base`, sorted.
    pub fn referrers(&self, base: &CaseId) -> &[Referrer] {
        self.referrers
            .get(base)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn insert(&mut self, satellite: &CaseId, related: &RelatedCase) {
        let entry = self.referrers.entry(related.case_id.clone()).or_default();
        let referrer = Referrer {
            case_id: satellite.clone(),
            relation: related.relation,
        };
        if let Err(at) = entry.binary_search(&referrer) {
            entry.insert(at, referrer);
        }
    }
}

impl Projection for RelatedCasesIndex {
    const NAME: &'static str = "related-cases";

    fn apply(&mut self, stored: &StoredEvent) {
        let event = &stored.event;
        match &event.kind {
            EventKind::CaseCreated(created) => {
                for related in &created.related {
                    self.insert(&event.case_id, related);
                }
            }
            EventKind::RelatedCaseAdded(related) => self.insert(&event.case_id, related),
            _ => {}
        }
    }
}
