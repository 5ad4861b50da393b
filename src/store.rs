//! The event store contract and the in-memory backend.
//!
//! A store owns one append-only log per case and a version counter equal
//! to the number of events in it. Appends carry the version the caller
//! last observed; the store rejects the append if that is no longer the
//! current version. This check is the only serialization point between
//! concurrent writers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::StoreError;
use crate::event::{CaseEvent, CaseId, EventType, StoredEvent};

/// A consistent snapshot of one case log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStream {
    /// Events in `(timestamp, position)` order.
    pub events: Vec<StoredEvent>,
    /// Number of committed events in the log at the time of the read.
    pub version: u64,
}

impl EventStream {
    pub(crate) fn new(mut events: Vec<StoredEvent>, version: u64) -> Self {
        events.sort_by_key(StoredEvent::ordering_key);
        Self { events, version }
    }

    pub fn is_empty(&self) -> bool {
        self.version == 0
    }
}

/// Append-only per-case event log with optimistic concurrency.
///
/// Implementations must make `append_batch` linearizable per case: the
/// version check and the write happen atomically with respect to other
/// appends to the same case.
pub trait EventStore: Send + Sync {
    /// Append one event.
    ///
    /// # Returns
    ///
    /// The new version, `expected_version + 1`.
    ///
    /// # Errors
    ///
    /// * [`StoreError::ConcurrencyConflict`] if `expected_version` is not
    ///   the current version.
    /// * [`StoreError::UnknownCase`] if the case has no log and the event
    ///   is not `CaseCreated`.
    /// * [`StoreError::Io`] and friends if the event could not be durably
    ///   recorded.
    fn append(
        &self,
        case_id: &CaseId,
        event: CaseEvent,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        self.append_batch(case_id, vec![event], expected_version)
    }

    /// Append several events atomically: all of them are recorded or none.
    ///
    /// # Returns
    ///
    /// The new version, `expected_version + events.len()`.
    ///
    /// # Errors
    ///
    /// Same as [`append`](EventStore::append).
    fn append_batch(
        &self,
        case_id: &CaseId,
        events: Vec<CaseEvent>,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Read the full log of a case. An unknown case reads as empty at
    /// version 0.
    fn get_events(&self, case_id: &CaseId) -> Result<EventStream, StoreError>;

    /// Read the events at positions after `version`.
    fn get_events_after(&self, case_id: &CaseId, version: u64) -> Result<EventStream, StoreError> {
        let stream = self.get_events(case_id)?;
        let events = stream
            .events
            .into_iter()
            .filter(|e| e.position > version)
            .collect();
        Ok(EventStream::new(events, stream.version))
    }

    /// Every case with a log, sorted.
    fn case_ids(&self) -> Result<Vec<CaseId>, StoreError>;
}

/// Precondition shared by every backend, checked under the backend's
/// per-case write exclusion.
pub(crate) fn check_append(
    case_id: &CaseId,
    current_version: u64,
    expected_version: u64,
    events: &[CaseEvent],
) -> Result<(), StoreError> {
    if expected_version != current_version {
        return Err(StoreError::ConcurrencyConflict {
            case_id: case_id.clone(),
            expected: expected_version,
            actual: current_version,
        });
    }
    if let Some(stray) = events.iter().find(|e| e.case_id != *case_id) {
        return Err(StoreError::CaseMismatch {
            expected: case_id.clone(),
            found: stray.case_id.clone(),
        });
    }
    if current_version == 0
        && events
            .first()
            .is_some_and(|e| e.event_type() != EventType::CaseCreated)
    {
        return Err(StoreError::UnknownCase(case_id.clone()));
    }
    Ok(())
}

/// Number the batch from `current_version + 1`.
pub(crate) fn number_events(current_version: u64, events: Vec<CaseEvent>) -> Vec<StoredEvent> {
    events
        .into_iter()
        .zip(current_version + 1..)
        .map(|(event, position)| StoredEvent { position, event })
        .collect()
}

/// Process-local store. Nothing survives a restart.
///
/// Each case log is an `Arc<Vec<StoredEvent>>`. A reader clones the `Arc`
/// under a short read lock and works on that snapshot; a writer replaces
/// the `Arc` under the write lock, so a read never observes a partial
/// batch.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    logs: RwLock<HashMap<CaseId, Arc<Vec<StoredEvent>>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, case_id: &CaseId) -> Option<Arc<Vec<StoredEvent>>> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(case_id)
            .cloned()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_batch(
        &self,
        case_id: &CaseId,
        events: Vec<CaseEvent>,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        let current = logs.get(case_id).map_or(0, |log| log.len() as u64);
        check_append(case_id, current, expected_version, &events)?;
        if events.is_empty() {
            return Ok(current);
        }

        let count = events.len();
        let log = logs.entry(case_id.clone()).or_default();
        Arc::make_mut(log).extend(number_events(current, events));
        let version = log.len() as u64;
        debug!(case_id = %case_id, count, version, "appended to in-memory log");
        Ok(version)
    }

    fn get_events(&self, case_id: &CaseId) -> Result<EventStream, StoreError> {
        Ok(match self.snapshot(case_id) {
            Some(log) => EventStream::new(log.as_ref().clone(), log.len() as u64),
            None => EventStream::default(),
        })
    }

    fn get_events_after(&self, case_id: &CaseId, version: u64) -> Result<EventStream, StoreError> {
        Ok(match self.snapshot(case_id) {
            Some(log) => {
                let skip = usize::try_from(version).unwrap_or(usize::MAX);
                let tail = log.iter().skip(skip).cloned().collect();
                EventStream::new(tail, log.len() as u64)
            }
            None => EventStream::default(),
        })
    }

    fn case_ids(&self) -> Result<Vec<CaseId>, StoreError> {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<CaseId> = logs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    fn append_batch(
        &self,
        case_id: &CaseId,
        events: Vec<CaseEvent>,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        (**self).append_batch(case_id, events, expected_version)
    }

    fn get_events(&self, case_id: &CaseId) -> Result<EventStream, StoreError> {
        (**self).get_events(case_id)
    }

    fn get_events_after(&self, case_id: &CaseId, version: u64) -> Result<EventStream, StoreError> {
        (**self).get_events_after(case_id, version)
    }

    fn case_ids(&self) -> Result<Vec<CaseId>, StoreError> {
        (**self).case_ids()
    }
}
