//! The case service: the read and write API over one event store.
//!
//! A write reads the case log, folds it into a [`CaseState`], validates the
//! candidate events against that state, and appends with the version it
//! read as the precondition. No lock is held across those steps; two
//! writers racing on the same case are arbitrated by the store's version
//! check alone.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, info_span, warn};

use crate::error::{CaseError, StoreError, ValidationError};
use crate::event::{CaseEvent, CaseId, EventType, StoredEvent};
use crate::projection::{
    Projection, ProjectionCatchUp, ProjectionRunner, Referrer, RelatedCasesIndex,
};
use crate::projector::compute_state;
use crate::reactor::{self, Committed, Reactor, ReactorConfig, ReactorHandle, ReactorSender};
use crate::rules::{RelatedStates, Rule, RulePolicy};
use crate::state::CaseState;
use crate::storage::{FileEventStore, StreamLayout};
use crate::store::{EventStore, InMemoryEventStore};
use crate::validator::Validator;

/// Conflicts retried by [`CaseService::submit_with_retry`] before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    /// Log version after the append.
    pub version: u64,
    /// State projected from the log including the new events.
    pub state: CaseState,
}

type ProjectionMap = HashMap<&'static str, Mutex<Box<dyn ProjectionCatchUp>>>;

struct Inner {
    store: Arc<dyn EventStore>,
    validator: Validator,
    projections: ProjectionMap,
    reactors: Vec<Arc<dyn Reactor>>,
    reactor_config: ReactorConfig,
    reactor_sender: Mutex<Option<ReactorSender>>,
    reactor_handle: tokio::sync::Mutex<Option<ReactorHandle>>,
    max_retries: u32,
    base_dir: Option<PathBuf>,
}

/// Entry point for reading and writing cases.
///
/// `Clone` is cheap: all internal state is `Arc`-wrapped.
///
/// # Examples
///
/// ```
/// use koe_es::{ActorRole, CaseEvent, CaseService, EventKind, OverallStatus};
/// use koe_es::{CaseCreated, CaseKind};
///
/// let service = CaseService::in_memory();
/// let created = CaseEvent::new(
///     "KOE-1",
///     "Kari Nordmann",
///     ActorRole::Claimant,
///     EventKind::CaseCreated(CaseCreated {
///         title: "Rock in tunnel face".into(),
///         kind: CaseKind::Standard,
///         claimant: "Fjellbygg AS".into(),
///         owner: "Statens vegvesen".into(),
///         related: Vec::new(),
///     }),
/// );
///
/// let submitted = service.submit(&"KOE-1".into(), created, 0)?;
/// assert_eq!(submitted.version, 1);
/// assert_eq!(submitted.state.overall_status(), OverallStatus::Draft);
/// # Ok::<(), koe_es::CaseError>(())
/// ```
#[derive(Clone)]
pub struct CaseService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseService")
            .field("base_dir", &self.inner.base_dir)
            .field("validator", &self.inner.validator)
            .field("max_retries", &self.inner.max_retries)
            .finish_non_exhaustive()
    }
}

impl CaseService {
    pub fn builder() -> CaseServiceBuilder {
        CaseServiceBuilder::new()
    }

    /// A service over a fresh [`InMemoryEventStore`] with the default policy.
    pub fn in_memory() -> Self {
        let mut projections = ProjectionMap::new();
        let related: Box<dyn ProjectionCatchUp> =
            Box::new(ProjectionRunner::<RelatedCasesIndex>::in_memory());
        projections.insert(RelatedCasesIndex::NAME, Mutex::new(related));
        Self::from_parts(
            Arc::new(InMemoryEventStore::new()),
            Validator::default(),
            projections,
            Vec::new(),
            ReactorConfig::default(),
            DEFAULT_MAX_RETRIES,
            None,
        )
    }

    fn from_parts(
        store: Arc<dyn EventStore>,
        validator: Validator,
        projections: ProjectionMap,
        reactors: Vec<Arc<dyn Reactor>>,
        reactor_config: ReactorConfig,
        max_retries: u32,
        base_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                validator,
                projections,
                reactors,
                reactor_config,
                reactor_sender: Mutex::new(None),
                reactor_handle: tokio::sync::Mutex::new(None),
                max_retries,
                base_dir,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.inner.store
    }

    pub fn validator(&self) -> &Validator {
        &self.inner.validator
    }

    /// Project the current state of a case.
    ///
    /// A case with no log reads as an empty, uncreated state at version 0.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Storage`] if the log cannot be read.
    pub fn read(&self, case_id: &CaseId) -> Result<(CaseState, u64), CaseError> {
        let stream = self.inner.store.get_events(case_id)?;
        Ok((compute_state(&stream.events), stream.version))
    }

    /// Validate and append one event.
    ///
    /// # Arguments
    ///
    /// * `case_id` - The case to write to.
    /// * `event` - The candidate event. Its `case_id` must match.
    /// * `expected_version` - The version the caller last read.
    ///
    /// # Returns
    ///
    /// The new version and the state including the event.
    ///
    /// # Errors
    ///
    /// * [`CaseError::ConcurrencyConflict`] if the case is no longer at
    ///   `expected_version`.
    /// * [`CaseError::Validation`] with the first failing rule.
    /// * [`CaseError::Storage`] if the event could not be durably recorded.
    pub fn submit(
        &self,
        case_id: &CaseId,
        event: CaseEvent,
        expected_version: u64,
    ) -> Result<Submitted, CaseError> {
        let span = info_span!(
            "submit",
            case_id = %case_id,
            event_type = %event.event_type(),
            expected_version
        );
        let _enter = span.enter();
        self.commit(case_id, vec![event], expected_version)
    }

    /// Validate and append several events as one atomic write.
    ///
    /// Each event is validated against the state folded through the
    /// events before it in the batch. The first rejection aborts the whole
    /// batch; nothing is appended.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn submit_batch(
        &self,
        case_id: &CaseId,
        events: Vec<CaseEvent>,
        expected_version: u64,
    ) -> Result<Submitted, CaseError> {
        let span = info_span!(
            "submit",
            case_id = %case_id,
            batch_len = events.len(),
            expected_version
        );
        let _enter = span.enter();
        self.commit(case_id, events, expected_version)
    }

    /// Read, decide, and submit, retrying on conflict.
    ///
    /// `decide` receives the current state and version and returns the
    /// events to submit. On [`CaseError::ConcurrencyConflict`] the case is
    /// re-read and `decide` is called again, up to the configured
    /// `max_retries` times; after that the conflict is returned.
    ///
    /// # Errors
    ///
    /// Whatever `decide` returns, or the final error of the last attempt.
    pub fn submit_with_retry<F>(
        &self,
        case_id: &CaseId,
        mut decide: F,
    ) -> Result<Submitted, CaseError>
    where
        F: FnMut(&CaseState, u64) -> Result<Vec<CaseEvent>, ValidationError>,
    {
        let mut attempt = 0_u32;
        loop {
            let (state, version) = self.read(case_id)?;
            let events = decide(&state, version)?;
            match self.submit_batch(case_id, events, version) {
                Err(CaseError::ConcurrencyConflict { actual_version })
                    if attempt < self.inner.max_retries =>
                {
                    attempt += 1;
                    debug!(
                        case_id = %case_id,
                        attempt,
                        actual_version,
                        "retrying after concurrency conflict"
                    );
                }
                result => return result,
            }
        }
    }

    fn commit(
        &self,
        case_id: &CaseId,
        events: Vec<CaseEvent>,
        expected_version: u64,
    ) -> Result<Submitted, CaseError> {
        let stream = self.inner.store.get_events(case_id).inspect_err(|e| {
            error!(error = %e, "failed to read case log");
        })?;
        if stream.version != expected_version {
            warn!(actual_version = stream.version, "stale expected version");
            return Err(CaseError::ConcurrencyConflict {
                actual_version: stream.version,
            });
        }

        let mut state = compute_state(&stream.events);
        let mut staged = Vec::with_capacity(events.len());
        for (position, event) in (stream.version + 1..).zip(&events) {
            let related = self.load_related(event, &state)?;
            self.inner
                .validator
                .validate(case_id, event, &state, &related)?;
            let stored = StoredEvent {
                position,
                event: event.clone(),
            };
            state = state.apply(&stored);
            staged.push(stored);
        }
        if staged.is_empty() {
            return Ok(Submitted {
                version: stream.version,
                state,
            });
        }

        let version = match self
            .inner
            .store
            .append_batch(case_id, events, expected_version)
        {
            Ok(version) => version,
            Err(e @ StoreError::ConcurrencyConflict { .. }) => {
                warn!(error = %e, "lost the race to append");
                return Err(e.into());
            }
            Err(e) => {
                error!(error = %e, "append failed");
                return Err(e.into());
            }
        };

        let mut log = stream.events;
        log.extend(staged.iter().cloned());
        let state = compute_state(&log);
        info!(version, count = staged.len(), "events committed");

        self.notify_reactors(Committed {
            case_id: case_id.clone(),
            version,
            events: staged,
        });
        Ok(Submitted { version, state })
    }

    /// Project every case the validator needs to see for `event`.
    /// Cases with no log are left out.
    fn load_related(
        &self,
        event: &CaseEvent,
        state: &CaseState,
    ) -> Result<RelatedStates, CaseError> {
        let mut related = RelatedStates::new();
        for case_id in self.inner.validator.required_cases(event, state) {
            let stream = self.inner.store.get_events(&case_id)?;
            if stream.is_empty() {
                continue;
            }
            related.insert(case_id, compute_state(&stream.events));
        }
        Ok(related)
    }

    fn notify_reactors(&self, committed: Committed) {
        let sender = self
            .inner
            .reactor_sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sender) = sender {
            sender.notify(committed);
        }
    }

    /// Catch up and return the current state of a registered projection.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Storage`] if the projection is not registered,
    /// or if catching up fails.
    pub fn projection<P: Projection>(&self) -> Result<P, CaseError> {
        let runner = self.inner.projections.get(P::NAME).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("projection '{}' not registered", P::NAME),
            ))
        })?;
        let mut runner = runner.lock().unwrap_or_else(PoisonError::into_inner);
        runner.catch_up(self.inner.store.as_ref())?;
        runner
            .state_any()
            .downcast::<P>()
            .map(|b| *b)
            .map_err(|_| {
                CaseError::Storage(StoreError::Io(io::Error::other(
                    "projection type mismatch",
                )))
            })
    }

    /// Satellite cases that reference `case_id` as their base case.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Storage`] if the index cannot be caught up.
    pub fn referrers(&self, case_id: &CaseId) -> Result<Vec<Referrer>, CaseError> {
        Ok(self
            .projection::<RelatedCasesIndex>()?
            .referrers(case_id)
            .to_vec())
    }

    /// Start delivering commits to the registered reactors.
    ///
    /// Commits made before this call are not delivered. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::AlreadyExists`] if reactors are already
    /// running.
    pub async fn start_reactors(&self) -> io::Result<ReactorHandle> {
        let mut guard = self.inner.reactor_handle.lock().await;
        if guard.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "reactors already started",
            ));
        }

        let (sender, handle) = reactor::spawn(
            self.inner.reactors.clone(),
            self.inner.reactor_config.clone(),
        );
        *self
            .inner
            .reactor_sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sender);
        *guard = Some(handle.clone());
        Ok(handle)
    }
}

type ProjectionFactory = Box<dyn FnOnce(Option<&Path>) -> io::Result<Box<dyn ProjectionCatchUp>>>;

fn projection_factory<P: Projection>() -> ProjectionFactory {
    Box::new(|projections_dir: Option<&Path>| {
        let runner = ProjectionRunner::<P>::new(projections_dir.map(|dir| dir.join(P::NAME)))?;
        Ok(Box::new(runner) as Box<dyn ProjectionCatchUp>)
    })
}

/// Builder for [`CaseService`].
///
/// Defaults: in-memory store, [`RulePolicy::default`], no custom rules,
/// no reactors, [`DEFAULT_MAX_RETRIES`].
///
/// # Examples
///
/// ```no_run
/// use koe_es::{CaseService, RulePolicy};
///
/// let policy = RulePolicy::from_json_str(r#"{ "acceleration_ceiling_percent": 150 }"#)?;
/// let service = CaseService::builder()
///     .base_dir("/var/lib/koe")
///     .policy(policy)
///     .max_retries(5)
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CaseServiceBuilder {
    base_dir: Option<PathBuf>,
    store: Option<Arc<dyn EventStore>>,
    policy: RulePolicy,
    rules: Vec<(EventType, Arc<dyn Rule>)>,
    projection_factories: Vec<(&'static str, ProjectionFactory)>,
    reactors: Vec<Arc<dyn Reactor>>,
    reactor_config: Option<ReactorConfig>,
    max_retries: u32,
}

impl CaseServiceBuilder {
    pub fn new() -> Self {
        Self {
            base_dir: None,
            store: None,
            policy: RulePolicy::default(),
            rules: Vec::new(),
            projection_factories: vec![(
                RelatedCasesIndex::NAME,
                projection_factory::<RelatedCasesIndex>(),
            )],
            reactors: Vec::new(),
            reactor_config: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Persist cases under `path` with a [`FileEventStore`].
    ///
    /// Projection checkpoints and reactor dead-letter logs are written
    /// under the same directory, even when [`store`](Self::store) supplies
    /// the event store.
    pub fn base_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.base_dir = Some(path.as_ref().to_owned());
        self
    }

    /// Use a caller-supplied event store.
    pub fn store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn policy(mut self, policy: RulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Append a custom rule for one event type, run after the built-in
    /// rules.
    pub fn rule(mut self, event_type: EventType, rule: impl Rule + 'static) -> Self {
        self.rules.push((event_type, Arc::new(rule)));
        self
    }

    /// Register a projection, readable through
    /// [`CaseService::projection`]. Registering the same type twice keeps
    /// the first.
    pub fn projection<P: Projection>(mut self) -> Self {
        if self.projection_factories.iter().all(|(name, _)| *name != P::NAME) {
            self.projection_factories
                .push((P::NAME, projection_factory::<P>()));
        }
        self
    }

    /// Register a reactor. Reactors run in registration order once
    /// [`CaseService::start_reactors`] is called.
    pub fn reactor(mut self, reactor: impl Reactor) -> Self {
        self.reactors.push(Arc::new(reactor));
        self
    }

    /// If not called, the default queue capacity is used and dead letters
    /// go to `<base_dir>/reactors` when a base directory is set.
    pub fn reactor_config(mut self, config: ReactorConfig) -> Self {
        self.reactor_config = Some(config);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Open the store and initialize projections, loading any persisted
    /// checkpoints.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the base directory or a checkpoint
    /// cannot be read or created.
    pub fn build(self) -> Result<CaseService, StoreError> {
        let layout = self.base_dir.as_ref().map(StreamLayout::new);

        let store: Arc<dyn EventStore> = match (self.store, &self.base_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileEventStore::open(dir)?),
            (None, None) => Arc::new(InMemoryEventStore::new()),
        };

        let projections_dir = layout.as_ref().map(StreamLayout::projections_dir);
        let mut projections = ProjectionMap::new();
        for (name, factory) in self.projection_factories {
            let runner = factory(projections_dir.as_deref()).inspect_err(|e| {
                error!(projection_name = name, error = %e, "failed to initialize projection");
            })?;
            projections.insert(name, Mutex::new(runner));
        }

        let mut validator = Validator::new(self.policy);
        for (event_type, rule) in self.rules {
            validator.push_rule(event_type, rule);
        }

        let reactor_config = self.reactor_config.unwrap_or_else(|| ReactorConfig {
            dead_letter_dir: layout.as_ref().map(StreamLayout::reactors_dir),
            ..ReactorConfig::default()
        });

        info!(
            base_dir = ?self.base_dir,
            projections = projections.len(),
            reactors = self.reactors.len(),
            "case service ready"
        );
        Ok(CaseService::from_parts(
            store,
            validator,
            projections,
            self.reactors,
            reactor_config,
            self.max_retries,
            self.base_dir,
        ))
    }
}

impl Default for CaseServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
