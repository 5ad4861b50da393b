//! Event-sourced case engine for NS 8407 change-order claims (KOE cases).
//!
//! Every fact about a case is an immutable [`CaseEvent`] in a per-case
//! append-only log. [`CaseState`] is never stored: [`compute_state`] folds
//! it from the log on every read. Writes go through [`CaseService`], which
//! validates each candidate event against the projected state before
//! appending it with an optimistic version check.

mod error;
mod event;
mod payload;
mod projection;
mod projector;
mod reactor;
mod rules;
mod service;
mod state;
mod storage;
mod store;
mod validator;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::{CaseError, PolicyError, ReactorError, StoreError, ValidationError};
pub use event::{
    ActorRole, CaseEvent, CaseId, EventId, EventKind, EventType, StoredEvent, Timestamp,
    TrackKind, now_millis,
};
pub use payload::{
    AccelerationClaim, Amount, BasisCategory, BasisClaim, BasisResponse, CaseClosed, CaseCreated,
    CaseKind, ChangeOrder, Claim, CompensationClaim, CompensationMethod, CompensationResponse,
    Contest, Dispute, DocumentRef, DocumentsAttached, RelatedCase, RelationKind, Response,
    ResponseResult, ScheduleClaim, ScheduleResponse, SubsidiaryPosition, TrackRef, Withdrawal,
};
pub use projection::{Projection, Referrer, RelatedCasesIndex};
pub use projector::{compute_state, replay_onto};
pub use reactor::{
    BoxFuture, Committed, DEFAULT_QUEUE_CAPACITY, Reactor, ReactorConfig, ReactorHandle,
    ReactorReport,
};
pub use rules::{
    BuiltinRule, DEFAULT_ACCELERATION_CEILING_PERCENT, FnRule, RelatedStates, Rule, RuleContext,
    RuleOutcome, RulePolicy, acceleration_ceiling, rule_fn,
};
pub use service::{CaseService, CaseServiceBuilder, DEFAULT_MAX_RETRIES, Submitted};
pub use state::{
    BasisTrack, CaseState, CaseSummary, ChangeOrderState, ChangeOrderStatus, Closure,
    CompensationTrack, OverallStatus, ScheduleTrack, Track, TrackInfo, TrackStatus, TrackSummary,
};
pub use storage::{DEFAULT_LOCK_TIMEOUT, FileEventStore, StreamLayout, case_stream_uuid};
pub use store::{EventStore, EventStream, InMemoryEventStore};
pub use validator::Validator;
