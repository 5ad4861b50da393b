//! Event envelope, identifiers, and the closed event-type union.
//!
//! Every fact recorded against a case is a [`CaseEvent`]: an immutable
//! envelope (id, case, timestamp, actor) around one [`EventKind`] variant.
//! `EventKind` is adjacently tagged (`"type"` + `"data"`) so the storage
//! layer can split it into a discriminator and a payload.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::{
    AccelerationClaim, BasisClaim, BasisResponse, CaseClosed, CaseCreated, ChangeOrder,
    CompensationClaim, CompensationResponse, Contest, Dispute, DocumentsAttached, RelatedCase,
    ScheduleClaim, ScheduleResponse, TrackRef, Withdrawal,
};

/// Unix epoch milliseconds.
pub type Timestamp = u64;

/// Current wall-clock time in Unix epoch milliseconds.
///
/// Only used to stamp freshly constructed events. Replay and validation
/// never read the clock.
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::UNIX_EPOCH
        .elapsed()
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Identifier of a single KOE case (e.g. `"KOE-2024-017"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Wrap any string-like value as a case id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CaseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&CaseId> for CaseId {
    fn from(value: &CaseId) -> Self {
        value.clone()
    }
}

/// Globally unique event identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh random event id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The party on whose behalf an event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// The contractor raising the claim (totalentreprenør / entreprenør).
    Claimant,
    /// The owner answering the claim (byggherre).
    Owner,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claimant => "claimant",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three independent sub-claims of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Entitlement (grunnlag).
    Basis,
    /// Cost (vederlag).
    Compensation,
    /// Time extension (frist).
    Schedule,
}

impl TrackKind {
    pub const ALL: [TrackKind; 3] = [Self::Basis, Self::Compensation, Self::Schedule];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basis => "basis",
            Self::Compensation => "compensation",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every fact that can be appended to a case log.
///
/// Adding a variant is a compile error in every exhaustive match that
/// does not handle it: the projector, [`EventKind::event_type`], and the
/// validator's rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventKind {
    CaseCreated(CaseCreated),
    RelatedCaseAdded(RelatedCase),
    DocumentsAttached(DocumentsAttached),
    CaseClosed(CaseClosed),
    BasisSubmitted(BasisClaim),
    BasisResponded(BasisResponse),
    CompensationSubmitted(CompensationClaim),
    AccelerationClaimed(AccelerationClaim),
    CompensationResponded(CompensationResponse),
    ScheduleSubmitted(ScheduleClaim),
    ScheduleResponded(ScheduleResponse),
    ReviewStarted(TrackRef),
    ResponseContested(Contest),
    ClaimWithdrawn(Withdrawal),
    ResponseAccepted(TrackRef),
    ChangeOrderIssued(ChangeOrder),
    ChangeOrderAccepted,
    ChangeOrderDisputed(Dispute),
    ChangeOrderRevoked(Dispute),
}

/// Fieldless discriminant of [`EventKind`].
///
/// Used as the persisted `event_type` string and as the key of the
/// validator's per-type rule lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    CaseCreated,
    RelatedCaseAdded,
    DocumentsAttached,
    CaseClosed,
    BasisSubmitted,
    BasisResponded,
    CompensationSubmitted,
    AccelerationClaimed,
    CompensationResponded,
    ScheduleSubmitted,
    ScheduleResponded,
    ReviewStarted,
    ResponseContested,
    ClaimWithdrawn,
    ResponseAccepted,
    ChangeOrderIssued,
    ChangeOrderAccepted,
    ChangeOrderDisputed,
    ChangeOrderRevoked,
}

impl EventType {
    pub const ALL: [EventType; 19] = [
        Self::CaseCreated,
        Self::RelatedCaseAdded,
        Self::DocumentsAttached,
        Self::CaseClosed,
        Self::BasisSubmitted,
        Self::BasisResponded,
        Self::CompensationSubmitted,
        Self::AccelerationClaimed,
        Self::CompensationResponded,
        Self::ScheduleSubmitted,
        Self::ScheduleResponded,
        Self::ReviewStarted,
        Self::ResponseContested,
        Self::ClaimWithdrawn,
        Self::ResponseAccepted,
        Self::ChangeOrderIssued,
        Self::ChangeOrderAccepted,
        Self::ChangeOrderDisputed,
        Self::ChangeOrderRevoked,
    ];

    /// The persisted discriminator string; identical to the serde tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseCreated => "CaseCreated",
            Self::RelatedCaseAdded => "RelatedCaseAdded",
            Self::DocumentsAttached => "DocumentsAttached",
            Self::CaseClosed => "CaseClosed",
            Self::BasisSubmitted => "BasisSubmitted",
            Self::BasisResponded => "BasisResponded",
            Self::CompensationSubmitted => "CompensationSubmitted",
            Self::AccelerationClaimed => "AccelerationClaimed",
            Self::CompensationResponded => "CompensationResponded",
            Self::ScheduleSubmitted => "ScheduleSubmitted",
            Self::ScheduleResponded => "ScheduleResponded",
            Self::ReviewStarted => "ReviewStarted",
            Self::ResponseContested => "ResponseContested",
            Self::ClaimWithdrawn => "ClaimWithdrawn",
            Self::ResponseAccepted => "ResponseAccepted",
            Self::ChangeOrderIssued => "ChangeOrderIssued",
            Self::ChangeOrderAccepted => "ChangeOrderAccepted",
            Self::ChangeOrderDisputed => "ChangeOrderDisputed",
            Self::ChangeOrderRevoked => "ChangeOrderRevoked",
        }
    }

    /// The role that must record this event type, if fixed.
    ///
    /// `CaseCreated` depends on the case kind, document attachments and
    /// closing are open to both parties, so those return `None`.
    pub fn required_role(&self) -> Option<ActorRole> {
        match self {
            Self::CaseCreated
            | Self::RelatedCaseAdded
            | Self::DocumentsAttached
            | Self::CaseClosed => None,
            Self::BasisSubmitted
            | Self::CompensationSubmitted
            | Self::AccelerationClaimed
            | Self::ScheduleSubmitted
            | Self::ResponseContested
            | Self::ClaimWithdrawn
            | Self::ResponseAccepted
            | Self::ChangeOrderAccepted
            | Self::ChangeOrderDisputed => Some(ActorRole::Claimant),
            Self::BasisResponded
            | Self::CompensationResponded
            | Self::ScheduleResponded
            | Self::ReviewStarted
            | Self::ChangeOrderIssued
            | Self::ChangeOrderRevoked => Some(ActorRole::Owner),
        }
    }

    /// Whether this is an owner response to a claimant submission.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Self::BasisResponded | Self::CompensationResponded | Self::ScheduleResponded
        )
    }

    /// Whether this is a claimant submission (first or resubmission).
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            Self::BasisSubmitted
                | Self::CompensationSubmitted
                | Self::AccelerationClaimed
                | Self::ScheduleSubmitted
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::CaseCreated(_) => EventType::CaseCreated,
            Self::RelatedCaseAdded(_) => EventType::RelatedCaseAdded,
            Self::DocumentsAttached(_) => EventType::DocumentsAttached,
            Self::CaseClosed(_) => EventType::CaseClosed,
            Self::BasisSubmitted(_) => EventType::BasisSubmitted,
            Self::BasisResponded(_) => EventType::BasisResponded,
            Self::CompensationSubmitted(_) => EventType::CompensationSubmitted,
            Self::AccelerationClaimed(_) => EventType::AccelerationClaimed,
            Self::CompensationResponded(_) => EventType::CompensationResponded,
            Self::ScheduleSubmitted(_) => EventType::ScheduleSubmitted,
            Self::ScheduleResponded(_) => EventType::ScheduleResponded,
            Self::ReviewStarted(_) => EventType::ReviewStarted,
            Self::ResponseContested(_) => EventType::ResponseContested,
            Self::ClaimWithdrawn(_) => EventType::ClaimWithdrawn,
            Self::ResponseAccepted(_) => EventType::ResponseAccepted,
            Self::ChangeOrderIssued(_) => EventType::ChangeOrderIssued,
            Self::ChangeOrderAccepted => EventType::ChangeOrderAccepted,
            Self::ChangeOrderDisputed(_) => EventType::ChangeOrderDisputed,
            Self::ChangeOrderRevoked(_) => EventType::ChangeOrderRevoked,
        }
    }

    /// The track this event mutates, if any.
    pub fn target_track(&self) -> Option<TrackKind> {
        match self {
            Self::BasisSubmitted(_) | Self::BasisResponded(_) => Some(TrackKind::Basis),
            Self::CompensationSubmitted(_)
            | Self::AccelerationClaimed(_)
            | Self::CompensationResponded(_) => Some(TrackKind::Compensation),
            Self::ScheduleSubmitted(_) | Self::ScheduleResponded(_) => Some(TrackKind::Schedule),
            Self::ReviewStarted(r) | Self::ResponseAccepted(r) => Some(r.track),
            Self::ResponseContested(c) => Some(c.track),
            Self::ClaimWithdrawn(w) => Some(w.track),
            Self::DocumentsAttached(d) => d.track,
            Self::CaseCreated(_)
            | Self::RelatedCaseAdded(_)
            | Self::CaseClosed(_)
            | Self::ChangeOrderIssued(_)
            | Self::ChangeOrderAccepted
            | Self::ChangeOrderDisputed(_)
            | Self::ChangeOrderRevoked(_) => None,
        }
    }

    /// Validate the shape of the payload in isolation from any state.
    ///
    /// Returns the first problem found as a human-readable reason.
    pub fn check_shape(&self) -> Result<(), String> {
        match self {
            Self::CaseCreated(p) => p.check(),
            Self::RelatedCaseAdded(p) => p.check(),
            Self::DocumentsAttached(p) => p.check(),
            Self::CaseClosed(p) => p.check(),
            Self::BasisSubmitted(p) => p.check(),
            Self::BasisResponded(p) => p.check(),
            Self::CompensationSubmitted(p) => p.check(),
            Self::AccelerationClaimed(p) => p.check(),
            Self::CompensationResponded(p) => p.check(),
            Self::ScheduleSubmitted(p) => p.check(),
            Self::ScheduleResponded(p) => p.check(),
            Self::ReviewStarted(_) | Self::ResponseAccepted(_) => Ok(()),
            Self::ResponseContested(p) => p.check(),
            Self::ClaimWithdrawn(p) => p.check(),
            Self::ChangeOrderIssued(p) => p.check(),
            Self::ChangeOrderAccepted => Ok(()),
            Self::ChangeOrderDisputed(p) | Self::ChangeOrderRevoked(p) => p.check(),
        }
    }
}

/// An immutable fact about one case.
///
/// Construct with [`CaseEvent::new`] and refine with the builder methods.
///
/// # Examples
///
/// ```
/// use koe_es::{ActorRole, CaseEvent, EventKind, EventType, TrackKind, TrackRef};
///
/// let event = CaseEvent::new(
///     "KOE-1",
///     "Byggherre KF",
///     ActorRole::Owner,
///     EventKind::ReviewStarted(TrackRef { track: TrackKind::Basis }),
/// )
/// .at(1_700_000_000_000)
/// .with_comment("tas til behandling");
///
/// assert_eq!(event.event_type(), EventType::ReviewStarted);
/// assert_eq!(event.timestamp, 1_700_000_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseEvent {
    pub event_id: EventId,
    pub case_id: CaseId,
    pub timestamp: Timestamp,
    pub actor_name: String,
    pub actor_role: ActorRole,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_to_event_id: Option<EventId>,
}

impl CaseEvent {
    /// Create an event with a fresh id, stamped with the current time.
    pub fn new(
        case_id: impl Into<CaseId>,
        actor_name: impl Into<String>,
        actor_role: ActorRole,
        kind: EventKind,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            case_id: case_id.into(),
            timestamp: now_millis(),
            actor_name: actor_name.into(),
            actor_role,
            kind,
            comment: None,
            reference_to_event_id: None,
        }
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Override the event id (e.g. when the caller assigns ids for idempotency).
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Point this event back at an earlier event in the same case.
    pub fn referencing(mut self, event_id: EventId) -> Self {
        self.reference_to_event_id = Some(event_id);
        self
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

/// An event together with its position in the case log.
///
/// `position` is 1-based: the `CaseCreated` event sits at position 1 and a
/// log at version `n` holds positions `1..=n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub position: u64,
    pub event: CaseEvent,
}

impl StoredEvent {
    /// Replay ordering key: timestamp first, log position breaks ties.
    pub fn ordering_key(&self) -> (Timestamp, u64) {
        (self.event.timestamp, self.position)
    }
}
