//! Projected case state and the values derived from it.
//!
//! [`CaseState`] is never persisted. It is rebuilt from the log by
//! [`compute_state`](crate::compute_state) on every read, and every derived
//! value (overall status, subsidiary flags, change-order eligibility) is a
//! method computed from the raw track fields rather than a stored field.

use serde::{Deserialize, Serialize};

use crate::event::{CaseId, EventId, Timestamp, TrackKind};
use crate::payload::{
    AccelerationClaim, BasisClaim, BasisResponse, CaseKind, ChangeOrder, Claim,
    CompensationClaim, CompensationResponse, DocumentRef, RelatedCase, Response, ResponseResult,
    ScheduleClaim, ScheduleResponse, SubsidiaryPosition,
};

/// Status of one track's state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// The case kind does not use this track.
    NotApplicable,
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Approved,
    PartiallyApproved,
    Rejected,
    Negotiating,
    Withdrawn,
    Locked,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotApplicable => "not_applicable",
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::PartiallyApproved => "partially_approved",
            Self::Rejected => "rejected",
            Self::Negotiating => "negotiating",
            Self::Withdrawn => "withdrawn",
            Self::Locked => "locked",
        }
    }

    /// `Locked` and `Withdrawn` admit no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Locked | Self::Withdrawn)
    }

    /// Applicable and past `Draft`.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::NotApplicable | Self::Draft)
    }

    /// Status reached by a response with the given result.
    pub fn from_result(result: ResponseResult) -> Self {
        match result {
            ResponseResult::Approved => Self::Approved,
            ResponseResult::PartiallyApproved => Self::PartiallyApproved,
            ResponseResult::Rejected => Self::Rejected,
        }
    }
}

/// One independent sub-claim: the claimant's latest claim and the owner's
/// latest response, plus the bookkeeping the validator needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track<C, R> {
    pub status: TrackStatus,
    /// Number of submissions so far; the first submission is revision 1.
    pub revision: u32,
    pub claim: Option<C>,
    pub response: Option<R>,
    /// Ids of every submission event, oldest first.
    pub submissions: Vec<EventId>,
    pub response_event: Option<EventId>,
    pub contest_reason: Option<String>,
    pub withdrawal_reason: Option<String>,
    pub documents: Vec<DocumentRef>,
    pub updated_at: Option<Timestamp>,
}

impl<C, R> Default for Track<C, R> {
    fn default() -> Self {
        Self::with_status(TrackStatus::Draft)
    }
}

impl<C, R> Track<C, R> {
    pub fn with_status(status: TrackStatus) -> Self {
        Self {
            status,
            revision: 0,
            claim: None,
            response: None,
            submissions: Vec::new(),
            response_event: None,
            contest_reason: None,
            withdrawal_reason: None,
            documents: Vec::new(),
            updated_at: None,
        }
    }

    /// The submission a response is expected to reference.
    pub fn latest_submission(&self) -> Option<EventId> {
        self.submissions.last().copied()
    }
}

impl<C: Claim, R: Response> Track<C, R> {
    fn info(&self) -> TrackInfo<'_> {
        TrackInfo {
            status: self.status,
            revision: self.revision,
            submissions: &self.submissions,
            claimed_value: self.claim.as_ref().and_then(Claim::claimed_value),
            response_result: self.response.as_ref().map(Response::result),
            approved_value: self.response.as_ref().and_then(Response::approved_value),
            subsidiary: self.response.as_ref().and_then(Response::subsidiary),
        }
    }
}

pub type BasisTrack = Track<BasisClaim, BasisResponse>;
pub type CompensationTrack = Track<CompensationClaim, CompensationResponse>;
pub type ScheduleTrack = Track<ScheduleClaim, ScheduleResponse>;

/// Type-erased view of a track, shared by derived values and rules.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo<'a> {
    pub status: TrackStatus,
    pub revision: u32,
    pub submissions: &'a [EventId],
    pub claimed_value: Option<u64>,
    pub response_result: Option<ResponseResult>,
    pub approved_value: Option<u64>,
    pub subsidiary: Option<SubsidiaryPosition<u64>>,
}

impl TrackInfo<'_> {
    pub fn latest_submission(&self) -> Option<EventId> {
        self.submissions.last().copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrderStatus {
    #[default]
    Draft,
    Issued,
    Disputed,
    Accepted,
    Revoked,
}

/// Lifecycle of a change-order case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeOrderState {
    pub status: ChangeOrderStatus,
    pub order: Option<ChangeOrder>,
    /// Number of times an order has been issued on this case.
    pub revision: u32,
    pub issued_event: Option<EventId>,
    pub dispute_reason: Option<String>,
    pub revoke_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    pub reason: String,
    pub closed_at: Timestamp,
    pub closed_by: String,
}

/// Overall case status, derived from the track statuses by fixed priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Draft,
    Submitted,
    UnderReview,
    Negotiating,
    Approved,
    Locked,
    Withdrawn,
    Closed,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Negotiating => "negotiating",
            Self::Approved => "approved",
            Self::Locked => "locked",
            Self::Withdrawn => "withdrawn",
            Self::Closed => "closed",
        }
    }
}

/// The aggregate view of one case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseState {
    /// Set by `CaseCreated`; every other field is meaningless while false.
    pub created: bool,
    pub case_id: CaseId,
    pub kind: CaseKind,
    pub title: String,
    pub claimant: String,
    pub owner: String,
    pub created_at: Timestamp,
    pub created_by: String,
    pub closed: Option<Closure>,
    pub basis: BasisTrack,
    pub compensation: CompensationTrack,
    pub schedule: ScheduleTrack,
    /// Latest forcing-cost claim; acceleration cases only.
    pub acceleration: Option<AccelerationClaim>,
    pub change_order: ChangeOrderState,
    pub related: Vec<RelatedCase>,
    /// Case-level attachments (not tied to a track).
    pub documents: Vec<DocumentRef>,
    /// Number of events folded into this state.
    pub version: u64,
    pub last_event_at: Option<Timestamp>,
}

impl CaseState {
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn track_status(&self, track: TrackKind) -> TrackStatus {
        match track {
            TrackKind::Basis => self.basis.status,
            TrackKind::Compensation => self.compensation.status,
            TrackKind::Schedule => self.schedule.status,
        }
    }

    /// Type-erased view of one track.
    ///
    /// On acceleration cases the compensation track's claimed value is the
    /// estimated forcing cost.
    pub fn track(&self, track: TrackKind) -> TrackInfo<'_> {
        match track {
            TrackKind::Basis => self.basis.info(),
            TrackKind::Compensation => {
                let mut info = self.compensation.info();
                if let Some(acceleration) = &self.acceleration {
                    info.claimed_value = acceleration.claimed_value();
                }
                info
            }
            TrackKind::Schedule => self.schedule.info(),
        }
    }

    /// Whether the track carries a contingent owner position: basis is
    /// rejected, yet the owner stated what it would grant on this track.
    pub fn has_subsidiary_position(&self, track: TrackKind) -> bool {
        self.subsidiary_position(track).is_some()
    }

    pub fn subsidiary_position(&self, track: TrackKind) -> Option<SubsidiaryPosition<u64>> {
        if track == TrackKind::Basis || self.basis.status != TrackStatus::Rejected {
            return None;
        }
        self.track(track).subsidiary
    }

    /// Derived overall status. First matching rule wins:
    /// closed, draft, withdrawn, negotiating, submitted, under review,
    /// locked, approved.
    pub fn overall_status(&self) -> OverallStatus {
        if self.is_closed() {
            return OverallStatus::Closed;
        }
        if self.kind == CaseKind::ChangeOrder {
            return match self.change_order.status {
                ChangeOrderStatus::Draft => OverallStatus::Draft,
                ChangeOrderStatus::Issued => OverallStatus::Submitted,
                ChangeOrderStatus::Disputed => OverallStatus::Negotiating,
                ChangeOrderStatus::Accepted => OverallStatus::Locked,
                ChangeOrderStatus::Revoked => OverallStatus::Withdrawn,
            };
        }

        let active: Vec<TrackStatus> = TrackKind::ALL
            .iter()
            .map(|t| self.track_status(*t))
            .filter(TrackStatus::is_active)
            .collect();
        if active.is_empty() {
            return OverallStatus::Draft;
        }
        if active.iter().all(|s| *s == TrackStatus::Withdrawn) {
            return OverallStatus::Withdrawn;
        }
        let open = active.iter().any(|s| {
            matches!(
                s,
                TrackStatus::Negotiating | TrackStatus::Rejected | TrackStatus::PartiallyApproved
            )
        });
        let subsidiary = TrackKind::ALL
            .iter()
            .any(|t| self.has_subsidiary_position(*t));
        if open || subsidiary {
            return OverallStatus::Negotiating;
        }
        if active.contains(&TrackStatus::Submitted) {
            return OverallStatus::Submitted;
        }
        if active.contains(&TrackStatus::UnderReview) {
            return OverallStatus::UnderReview;
        }
        if active
            .iter()
            .filter(|s| **s != TrackStatus::Withdrawn)
            .all(|s| *s == TrackStatus::Locked)
        {
            return OverallStatus::Locked;
        }
        OverallStatus::Approved
    }

    /// A standard case whose active tracks are all approved or locked may
    /// be consolidated into a change order.
    pub fn eligible_for_change_order(&self) -> bool {
        self.created
            && self.kind == CaseKind::Standard
            && matches!(
                self.overall_status(),
                OverallStatus::Approved | OverallStatus::Locked
            )
    }

    /// Schedule days the owner has refused on this case.
    ///
    /// A rejection counts every claimed day, a partial approval counts the
    /// difference. With `count_unanswered` set, a claim that is still
    /// awaiting a response counts as fully rejected.
    pub fn rejected_schedule_days(&self, count_unanswered: bool) -> u64 {
        let info = self.track(TrackKind::Schedule);
        let claimed = info.claimed_value.unwrap_or(0);
        match info.status {
            TrackStatus::Rejected => claimed,
            TrackStatus::PartiallyApproved => {
                claimed.saturating_sub(info.approved_value.unwrap_or(0))
            }
            TrackStatus::Negotiating => match info.response_result {
                Some(ResponseResult::Rejected) => claimed,
                Some(ResponseResult::PartiallyApproved) => {
                    claimed.saturating_sub(info.approved_value.unwrap_or(0))
                }
                Some(ResponseResult::Approved) | None => 0,
            },
            TrackStatus::Submitted | TrackStatus::UnderReview if count_unanswered => claimed,
            _ => 0,
        }
    }

    /// Snapshot of the derived values, suitable for rendering.
    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            case_id: self.case_id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            version: self.version,
            overall_status: self.overall_status(),
            eligible_for_change_order: self.eligible_for_change_order(),
            basis: self.track_summary(TrackKind::Basis),
            compensation: self.track_summary(TrackKind::Compensation),
            schedule: self.track_summary(TrackKind::Schedule),
            change_order: self.change_order.status,
            related: self.related.clone(),
        }
    }

    fn track_summary(&self, track: TrackKind) -> TrackSummary {
        let info = self.track(track);
        let subsidiary = self.subsidiary_position(track);
        TrackSummary {
            status: info.status,
            revision: info.revision,
            claimed: info.claimed_value,
            approved: info.approved_value,
            has_subsidiary_position: subsidiary.is_some(),
            subsidiary_approved: subsidiary.and_then(|s| s.approved),
        }
    }
}

/// Derived per-track view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub status: TrackStatus,
    pub revision: u32,
    pub claimed: Option<u64>,
    /// Principal approved value.
    pub approved: Option<u64>,
    pub has_subsidiary_position: bool,
    pub subsidiary_approved: Option<u64>,
}

/// Derived case view returned to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub case_id: CaseId,
    pub kind: CaseKind,
    pub title: String,
    pub version: u64,
    pub overall_status: OverallStatus,
    pub eligible_for_change_order: bool,
    pub basis: TrackSummary,
    pub compensation: TrackSummary,
    pub schedule: TrackSummary,
    pub change_order: ChangeOrderStatus,
    pub related: Vec<RelatedCase>,
}
