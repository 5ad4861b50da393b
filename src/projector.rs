//! Replay: fold an ordered event log into a [`CaseState`].
//!
//! The fold is pure and total. It reads nothing but its inputs and applies
//! every recorded event unconditionally, since the log is authoritative and
//! the validator already gated each event before it was appended.

use crate::event::{CaseEvent, EventKind, StoredEvent, Timestamp, TrackKind};
use crate::payload::{CaseCreated, DocumentRef, ResponseResult};
use crate::state::{CaseState, ChangeOrderStatus, Closure, Track, TrackStatus};

/// Replay a full case log from the empty state.
///
/// Events are applied in `(timestamp, position)` order regardless of the
/// order of the input slice.
///
/// # Examples
///
/// ```
/// use koe_es::{compute_state, OverallStatus};
///
/// let state = compute_state(&[]);
/// assert!(!state.created);
/// assert_eq!(state.version, 0);
/// assert_eq!(state.overall_status(), OverallStatus::Draft);
/// ```
pub fn compute_state(events: &[StoredEvent]) -> CaseState {
    replay_onto(CaseState::default(), events)
}

/// Continue a replay from a previously computed state.
///
/// For a log whose timestamps never decrease (which the validator
/// guarantees), `replay_onto(compute_state(&log[..k]), &log[k..])` equals
/// `compute_state(&log)` for every split point `k`.
pub fn replay_onto(seed: CaseState, events: &[StoredEvent]) -> CaseState {
    let mut ordered: Vec<&StoredEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.ordering_key());
    ordered.into_iter().fold(seed, CaseState::apply)
}

impl CaseState {
    /// Apply one stored event, returning the next state.
    pub fn apply(mut self, stored: &StoredEvent) -> Self {
        let event = &stored.event;
        let at = event.timestamp;
        match &event.kind {
            EventKind::CaseCreated(created) => self.on_created(event, created),
            EventKind::RelatedCaseAdded(related) => self.related.push(related.clone()),
            EventKind::DocumentsAttached(attached) => match attached.track {
                Some(track) => self.lifecycle(track).attach(&attached.documents, at),
                None => self.documents.extend(attached.documents.iter().cloned()),
            },
            EventKind::CaseClosed(closed) => {
                self.closed = Some(Closure {
                    reason: closed.reason.clone(),
                    closed_at: at,
                    closed_by: event.actor_name.clone(),
                });
            }
            EventKind::BasisSubmitted(claim) => {
                self.basis.record_submission(Some(claim.clone()), event);
            }
            EventKind::BasisResponded(response) => {
                self.basis
                    .record_response(response.clone(), response.result, event);
            }
            EventKind::CompensationSubmitted(claim) => {
                self.compensation
                    .record_submission(Some(claim.clone()), event);
            }
            EventKind::AccelerationClaimed(claim) => {
                self.acceleration = Some(claim.clone());
                self.compensation.record_submission(None, event);
            }
            EventKind::CompensationResponded(response) => {
                self.compensation
                    .record_response(response.clone(), response.result, event);
            }
            EventKind::ScheduleSubmitted(claim) => {
                self.schedule.record_submission(Some(claim.clone()), event);
            }
            EventKind::ScheduleResponded(response) => {
                self.schedule
                    .record_response(response.clone(), response.result, event);
            }
            EventKind::ReviewStarted(target) => self.lifecycle(target.track).review(at),
            EventKind::ResponseContested(contest) => {
                self.lifecycle(contest.track).contest(&contest.reason, at);
            }
            EventKind::ClaimWithdrawn(withdrawal) => {
                self.lifecycle(withdrawal.track)
                    .withdraw(withdrawal.reason.as_deref(), at);
            }
            EventKind::ResponseAccepted(target) => self.lifecycle(target.track).accept(at),
            EventKind::ChangeOrderIssued(order) => {
                let co = &mut self.change_order;
                co.status = ChangeOrderStatus::Issued;
                co.order = Some(order.clone());
                co.revision += 1;
                co.issued_event = Some(event.event_id);
                co.dispute_reason = None;
            }
            EventKind::ChangeOrderAccepted => {
                self.change_order.status = ChangeOrderStatus::Accepted;
            }
            EventKind::ChangeOrderDisputed(dispute) => {
                self.change_order.status = ChangeOrderStatus::Disputed;
                self.change_order.dispute_reason = Some(dispute.reason.clone());
            }
            EventKind::ChangeOrderRevoked(dispute) => {
                self.change_order.status = ChangeOrderStatus::Revoked;
                self.change_order.revoke_reason = Some(dispute.reason.clone());
            }
        }
        self.version += 1;
        self.last_event_at = Some(at);
        self
    }

    fn on_created(&mut self, event: &CaseEvent, created: &CaseCreated) {
        self.created = true;
        self.case_id = event.case_id.clone();
        self.kind = created.kind;
        self.title = created.title.clone();
        self.claimant = created.claimant.clone();
        self.owner = created.owner.clone();
        self.created_at = event.timestamp;
        self.created_by = event.actor_name.clone();
        self.related = created.related.clone();
        for track in TrackKind::ALL {
            if !created.kind.uses_track(track) {
                self.lifecycle(track).set_status(TrackStatus::NotApplicable);
            }
        }
    }

    fn lifecycle(&mut self, track: TrackKind) -> &mut dyn Lifecycle {
        match track {
            TrackKind::Basis => &mut self.basis,
            TrackKind::Compensation => &mut self.compensation,
            TrackKind::Schedule => &mut self.schedule,
        }
    }
}

/// Transitions that do not depend on a track's claim or response types.
trait Lifecycle {
    fn set_status(&mut self, status: TrackStatus);
    fn review(&mut self, at: Timestamp);
    fn contest(&mut self, reason: &str, at: Timestamp);
    fn withdraw(&mut self, reason: Option<&str>, at: Timestamp);
    fn accept(&mut self, at: Timestamp);
    fn attach(&mut self, documents: &[DocumentRef], at: Timestamp);
}

impl<C, R> Lifecycle for Track<C, R> {
    fn set_status(&mut self, status: TrackStatus) {
        self.status = status;
    }

    fn review(&mut self, at: Timestamp) {
        self.status = TrackStatus::UnderReview;
        self.updated_at = Some(at);
    }

    fn contest(&mut self, reason: &str, at: Timestamp) {
        self.status = TrackStatus::Negotiating;
        self.contest_reason = Some(reason.to_owned());
        self.updated_at = Some(at);
    }

    fn withdraw(&mut self, reason: Option<&str>, at: Timestamp) {
        self.status = TrackStatus::Withdrawn;
        self.withdrawal_reason = reason.map(str::to_owned);
        self.updated_at = Some(at);
    }

    fn accept(&mut self, at: Timestamp) {
        self.status = TrackStatus::Locked;
        self.updated_at = Some(at);
    }

    fn attach(&mut self, documents: &[DocumentRef], at: Timestamp) {
        self.documents.extend(documents.iter().cloned());
        self.updated_at = Some(at);
    }
}

impl<C, R> Track<C, R> {
    /// A (re)submission opens a new revision and clears the last response.
    fn record_submission(&mut self, claim: Option<C>, event: &CaseEvent) {
        self.status = TrackStatus::Submitted;
        self.revision += 1;
        if claim.is_some() {
            self.claim = claim;
        }
        self.response = None;
        self.response_event = None;
        self.contest_reason = None;
        self.submissions.push(event.event_id);
        self.updated_at = Some(event.timestamp);
    }

    fn record_response(&mut self, response: R, result: ResponseResult, event: &CaseEvent) {
        self.status = TrackStatus::from_result(result);
        self.response = Some(response);
        self.response_event = Some(event.event_id);
        self.updated_at = Some(event.timestamp);
    }
}
