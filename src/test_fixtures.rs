//! Shared builders for unit tests.

use crate::event::{
    ActorRole, CaseEvent, CaseId, EventId, EventKind, StoredEvent, Timestamp, TrackKind,
};
use crate::payload::{
    AccelerationClaim, BasisCategory, BasisClaim, BasisResponse, CaseClosed, CaseCreated,
    CaseKind, ChangeOrder, CompensationClaim, CompensationMethod, CompensationResponse, Contest,
    DocumentRef, DocumentsAttached, RelatedCase, RelationKind, ResponseResult, ScheduleClaim,
    ScheduleResponse, SubsidiaryPosition, TrackRef, Withdrawal,
};
use crate::projector::compute_state;
use crate::state::CaseState;

pub(crate) const CLAIMANT: &str = "Fjellbygg Entreprenør AS";
pub(crate) const OWNER: &str = "Statens vegvesen";

const START: Timestamp = 1_700_000_000_000;
const TICK: Timestamp = 60_000;

/// A case log under construction, with a clock that advances one minute
/// per event.
pub(crate) struct Script {
    case_id: CaseId,
    clock: Timestamp,
    events: Vec<StoredEvent>,
}

impl Script {
    pub(crate) fn new(case_id: &str, created: CaseCreated) -> Self {
        let role = match created.kind {
            CaseKind::ChangeOrder => ActorRole::Owner,
            CaseKind::Standard | CaseKind::Acceleration => ActorRole::Claimant,
        };
        let mut script = Self {
            case_id: CaseId::new(case_id),
            clock: START,
            events: Vec::new(),
        };
        let event = script.next_event(role, EventKind::CaseCreated(created));
        script.push(event);
        script
    }

    pub(crate) fn standard(case_id: &str) -> Self {
        Self::new(case_id, created(CaseKind::Standard, Vec::new()))
    }

    pub(crate) fn acceleration(case_id: &str, base: &str) -> Self {
        Self::new(
            case_id,
            created(
                CaseKind::Acceleration,
                vec![related(base, RelationKind::Accelerates)],
            ),
        )
    }

    pub(crate) fn change_order(case_id: &str, bases: &[&str]) -> Self {
        Self::new(
            case_id,
            created(
                CaseKind::ChangeOrder,
                bases
                    .iter()
                    .map(|b| related(b, RelationKind::Consolidates))
                    .collect(),
            ),
        )
    }

    pub(crate) fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    /// Build the next event on the clock without appending it.
    pub(crate) fn next_event(&mut self, role: ActorRole, kind: EventKind) -> CaseEvent {
        self.clock += TICK;
        let name = match role {
            ActorRole::Claimant => CLAIMANT,
            ActorRole::Owner => OWNER,
        };
        CaseEvent::new(self.case_id.clone(), name, role, kind).at(self.clock)
    }

    pub(crate) fn push(&mut self, event: CaseEvent) -> EventId {
        let id = event.event_id;
        self.events.push(StoredEvent {
            position: self.events.len() as u64 + 1,
            event,
        });
        id
    }

    pub(crate) fn claimant(&mut self, kind: EventKind) -> EventId {
        let event = self.next_event(ActorRole::Claimant, kind);
        self.push(event)
    }

    pub(crate) fn owner(&mut self, kind: EventKind) -> EventId {
        let event = self.next_event(ActorRole::Owner, kind);
        self.push(event)
    }

    pub(crate) fn owner_ref(&mut self, kind: EventKind, reference: EventId) -> EventId {
        let event = self.next_event(ActorRole::Owner, kind).referencing(reference);
        self.push(event)
    }

    pub(crate) fn events(&self) -> &[StoredEvent] {
        &self.events
    }

    pub(crate) fn state(&self) -> CaseState {
        compute_state(&self.events)
    }
}

pub(crate) fn owner_event(case_id: &str, kind: EventKind) -> CaseEvent {
    CaseEvent::new(case_id, OWNER, ActorRole::Owner, kind).at(START)
}

pub(crate) fn created(kind: CaseKind, related: Vec<RelatedCase>) -> CaseCreated {
    CaseCreated {
        title: "Endret fundamentering akse C".into(),
        kind,
        claimant: CLAIMANT.into(),
        owner: OWNER.into(),
        related,
    }
}

pub(crate) fn related(case_id: &str, relation: RelationKind) -> RelatedCase {
    RelatedCase {
        case_id: CaseId::new(case_id),
        relation,
    }
}

pub(crate) fn basis_claim() -> EventKind {
    EventKind::BasisSubmitted(BasisClaim {
        category: BasisCategory::IrregularChange,
        description: "Pålagt endret fundamentering".into(),
        clause: Some("NS 8407 pkt. 32.1".into()),
    })
}

pub(crate) fn basis_response(result: ResponseResult) -> EventKind {
    EventKind::BasisResponded(BasisResponse {
        result,
        reasoning: "Vurdert mot kontraktens beskrivelse".into(),
    })
}

pub(crate) fn compensation_claim(amount: u64) -> EventKind {
    EventKind::CompensationSubmitted(CompensationClaim {
        amount,
        method: CompensationMethod::UnitPrices,
        description: "Merarbeid etter enhetspriser".into(),
    })
}

pub(crate) fn compensation_response(result: ResponseResult, approved: Option<u64>) -> EventKind {
    EventKind::CompensationResponded(CompensationResponse {
        result,
        approved_amount: approved,
        reasoning: "Mengder kontrollert".into(),
        subsidiary: None,
    })
}

/// Principal rejection with a contingent approval of `amount`.
pub(crate) fn subsidiary_compensation_response(amount: u64) -> EventKind {
    EventKind::CompensationResponded(CompensationResponse {
        result: ResponseResult::Rejected,
        approved_amount: None,
        reasoning: "Grunnlaget er avvist".into(),
        subsidiary: Some(SubsidiaryPosition {
            result: ResponseResult::PartiallyApproved,
            approved: Some(amount),
        }),
    })
}

pub(crate) fn schedule_claim(days: u32) -> EventKind {
    EventKind::ScheduleSubmitted(ScheduleClaim {
        days,
        description: "Fristforlengelse for endret fundamentering".into(),
    })
}

pub(crate) fn schedule_response(result: ResponseResult, approved_days: Option<u32>) -> EventKind {
    EventKind::ScheduleResponded(ScheduleResponse {
        result,
        approved_days,
        reasoning: "Ikke på kritisk linje".into(),
        subsidiary: None,
    })
}

pub(crate) fn acceleration_claim(estimated_cost: u64, daily_penalty_rate: u64) -> EventKind {
    EventKind::AccelerationClaimed(AccelerationClaim {
        estimated_cost,
        daily_penalty_rate,
        description: "Forsering med ekstra skift".into(),
    })
}

pub(crate) fn review(track: TrackKind) -> EventKind {
    EventKind::ReviewStarted(TrackRef { track })
}

pub(crate) fn contest(track: TrackKind) -> EventKind {
    EventKind::ResponseContested(Contest {
        track,
        reason: "Uenig i vurderingen".into(),
    })
}

pub(crate) fn accept(track: TrackKind) -> EventKind {
    EventKind::ResponseAccepted(TrackRef { track })
}

pub(crate) fn withdraw(track: TrackKind) -> EventKind {
    EventKind::ClaimWithdrawn(Withdrawal {
        track,
        reason: None,
    })
}

pub(crate) fn close(reason: &str) -> EventKind {
    EventKind::CaseClosed(CaseClosed {
        reason: reason.into(),
    })
}

/// One case-level document.
pub(crate) fn documents(name: &str) -> EventKind {
    EventKind::DocumentsAttached(DocumentsAttached {
        track: None,
        documents: vec![DocumentRef {
            name: name.into(),
            uri: format!("https://arkiv.example/{name}"),
            media_type: Some("application/pdf".into()),
        }],
    })
}

pub(crate) fn issue_change_order(number: &str) -> EventKind {
    EventKind::ChangeOrderIssued(ChangeOrder {
        number: number.into(),
        description: "Endret fundamentering".into(),
        compensation_amount: 150_000,
        schedule_days: 10,
    })
}

/// A standard case with rejected basis, contested and resubmitted
/// compensation, and a reviewed schedule claim.
pub(crate) fn negotiated_case(case_id: &str) -> Script {
    let mut script = Script::standard(case_id);
    let basis = script.claimant(basis_claim());
    let compensation = script.claimant(compensation_claim(300_000));
    let schedule = script.claimant(schedule_claim(20));
    script.owner(review(TrackKind::Basis));
    script.owner_ref(basis_response(ResponseResult::Rejected), basis);
    script.owner_ref(
        compensation_response(ResponseResult::Rejected, None),
        compensation,
    );
    script.claimant(contest(TrackKind::Compensation));
    script.claimant(compensation_claim(240_000));
    script.owner(review(TrackKind::Schedule));
    script.owner_ref(schedule_response(ResponseResult::PartiallyApproved, Some(5)), schedule);
    script
}

/// A standard case whose three tracks are all approved.
pub(crate) fn approved_case(case_id: &str) -> Script {
    let mut script = Script::standard(case_id);
    let basis = script.claimant(basis_claim());
    let compensation = script.claimant(compensation_claim(150_000));
    let schedule = script.claimant(schedule_claim(10));
    script.owner_ref(basis_response(ResponseResult::Approved), basis);
    script.owner_ref(
        compensation_response(ResponseResult::Approved, Some(150_000)),
        compensation,
    );
    script.owner_ref(schedule_response(ResponseResult::Approved, Some(10)), schedule);
    script
}

/// A standard case whose schedule claim of `days` was rejected outright.
pub(crate) fn rejected_schedule_case(case_id: &str, days: u32) -> Script {
    let mut script = Script::standard(case_id);
    let basis = script.claimant(basis_claim());
    let schedule = script.claimant(schedule_claim(days));
    script.owner_ref(basis_response(ResponseResult::Approved), basis);
    script.owner_ref(schedule_response(ResponseResult::Rejected, None), schedule);
    script
}
