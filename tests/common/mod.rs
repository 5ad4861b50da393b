//! Builders shared by the integration tests. Public API only.
#![allow(dead_code)]

use koe_es::{
    AccelerationClaim, ActorRole, BasisCategory, BasisClaim, BasisResponse, CaseCreated,
    CaseError, CaseEvent, CaseId, CaseKind, CaseService, CompensationClaim, CompensationMethod,
    CompensationResponse, DocumentRef, DocumentsAttached, EventId, EventKind, RelatedCase,
    RelationKind, ResponseResult, ScheduleClaim, ScheduleResponse, Submitted, SubsidiaryPosition,
    Timestamp, TrackKind, TrackRef,
};

pub const CLAIMANT: &str = "Fjellbygg Entreprenør AS";
pub const OWNER: &str = "Statens vegvesen";

const START: Timestamp = 1_700_000_000_000;
const TICK: Timestamp = 60_000;

/// Events for one case on a steadily advancing clock.
pub struct Timeline {
    case_id: CaseId,
    clock: Timestamp,
}

impl Timeline {
    pub fn new(case_id: &str) -> Self {
        Self {
            case_id: CaseId::new(case_id),
            clock: START,
        }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn event(&mut self, role: ActorRole, kind: EventKind) -> CaseEvent {
        self.clock += TICK;
        let actor = match role {
            ActorRole::Claimant => CLAIMANT,
            ActorRole::Owner => OWNER,
        };
        CaseEvent::new(self.case_id.clone(), actor, role, kind).at(self.clock)
    }

    pub fn claimant(&mut self, kind: EventKind) -> CaseEvent {
        self.event(ActorRole::Claimant, kind)
    }

    pub fn owner(&mut self, kind: EventKind) -> CaseEvent {
        self.event(ActorRole::Owner, kind)
    }

    /// An owner response pointing back at `submission`.
    pub fn response(&mut self, kind: EventKind, submission: EventId) -> CaseEvent {
        self.owner(kind).referencing(submission)
    }
}

pub fn created(kind: CaseKind, related: &[(&str, RelationKind)]) -> EventKind {
    EventKind::CaseCreated(CaseCreated {
        title: "Endret fundamentering akse 4".into(),
        kind,
        claimant: CLAIMANT.into(),
        owner: OWNER.into(),
        related: related
            .iter()
            .map(|(id, relation)| RelatedCase {
                case_id: CaseId::new(*id),
                relation: *relation,
            })
            .collect(),
    })
}

pub fn basis_claim() -> EventKind {
    EventKind::BasisSubmitted(BasisClaim {
        category: BasisCategory::IrregularChange,
        description: "Pålagt endret fundamentering".into(),
        clause: None,
    })
}

pub fn basis_response(result: ResponseResult) -> EventKind {
    EventKind::BasisResponded(BasisResponse {
        result,
        reasoning: "Vurdert mot kontrakten".into(),
    })
}

pub fn compensation_claim(amount: u64) -> EventKind {
    EventKind::CompensationSubmitted(CompensationClaim {
        amount,
        method: CompensationMethod::LumpSum,
        description: "Merarbeid".into(),
    })
}

pub fn compensation_response(result: ResponseResult, approved_amount: Option<u64>) -> EventKind {
    EventKind::CompensationResponded(CompensationResponse {
        result,
        approved_amount,
        reasoning: "Kontrollert".into(),
        subsidiary: None,
    })
}

pub fn subsidiary_compensation_response(amount: u64) -> EventKind {
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

pub fn schedule_claim(days: u32) -> EventKind {
    EventKind::ScheduleSubmitted(ScheduleClaim {
        days,
        description: "Fristforlengelse".into(),
    })
}

pub fn schedule_response(result: ResponseResult, approved_days: Option<u32>) -> EventKind {
    EventKind::ScheduleResponded(ScheduleResponse {
        result,
        approved_days,
        reasoning: "Ikke på kritisk linje".into(),
        subsidiary: None,
    })
}

pub fn acceleration_claim(estimated_cost: u64, daily_penalty_rate: u64) -> EventKind {
    EventKind::AccelerationClaimed(AccelerationClaim {
        estimated_cost,
        daily_penalty_rate,
        description: "Forsering med ekstra skift".into(),
    })
}

pub fn accept(track: TrackKind) -> EventKind {
    EventKind::ResponseAccepted(TrackRef { track })
}

pub fn documents(name: &str, track: Option<TrackKind>) -> EventKind {
    EventKind::DocumentsAttached(DocumentsAttached {
        track,
        documents: vec![DocumentRef {
            name: name.into(),
            uri: format!("https://arkiv.example/{name}"),
            media_type: None,
        }],
    })
}

/// Submit `event` at the case's current version.
pub fn submit(service: &CaseService, event: CaseEvent) -> Result<Submitted, CaseError> {
    let case_id = event.case_id.clone();
    let (_, version) = service.read(&case_id)?;
    service.submit(&case_id, event, version)
}

pub fn submit_ok(service: &CaseService, event: CaseEvent) -> Submitted {
    submit(service, event).expect("event should be accepted")
}

/// A standard case with all three tracks approved.
pub fn approved_case(service: &CaseService, case_id: &str) -> Timeline {
    let mut timeline = Timeline::new(case_id);
    submit_ok(service, timeline.claimant(created(CaseKind::Standard, &[])));
    let basis = timeline.claimant(basis_claim());
    let compensation = timeline.claimant(compensation_claim(150_000));
    let schedule = timeline.claimant(schedule_claim(10));
    let responses = [
        (basis_response(ResponseResult::Approved), basis.event_id),
        (
            compensation_response(ResponseResult::Approved, Some(150_000)),
            compensation.event_id,
        ),
        (
            schedule_response(ResponseResult::Approved, Some(10)),
            schedule.event_id,
        ),
    ];
    for event in [basis, compensation, schedule] {
        submit_ok(service, event);
    }
    for (kind, submission) in responses {
        let response = timeline.response(kind, submission);
        submit_ok(service, response);
    }
    timeline
}

/// A standard case whose schedule claim of `days` was rejected.
pub fn rejected_schedule_case(service: &CaseService, case_id: &str, days: u32) -> Timeline {
    let mut timeline = Timeline::new(case_id);
    submit_ok(service, timeline.claimant(created(CaseKind::Standard, &[])));
    let basis = timeline.claimant(basis_claim());
    let basis_id = basis.event_id;
    submit_ok(service, basis);
    let schedule = timeline.claimant(schedule_claim(days));
    let schedule_id = schedule.event_id;
    submit_ok(service, schedule);
    let response = timeline.response(basis_response(ResponseResult::Approved), basis_id);
    submit_ok(service, response);
    let response = timeline.response(
        schedule_response(ResponseResult::Rejected, None),
        schedule_id,
    );
    submit_ok(service, response);
    timeline
}
