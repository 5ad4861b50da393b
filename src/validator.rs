//! Pre-commit gate: decides whether a candidate event may be appended.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::event::{CaseEvent, CaseId, EventType};
use crate::rules::{self, BuiltinRule, RelatedStates, Rule, RuleContext, RulePolicy};
use crate::state::CaseState;

/// Rules every event passes through first, in order.
static COMMON_RULES: &[BuiltinRule] = &[
    rules::CASE_ID_MISMATCH,
    rules::UNKNOWN_CASE,
    rules::CASE_EXISTS,
    rules::CASE_CLOSED,
    rules::TIMESTAMP_REGRESSION,
    rules::INVALID_PAYLOAD,
    rules::EVENT_NOT_ALLOWED_FOR_CASE_KIND,
    rules::WRONG_ACTOR_ROLE,
];

static CREATION_RULES: &[BuiltinRule] = &[
    rules::RELATIONS_NOT_ALLOWED,
    rules::MISSING_BASE_CASE,
    rules::DUPLICATE_RELATION,
    rules::SELF_REFERENCE,
    rules::RELATED_CASE_MISSING,
    rules::RELATED_CASE_KIND,
    rules::BASE_CASE_NOT_ELIGIBLE,
];

static RELATION_RULES: &[BuiltinRule] = &[
    rules::RELATIONS_NOT_ALLOWED,
    rules::CHANGE_ORDER_ALREADY_ISSUED,
    rules::DUPLICATE_RELATION,
    rules::SELF_REFERENCE,
    rules::RELATED_CASE_MISSING,
    rules::RELATED_CASE_KIND,
    rules::BASE_CASE_NOT_ELIGIBLE,
];

static TRACK_RULES: &[BuiltinRule] = &[
    rules::TRACK_NOT_APPLICABLE,
    rules::TRACK_LOCKED,
    rules::TRACK_WITHDRAWN,
    rules::INVALID_TRANSITION,
];

static BASIS_RESPONSE_RULES: &[BuiltinRule] = &[
    rules::TRACK_NOT_APPLICABLE,
    rules::TRACK_LOCKED,
    rules::TRACK_WITHDRAWN,
    rules::INVALID_TRANSITION,
    rules::MISSING_REFERENCE,
    rules::STALE_REFERENCE,
];

static QUANTIFIED_RESPONSE_RULES: &[BuiltinRule] = &[
    rules::TRACK_NOT_APPLICABLE,
    rules::TRACK_LOCKED,
    rules::TRACK_WITHDRAWN,
    rules::INVALID_TRANSITION,
    rules::MISSING_REFERENCE,
    rules::STALE_REFERENCE,
    rules::SUBSIDIARY_WITHOUT_BASIS_REJECTION,
    rules::INCONSISTENT_RESPONSE,
];

static ACCELERATION_RULES: &[BuiltinRule] = &[
    rules::TRACK_NOT_APPLICABLE,
    rules::TRACK_LOCKED,
    rules::TRACK_WITHDRAWN,
    rules::INVALID_TRANSITION,
    rules::MISSING_BASE_CASE,
    rules::RELATED_CASE_MISSING,
    rules::ACCELERATION_REQUIRES_REJECTED_SCHEDULE,
    rules::ACCELERATION_CEILING,
];

static ISSUE_RULES: &[BuiltinRule] = &[
    rules::CHANGE_ORDER_TRANSITION,
    rules::MISSING_BASE_CASE,
    rules::RELATED_CASE_MISSING,
    rules::RELATED_CASE_KIND,
    rules::BASE_CASE_NOT_ELIGIBLE,
];

static CHANGE_ORDER_RULES: &[BuiltinRule] = &[rules::CHANGE_ORDER_TRANSITION];

/// Built-in rules for one event type, after the common rules.
fn builtin_rules(event_type: EventType) -> &'static [BuiltinRule] {
    match event_type {
        EventType::CaseCreated => CREATION_RULES,
        EventType::RelatedCaseAdded => RELATION_RULES,
        EventType::CaseClosed => &[],
        EventType::DocumentsAttached
        | EventType::BasisSubmitted
        | EventType::CompensationSubmitted
        | EventType::ScheduleSubmitted
        | EventType::ReviewStarted
        | EventType::ResponseContested
        | EventType::ClaimWithdrawn
        | EventType::ResponseAccepted => TRACK_RULES,
        EventType::BasisResponded => BASIS_RESPONSE_RULES,
        EventType::CompensationResponded | EventType::ScheduleResponded => {
            QUANTIFIED_RESPONSE_RULES
        }
        EventType::AccelerationClaimed => ACCELERATION_RULES,
        EventType::ChangeOrderIssued => ISSUE_RULES,
        EventType::ChangeOrderAccepted
        | EventType::ChangeOrderDisputed
        | EventType::ChangeOrderRevoked => CHANGE_ORDER_RULES,
    }
}

/// Runs the ordered rule list for a candidate event and reports the first
/// failure.
///
/// Built-in rules come first (common rules, then the event type's own),
/// followed by any custom rules registered for that event type in
/// registration order. Rules named in [`RulePolicy::disabled_rules`] are
/// skipped.
#[derive(Clone, Default)]
pub struct Validator {
    policy: RulePolicy,
    custom: Vec<(EventType, Arc<dyn Rule>)>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("policy", &self.policy)
            .field(
                "custom",
                &self
                    .custom
                    .iter()
                    .map(|(t, r)| (t.as_str(), r.name().to_owned()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Validator {
    pub fn new(policy: RulePolicy) -> Self {
        Self {
            policy,
            custom: Vec::new(),
        }
    }

    /// Append a caller-supplied rule for one event type.
    pub fn with_rule(mut self, event_type: EventType, rule: impl Rule + 'static) -> Self {
        self.custom.push((event_type, Arc::new(rule)));
        self
    }

    pub(crate) fn push_rule(&mut self, event_type: EventType, rule: Arc<dyn Rule>) {
        self.custom.push((event_type, rule));
    }

    pub fn policy(&self) -> &RulePolicy {
        &self.policy
    }

    /// Cases whose projected state [`validate`](Self::validate) needs in
    /// `related` for this event.
    pub fn required_cases(&self, event: &CaseEvent, state: &CaseState) -> Vec<CaseId> {
        let mut ids: Vec<CaseId> = rules::candidate_relations(event, state)
            .into_iter()
            .map(|r| r.case_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Validate `event` for `case_id` against the state before it.
    ///
    /// # Arguments
    ///
    /// * `case_id` - The case the event is being submitted to.
    /// * `event` - The candidate event.
    /// * `state` - State projected from the log before the candidate.
    /// * `related` - Projected states of the cases named by
    ///   [`required_cases`](Self::required_cases). Missing entries are
    ///   reported by the `related_case_missing` rule.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first failing rule.
    pub fn validate(
        &self,
        case_id: &CaseId,
        event: &CaseEvent,
        state: &CaseState,
        related: &RelatedStates,
    ) -> Result<(), ValidationError> {
        let ctx = RuleContext {
            case_id,
            event,
            state,
            related,
            policy: &self.policy,
        };
        let event_type = event.event_type();
        let builtin = COMMON_RULES
            .iter()
            .chain(builtin_rules(event_type))
            .map(|r| r as &dyn Rule);
        let custom = self
            .custom
            .iter()
            .filter(|(t, _)| *t == event_type)
            .map(|(_, r)| r.as_ref());

        let mut evaluated = 0_usize;
        for rule in builtin.chain(custom) {
            if self.policy.is_disabled(rule.name()) {
                continue;
            }
            evaluated += 1;
            if let Err(reason) = rule.check(&ctx) {
                warn!(
                    case_id = %case_id,
                    event_type = %event_type,
                    rule = rule.name(),
                    %reason,
                    "event rejected"
                );
                return Err(ValidationError::new(rule.name(), reason));
            }
        }
        debug!(case_id = %case_id, event_type = %event_type, evaluated, "event accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ActorRole, EventKind, TrackKind};
    use crate::payload::{CaseKind, RelationKind, ResponseResult};
    use crate::rules::rule_fn;
    use crate::test_fixtures::{self, Script};

    fn validate_next(
        validator: &Validator,
        script: &mut Script,
        role: ActorRole,
        kind: EventKind,
    ) -> Result<(), ValidationError> {
        let event = script.next_event(role, kind);
        validator.validate(
            &script.case_id().clone(),
            &event,
            &script.state(),
            &RelatedStates::new(),
        )
    }

    fn rule_of(result: Result<(), ValidationError>) -> String {
        result.expect_err("event should be rejected").rule
    }

    #[test]
    fn creation_on_empty_log_passes() {
        let validator = Validator::default();
        let event = test_fixtures::Script::standard("KOE-1").events()[0].event.clone();
        validator
            .validate(
                &CaseId::new("KOE-1"),
                &event,
                &CaseState::default(),
                &RelatedStates::new(),
            )
            .expect("creation should pass");
    }

    #[test]
    fn non_creating_event_on_empty_log_is_unknown_case() {
        let validator = Validator::default();
        let event = test_fixtures::owner_event("KOE-1", test_fixtures::review(TrackKind::Basis));
        let err = validator
            .validate(
                &CaseId::new("KOE-1"),
                &event,
                &CaseState::default(),
                &RelatedStates::new(),
            )
            .expect_err("no case yet");
        assert_eq!(err.rule, "unknown_case");
    }

    #[test]
    fn second_creation_is_rejected() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        let created = EventKind::CaseCreated(test_fixtures::created(CaseKind::Standard, vec![]));
        assert_eq!(
            rule_of(validate_next(&validator, &mut script, ActorRole::Claimant, created)),
            "case_exists"
        );
    }

    #[test]
    fn mismatched_case_id_is_rejected_first() {
        let validator = Validator::default();
        let script = Script::standard("KOE-1");
        let event = test_fixtures::owner_event("KOE-2", test_fixtures::review(TrackKind::Basis));
        let err = validator
            .validate(
                script.case_id(),
                &event,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect_err("wrong case");
        assert_eq!(err.rule, "case_id_mismatch");
    }

    #[test]
    fn owner_cannot_submit_claims() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Owner,
                test_fixtures::basis_claim()
            )),
            "wrong_actor_role"
        );
    }

    #[test]
    fn response_to_draft_track_is_invalid_transition() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Owner,
                test_fixtures::basis_response(ResponseResult::Approved)
            )),
            "invalid_transition"
        );
    }

    #[test]
    fn locked_track_rejects_every_track_event() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        let submission = script.claimant(test_fixtures::basis_claim());
        script.owner_ref(
            test_fixtures::basis_response(ResponseResult::Approved),
            submission,
        );
        script.claimant(test_fixtures::accept(TrackKind::Basis));
        assert_eq!(
            script.state().basis.status,
            crate::state::TrackStatus::Locked
        );

        let attempts = [
            (ActorRole::Claimant, test_fixtures::basis_claim()),
            (ActorRole::Owner, test_fixtures::review(TrackKind::Basis)),
            (
                ActorRole::Owner,
                test_fixtures::basis_response(ResponseResult::Rejected),
            ),
            (ActorRole::Claimant, test_fixtures::contest(TrackKind::Basis)),
            (ActorRole::Claimant, test_fixtures::withdraw(TrackKind::Basis)),
            (ActorRole::Claimant, test_fixtures::accept(TrackKind::Basis)),
        ];
        for (role, kind) in attempts {
            assert_eq!(
                rule_of(validate_next(&validator, &mut script, role, kind)),
                "track_locked"
            );
        }
    }

    #[test]
    fn response_reference_must_name_a_submission() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        script.claimant(test_fixtures::basis_claim());

        let missing = script
            .next_event(
                ActorRole::Owner,
                test_fixtures::basis_response(ResponseResult::Approved),
            )
            .referencing(crate::event::EventId::new());
        let err = validator
            .validate(
                script.case_id(),
                &missing,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect_err("unknown reference");
        assert_eq!(err.rule, "missing_reference");

        let absent = script.next_event(
            ActorRole::Owner,
            test_fixtures::basis_response(ResponseResult::Approved),
        );
        let err = validator
            .validate(
                script.case_id(),
                &absent,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect_err("no reference");
        assert_eq!(err.rule, "missing_reference");
    }

    #[test]
    fn optional_reference_policy_accepts_bare_response() {
        let policy = RulePolicy {
            require_response_reference: false,
            ..RulePolicy::default()
        };
        let validator = Validator::new(policy);
        let mut script = Script::standard("KOE-1");
        script.claimant(test_fixtures::basis_claim());
        validate_next(
            &validator,
            &mut script,
            ActorRole::Owner,
            test_fixtures::basis_response(ResponseResult::Approved),
        )
        .expect("reference optional");
    }

    #[test]
    fn stale_reference_is_rejected() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        let first = script.claimant(test_fixtures::compensation_claim(100_000));
        script.owner_ref(
            test_fixtures::compensation_response(ResponseResult::Rejected, None),
            first,
        );
        script.claimant(test_fixtures::contest(TrackKind::Compensation));
        script.claimant(test_fixtures::compensation_claim(90_000));

        let stale = script
            .next_event(
                ActorRole::Owner,
                test_fixtures::compensation_response(ResponseResult::Approved, None),
            )
            .referencing(first);
        let err = validator
            .validate(
                script.case_id(),
                &stale,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect_err("superseded submission");
        assert_eq!(err.rule, "stale_reference");

        let lenient = Validator::new(RulePolicy::default().disable("stale_reference"));
        lenient
            .validate(
                script.case_id(),
                &stale,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect("stale references allowed when disabled");
    }

    #[test]
    fn partial_approval_must_be_below_claim() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        let submission = script.claimant(test_fixtures::compensation_claim(100_000));
        let event = script
            .next_event(
                ActorRole::Owner,
                test_fixtures::compensation_response(
                    ResponseResult::PartiallyApproved,
                    Some(100_000),
                ),
            )
            .referencing(submission);
        let err = validator
            .validate(
                script.case_id(),
                &event,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect_err("not partial");
        assert_eq!(err.rule, "inconsistent_response");
    }

    #[test]
    fn subsidiary_needs_rejected_basis() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        let submission = script.claimant(test_fixtures::compensation_claim(100_000));
        let event = script
            .next_event(
                ActorRole::Owner,
                test_fixtures::subsidiary_compensation_response(50_000),
            )
            .referencing(submission);
        let err = validator
            .validate(
                script.case_id(),
                &event,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect_err("basis not rejected");
        assert_eq!(err.rule, "subsidiary_without_basis_rejection");
    }

    #[test]
    fn earlier_timestamp_is_rejected() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        let event = script
            .next_event(ActorRole::Claimant, test_fixtures::basis_claim())
            .at(1);
        let err = validator
            .validate(
                script.case_id(),
                &event,
                &script.state(),
                &RelatedStates::new(),
            )
            .expect_err("time went backwards");
        assert_eq!(err.rule, "timestamp_regression");
    }

    #[test]
    fn closed_case_rejects_everything() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        script.claimant(test_fixtures::close("avklart"));
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Claimant,
                test_fixtures::basis_claim()
            )),
            "case_closed"
        );
    }

    #[test]
    fn acceleration_ceiling_boundary() {
        let validator = Validator::default();
        let base = test_fixtures::rejected_schedule_case("KOE-1", 15);
        let mut related = RelatedStates::new();
        related.insert(base.case_id().clone(), base.state());

        let mut script = Script::acceleration("KOE-2", "KOE-1");
        assert_eq!(
            validator.required_cases(
                &script.next_event(
                    ActorRole::Claimant,
                    test_fixtures::acceleration_claim(1, 1)
                ),
                &script.state()
            ),
            vec![CaseId::new("KOE-1")]
        );

        let at_ceiling = script.next_event(
            ActorRole::Claimant,
            test_fixtures::acceleration_claim(195_000, 10_000),
        );
        validator
            .validate(script.case_id(), &at_ceiling, &script.state(), &related)
            .expect("at the ceiling");

        let above = script.next_event(
            ActorRole::Claimant,
            test_fixtures::acceleration_claim(195_001, 10_000),
        );
        let err = validator
            .validate(script.case_id(), &above, &script.state(), &related)
            .expect_err("above the ceiling");
        assert_eq!(err.rule, "acceleration_ceiling");
    }

    #[test]
    fn acceleration_needs_a_rejected_schedule() {
        let validator = Validator::default();
        let base = test_fixtures::approved_case("KOE-1");
        let mut related = RelatedStates::new();
        related.insert(base.case_id().clone(), base.state());

        let mut script = Script::acceleration("KOE-2", "KOE-1");
        let event = script.next_event(
            ActorRole::Claimant,
            test_fixtures::acceleration_claim(1_000, 10_000),
        );
        let err = validator
            .validate(script.case_id(), &event, &script.state(), &related)
            .expect_err("nothing rejected");
        assert_eq!(err.rule, "acceleration_requires_rejected_schedule");
    }

    #[test]
    fn change_order_requires_eligible_bases() {
        let validator = Validator::default();
        let approved = test_fixtures::approved_case("KOE-1");
        let open = test_fixtures::negotiated_case("KOE-3");
        let mut related = RelatedStates::new();
        related.insert(approved.case_id().clone(), approved.state());
        related.insert(open.case_id().clone(), open.state());

        let created = Script::change_order("EO-1", &["KOE-1"]).events()[0]
            .event
            .clone();
        validator
            .validate(
                &CaseId::new("EO-1"),
                &created,
                &CaseState::default(),
                &related,
            )
            .expect("approved base is eligible");

        let created = Script::change_order("EO-2", &["KOE-1", "KOE-3"]).events()[0]
            .event
            .clone();
        let err = validator
            .validate(
                &CaseId::new("EO-2"),
                &created,
                &CaseState::default(),
                &related,
            )
            .expect_err("negotiated base is not eligible");
        assert_eq!(err.rule, "base_case_not_eligible");
    }

    #[test]
    fn standard_case_cannot_hold_relations() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        let kind = EventKind::RelatedCaseAdded(test_fixtures::related(
            "KOE-2",
            RelationKind::Accelerates,
        ));
        assert_eq!(
            rule_of(validate_next(&validator, &mut script, ActorRole::Claimant, kind)),
            "relations_not_allowed"
        );
    }

    #[test]
    fn missing_related_case_is_reported() {
        let validator = Validator::default();
        let created = Script::acceleration("KOE-2", "KOE-404").events()[0]
            .event
            .clone();
        let err = validator
            .validate(
                &CaseId::new("KOE-2"),
                &created,
                &CaseState::default(),
                &RelatedStates::new(),
            )
            .expect_err("base missing");
        assert_eq!(err.rule, "related_case_missing");
    }

    #[test]
    fn track_not_applicable_on_acceleration_case() {
        let validator = Validator::default();
        let mut script = Script::acceleration("KOE-2", "KOE-1");
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Claimant,
                test_fixtures::schedule_claim(3)
            )),
            "track_not_applicable"
        );
    }

    #[test]
    fn withdrawn_track_rejects_further_events() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        script.claimant(test_fixtures::basis_claim());
        script.claimant(test_fixtures::withdraw(TrackKind::Basis));
        assert_eq!(
            script.state().basis.status,
            crate::state::TrackStatus::Withdrawn
        );

        let attempts = [
            (ActorRole::Claimant, test_fixtures::basis_claim()),
            (ActorRole::Owner, test_fixtures::review(TrackKind::Basis)),
            (ActorRole::Claimant, test_fixtures::withdraw(TrackKind::Basis)),
        ];
        for (role, kind) in attempts {
            assert_eq!(
                rule_of(validate_next(&validator, &mut script, role, kind)),
                "track_withdrawn"
            );
        }
    }

    #[test]
    fn relation_to_an_already_related_case_is_rejected() {
        let validator = Validator::default();
        let base = test_fixtures::rejected_schedule_case("KOE-1", 15);
        let mut related = RelatedStates::new();
        related.insert(base.case_id().clone(), base.state());

        let mut script = Script::acceleration("KOE-2", "KOE-1");
        let event = script.next_event(
            ActorRole::Claimant,
            EventKind::RelatedCaseAdded(test_fixtures::related(
                "KOE-1",
                RelationKind::Accelerates,
            )),
        );
        let err = validator
            .validate(script.case_id(), &event, &script.state(), &related)
            .expect_err("already related");
        assert_eq!(err.rule, "duplicate_relation");
    }

    #[test]
    fn case_cannot_reference_itself() {
        let validator = Validator::default();
        let created = Script::acceleration("KOE-2", "KOE-2").events()[0]
            .event
            .clone();
        let err = validator
            .validate(
                &CaseId::new("KOE-2"),
                &created,
                &CaseState::default(),
                &RelatedStates::new(),
            )
            .expect_err("self reference");
        assert_eq!(err.rule, "self_reference");
    }

    #[test]
    fn zero_value_claim_is_invalid_payload() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Claimant,
                test_fixtures::compensation_claim(0)
            )),
            "invalid_payload"
        );
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Claimant,
                test_fixtures::schedule_claim(0)
            )),
            "invalid_payload"
        );
    }

    #[test]
    fn acceleration_claim_on_standard_case_is_rejected() {
        let validator = Validator::default();
        let mut script = Script::standard("KOE-1");
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Claimant,
                test_fixtures::acceleration_claim(100_000, 10_000)
            )),
            "event_not_allowed_for_case_kind"
        );
    }

    #[test]
    fn custom_rules_run_after_builtins() {
        let validator = Validator::default().with_rule(
            EventType::ScheduleSubmitted,
            rule_fn("max_extension", |ctx| match &ctx.event.kind {
                EventKind::ScheduleSubmitted(claim) if claim.days > 60 => {
                    Err("extensions above 60 days need a separate agreement".into())
                }
                _ => Ok(()),
            }),
        );
        let mut script = Script::standard("KOE-1");
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Claimant,
                test_fixtures::schedule_claim(90)
            )),
            "max_extension"
        );
        validate_next(
            &validator,
            &mut script,
            ActorRole::Claimant,
            test_fixtures::schedule_claim(30),
        )
        .expect("within limit");

        // Builtins still run first.
        assert_eq!(
            rule_of(validate_next(
                &validator,
                &mut script,
                ActorRole::Owner,
                test_fixtures::schedule_claim(90)
            )),
            "wrong_actor_role"
        );
    }
}
