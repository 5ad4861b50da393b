//! Business rules: the predicates the validator runs before an append.
//!
//! A rule looks at one candidate event, the state projected from the log
//! before it, and (for cross-case rules) the projected states of related
//! cases. It either passes or returns a reason. Rules never mutate
//! anything.
//!
//! Judgement calls that the contract leaves open (how silence is treated,
//! the acceleration cost multiplier, how strict back-references must be)
//! live in [`RulePolicy`] rather than being hard-coded.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::event::{ActorRole, CaseEvent, CaseId, EventKind, EventType, TrackKind};
use crate::payload::{CaseKind, RelatedCase, Response, ResponseResult};
use crate::state::{CaseState, ChangeOrderStatus, TrackStatus};

/// Projected states of the cases a candidate event refers to.
pub type RelatedStates = BTreeMap<CaseId, CaseState>;

/// Result of a single rule: `Err` carries the user-facing reason.
pub type RuleOutcome = Result<(), String>;

/// Default acceleration ceiling: rejected days × daily penalty × 130 %.
pub const DEFAULT_ACCELERATION_CEILING_PERCENT: u32 = 130;

/// Tunable business policy.
///
/// Every field has a default, so a policy document only needs to name the
/// knobs it changes.
///
/// # Examples
///
/// ```
/// use koe_es::RulePolicy;
///
/// let policy = RulePolicy::from_json_str(r#"{"acceleration_ceiling_percent": 100}"#).unwrap();
/// assert_eq!(policy.acceleration_ceiling_percent, 100);
/// assert!(policy.require_response_reference);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePolicy {
    /// Multiplier, in percent, applied to rejected days × daily penalty.
    pub acceleration_ceiling_percent: u32,
    /// Whether a schedule claim still awaiting a response counts as
    /// rejected when computing the acceleration ceiling.
    pub count_unanswered_schedule_as_rejected: bool,
    /// Whether owner responses must carry `reference_to_event_id`.
    pub require_response_reference: bool,
    /// Whether a response may only reference the latest submission of its
    /// track.
    pub reject_stale_references: bool,
    /// Rule names to skip entirely.
    pub disabled_rules: BTreeSet<String>,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            acceleration_ceiling_percent: DEFAULT_ACCELERATION_CEILING_PERCENT,
            count_unanswered_schedule_as_rejected: false,
            require_response_reference: true,
            reject_stale_references: true,
            disabled_rules: BTreeSet::new(),
        }
    }
}

impl RulePolicy {
    /// Parse a policy from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] if the document is not a valid policy.
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a policy from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Io`] if the file cannot be read and
    /// [`PolicyError::Parse`] if its contents are not a valid policy.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Skip the named rule.
    pub fn disable(mut self, rule: impl Into<String>) -> Self {
        self.disabled_rules.insert(rule.into());
        self
    }

    pub fn is_disabled(&self, rule: &str) -> bool {
        self.disabled_rules.contains(rule)
    }
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// The case the event is being submitted to.
    pub case_id: &'a CaseId,
    pub event: &'a CaseEvent,
    /// State projected from the log before the candidate event.
    pub state: &'a CaseState,
    pub related: &'a RelatedStates,
    pub policy: &'a RulePolicy,
}

impl RuleContext<'_> {
    /// Kind of the case: from the payload when creating, else from state.
    pub fn case_kind(&self) -> CaseKind {
        match &self.event.kind {
            EventKind::CaseCreated(created) => created.kind,
            _ => self.state.kind,
        }
    }

    fn target_status(&self) -> Option<(TrackKind, TrackStatus)> {
        self.event
            .kind
            .target_track()
            .map(|track| (track, self.state.track_status(track)))
    }
}

/// A named predicate over a candidate event.
pub trait Rule: Send + Sync {
    /// Stable name reported as `ValidationError::rule`.
    fn name(&self) -> &str;

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome;
}

/// A rule backed by a plain function.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinRule {
    name: &'static str,
    check: fn(&RuleContext<'_>) -> RuleOutcome,
}

impl BuiltinRule {
    pub const fn new(name: &'static str, check: fn(&RuleContext<'_>) -> RuleOutcome) -> Self {
        Self { name, check }
    }
}

impl Rule for BuiltinRule {
    fn name(&self) -> &str {
        self.name
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        (self.check)(ctx)
    }
}

/// A rule backed by a closure, for caller-supplied policy.
pub struct FnRule<F> {
    name: String,
    check: F,
}

/// Wrap a closure as a [`Rule`].
pub fn rule_fn<F>(name: impl Into<String>, check: F) -> FnRule<F>
where
    F: Fn(&RuleContext<'_>) -> RuleOutcome + Send + Sync,
{
    FnRule {
        name: name.into(),
        check,
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&RuleContext<'_>) -> RuleOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        (self.check)(ctx)
    }
}

/// Maximum acceleration cost for the given rejected days and penalty rate.
///
/// Integer arithmetic, rounded down, saturating at `u64::MAX`.
pub fn acceleration_ceiling(rejected_days: u64, daily_penalty_rate: u64, percent: u32) -> u64 {
    let ceiling =
        u128::from(rejected_days) * u128::from(daily_penalty_rate) * u128::from(percent) / 100;
    u64::try_from(ceiling).unwrap_or(u64::MAX)
}

/// Relations the candidate event asks the validator to check.
pub(crate) fn candidate_relations<'a>(
    event: &'a CaseEvent,
    state: &'a CaseState,
) -> Vec<&'a RelatedCase> {
    match &event.kind {
        EventKind::CaseCreated(created) => created.related.iter().collect(),
        EventKind::RelatedCaseAdded(related) => vec![related],
        EventKind::AccelerationClaimed(_) | EventKind::ChangeOrderIssued(_) => {
            state.related.iter().collect()
        }
        _ => Vec::new(),
    }
}

// --- Common rules ---

pub(crate) const CASE_ID_MISMATCH: BuiltinRule =
    BuiltinRule::new("case_id_mismatch", case_id_mismatch);
pub(crate) const UNKNOWN_CASE: BuiltinRule = BuiltinRule::new("unknown_case", unknown_case);
pub(crate) const CASE_EXISTS: BuiltinRule = BuiltinRule::new("case_exists", case_exists);
pub(crate) const CASE_CLOSED: BuiltinRule = BuiltinRule::new("case_closed", case_closed);
pub(crate) const TIMESTAMP_REGRESSION: BuiltinRule =
    BuiltinRule::new("timestamp_regression", timestamp_regression);
pub(crate) const INVALID_PAYLOAD: BuiltinRule =
    BuiltinRule::new("invalid_payload", invalid_payload);
pub(crate) const EVENT_NOT_ALLOWED_FOR_CASE_KIND: BuiltinRule =
    BuiltinRule::new("event_not_allowed_for_case_kind", event_not_allowed_for_case_kind);
pub(crate) const WRONG_ACTOR_ROLE: BuiltinRule =
    BuiltinRule::new("wrong_actor_role", wrong_actor_role);

fn case_id_mismatch(ctx: &RuleContext<'_>) -> RuleOutcome {
    if ctx.event.case_id != *ctx.case_id {
        return Err(format!(
            "event names case {} but was submitted to case {}",
            ctx.event.case_id, ctx.case_id
        ));
    }
    Ok(())
}

fn unknown_case(ctx: &RuleContext<'_>) -> RuleOutcome {
    if !ctx.state.created && ctx.event.event_type() != EventType::CaseCreated {
        return Err(format!("case {} does not exist", ctx.case_id));
    }
    Ok(())
}

fn case_exists(ctx: &RuleContext<'_>) -> RuleOutcome {
    if ctx.state.created && ctx.event.event_type() == EventType::CaseCreated {
        return Err(format!("case {} already exists", ctx.case_id));
    }
    Ok(())
}

fn case_closed(ctx: &RuleContext<'_>) -> RuleOutcome {
    match &ctx.state.closed {
        Some(closure) => Err(format!("case is closed: {}", closure.reason)),
        None => Ok(()),
    }
}

fn timestamp_regression(ctx: &RuleContext<'_>) -> RuleOutcome {
    match ctx.state.last_event_at {
        Some(last) if ctx.event.timestamp < last => Err(format!(
            "event timestamp {} is earlier than the last recorded event ({last})",
            ctx.event.timestamp
        )),
        _ => Ok(()),
    }
}

fn invalid_payload(ctx: &RuleContext<'_>) -> RuleOutcome {
    ctx.event.kind.check_shape()
}

fn event_not_allowed_for_case_kind(ctx: &RuleContext<'_>) -> RuleOutcome {
    let kind = ctx.case_kind();
    let allowed = match ctx.event.event_type() {
        EventType::AccelerationClaimed => kind == CaseKind::Acceleration,
        EventType::CompensationSubmitted => kind != CaseKind::Acceleration,
        EventType::ChangeOrderIssued
        | EventType::ChangeOrderAccepted
        | EventType::ChangeOrderDisputed
        | EventType::ChangeOrderRevoked => kind == CaseKind::ChangeOrder,
        _ => true,
    };
    if !allowed {
        return Err(format!(
            "{} is not allowed on a {} case",
            ctx.event.event_type(),
            kind.as_str()
        ));
    }
    Ok(())
}

fn wrong_actor_role(ctx: &RuleContext<'_>) -> RuleOutcome {
    let required = match &ctx.event.kind {
        EventKind::CaseCreated(created) => Some(match created.kind {
            CaseKind::ChangeOrder => ActorRole::Owner,
            CaseKind::Standard | CaseKind::Acceleration => ActorRole::Claimant,
        }),
        other => other.event_type().required_role(),
    };
    match required {
        Some(role) if role != ctx.event.actor_role => Err(format!(
            "{} must be recorded by the {role}, not the {}",
            ctx.event.event_type(),
            ctx.event.actor_role
        )),
        _ => Ok(()),
    }
}

// --- Track targeting ---

pub(crate) const TRACK_NOT_APPLICABLE: BuiltinRule =
    BuiltinRule::new("track_not_applicable", track_not_applicable);
pub(crate) const TRACK_LOCKED: BuiltinRule = BuiltinRule::new("track_locked", track_locked);
pub(crate) const TRACK_WITHDRAWN: BuiltinRule =
    BuiltinRule::new("track_withdrawn", track_withdrawn);
pub(crate) const INVALID_TRANSITION: BuiltinRule =
    BuiltinRule::new("invalid_transition", invalid_transition);

fn track_not_applicable(ctx: &RuleContext<'_>) -> RuleOutcome {
    match ctx.target_status() {
        Some((track, _)) if !ctx.state.kind.uses_track(track) => Err(format!(
            "a {} case has no {track} track",
            ctx.state.kind.as_str()
        )),
        _ => Ok(()),
    }
}

fn track_locked(ctx: &RuleContext<'_>) -> RuleOutcome {
    match ctx.target_status() {
        Some((track, TrackStatus::Locked)) => Err(format!("the {track} track is locked")),
        _ => Ok(()),
    }
}

fn track_withdrawn(ctx: &RuleContext<'_>) -> RuleOutcome {
    match ctx.target_status() {
        Some((track, TrackStatus::Withdrawn)) => {
            Err(format!("the {track} claim has been withdrawn"))
        }
        _ => Ok(()),
    }
}

/// Statuses a track event may be applied from.
fn allowed_from(event_type: EventType) -> Option<&'static [TrackStatus]> {
    use TrackStatus::*;
    match event_type {
        EventType::BasisSubmitted
        | EventType::CompensationSubmitted
        | EventType::AccelerationClaimed
        | EventType::ScheduleSubmitted => Some(&[Draft, Negotiating]),
        EventType::ReviewStarted => Some(&[Submitted]),
        EventType::BasisResponded
        | EventType::CompensationResponded
        | EventType::ScheduleResponded => Some(&[Submitted, UnderReview]),
        EventType::ResponseContested => Some(&[PartiallyApproved, Rejected]),
        EventType::ClaimWithdrawn => Some(&[
            Submitted,
            UnderReview,
            PartiallyApproved,
            Rejected,
            Negotiating,
        ]),
        EventType::ResponseAccepted => Some(&[Approved]),
        EventType::CaseCreated
        | EventType::RelatedCaseAdded
        | EventType::DocumentsAttached
        | EventType::CaseClosed
        | EventType::ChangeOrderIssued
        | EventType::ChangeOrderAccepted
        | EventType::ChangeOrderDisputed
        | EventType::ChangeOrderRevoked => None,
    }
}

fn invalid_transition(ctx: &RuleContext<'_>) -> RuleOutcome {
    let Some((track, status)) = ctx.target_status() else {
        return Ok(());
    };
    match allowed_from(ctx.event.event_type()) {
        Some(from) if !from.contains(&status) => Err(format!(
            "{} is not allowed while the {track} track is {}",
            ctx.event.event_type(),
            status.as_str()
        )),
        _ => Ok(()),
    }
}

// --- Sequencing ---

pub(crate) const MISSING_REFERENCE: BuiltinRule =
    BuiltinRule::new("missing_reference", missing_reference);
pub(crate) const STALE_REFERENCE: BuiltinRule =
    BuiltinRule::new("stale_reference", stale_reference);

fn missing_reference(ctx: &RuleContext<'_>) -> RuleOutcome {
    let Some((track, _)) = ctx.target_status() else {
        return Ok(());
    };
    match ctx.event.reference_to_event_id {
        None if ctx.policy.require_response_reference => Err(format!(
            "a {track} response must reference the submission it answers"
        )),
        None => Ok(()),
        Some(reference) => {
            if ctx.state.track(track).submissions.contains(&reference) {
                Ok(())
            } else {
                Err(format!(
                    "referenced event {reference} is not a {track} submission on this case"
                ))
            }
        }
    }
}

fn stale_reference(ctx: &RuleContext<'_>) -> RuleOutcome {
    if !ctx.policy.reject_stale_references {
        return Ok(());
    }
    let (Some((track, _)), Some(reference)) =
        (ctx.target_status(), ctx.event.reference_to_event_id)
    else {
        return Ok(());
    };
    let latest = ctx.state.track(track).latest_submission();
    if latest != Some(reference) {
        return Err(format!(
            "referenced submission {reference} has been superseded by a later revision"
        ));
    }
    Ok(())
}

// --- Numeric ---

pub(crate) const INCONSISTENT_RESPONSE: BuiltinRule =
    BuiltinRule::new("inconsistent_response", inconsistent_response);
pub(crate) const SUBSIDIARY_WITHOUT_BASIS_REJECTION: BuiltinRule = BuiltinRule::new(
    "subsidiary_without_basis_rejection",
    subsidiary_without_basis_rejection,
);
pub(crate) const ACCELERATION_REQUIRES_REJECTED_SCHEDULE: BuiltinRule = BuiltinRule::new(
    "acceleration_requires_rejected_schedule",
    acceleration_requires_rejected_schedule,
);
pub(crate) const ACCELERATION_CEILING: BuiltinRule =
    BuiltinRule::new("acceleration_ceiling", acceleration_ceiling_rule);

fn quantified_response<'a>(event: &'a CaseEvent) -> Option<&'a dyn Response> {
    match &event.kind {
        EventKind::CompensationResponded(r) => Some(r),
        EventKind::ScheduleResponded(r) => Some(r),
        _ => None,
    }
}

fn check_value(
    what: &str,
    result: ResponseResult,
    approved: Option<u64>,
    claimed: Option<u64>,
) -> RuleOutcome {
    match (result, approved) {
        (ResponseResult::Approved, Some(a)) if claimed.is_some_and(|c| a != c) => Err(format!(
            "{what} approval of {a} differs from the claimed {}",
            claimed.unwrap_or_default()
        )),
        (ResponseResult::PartiallyApproved, None) => {
            Err(format!("a partial {what} approval must state the approved value"))
        }
        (ResponseResult::PartiallyApproved, Some(0)) => {
            Err(format!("a partial {what} approval must be above zero"))
        }
        (ResponseResult::PartiallyApproved, Some(a)) if claimed.is_some_and(|c| a >= c) => {
            Err(format!(
                "a partial {what} approval of {a} must be below the claimed {}",
                claimed.unwrap_or_default()
            ))
        }
        (ResponseResult::Rejected, Some(a)) if a > 0 => {
            Err(format!("a {what} rejection cannot approve {a}"))
        }
        _ => Ok(()),
    }
}

fn inconsistent_response(ctx: &RuleContext<'_>) -> RuleOutcome {
    let (Some(response), Some((track, _))) = (quantified_response(ctx.event), ctx.target_status())
    else {
        return Ok(());
    };
    let claimed = ctx.state.track(track).claimed_value;
    check_value(
        "principal",
        response.result(),
        response.approved_value(),
        claimed,
    )?;
    if let Some(subsidiary) = response.subsidiary() {
        check_value("subsidiary", subsidiary.result, subsidiary.approved, claimed)?;
    }
    Ok(())
}

fn subsidiary_without_basis_rejection(ctx: &RuleContext<'_>) -> RuleOutcome {
    let Some(response) = quantified_response(ctx.event) else {
        return Ok(());
    };
    if response.subsidiary().is_some() && ctx.state.basis.status != TrackStatus::Rejected {
        return Err(
            "a subsidiary position may only be given while the basis claim is rejected".into(),
        );
    }
    Ok(())
}

/// Rejected schedule days summed over every accelerated base case.
fn accelerated_days(ctx: &RuleContext<'_>) -> u64 {
    let count_unanswered = ctx.policy.count_unanswered_schedule_as_rejected;
    ctx.state
        .related
        .iter()
        .filter(|r| r.relation == crate::payload::RelationKind::Accelerates)
        .filter_map(|r| ctx.related.get(&r.case_id))
        .map(|base| base.rejected_schedule_days(count_unanswered))
        .sum()
}

fn acceleration_requires_rejected_schedule(ctx: &RuleContext<'_>) -> RuleOutcome {
    if !matches!(ctx.event.kind, EventKind::AccelerationClaimed(_)) {
        return Ok(());
    }
    if accelerated_days(ctx) == 0 {
        return Err(
            "acceleration may only be claimed after a time-extension claim on the base case \
             has been rejected"
                .into(),
        );
    }
    Ok(())
}

fn acceleration_ceiling_rule(ctx: &RuleContext<'_>) -> RuleOutcome {
    let EventKind::AccelerationClaimed(claim) = &ctx.event.kind else {
        return Ok(());
    };
    let days = accelerated_days(ctx);
    let ceiling = acceleration_ceiling(
        days,
        claim.daily_penalty_rate,
        ctx.policy.acceleration_ceiling_percent,
    );
    if claim.estimated_cost > ceiling {
        return Err(format!(
            "estimated cost {} exceeds the ceiling of {ceiling} \
             ({days} rejected days × {} per day × {} %)",
            claim.estimated_cost, claim.daily_penalty_rate, ctx.policy.acceleration_ceiling_percent
        ));
    }
    Ok(())
}

// --- Cross-case ---

pub(crate) const RELATIONS_NOT_ALLOWED: BuiltinRule =
    BuiltinRule::new("relations_not_allowed", relations_not_allowed);
pub(crate) const MISSING_BASE_CASE: BuiltinRule =
    BuiltinRule::new("missing_base_case", missing_base_case);
pub(crate) const DUPLICATE_RELATION: BuiltinRule =
    BuiltinRule::new("duplicate_relation", duplicate_relation);
pub(crate) const SELF_REFERENCE: BuiltinRule = BuiltinRule::new("self_reference", self_reference);
pub(crate) const RELATED_CASE_MISSING: BuiltinRule =
    BuiltinRule::new("related_case_missing", related_case_missing);
pub(crate) const RELATED_CASE_KIND: BuiltinRule =
    BuiltinRule::new("related_case_kind", related_case_kind);
pub(crate) const BASE_CASE_NOT_ELIGIBLE: BuiltinRule =
    BuiltinRule::new("base_case_not_eligible", base_case_not_eligible);
pub(crate) const CHANGE_ORDER_ALREADY_ISSUED: BuiltinRule =
    BuiltinRule::new("change_order_already_issued", change_order_already_issued);
pub(crate) const CHANGE_ORDER_TRANSITION: BuiltinRule =
    BuiltinRule::new("invalid_transition", change_order_transition);

fn relations_not_allowed(ctx: &RuleContext<'_>) -> RuleOutcome {
    if ctx.case_kind() == CaseKind::Standard
        && !candidate_relations(ctx.event, ctx.state).is_empty()
    {
        return Err("a standard case cannot reference other cases".into());
    }
    Ok(())
}

fn missing_base_case(ctx: &RuleContext<'_>) -> RuleOutcome {
    if ctx.case_kind().is_satellite() && candidate_relations(ctx.event, ctx.state).is_empty() {
        return Err(format!(
            "a {} case must reference at least one base case",
            ctx.case_kind().as_str()
        ));
    }
    Ok(())
}

fn duplicate_relation(ctx: &RuleContext<'_>) -> RuleOutcome {
    let mut seen: BTreeSet<&CaseId> = match &ctx.event.kind {
        EventKind::RelatedCaseAdded(_) => ctx.state.related.iter().map(|r| &r.case_id).collect(),
        _ => BTreeSet::new(),
    };
    for relation in candidate_relations(ctx.event, ctx.state) {
        if !seen.insert(&relation.case_id) {
            return Err(format!("case {} is already referenced", relation.case_id));
        }
    }
    Ok(())
}

fn self_reference(ctx: &RuleContext<'_>) -> RuleOutcome {
    if candidate_relations(ctx.event, ctx.state)
        .iter()
        .any(|r| r.case_id == *ctx.case_id)
    {
        return Err("a case cannot reference itself".into());
    }
    Ok(())
}

fn related_case_missing(ctx: &RuleContext<'_>) -> RuleOutcome {
    for relation in candidate_relations(ctx.event, ctx.state) {
        if !ctx.related.get(&relation.case_id).is_some_and(|s| s.created) {
            return Err(format!("referenced case {} does not exist", relation.case_id));
        }
    }
    Ok(())
}

fn related_case_kind(ctx: &RuleContext<'_>) -> RuleOutcome {
    let expected = ctx.case_kind().relation();
    for relation in candidate_relations(ctx.event, ctx.state) {
        if Some(relation.relation) != expected {
            return Err(format!(
                "a {} case cannot hold a {:?} relation",
                ctx.case_kind().as_str(),
                relation.relation
            ));
        }
        if let Some(base) = ctx.related.get(&relation.case_id)
            && base.kind != CaseKind::Standard
        {
            return Err(format!(
                "referenced case {} is a {} case, not a standard case",
                relation.case_id,
                base.kind.as_str()
            ));
        }
    }
    Ok(())
}

fn base_case_not_eligible(ctx: &RuleContext<'_>) -> RuleOutcome {
    if ctx.case_kind() != CaseKind::ChangeOrder {
        return Ok(());
    }
    for relation in candidate_relations(ctx.event, ctx.state) {
        let Some(base) = ctx.related.get(&relation.case_id) else {
            continue;
        };
        if !base.eligible_for_change_order() {
            return Err(format!(
                "base case {} is {} and not yet eligible for a change order",
                relation.case_id,
                base.overall_status().as_str()
            ));
        }
    }
    Ok(())
}

fn change_order_already_issued(ctx: &RuleContext<'_>) -> RuleOutcome {
    if ctx.state.kind == CaseKind::ChangeOrder
        && ctx.state.change_order.status != ChangeOrderStatus::Draft
    {
        return Err("related cases are frozen once a change order has been issued".into());
    }
    Ok(())
}

fn change_order_transition(ctx: &RuleContext<'_>) -> RuleOutcome {
    use ChangeOrderStatus::*;
    let status = ctx.state.change_order.status;
    let allowed: &[ChangeOrderStatus] = match ctx.event.event_type() {
        EventType::ChangeOrderIssued => &[Draft, Disputed],
        EventType::ChangeOrderAccepted | EventType::ChangeOrderDisputed => &[Issued],
        EventType::ChangeOrderRevoked => &[Issued, Disputed],
        _ => return Ok(()),
    };
    if !allowed.contains(&status) {
        return Err(format!(
            "{} is not allowed while the change order is {status:?}",
            ctx.event.event_type()
        ));
    }
    Ok(())
}
