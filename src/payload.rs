//! Payload records carried by [`EventKind`](crate::EventKind) variants.
//!
//! Pure data plus shape checks. A shape check only looks at the payload
//! itself; anything that depends on the current case state belongs to the
//! validator's rules.

use serde::{Deserialize, Serialize};

use crate::event::{CaseId, TrackKind};

/// Money in whole NOK, excluding VAT.
pub type Amount = u64;

// --- Case-level payloads ---

/// What kind of case this is. Fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    /// A regular claim with all three tracks.
    #[default]
    Standard,
    /// A claim for forcing costs after a rejected time extension
    /// (NS 8407 §33.8). Uses the compensation track only.
    Acceleration,
    /// A formal contract amendment consolidating resolved base cases.
    /// Has no tracks; its lifecycle is the change-order status.
    ChangeOrder,
}

impl CaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Acceleration => "acceleration",
            Self::ChangeOrder => "change_order",
        }
    }

    /// Whether cases of this kind carry the given track.
    pub fn uses_track(&self, track: TrackKind) -> bool {
        match self {
            Self::Standard => true,
            Self::Acceleration => track == TrackKind::Compensation,
            Self::ChangeOrder => false,
        }
    }

    /// Satellite kinds reference base cases; standard cases never do.
    pub fn is_satellite(&self) -> bool {
        !matches!(self, Self::Standard)
    }

    /// The only relation a satellite of this kind may hold.
    pub fn relation(&self) -> Option<RelationKind> {
        match self {
            Self::Standard => None,
            Self::Acceleration => Some(RelationKind::Accelerates),
            Self::ChangeOrder => Some(RelationKind::Consolidates),
        }
    }
}

/// How a satellite case relates to a base case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Acceleration case claiming forcing costs for a base case.
    Accelerates,
    /// Change order including a resolved base case.
    Consolidates,
}

/// One-directional reference from a satellite case to a base case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCase {
    pub case_id: CaseId,
    pub relation: RelationKind,
}

impl RelatedCase {
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.case_id.as_str().trim().is_empty() {
            return Err("related case id must not be empty".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseCreated {
    pub title: String,
    pub kind: CaseKind,
    /// Contractor party name.
    pub claimant: String,
    /// Owner party name.
    pub owner: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedCase>,
}

impl CaseCreated {
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("case title must not be empty".into());
        }
        if self.claimant.trim().is_empty() || self.owner.trim().is_empty() {
            return Err("both parties must be named".into());
        }
        self.related.iter().try_for_each(RelatedCase::check)
    }
}

/// Reference to a document held by an external document system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub name: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentsAttached {
    /// `None` attaches to the case as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackKind>,
    pub documents: Vec<DocumentRef>,
}

impl DocumentsAttached {
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.documents.is_empty() {
            return Err("at least one document must be attached".into());
        }
        if self
            .documents
            .iter()
            .any(|d| d.name.trim().is_empty() || d.uri.trim().is_empty())
        {
            return Err("every document needs a name and a uri".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseClosed {
    pub reason: String,
}

impl CaseClosed {
    pub(crate) fn check(&self) -> Result<(), String> {
        non_empty(&self.reason, "closing reason")
    }
}

// --- Claims (claimant side) ---

/// Legal ground invoked by a basis claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasisCategory {
    /// Ordered change (endringsordre).
    OrderedChange,
    /// Instruction the claimant treats as a change (irregulær endring).
    IrregularChange,
    /// Owner-side delay or default (forsinkelse eller svikt ved byggherren).
    OwnerDefault,
    /// Events outside either party's control (force majeure).
    ForceMajeure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisClaim {
    pub category: BasisCategory,
    pub description: String,
    /// Contract clause relied on, e.g. "NS 8407 pkt. 32.2".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
}

impl BasisClaim {
    pub(crate) fn check(&self) -> Result<(), String> {
        non_empty(&self.description, "basis description")
    }
}

/// Settlement method for a compensation claim (NS 8407 §34).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationMethod {
    UnitPrices,
    LumpSum,
    /// Cost-plus (regningsarbeid).
    Account,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationClaim {
    pub amount: Amount,
    pub method: CompensationMethod,
    pub description: String,
}

impl CompensationClaim {
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.amount == 0 {
            return Err("claimed amount must be positive".into());
        }
        non_empty(&self.description, "compensation description")
    }
}

/// Forcing-cost claim on an acceleration case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerationClaim {
    pub estimated_cost: Amount,
    /// Liquidated damages per day the claimant would otherwise incur.
    pub daily_penalty_rate: Amount,
    pub description: String,
}

impl AccelerationClaim {
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.estimated_cost == 0 {
            return Err("estimated acceleration cost must be positive".into());
        }
        if self.daily_penalty_rate == 0 {
            return Err("daily penalty rate must be positive".into());
        }
        non_empty(&self.description, "acceleration description")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleClaim {
    /// Requested extension in calendar days.
    pub days: u32,
    pub description: String,
}

impl ScheduleClaim {
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.days == 0 {
            return Err("requested extension must be at least one day".into());
        }
        non_empty(&self.description, "schedule description")
    }
}

// --- Responses (owner side) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Approved,
    PartiallyApproved,
    Rejected,
}

/// What the owner would grant if its basis rejection is later overturned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsidiaryPosition<V> {
    pub result: ResponseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<V>,
}

impl<V: Copy + Into<u64>> SubsidiaryPosition<V> {
    pub(crate) fn widen(&self) -> SubsidiaryPosition<u64> {
        SubsidiaryPosition {
            result: self.result,
            approved: self.approved.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisResponse {
    pub result: ResponseResult,
    #[serde(default)]
    pub reasoning: String,
}

impl BasisResponse {
    pub(crate) fn check(&self) -> Result<(), String> {
        reasoned(self.result, &self.reasoning)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationResponse {
    pub result: ResponseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<Amount>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsidiary: Option<SubsidiaryPosition<Amount>>,
}

impl CompensationResponse {
    pub(crate) fn check(&self) -> Result<(), String> {
        reasoned(self.result, &self.reasoning)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub result: ResponseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_days: Option<u32>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsidiary: Option<SubsidiaryPosition<u32>>,
}

impl ScheduleResponse {
    pub(crate) fn check(&self) -> Result<(), String> {
        reasoned(self.result, &self.reasoning)
    }
}

/// Uniform read access to a track's claim, used by derived views and rules.
pub trait Claim {
    /// The claimed quantity (NOK or days), if the claim is quantified.
    fn claimed_value(&self) -> Option<u64> {
        None
    }
}

impl Claim for BasisClaim {}

impl Claim for CompensationClaim {
    fn claimed_value(&self) -> Option<u64> {
        Some(self.amount)
    }
}

impl Claim for AccelerationClaim {
    fn claimed_value(&self) -> Option<u64> {
        Some(self.estimated_cost)
    }
}

impl Claim for ScheduleClaim {
    fn claimed_value(&self) -> Option<u64> {
        Some(u64::from(self.days))
    }
}

/// Uniform read access to a track's response.
pub trait Response {
    fn result(&self) -> ResponseResult;

    fn approved_value(&self) -> Option<u64> {
        None
    }

    fn subsidiary(&self) -> Option<SubsidiaryPosition<u64>> {
        None
    }
}

impl Response for BasisResponse {
    fn result(&self) -> ResponseResult {
        self.result
    }
}

impl Response for CompensationResponse {
    fn result(&self) -> ResponseResult {
        self.result
    }

    fn approved_value(&self) -> Option<u64> {
        self.approved_amount
    }

    fn subsidiary(&self) -> Option<SubsidiaryPosition<u64>> {
        self.subsidiary.as_ref().map(SubsidiaryPosition::widen)
    }
}

impl Response for ScheduleResponse {
    fn result(&self) -> ResponseResult {
        self.result
    }

    fn approved_value(&self) -> Option<u64> {
        self.approved_days.map(u64::from)
    }

    fn subsidiary(&self) -> Option<SubsidiaryPosition<u64>> {
        self.subsidiary.as_ref().map(SubsidiaryPosition::widen)
    }
}

// --- Track lifecycle payloads ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub track: TrackKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub track: TrackKind,
    pub reason: String,
}

impl Contest {
    pub(crate) fn check(&self) -> Result<(), String> {
        non_empty(&self.reason, "contest reason")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub track: TrackKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Withdrawal {
    pub(crate) fn check(&self) -> Result<(), String> {
        match &self.reason {
            Some(reason) => non_empty(reason, "withdrawal reason"),
            None => Ok(()),
        }
    }
}

// --- Change order ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOrder {
    /// Contract amendment number, e.g. "EO-012".
    pub number: String,
    pub description: String,
    pub compensation_amount: Amount,
    pub schedule_days: u32,
}

impl ChangeOrder {
    pub(crate) fn check(&self) -> Result<(), String> {
        non_empty(&self.number, "change order number")?;
        non_empty(&self.description, "change order description")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub reason: String,
}

impl Dispute {
    pub(crate) fn check(&self) -> Result<(), String> {
        non_empty(&self.reason, "reason")
    }
}

fn non_empty(value: &str, what: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{what} must not be empty"))
    } else {
        Ok(())
    }
}

/// Anything short of full approval must say why.
fn reasoned(result: ResponseResult, reasoning: &str) -> Result<(), String> {
    if result != ResponseResult::Approved && reasoning.trim().is_empty() {
        return Err("a rejection or partial approval must state its reasoning".into());
    }
    Ok(())
}
