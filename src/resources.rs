//! ERP resources: IOUs (expense advances), proofs of expense, settlements and
//! approvals.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::UserId;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct IouId(pub String);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct ApprovalId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IouStatus {
    Pending,
    Approved,
    Rejected,
    Disbursed,
    Settled,
    #[serde(other)]
    Unknown,
}

/// An expense advance requested by an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Iou {
    pub id: IouId,
    pub purpose: String,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: IouStatus,
    #[serde(default)]
    pub requested_by: Option<UserId>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Body of an IOU request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIou {
    pub purpose: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    Submitted,
    Accepted,
    Rejected,
    #[serde(other)]
    Unknown,
}

/// A receipt or other evidence of spending against an IOU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ProofOfExpense {
    pub id: String,
    pub iou_id: IouId,
    pub amount: f64,
    pub description: String,
    #[serde(default)]
    pub receipt_url: Option<String>,
    pub status: ProofStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProof {
    pub iou_id: IouId,
    pub amount: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Open,
    Closed,
    #[serde(other)]
    Unknown,
}

/// Reconciliation of an IOU's advance against its accepted proofs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Settlement {
    pub id: String,
    pub iou_id: IouId,
    pub advance_amount: f64,
    pub total_expenses: f64,
    pub balance: f64,
    pub status: SettlementStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    Iou,
    Proof,
    Settlement,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Unknown,
}

/// An item waiting on (or decided by) an approver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Approval {
    pub id: ApprovalId,
    pub kind: ApprovalKind,
    pub reference_id: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub requested_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject { reason: Option<String> },
}

impl ApprovalDecision {
    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
        }
    }

    pub(crate) fn reason(&self) -> Option<&str> {
        match self {
            Self::Approve => None,
            Self::Reject { reason } => reason.as_deref(),
        }
    }
}

/// Outcome of settling an advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    Balanced,
    /// Unspent advance the employee returns.
    RefundDue(f64),
    /// Spending above the advance the company pays back.
    ReimbursementDue(f64),
}

/// Compare an advance with the proofs submitted against it.
///
/// Rejected proofs are ignored. Amounts are summed in cents.
#[must_use]
pub fn reconcile(advance: f64, proofs: &[ProofOfExpense]) -> Reconciliation {
    let spent: i64 = proofs
        .iter()
        .filter(|p| p.status != ProofStatus::Rejected)
        .map(|p| to_cents(p.amount))
        .sum();
    let diff = to_cents(advance) - spent;
    match diff {
        0 => Reconciliation::Balanced,
        d if d > 0 => Reconciliation::RefundDue(from_cents(d)),
        d => Reconciliation::ReimbursementDue(from_cents(-d)),
    }
}

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}
