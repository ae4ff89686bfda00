//! Request-related types
//!
//! Balance top-up requests, withdraw requests and feedback share one
//! lifecycle: created by a user flow, resolved exactly once by an admin.
//! Resolution is the only mutation path.

use super::error::MarketError;
use super::item::ContentRef;
use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Balance/withdraw request identifier
pub type RequestId = u64;

/// Feedback identifier
pub type FeedbackId = u64;

/// Which way a request moves money once approved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Credit the user (balance request)
    TopUp,
    /// Debit the user (withdraw request)
    Withdraw,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::TopUp => "topup",
            RequestKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by requests and feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => f.write_str("pending"),
            RequestStatus::Approved => f.write_str("approved"),
            RequestStatus::Rejected => f.write_str("rejected"),
        }
    }
}

/// Admin decision on a pending entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl From<Decision> for RequestStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            other => Err(MarketError::validation(
                "decision",
                &format!("unknown decision '{}'", other),
            )),
        }
    }
}

/// Supporting evidence attached to a request
#[derive(Debug, Clone, PartialEq)]
pub enum Proof {
    /// Free text: a transfer reference, or payout details for withdrawals
    Text(String),
    /// A screenshot or document
    Content(ContentRef),
}

/// A user-initiated, admin-resolved balance adjustment proposal
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub user: UserId,
    pub amount: Decimal,
    pub proof: Option<Proof>,
    pub status: RequestStatus,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,

    /// Whether the approved amount has actually been applied to the balance
    ///
    /// A request can be approved but not yet applied if the balance mutation
    /// failed after the resolution was recorded.
    pub balance_applied: bool,
}

impl BalanceRequest {
    pub fn new(
        id: RequestId,
        kind: RequestKind,
        user: UserId,
        amount: Decimal,
        proof: Option<Proof>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            user,
            amount,
            proof,
            status: RequestStatus::Pending,
            resolved_by: None,
            resolved_at: None,
            created_at,
            balance_applied: false,
        }
    }

    /// Approved requests whose balance change never landed
    pub fn is_unapplied(&self) -> bool {
        self.status == RequestStatus::Approved && !self.balance_applied
    }
}

/// User feedback awaiting admin review
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub id: FeedbackId,
    pub user: UserId,
    pub message: String,
    pub status: RequestStatus,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
