//! Borrower funding requests

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LendingError, LendingResult};
use crate::risk::RiskLevel;
use crate::schedule::RepaymentType;
use crate::store::{Collection, Record};

/// Request lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Matched,
    Rejected,
    Expired,
    Withdrawn,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Matched => "matched",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Expired => "expired",
            RequestStatus::Withdrawn => "withdrawn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Medium
    }
}

/// A borrower's funding request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingRequest {
    pub id: String,

    pub borrower_id: String,

    pub requested_amount: Decimal,

    /// Highest annual percentage the borrower accepts
    pub max_interest_rate: Decimal,

    /// Days
    pub preferred_duration: u32,

    /// Days
    pub max_duration: u32,

    pub accepted_repayment_types: Vec<RepaymentType>,

    #[serde(default)]
    pub purpose: String,

    pub status: RequestStatus,

    #[serde(default)]
    pub urgency: Urgency,

    /// Risk level judged at intake; never updated afterwards
    pub intake_risk_level: RiskLevel,

    pub created_at: DateTime<Utc>,
}

impl Record for LendingRequest {
    const COLLECTION: Collection = Collection::Requests;

    fn id(&self) -> &str {
        &self.id
    }
}

impl LendingRequest {
    /// Build a pending request from validated input
    pub fn from_new(input: NewRequest, intake_risk_level: RiskLevel, now: DateTime<Utc>) -> LendingResult<Self> {
        input.validate()?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            borrower_id: input.borrower_id,
            requested_amount: input.requested_amount,
            max_interest_rate: input.max_interest_rate,
            preferred_duration: input.preferred_duration,
            max_duration: input.max_duration,
            accepted_repayment_types: input.accepted_repayment_types,
            purpose: input.purpose,
            status: RequestStatus::Pending,
            urgency: input.urgency,
            intake_risk_level,
            created_at: now,
        })
    }

    pub fn accepts(&self, repayment_type: RepaymentType) -> bool {
        self.accepted_repayment_types.contains(&repayment_type)
    }
}

/// Caller input for a new request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub borrower_id: String,
    pub requested_amount: Decimal,
    pub max_interest_rate: Decimal,
    pub preferred_duration: u32,
    pub max_duration: u32,
    pub accepted_repayment_types: Vec<RepaymentType>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub urgency: Urgency,
}

impl NewRequest {
    pub fn validate(&self) -> LendingResult<()> {
        if self.borrower_id.trim().is_empty() {
            return Err(LendingError::invalid("borrower_id", "must not be empty"));
        }
        if self.requested_amount <= Decimal::ZERO {
            return Err(LendingError::invalid("requested_amount", "must be positive"));
        }
        if self.max_interest_rate.is_sign_negative() {
            return Err(LendingError::invalid("max_interest_rate", "must not be negative"));
        }
        if self.preferred_duration == 0 || self.preferred_duration > self.max_duration {
            return Err(LendingError::invalid(
                "preferred_duration",
                format!("{} days must be within 1..={}", self.preferred_duration, self.max_duration),
            ));
        }
        if self.accepted_repayment_types.is_empty() {
            return Err(LendingError::invalid("accepted_repayment_types", "must name at least one type"));
        }
        Ok(())
    }
}

/// Request listing filter; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub borrower_id: Option<String>,
    pub urgency: Option<Urgency>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl RequestFilter {
    /// Pending requests only
    pub fn pending() -> Self {
        Self {
            status: Some(RequestStatus::Pending),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &LendingRequest) -> bool {
        self.status.map_or(true, |s| request.status == s)
            && self.borrower_id.as_ref().map_or(true, |b| &request.borrower_id == b)
            && self.urgency.map_or(true, |u| request.urgency == u)
            && self.min_amount.map_or(true, |m| request.requested_amount >= m)
            && self.max_amount.map_or(true, |m| request.requested_amount <= m)
    }
}
