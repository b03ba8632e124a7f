//! Loan contract record and its payment history

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schedule::{PaymentSchedule, RepaymentType};
use crate::store::{Collection, Record};

/// Legal status of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalStatus {
    Draft,
    Signed,
    Active,
    Completed,
    Defaulted,
    Disputed,
    Cancelled,
}

impl LegalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalStatus::Draft => "draft",
            LegalStatus::Signed => "signed",
            LegalStatus::Active => "active",
            LegalStatus::Completed => "completed",
            LegalStatus::Defaulted => "defaulted",
            LegalStatus::Disputed => "disputed",
            LegalStatus::Cancelled => "cancelled",
        }
    }

    /// Contract accepts payments in this status
    pub fn accepts_payments(&self) -> bool {
        matches!(self, LegalStatus::Signed | LegalStatus::Active)
    }
}

impl fmt::Display for LegalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Party signing a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Lender,
    Borrower,
}

/// Signed/unsigned flags per party
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigitalSignatures {
    pub lender: bool,
    pub borrower: bool,
    #[serde(default)]
    pub lender_signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub borrower_signed_at: Option<DateTime<Utc>>,
}

impl DigitalSignatures {
    /// Record a party's signature; signing twice keeps the first timestamp
    pub fn sign(&mut self, party: Party, at: DateTime<Utc>) {
        match party {
            Party::Lender if !self.lender => {
                self.lender = true;
                self.lender_signed_at = Some(at);
            }
            Party::Borrower if !self.borrower => {
                self.borrower = true;
                self.borrower_signed_at = Some(at);
            }
            _ => {}
        }
    }

    pub fn is_complete(&self) -> bool {
        self.lender && self.borrower
    }

    /// When the second signature landed
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match (self.lender_signed_at, self.borrower_signed_at) {
            (Some(l), Some(b)) if self.is_complete() => Some(l.max(b)),
            _ => None,
        }
    }
}

/// Schedule entry a payment was applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAllocation {
    /// Settled the installment
    Scheduled(u32),
    /// Counted towards the installment without settling it
    Partial(u32),
    /// No unsettled installment left to apply it to
    Unscheduled,
}

impl PaymentAllocation {
    pub fn installment(&self) -> Option<u32> {
        match self {
            PaymentAllocation::Scheduled(n) | PaymentAllocation::Partial(n) => Some(*n),
            PaymentAllocation::Unscheduled => None,
        }
    }
}

/// Share of a payment applied to one installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedAmount {
    pub allocation: PaymentAllocation,
    pub amount: Decimal,
}

/// A recorded payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayment {
    pub id: String,
    pub paid_at: DateTime<Utc>,
    /// principal + interest
    pub amount: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    /// First installment the payment landed on
    pub allocation: PaymentAllocation,
    /// Every installment the payment covered, in the order applied
    #[serde(default)]
    pub splits: Vec<AllocatedAmount>,
    pub recorded_at: DateTime<Utc>,
}

impl LoanPayment {
    /// Amount of this payment applied to an installment
    pub fn applied_to(&self, installment_number: u32) -> Decimal {
        if self.splits.is_empty() {
            return match self.allocation.installment() {
                Some(n) if n == installment_number => self.amount,
                _ => Decimal::ZERO,
            };
        }
        self.splits
            .iter()
            .filter(|s| s.allocation.installment() == Some(installment_number))
            .map(|s| s.amount)
            .sum()
    }
}

/// A binding loan contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanContract {
    pub id: String,
    pub offer_id: String,
    pub request_id: String,
    pub lender_id: String,
    pub borrower_id: String,
    pub jurisdiction: String,

    pub principal: Decimal,
    /// Annual percentage
    pub interest_rate: Decimal,
    /// Days
    pub duration: u32,
    pub repayment_type: RepaymentType,
    /// Days
    pub grace_period: u32,
    /// Annual percentage
    pub penalty_rate: Decimal,
    /// Days
    pub max_penalty_duration: u32,

    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub grace_period_end: DateTime<Utc>,
    pub penalty_period_end: DateTime<Utc>,

    pub repayment_schedule: PaymentSchedule,

    /// principal + total_interest
    pub total_amount: Decimal,
    pub total_interest: Decimal,
    /// Obligation still owed; starts at `total_amount`, only decreases
    pub remaining_amount: Decimal,
    /// Principal not yet repaid
    pub outstanding_principal: Decimal,

    pub legal_status: LegalStatus,
    #[serde(default)]
    pub digital_signatures: DigitalSignatures,
    #[serde(default)]
    pub payments: Vec<LoanPayment>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for LoanContract {
    const COLLECTION: Collection = Collection::Contracts;

    fn id(&self) -> &str {
        &self.id
    }
}

impl LoanContract {
    /// Sum of payments allocated (fully or partially) to an installment
    pub fn paid_towards(&self, installment_number: u32) -> Decimal {
        self.payments.iter().map(|p| p.applied_to(installment_number)).sum()
    }

    pub fn total_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Inside the cooling-off window that opens when both parties have signed
    pub fn in_cooling_off(&self, now: DateTime<Utc>, cooling_off_hours: u32) -> bool {
        self.digital_signatures
            .completed_at()
            .is_some_and(|signed| now < signed + Duration::hours(i64::from(cooling_off_hours)))
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
