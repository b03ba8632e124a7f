//! Lender standing offers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::compliance::DEFAULT_JURISDICTION;
use crate::error::{LendingError, LendingResult};
use crate::schedule::{InstallmentFrequency, RepaymentType};
use crate::store::{Collection, Record};

fn default_jurisdiction() -> String {
    DEFAULT_JURISDICTION.to_string()
}

/// Offer lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Paused,
    /// Capacity exhausted
    Closed,
    Expired,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Active => "active",
            OfferStatus::Paused => "paused",
            OfferStatus::Closed => "closed",
            OfferStatus::Expired => "expired",
        }
    }
}

/// A lender's standing offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingOffer {
    pub id: String,

    pub lender_id: String,

    pub min_amount: Decimal,

    pub max_amount: Decimal,

    /// Days
    pub min_duration: u32,

    /// Days
    pub max_duration: u32,

    /// Annual percentage
    pub interest_rate: Decimal,

    pub repayment_type: RepaymentType,

    #[serde(default)]
    pub installment_frequency: InstallmentFrequency,

    /// Days after a due date with no penalty
    pub grace_period: u32,

    /// Annual percentage applied during the penalty window
    pub penalty_rate: Decimal,

    /// Days of penalty accrual before default
    pub max_penalty_duration: u32,

    /// Capacity still available for new contracts
    pub available_amount: Decimal,

    pub total_offered: Decimal,

    pub status: OfferStatus,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default = "default_jurisdiction")]
    pub jurisdiction: String,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record for LendingOffer {
    const COLLECTION: Collection = Collection::Offers;

    fn id(&self) -> &str {
        &self.id
    }
}

impl LendingOffer {
    /// Build an active offer from validated input; capacity starts full
    pub fn from_new(input: NewOffer, jurisdiction: String, now: DateTime<Utc>) -> LendingResult<Self> {
        input.validate(now)?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            lender_id: input.lender_id,
            min_amount: input.min_amount,
            max_amount: input.max_amount,
            min_duration: input.min_duration,
            max_duration: input.max_duration,
            interest_rate: input.interest_rate,
            repayment_type: input.repayment_type,
            installment_frequency: input.installment_frequency,
            grace_period: input.grace_period,
            penalty_rate: input.penalty_rate,
            max_penalty_duration: input.max_penalty_duration,
            available_amount: input.total_offered,
            total_offered: input.total_offered,
            status: OfferStatus::Active,
            category: input.category,
            jurisdiction,
            created_at: now,
            expires_at: input.expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Active and not past its expiry
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Active && !self.is_expired_at(now)
    }

    /// Take capacity for a new contract; the offer closes when exhausted
    pub(crate) fn reserve(&mut self, amount: Decimal) {
        self.available_amount = (self.available_amount - amount).max(Decimal::ZERO);
        if self.available_amount.is_zero() {
            self.status = OfferStatus::Closed;
        }
    }

    /// Give capacity back (cancelled contract); reopens an offer closed for capacity
    pub(crate) fn release(&mut self, amount: Decimal) {
        self.available_amount = (self.available_amount + amount).min(self.total_offered);
        if self.status == OfferStatus::Closed && self.available_amount > Decimal::ZERO {
            self.status = OfferStatus::Active;
        }
    }
}

/// Caller input for a new offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOffer {
    pub lender_id: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_duration: u32,
    pub max_duration: u32,
    pub interest_rate: Decimal,
    pub repayment_type: RepaymentType,
    #[serde(default)]
    pub installment_frequency: InstallmentFrequency,
    #[serde(default)]
    pub grace_period: u32,
    #[serde(default)]
    pub penalty_rate: Decimal,
    #[serde(default)]
    pub max_penalty_duration: u32,
    pub total_offered: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    /// Falls back to the engine's default jurisdiction
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewOffer {
    /// Structural checks; legal ceilings are the compliance validator's job
    pub fn validate(&self, now: DateTime<Utc>) -> LendingResult<()> {
        if self.lender_id.trim().is_empty() {
            return Err(LendingError::invalid("lender_id", "must not be empty"));
        }
        if self.min_amount <= Decimal::ZERO {
            return Err(LendingError::invalid("min_amount", "must be positive"));
        }
        if self.min_amount > self.max_amount {
            return Err(LendingError::invalid(
                "max_amount",
                format!("{} is below min_amount {}", self.max_amount, self.min_amount),
            ));
        }
        if self.min_duration == 0 || self.min_duration > self.max_duration {
            return Err(LendingError::invalid(
                "duration",
                format!("band {}..{} days is empty", self.min_duration, self.max_duration),
            ));
        }
        if self.interest_rate.is_sign_negative() {
            return Err(LendingError::invalid("interest_rate", "must not be negative"));
        }
        if self.penalty_rate.is_sign_negative() {
            return Err(LendingError::invalid("penalty_rate", "must not be negative"));
        }
        if self.total_offered < self.min_amount {
            return Err(LendingError::invalid(
                "total_offered",
                format!("{} cannot fund the minimum amount {}", self.total_offered, self.min_amount),
            ));
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(LendingError::invalid("expires_at", "already in the past"));
        }
        Ok(())
    }
}

/// Offer listing filter; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    pub status: Option<OfferStatus>,
    pub lender_id: Option<String>,
    pub jurisdiction: Option<String>,
    pub category: Option<String>,
    pub repayment_type: Option<RepaymentType>,
    /// Offer must be able to fund this amount now
    pub amount: Option<Decimal>,
    /// Offer's duration band must contain this duration
    pub duration: Option<u32>,
}

impl OfferFilter {
    /// Active offers only
    pub fn active() -> Self {
        Self {
            status: Some(OfferStatus::Active),
            ..Self::default()
        }
    }

    pub fn matches(&self, offer: &LendingOffer) -> bool {
        self.status.map_or(true, |s| offer.status == s)
            && self.lender_id.as_ref().map_or(true, |l| &offer.lender_id == l)
            && self
                .jurisdiction
                .as_ref()
                .map_or(true, |j| offer.jurisdiction.eq_ignore_ascii_case(j))
            && self
                .category
                .as_ref()
                .map_or(true, |c| offer.category.as_ref() == Some(c))
            && self.repayment_type.map_or(true, |r| offer.repayment_type == r)
            && self.amount.map_or(true, |a| {
                a >= offer.min_amount && a <= offer.max_amount && a <= offer.available_amount
            })
            && self
                .duration
                .map_or(true, |d| d >= offer.min_duration && d <= offer.max_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn new_offer() -> NewOffer {
        NewOffer {
            lender_id: "lender-1".to_string(),
            min_amount: dec!(1000),
            max_amount: dec!(10000),
            min_duration: 30,
            max_duration: 365,
            interest_rate: dec!(8.5),
            repayment_type: RepaymentType::Installments,
            installment_frequency: InstallmentFrequency::Monthly,
            grace_period: 5,
            penalty_rate: dec!(12),
            max_penalty_duration: 60,
            total_offered: dec!(5000),
            category: Some("personal".to_string()),
            jurisdiction: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_from_new_starts_full() {
        let offer = LendingOffer::from_new(new_offer(), "FR".to_string(), now()).unwrap();

        assert_eq!(offer.status, OfferStatus::Active);
        assert_eq!(offer.available_amount, offer.total_offered);
        assert_eq!(offer.jurisdiction, "FR");
        assert!(!offer.id.is_empty());
    }

    #[test]
    fn test_validation_bands() {
        let mut input = new_offer();
        input.min_amount = dec!(20000);
        assert!(matches!(
            input.validate(now()),
            Err(LendingError::InvalidInput { field: "max_amount", .. })
        ));

        let mut input = new_offer();
        input.min_duration = 400;
        assert!(input.validate(now()).is_err());

        let mut input = new_offer();
        input.expires_at = Some(now() - Duration::days(1));
        assert!(input.validate(now()).is_err());
    }

    #[test]
    fn test_reserve_closes_and_release_reopens() {
        let mut offer = LendingOffer::from_new(new_offer(), "FR".to_string(), now()).unwrap();

        offer.reserve(dec!(5000));
        assert_eq!(offer.available_amount, Decimal::ZERO);
        assert_eq!(offer.status, OfferStatus::Closed);

        offer.release(dec!(3000));
        assert_eq!(offer.available_amount, dec!(3000));
        assert_eq!(offer.status, OfferStatus::Active);

        // Never above the total offered
        offer.release(dec!(9000));
        assert_eq!(offer.available_amount, dec!(5000));
    }

    #[test]
    fn test_expiry() {
        let mut input = new_offer();
        input.expires_at = Some(now() + Duration::days(10));
        let offer = LendingOffer::from_new(input, "FR".to_string(), now()).unwrap();

        assert!(offer.is_open_at(now()));
        assert!(!offer.is_open_at(now() + Duration::days(10)));
    }

    #[test]
    fn test_filter() {
        let offer = LendingOffer::from_new(new_offer(), "FR".to_string(), now()).unwrap();

        assert!(OfferFilter::active().matches(&offer));
        assert!(OfferFilter { amount: Some(dec!(3000)), ..OfferFilter::default() }.matches(&offer));
        // Within the band but above available capacity
        assert!(!OfferFilter { amount: Some(dec!(8000)), ..OfferFilter::default() }.matches(&offer));
        assert!(!OfferFilter { duration: Some(400), ..OfferFilter::default() }.matches(&offer));
        assert!(OfferFilter { jurisdiction: Some("fr".to_string()), ..OfferFilter::default() }.matches(&offer));
        assert!(!OfferFilter {
            repayment_type: Some(RepaymentType::LumpSum),
            ..OfferFilter::default()
        }
        .matches(&offer));
    }
}
