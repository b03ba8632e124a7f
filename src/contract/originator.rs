//! Contract origination: offer + request + negotiated terms -> draft contract
//!
//! Pure composition. Every precondition is checked before a contract value
//! is built; persisting the contract and updating the offer and request is
//! the engine's job.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{DigitalSignatures, LegalStatus, LoanContract};
use crate::catalog::{LendingOffer, LendingRequest, OfferStatus, RequestStatus};
use crate::compliance::{ComplianceValidator, TermsUnderTest};
use crate::error::{LendingError, LendingResult};
use crate::risk::{RiskAssessment, RiskModel};
use crate::schedule::{ScheduleCalculator, ScheduleTerms};

/// Offer and request (or negotiated terms) cannot be matched
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("offer {offer_id} is {status}")]
    OfferNotActive { offer_id: String, status: String },

    #[error("request {request_id} is {status}")]
    RequestNotPending { request_id: String, status: String },

    #[error("amount {amount} is below the offer minimum {min}")]
    AmountBelowMinimum { amount: Decimal, min: Decimal },

    #[error("amount {amount} is above the offer maximum {max}")]
    AmountAboveMaximum { amount: Decimal, max: Decimal },

    #[error("amount {amount} exceeds the offer's available capacity {available}")]
    InsufficientCapacity { amount: Decimal, available: Decimal },

    #[error("duration {duration} days is outside {min}..={max} days")]
    DurationOutOfRange { duration: u32, min: u32, max: u32 },

    #[error("request does not accept {0:?} repayment")]
    RepaymentTypeNotAccepted(crate::schedule::RepaymentType),

    #[error("rate {rate}% exceeds the borrower's ceiling of {ceiling}%")]
    RateAboveBorrowerCeiling { rate: Decimal, ceiling: Decimal },

    #[error("{field} {value} exceeds the risk recommendation of {limit}")]
    ExceedsRiskRecommendation {
        field: &'static str,
        value: Decimal,
        limit: Decimal,
    },
}

/// Optional overrides of the matched terms
///
/// Unset fields fall back to the request amount, the offer rate, the request's
/// preferred duration and the origination time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NegotiatedTerms {
    #[serde(default)]
    pub principal: Option<Decimal>,
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

impl NegotiatedTerms {
    pub fn validate(&self, now: DateTime<Utc>) -> LendingResult<()> {
        if let Some(principal) = self.principal {
            if principal <= Decimal::ZERO {
                return Err(LendingError::invalid("principal", format!("{} must be positive", principal)));
            }
        }
        if let Some(rate) = self.interest_rate {
            if rate.is_sign_negative() {
                return Err(LendingError::invalid("interest_rate", format!("{} must not be negative", rate)));
            }
        }
        if self.duration == Some(0) {
            return Err(LendingError::invalid("duration", "must be at least one day"));
        }
        if let Some(start) = self.start_date {
            if start < now {
                return Err(LendingError::invalid("start_date", "must not be in the past"));
            }
        }
        Ok(())
    }
}

/// Resolved terms after defaults are applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgreedTerms {
    pub principal: Decimal,
    pub interest_rate: Decimal,
    pub duration: u32,
    pub start_date: DateTime<Utc>,
}

/// Builds draft contracts from matched offers and requests
#[derive(Debug, Clone, Copy)]
pub struct ContractOriginator<'a> {
    validator: &'a ComplianceValidator,
    calculator: ScheduleCalculator,
}

impl<'a> ContractOriginator<'a> {
    pub fn new(validator: &'a ComplianceValidator, calculator: ScheduleCalculator) -> Self {
        Self {
            validator,
            calculator,
        }
    }

    /// Apply defaults to negotiated overrides
    pub fn agree(
        offer: &LendingOffer,
        request: &LendingRequest,
        terms: &NegotiatedTerms,
        now: DateTime<Utc>,
    ) -> AgreedTerms {
        AgreedTerms {
            principal: terms.principal.unwrap_or(request.requested_amount),
            interest_rate: terms.interest_rate.unwrap_or(offer.interest_rate),
            duration: terms.duration.unwrap_or(request.preferred_duration),
            start_date: terms.start_date.unwrap_or(now),
        }
    }

    /// Check offer/request compatibility for the agreed terms
    pub fn check_match(
        offer: &LendingOffer,
        request: &LendingRequest,
        agreed: &AgreedTerms,
        now: DateTime<Utc>,
    ) -> Result<(), MatchError> {
        if !offer.is_open_at(now) {
            let status = if offer.status == OfferStatus::Active {
                OfferStatus::Expired
            } else {
                offer.status
            };
            return Err(MatchError::OfferNotActive {
                offer_id: offer.id.clone(),
                status: status.as_str().to_string(),
            });
        }

        if request.status != RequestStatus::Pending {
            return Err(MatchError::RequestNotPending {
                request_id: request.id.clone(),
                status: request.status.as_str().to_string(),
            });
        }

        let amount = agreed.principal;
        if amount < offer.min_amount {
            return Err(MatchError::AmountBelowMinimum {
                amount,
                min: offer.min_amount,
            });
        }
        if amount > offer.max_amount {
            return Err(MatchError::AmountAboveMaximum {
                amount,
                max: offer.max_amount,
            });
        }
        if amount > offer.available_amount {
            return Err(MatchError::InsufficientCapacity {
                amount,
                available: offer.available_amount,
            });
        }

        let max_duration = offer.max_duration.min(request.max_duration);
        if agreed.duration < offer.min_duration || agreed.duration > max_duration {
            return Err(MatchError::DurationOutOfRange {
                duration: agreed.duration,
                min: offer.min_duration,
                max: max_duration,
            });
        }

        if !request.accepts(offer.repayment_type) {
            return Err(MatchError::RepaymentTypeNotAccepted(offer.repayment_type));
        }

        if agreed.interest_rate > request.max_interest_rate {
            return Err(MatchError::RateAboveBorrowerCeiling {
                rate: agreed.interest_rate,
                ceiling: request.max_interest_rate,
            });
        }

        Ok(())
    }

    /// Hold the agreed terms to a point-in-time risk assessment
    pub fn check_risk(assessment: &RiskAssessment, agreed: &AgreedTerms) -> LendingResult<()> {
        let level = assessment.effective_level(&RiskModel::default());
        if !level.is_acceptable() {
            return Err(LendingError::RiskRejection {
                borrower_id: assessment.borrower_id.clone(),
                level,
            });
        }
        if agreed.principal > assessment.recommended_max_amount {
            return Err(MatchError::ExceedsRiskRecommendation {
                field: "principal",
                value: agreed.principal,
                limit: assessment.recommended_max_amount,
            }
            .into());
        }
        if agreed.interest_rate > assessment.recommended_max_rate {
            return Err(MatchError::ExceedsRiskRecommendation {
                field: "interest_rate",
                value: agreed.interest_rate,
                limit: assessment.recommended_max_rate,
            }
            .into());
        }
        Ok(())
    }

    /// Validate everything and build a draft contract
    pub fn originate(
        &self,
        offer: &LendingOffer,
        request: &LendingRequest,
        terms: &NegotiatedTerms,
        assessment: Option<&RiskAssessment>,
        now: DateTime<Utc>,
    ) -> LendingResult<LoanContract> {
        terms.validate(now)?;
        let agreed = Self::agree(offer, request, terms, now);

        if let Err(e) = Self::check_match(offer, request, &agreed, now) {
            warn!("Offer {} / request {} rejected: {}", offer.id, request.id, e);
            return Err(e.into());
        }

        if let Some(assessment) = assessment {
            if assessment.borrower_id != request.borrower_id {
                return Err(LendingError::invalid(
                    "assessment",
                    format!(
                        "assessment is for {}, request is from {}",
                        assessment.borrower_id, request.borrower_id
                    ),
                ));
            }
            Self::check_risk(assessment, &agreed).inspect_err(|e| {
                warn!("Request {} rejected on risk: {}", request.id, e);
            })?;
            self.validator
                .check_borrower_age(&offer.jurisdiction, assessment.age)?;
        }

        self.validator.check_terms(
            &offer.jurisdiction,
            &TermsUnderTest {
                interest_rate: agreed.interest_rate,
                amount: agreed.principal,
                penalty_rate: offer.penalty_rate,
            },
        )?;

        let schedule = self.calculator.build(
            &ScheduleTerms {
                principal: agreed.principal,
                annual_rate: agreed.interest_rate,
                duration: agreed.duration,
                repayment_type: offer.repayment_type,
                frequency: offer.installment_frequency,
            },
            agreed.start_date,
        )?;

        let total_interest = schedule.total_interest();
        let total_amount = agreed.principal + total_interest;

        // Calendar-month installments can run past start + duration
        let nominal_due = agreed.start_date + Duration::days(i64::from(agreed.duration));
        let due_date = schedule.final_due_date().map_or(nominal_due, |last| last.max(nominal_due));
        let grace_period_end = due_date + Duration::days(i64::from(offer.grace_period));
        let penalty_period_end = grace_period_end + Duration::days(i64::from(offer.max_penalty_duration));

        debug!(
            "Originating {} at {}% for {} days: {} installments, total {}",
            agreed.principal,
            agreed.interest_rate,
            agreed.duration,
            schedule.len(),
            total_amount
        );

        Ok(LoanContract {
            id: uuid::Uuid::new_v4().to_string(),
            offer_id: offer.id.clone(),
            request_id: request.id.clone(),
            lender_id: offer.lender_id.clone(),
            borrower_id: request.borrower_id.clone(),
            jurisdiction: offer.jurisdiction.clone(),
            principal: agreed.principal,
            interest_rate: agreed.interest_rate,
            duration: agreed.duration,
            repayment_type: offer.repayment_type,
            grace_period: offer.grace_period,
            penalty_rate: offer.penalty_rate,
            max_penalty_duration: offer.max_penalty_duration,
            start_date: agreed.start_date,
            due_date,
            grace_period_end,
            penalty_period_end,
            repayment_schedule: schedule,
            total_amount,
            total_interest,
            remaining_amount: total_amount,
            outstanding_principal: agreed.principal,
            legal_status: LegalStatus::Draft,
            digital_signatures: DigitalSignatures::default(),
            payments: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }
}
