//! Cost disclosure and platform fees
//!
//! Pure figures for pre-contract disclosure and comparison shopping. Nothing
//! here reads or writes stored entities.

use log::debug;
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::apr::apr_equivalent;
use crate::catalog::{LendingOffer, OfferFilter};
use crate::error::{LendingError, LendingResult};
use crate::money::{from_f64, pct, round_money, to_f64, DAYS_PER_YEAR};
use crate::schedule::{RepaymentType, ScheduleCalculator, ScheduleTerms};

fn default_lender_fee_pct() -> Decimal {
    dec!(1)
}

fn default_borrower_fee_pct() -> Decimal {
    dec!(2)
}

fn default_service_fee() -> Decimal {
    dec!(5.00)
}

fn default_late_fee() -> Decimal {
    dec!(15.00)
}

fn default_collection_fee_pct() -> Decimal {
    dec!(10)
}

/// Platform fee schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Percent of principal charged to the lender
    #[serde(default = "default_lender_fee_pct")]
    pub lender_fee_pct: Decimal,

    /// Percent of principal charged to the borrower upfront
    #[serde(default = "default_borrower_fee_pct")]
    pub borrower_fee_pct: Decimal,

    /// Flat fee charged to the borrower upfront
    #[serde(default = "default_service_fee")]
    pub service_fee: Decimal,

    /// Flat fee per missed installment
    #[serde(default = "default_late_fee")]
    pub late_fee: Decimal,

    /// Percent of the unpaid amount charged on collection
    #[serde(default = "default_collection_fee_pct")]
    pub collection_fee_pct: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            lender_fee_pct: default_lender_fee_pct(),
            borrower_fee_pct: default_borrower_fee_pct(),
            service_fee: default_service_fee(),
            late_fee: default_late_fee(),
            collection_fee_pct: default_collection_fee_pct(),
        }
    }
}

impl FeeSchedule {
    pub fn validate(&self) -> LendingResult<()> {
        let fields = [
            ("lender_fee_pct", self.lender_fee_pct),
            ("borrower_fee_pct", self.borrower_fee_pct),
            ("service_fee", self.service_fee),
            ("late_fee", self.late_fee),
            ("collection_fee_pct", self.collection_fee_pct),
        ];
        match fields.iter().find(|(_, v)| v.is_sign_negative()) {
            Some((field, value)) => Err(LendingError::invalid(*field, format!("{} must not be negative", value))),
            None => Ok(()),
        }
    }
}

/// Pre-contract cost figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostDisclosure {
    pub principal: Decimal,
    pub total_interest: Decimal,
    /// principal + total_interest
    pub total_amount: Decimal,
    /// First installment amount (the whole amount for a lump sum)
    pub monthly_payment: Decimal,
    pub installments: u32,
    pub borrower_fee: Decimal,
    pub service_fee: Decimal,
    pub lender_fee: Decimal,
    /// Interest plus every borrower-side fee
    pub total_cost: Decimal,
    /// Interest the lender keeps after the lender fee
    pub lender_net_interest: Decimal,
    /// Effective annual percentage including upfront fees
    pub apr_equivalent: Decimal,
}

/// Quote for one offer in a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferQuote {
    pub offer_id: String,
    pub lender_id: String,
    pub interest_rate: Decimal,
    pub disclosure: CostDisclosure,
}

/// Computes disclosures from a fee schedule and an amortization method
#[derive(Debug, Clone, Default)]
pub struct CostCalculator {
    fees: FeeSchedule,
    schedule: ScheduleCalculator,
}

impl CostCalculator {
    pub fn new(fees: FeeSchedule, schedule: ScheduleCalculator) -> Self {
        Self { fees, schedule }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Disclose the cost of borrowing on the given terms
    pub fn disclose(&self, terms: &ScheduleTerms) -> LendingResult<CostDisclosure> {
        let splits = self.schedule.splits(terms)?;

        let total_interest: Decimal = splits.iter().map(|s| s.interest).sum();
        let total_amount = terms.principal + total_interest;
        let monthly_payment = splits.first().map_or(Decimal::ZERO, |s| s.amount);

        let borrower_fee = round_money(terms.principal * pct(self.fees.borrower_fee_pct));
        let lender_fee = round_money(terms.principal * pct(self.fees.lender_fee_pct));
        let service_fee = round_money(self.fees.service_fee);

        let net_proceeds = terms.principal - borrower_fee - service_fee;
        if net_proceeds <= Decimal::ZERO {
            return Err(LendingError::invalid(
                "principal",
                format!("{} does not cover upfront fees of {}", terms.principal, borrower_fee + service_fee),
            ));
        }

        let periods_per_year = match terms.repayment_type {
            RepaymentType::LumpSum => to_f64(DAYS_PER_YEAR) / f64::from(terms.duration),
            RepaymentType::Installments => f64::from(terms.frequency.periods_per_year()),
        };
        let payments: Vec<f64> = splits.iter().map(|s| to_f64(s.amount)).collect();
        let annualised = apr_equivalent(to_f64(net_proceeds), &payments, periods_per_year)
            .ok_or_else(|| LendingError::invalid("apr_equivalent", "no rate solves the cash flows"))?;
        // Short lump sums compound the periodic rate hundreds of times a year
        let apr = Some(annualised)
            .filter(|rate| rate.is_finite())
            .and_then(from_f64)
            .map(round_money)
            .ok_or_else(|| {
                LendingError::invalid(
                    "apr_equivalent",
                    format!(
                        "annualised rate overflows over {} days with net proceeds of {}",
                        terms.duration, net_proceeds
                    ),
                )
            })?;

        debug!(
            "Disclosure for {} at {}% over {} days: total {} APR-equivalent {}%",
            terms.principal, terms.annual_rate, terms.duration, total_amount, apr
        );

        Ok(CostDisclosure {
            principal: terms.principal,
            total_interest,
            total_amount,
            monthly_payment,
            installments: splits.len() as u32,
            borrower_fee,
            service_fee,
            lender_fee,
            total_cost: total_interest + borrower_fee + service_fee,
            lender_net_interest: total_interest - lender_fee,
            apr_equivalent: apr,
        })
    }

    /// Late fee plus the collection fee on an unpaid amount
    pub fn late_charges(&self, unpaid: Decimal) -> Decimal {
        self.fees.late_fee + round_money(unpaid.max(Decimal::ZERO) * pct(self.fees.collection_fee_pct))
    }

    /// Quote every offer able to fund `principal` for `duration` days, cheapest APR first
    pub fn compare(&self, offers: &[LendingOffer], principal: Decimal, duration: u32) -> Vec<OfferQuote> {
        let eligible = OfferFilter {
            amount: Some(principal),
            duration: Some(duration),
            ..OfferFilter::active()
        };

        let mut quotes: Vec<OfferQuote> = offers
            .par_iter()
            .filter(|offer| eligible.matches(offer))
            .filter_map(|offer| {
                let terms = ScheduleTerms {
                    principal,
                    annual_rate: offer.interest_rate,
                    duration,
                    repayment_type: offer.repayment_type,
                    frequency: offer.installment_frequency,
                };
                match self.disclose(&terms) {
                    Ok(disclosure) => Some(OfferQuote {
                        offer_id: offer.id.clone(),
                        lender_id: offer.lender_id.clone(),
                        interest_rate: offer.interest_rate,
                        disclosure,
                    }),
                    Err(e) => {
                        debug!("Skipping offer {}: {}", offer.id, e);
                        None
                    }
                }
            })
            .collect();

        quotes.sort_by(|a, b| {
            a.disclosure
                .apr_equivalent
                .cmp(&b.disclosure.apr_equivalent)
                .then_with(|| a.offer_id.cmp(&b.offer_id))
        });
        quotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewOffer, OfferStatus};
    use crate::schedule::InstallmentFrequency;
    use chrono::Utc;

    fn terms(principal: Decimal, rate: Decimal, duration: u32) -> ScheduleTerms {
        ScheduleTerms {
            principal,
            annual_rate: rate,
            duration,
            repayment_type: RepaymentType::Installments,
            frequency: InstallmentFrequency::Monthly,
        }
    }

    #[test]
    fn test_default_fee_schedule() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.lender_fee_pct, dec!(1));
        assert_eq!(fees.borrower_fee_pct, dec!(2));
        assert_eq!(fees.service_fee, dec!(5));
        assert_eq!(fees.late_fee, dec!(15));
        assert_eq!(fees.collection_fee_pct, dec!(10));
        assert!(fees.validate().is_ok());
    }

    #[test]
    fn test_apr_overflow_reported() {
        let calc = CostCalculator::default();
        let short = ScheduleTerms {
            repayment_type: RepaymentType::LumpSum,
            ..terms(dec!(10), dec!(10), 1)
        };

        // Upfront fees take half the proceeds, repaid the next day
        let err = calc.disclose(&short).unwrap_err();
        match err {
            LendingError::InvalidInput { field, reason } => {
                assert_eq!(field, "apr_equivalent");
                assert!(reason.contains("overflows"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_fee_schedule_partial_json() {
        let fees: FeeSchedule = serde_json::from_str(r#"{"service_fee": "0"}"#).unwrap();
        assert_eq!(fees.service_fee, Decimal::ZERO);
        assert_eq!(fees.borrower_fee_pct, dec!(2));
    }

    #[test]
    fn test_disclosure_figures() {
        let calc = CostCalculator::default();
        let d = calc.disclose(&terms(dec!(3000), dec!(8.5), 180)).unwrap();

        assert_eq!(d.total_amount, dec!(3000) + d.total_interest);
        assert_eq!(d.borrower_fee, dec!(60.00));
        assert_eq!(d.lender_fee, dec!(30.00));
        assert_eq!(d.service_fee, dec!(5.00));
        assert_eq!(d.total_cost, d.total_interest + dec!(65));
        assert_eq!(d.lender_net_interest, d.total_interest - dec!(30));
        assert_eq!(d.installments, 6);
    }

    #[test]
    fn test_apr_exceeds_nominal_with_fees() {
        let calc = CostCalculator::default();
        let d = calc.disclose(&terms(dec!(3000), dec!(8.5), 180)).unwrap();
        assert!(d.apr_equivalent > dec!(8.5));
    }

    #[test]
    fn test_fee_free_apr_is_effective_rate() {
        let fees = FeeSchedule {
            lender_fee_pct: Decimal::ZERO,
            borrower_fee_pct: Decimal::ZERO,
            service_fee: Decimal::ZERO,
            ..FeeSchedule::default()
        };
        let calc = CostCalculator::new(fees, ScheduleCalculator::default());
        let d = calc.disclose(&terms(dec!(12000), dec!(12), 360)).unwrap();

        // Effective annual of 1% monthly, within rounding of the cents
        let apr = to_f64(d.apr_equivalent);
        approx::assert_abs_diff_eq!(apr, 12.68, epsilon = 0.02);
    }

    #[test]
    fn test_lump_sum_disclosure() {
        let calc = CostCalculator::default();
        let d = calc
            .disclose(&ScheduleTerms {
                repayment_type: RepaymentType::LumpSum,
                ..terms(dec!(5000), dec!(10), 90)
            })
            .unwrap();

        assert_eq!(d.installments, 1);
        assert_eq!(d.monthly_payment, d.total_amount);
        assert_eq!(d.total_interest, dec!(123.29));
    }

    #[test]
    fn test_fees_exceeding_principal_rejected() {
        let calc = CostCalculator::default();
        assert!(calc.disclose(&terms(dec!(5), dec!(5), 30)).is_err());
    }

    #[test]
    fn test_late_charges() {
        let calc = CostCalculator::default();
        // 15 + 10% of 250
        assert_eq!(calc.late_charges(dec!(250)), dec!(40.00));
        assert_eq!(calc.late_charges(Decimal::ZERO), dec!(15.00));
    }

    #[test]
    fn test_compare_ranks_by_apr() {
        let make = |lender: &str, rate: Decimal| {
            LendingOffer::from_new(
                NewOffer {
                    lender_id: lender.to_string(),
                    min_amount: dec!(1000),
                    max_amount: dec!(10000),
                    min_duration: 30,
                    max_duration: 365,
                    interest_rate: rate,
                    repayment_type: RepaymentType::Installments,
                    installment_frequency: InstallmentFrequency::Monthly,
                    grace_period: 0,
                    penalty_rate: Decimal::ZERO,
                    max_penalty_duration: 0,
                    total_offered: dec!(20000),
                    category: None,
                    jurisdiction: None,
                    expires_at: None,
                },
                "FR".to_string(),
                Utc::now(),
            )
            .unwrap()
        };

        let mut paused = make("paused", dec!(1));
        paused.status = OfferStatus::Paused;
        let offers = vec![make("dear", dec!(12)), make("cheap", dec!(6)), paused, make("mid", dec!(9))];

        let quotes = CostCalculator::default().compare(&offers, dec!(3000), 180);
        let lenders: Vec<&str> = quotes.iter().map(|q| q.lender_id.as_str()).collect();
        assert_eq!(lenders, vec!["cheap", "mid", "dear"]);
    }
}
