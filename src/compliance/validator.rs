//! Compliance validation against jurisdiction ceilings
//!
//! Pure checks with no side effects: a ceiling that is exceeded is always
//! reported, never clamped.

use log::{debug, warn};
use rust_decimal::Decimal;
use thiserror::Error;

use super::table::{ComplianceTable, JurisdictionRules};
use crate::catalog::LendingOffer;

/// A jurisdiction ceiling that the terms under test exceed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComplianceError {
    #[error("jurisdiction {0} is not in the compliance table")]
    UnknownJurisdiction(String),

    #[error("interest rate {rate}% exceeds the {jurisdiction} usury cap of {cap}%")]
    UsuryRateExceeded {
        jurisdiction: String,
        rate: Decimal,
        cap: Decimal,
    },

    #[error("amount {amount} exceeds the {jurisdiction} maximum loan amount of {cap}")]
    MaxAmountExceeded {
        jurisdiction: String,
        amount: Decimal,
        cap: Decimal,
    },

    #[error("penalty rate {rate}% exceeds the {jurisdiction} ceiling of {cap}%")]
    PenaltyRateExceeded {
        jurisdiction: String,
        rate: Decimal,
        cap: Decimal,
    },

    #[error("borrower age {age} is below the {jurisdiction} minimum of {min}")]
    BorrowerUnderage {
        jurisdiction: String,
        age: u8,
        min: u8,
    },
}

/// Terms submitted for a compliance check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermsUnderTest {
    /// Annual interest rate, percent
    pub interest_rate: Decimal,

    /// Principal, or an offer's maximum amount
    pub amount: Decimal,

    /// Annual penalty rate, percent
    pub penalty_rate: Decimal,
}

/// Validates terms against a [`ComplianceTable`]
#[derive(Debug, Clone)]
pub struct ComplianceValidator {
    table: ComplianceTable,
}

impl ComplianceValidator {
    pub fn new(table: ComplianceTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ComplianceTable {
        &self.table
    }

    /// Rules for a jurisdiction
    pub fn rules(&self, jurisdiction: &str) -> Result<&JurisdictionRules, ComplianceError> {
        self.table
            .get(jurisdiction)
            .ok_or_else(|| ComplianceError::UnknownJurisdiction(jurisdiction.to_string()))
    }

    /// Check rate, amount and penalty rate against the jurisdiction ceilings
    pub fn check_terms(
        &self,
        jurisdiction: &str,
        terms: &TermsUnderTest,
    ) -> Result<(), ComplianceError> {
        let rules = self.rules(jurisdiction)?;

        let result = Self::check_against(rules, terms);
        match &result {
            Ok(()) => debug!(
                "Terms pass {}: rate={} amount={} penalty={}",
                rules.code, terms.interest_rate, terms.amount, terms.penalty_rate
            ),
            Err(e) => warn!("Compliance check failed: {}", e),
        }
        result
    }

    fn check_against(
        rules: &JurisdictionRules,
        terms: &TermsUnderTest,
    ) -> Result<(), ComplianceError> {
        if terms.interest_rate > rules.max_interest_rate {
            return Err(ComplianceError::UsuryRateExceeded {
                jurisdiction: rules.code.clone(),
                rate: terms.interest_rate,
                cap: rules.max_interest_rate,
            });
        }

        if terms.amount > rules.max_loan_amount {
            return Err(ComplianceError::MaxAmountExceeded {
                jurisdiction: rules.code.clone(),
                amount: terms.amount,
                cap: rules.max_loan_amount,
            });
        }

        let penalty_cap = rules.max_penalty_rate();
        if terms.penalty_rate > penalty_cap {
            return Err(ComplianceError::PenaltyRateExceeded {
                jurisdiction: rules.code.clone(),
                rate: terms.penalty_rate,
                cap: penalty_cap,
            });
        }

        Ok(())
    }

    /// Check an offer's advertised terms (rate, max amount, penalty rate)
    pub fn check_offer(&self, offer: &LendingOffer) -> Result<(), ComplianceError> {
        self.check_terms(
            &offer.jurisdiction,
            &TermsUnderTest {
                interest_rate: offer.interest_rate,
                amount: offer.max_amount,
                penalty_rate: offer.penalty_rate,
            },
        )
    }

    /// Check the borrower's age when it is known
    pub fn check_borrower_age(
        &self,
        jurisdiction: &str,
        age: Option<u8>,
    ) -> Result<(), ComplianceError> {
        let rules = self.rules(jurisdiction)?;
        match age {
            Some(age) if age < rules.min_borrower_age => {
                let err = ComplianceError::BorrowerUnderage {
                    jurisdiction: rules.code.clone(),
                    age,
                    min: rules.min_borrower_age,
                };
                warn!("Compliance check failed: {}", err);
                Err(err)
            }
            _ => Ok(()),
        }
    }
}

impl Default for ComplianceValidator {
    fn default() -> Self {
        Self::new(ComplianceTable::default_table())
    }
}
