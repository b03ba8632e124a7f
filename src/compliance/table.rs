//! Jurisdiction rules and the compliance table

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default jurisdiction key
pub const DEFAULT_JURISDICTION: &str = "FR";

/// Penalty rate may not exceed this multiple of the usury cap unless overridden
pub const DEFAULT_PENALTY_RATE_MULTIPLE: Decimal = dec!(1.5);

fn default_penalty_rate_multiple() -> Decimal {
    DEFAULT_PENALTY_RATE_MULTIPLE
}

/// Legal ceilings for one jurisdiction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionRules {
    /// Jurisdiction key (e.g. "FR")
    pub code: String,

    /// Usury cap, annual percentage
    pub max_interest_rate: Decimal,

    /// Largest principal a consumer loan may carry
    pub max_loan_amount: Decimal,

    /// Minimum borrower age in years
    pub min_borrower_age: u8,

    /// Withdrawal window after signing, in hours
    pub cooling_off_period_hours: u32,

    /// Disclosures that must accompany a contract
    pub required_disclosures: Vec<String>,

    /// Whether borrower insurance is mandatory
    pub mandatory_insurance: bool,

    /// Whether a credit check is required before origination
    pub credit_check_required: bool,

    /// Penalty rate ceiling as a multiple of the usury cap
    #[serde(default = "default_penalty_rate_multiple")]
    pub penalty_rate_multiple: Decimal,
}

impl JurisdictionRules {
    /// Highest penalty rate allowed
    pub fn max_penalty_rate(&self) -> Decimal {
        self.max_interest_rate * self.penalty_rate_multiple
    }

    fn disclosures(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// France: taux d'usure ~20%, consumer credit ceiling 75k, 14-day withdrawal
    pub fn france() -> Self {
        Self {
            code: "FR".to_string(),
            max_interest_rate: dec!(20.0),
            max_loan_amount: dec!(75000),
            min_borrower_age: 18,
            cooling_off_period_hours: 336,
            required_disclosures: Self::disclosures(&[
                "taeg",
                "total_cost",
                "repayment_schedule",
                "withdrawal_right",
            ]),
            mandatory_insurance: false,
            credit_check_required: true,
            penalty_rate_multiple: DEFAULT_PENALTY_RATE_MULTIPLE,
        }
    }

    pub fn belgium() -> Self {
        Self {
            code: "BE".to_string(),
            max_interest_rate: dec!(18.5),
            max_loan_amount: dec!(75000),
            min_borrower_age: 18,
            cooling_off_period_hours: 336,
            required_disclosures: Self::disclosures(&["taeg", "total_cost", "withdrawal_right"]),
            mandatory_insurance: false,
            credit_check_required: true,
            penalty_rate_multiple: DEFAULT_PENALTY_RATE_MULTIPLE,
        }
    }

    pub fn germany() -> Self {
        Self {
            code: "DE".to_string(),
            max_interest_rate: dec!(15.0),
            max_loan_amount: dec!(100000),
            min_borrower_age: 18,
            cooling_off_period_hours: 336,
            required_disclosures: Self::disclosures(&["effektiver_jahreszins", "total_cost"]),
            mandatory_insurance: false,
            credit_check_required: true,
            penalty_rate_multiple: DEFAULT_PENALTY_RATE_MULTIPLE,
        }
    }

    pub fn spain() -> Self {
        Self {
            code: "ES".to_string(),
            max_interest_rate: dec!(22.0),
            max_loan_amount: dec!(60000),
            min_borrower_age: 18,
            cooling_off_period_hours: 336,
            required_disclosures: Self::disclosures(&["tae", "total_cost"]),
            mandatory_insurance: false,
            credit_check_required: false,
            penalty_rate_multiple: DEFAULT_PENALTY_RATE_MULTIPLE,
        }
    }
}

/// Mapping from jurisdiction key to rules
///
/// Ships with a default table; deployments replace or extend it with
/// [`ComplianceTable::insert`] or load one from CSV.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceTable {
    rules: BTreeMap<String, JurisdictionRules>,
}

impl ComplianceTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table (FR, BE, DE, ES)
    pub fn default_table() -> Self {
        let mut table = Self::new();
        for rules in [
            JurisdictionRules::france(),
            JurisdictionRules::belgium(),
            JurisdictionRules::germany(),
            JurisdictionRules::spain(),
        ] {
            table.insert(rules);
        }
        table
    }

    /// Add or replace a jurisdiction
    pub fn insert(&mut self, rules: JurisdictionRules) -> Option<JurisdictionRules> {
        self.rules.insert(rules.code.to_uppercase(), rules)
    }

    /// Look up rules by key (case-insensitive)
    pub fn get(&self, code: &str) -> Option<&JurisdictionRules> {
        self.rules.get(&code.to_uppercase())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
