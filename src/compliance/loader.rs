//! Load a jurisdiction table from CSV
//!
//! Expected columns:
//! `Code,MaxInterestRate,MaxLoanAmount,MinBorrowerAge,CoolingOffHours,RequiredDisclosures,MandatoryInsurance,CreditCheckRequired[,PenaltyRateMultiple]`
//! Disclosures are `;`-separated.

use csv::Reader;
use rust_decimal::Decimal;
use std::path::Path;

use super::table::{ComplianceTable, JurisdictionRules, DEFAULT_PENALTY_RATE_MULTIPLE};
use crate::error::{LendingError, LendingResult};

/// Default location of the jurisdiction table
pub const DEFAULT_JURISDICTIONS_PATH: &str = "data/jurisdictions.csv";

/// Raw CSV row
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "MaxInterestRate")]
    max_interest_rate: Decimal,
    #[serde(rename = "MaxLoanAmount")]
    max_loan_amount: Decimal,
    #[serde(rename = "MinBorrowerAge")]
    min_borrower_age: u8,
    #[serde(rename = "CoolingOffHours")]
    cooling_off_hours: u32,
    #[serde(rename = "RequiredDisclosures")]
    required_disclosures: String,
    #[serde(rename = "MandatoryInsurance")]
    mandatory_insurance: bool,
    #[serde(rename = "CreditCheckRequired")]
    credit_check_required: bool,
    #[serde(rename = "PenaltyRateMultiple", default)]
    penalty_rate_multiple: Option<Decimal>,
}

impl CsvRow {
    fn into_rules(self) -> LendingResult<JurisdictionRules> {
        let code = self.code.trim().to_uppercase();
        if code.is_empty() {
            return Err(LendingError::invalid("jurisdiction code", "empty"));
        }
        if self.max_interest_rate <= Decimal::ZERO {
            return Err(LendingError::invalid(
                "max_interest_rate",
                format!("{} must be positive for {}", self.max_interest_rate, code),
            ));
        }

        let required_disclosures = self
            .required_disclosures
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(JurisdictionRules {
            code,
            max_interest_rate: self.max_interest_rate,
            max_loan_amount: self.max_loan_amount,
            min_borrower_age: self.min_borrower_age,
            cooling_off_period_hours: self.cooling_off_hours,
            required_disclosures,
            mandatory_insurance: self.mandatory_insurance,
            credit_check_required: self.credit_check_required,
            penalty_rate_multiple: self
                .penalty_rate_multiple
                .unwrap_or(DEFAULT_PENALTY_RATE_MULTIPLE),
        })
    }
}

/// Load a table from any reader
pub fn load_table_from_reader<R: std::io::Read>(reader: R) -> LendingResult<ComplianceTable> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut table = ComplianceTable::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        table.insert(row.into_rules()?);
    }

    Ok(table)
}

/// Load a table from a CSV file
pub fn load_table<P: AsRef<Path>>(path: P) -> LendingResult<ComplianceTable> {
    let file = std::fs::File::open(path)?;
    load_table_from_reader(file)
}

impl ComplianceTable {
    /// Load from the default CSV location (data/jurisdictions.csv)
    pub fn from_csv() -> LendingResult<Self> {
        load_table(DEFAULT_JURISDICTIONS_PATH)
    }

    /// Load from a specific CSV file
    pub fn from_csv_path(path: &Path) -> LendingResult<Self> {
        load_table(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "\
Code,MaxInterestRate,MaxLoanAmount,MinBorrowerAge,CoolingOffHours,RequiredDisclosures,MandatoryInsurance,CreditCheckRequired,PenaltyRateMultiple
fr,20.0,75000,18,336,taeg;total_cost,false,true,
CH,10.0,80000,18,336,eff_rate,false,true,1.2
";

    #[test]
    fn test_load_from_reader() {
        let table = load_table_from_reader(SAMPLE.as_bytes()).expect("valid csv");

        assert_eq!(table.len(), 2);

        let fr = table.get("FR").expect("FR loaded");
        assert_eq!(fr.required_disclosures, vec!["taeg", "total_cost"]);
        assert_eq!(fr.penalty_rate_multiple, DEFAULT_PENALTY_RATE_MULTIPLE);

        let ch = table.get("CH").expect("CH loaded");
        assert_eq!(ch.max_penalty_rate(), dec!(12.0));
    }

    #[test]
    fn test_rejects_non_positive_cap() {
        let csv = "\
Code,MaxInterestRate,MaxLoanAmount,MinBorrowerAge,CoolingOffHours,RequiredDisclosures,MandatoryInsurance,CreditCheckRequired
XX,0,1000,18,0,,false,false
";
        assert!(load_table_from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_load_shipped_table() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_JURISDICTIONS_PATH);
        let table = ComplianceTable::from_csv_path(&path).expect("shipped table loads");
        assert_eq!(table.get("FR").map(|r| r.max_interest_rate), Some(dec!(20.0)));
    }
}
