//! Load offer sheets from CSV
//!
//! Expected columns:
//! `OfferId,LenderId,MinAmount,MaxAmount,MinDuration,MaxDuration,InterestRate,RepaymentType,Frequency,GracePeriod,PenaltyRate,MaxPenaltyDuration,Available,Jurisdiction`

use chrono::{DateTime, Utc};
use csv::Reader;
use rust_decimal::Decimal;
use std::path::Path;

use super::offer::{LendingOffer, OfferStatus};
use crate::error::{LendingError, LendingResult};
use crate::schedule::{InstallmentFrequency, RepaymentType};

/// Default location of the sample offer sheet
pub const DEFAULT_OFFER_SHEET_PATH: &str = "data/sample_offers.csv";

/// Raw CSV row
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "OfferId")]
    offer_id: String,
    #[serde(rename = "LenderId")]
    lender_id: String,
    #[serde(rename = "MinAmount")]
    min_amount: Decimal,
    #[serde(rename = "MaxAmount")]
    max_amount: Decimal,
    #[serde(rename = "MinDuration")]
    min_duration: u32,
    #[serde(rename = "MaxDuration")]
    max_duration: u32,
    #[serde(rename = "InterestRate")]
    interest_rate: Decimal,
    #[serde(rename = "RepaymentType")]
    repayment_type: String,
    #[serde(rename = "Frequency")]
    frequency: String,
    #[serde(rename = "GracePeriod")]
    grace_period: u32,
    #[serde(rename = "PenaltyRate")]
    penalty_rate: Decimal,
    #[serde(rename = "MaxPenaltyDuration")]
    max_penalty_duration: u32,
    #[serde(rename = "Available")]
    available: Decimal,
    #[serde(rename = "Jurisdiction")]
    jurisdiction: String,
}

impl CsvRow {
    fn into_offer(self, as_of: DateTime<Utc>) -> LendingResult<LendingOffer> {
        let repayment_type = match self.repayment_type.trim() {
            "lump_sum" | "LumpSum" => RepaymentType::LumpSum,
            "installments" | "Installments" => RepaymentType::Installments,
            other => {
                return Err(LendingError::invalid(
                    "RepaymentType",
                    format!("unknown value {} for offer {}", other, self.offer_id),
                ))
            }
        };

        let installment_frequency = match self.frequency.trim() {
            "weekly" | "Weekly" => InstallmentFrequency::Weekly,
            "biweekly" | "Biweekly" => InstallmentFrequency::Biweekly,
            "monthly" | "Monthly" | "" => InstallmentFrequency::Monthly,
            other => {
                return Err(LendingError::invalid(
                    "Frequency",
                    format!("unknown value {} for offer {}", other, self.offer_id),
                ))
            }
        };

        if self.min_amount > self.max_amount || self.min_duration > self.max_duration {
            return Err(LendingError::invalid(
                "offer bands",
                format!("offer {} has an empty amount or duration band", self.offer_id),
            ));
        }

        Ok(LendingOffer {
            id: self.offer_id,
            lender_id: self.lender_id,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            interest_rate: self.interest_rate,
            repayment_type,
            installment_frequency,
            grace_period: self.grace_period,
            penalty_rate: self.penalty_rate,
            max_penalty_duration: self.max_penalty_duration,
            available_amount: self.available,
            total_offered: self.available,
            status: OfferStatus::Active,
            category: None,
            jurisdiction: self.jurisdiction.trim().to_uppercase(),
            created_at: as_of,
            expires_at: None,
        })
    }
}

/// Load offers from any reader
pub fn load_offers_from_reader<R: std::io::Read>(
    reader: R,
    as_of: DateTime<Utc>,
) -> LendingResult<Vec<LendingOffer>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut offers = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        offers.push(row.into_offer(as_of)?);
    }

    Ok(offers)
}

/// Load offers from a CSV file
pub fn load_offers<P: AsRef<Path>>(path: P, as_of: DateTime<Utc>) -> LendingResult<Vec<LendingOffer>> {
    let file = std::fs::File::open(path)?;
    load_offers_from_reader(file, as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SHEET: &str = "\
OfferId,LenderId,MinAmount,MaxAmount,MinDuration,MaxDuration,InterestRate,RepaymentType,Frequency,GracePeriod,PenaltyRate,MaxPenaltyDuration,Available,Jurisdiction
o-1,l-1,500,5000,30,365,7.5,installments,monthly,5,10,60,20000,fr
o-2,l-2,1000,8000,60,180,6.9,lump_sum,,0,9,30,8000,BE
";

    #[test]
    fn test_load_from_reader() {
        let offers = load_offers_from_reader(SHEET.as_bytes(), Utc::now()).unwrap();

        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].interest_rate, dec!(7.5));
        assert_eq!(offers[0].jurisdiction, "FR");
        assert_eq!(offers[1].repayment_type, RepaymentType::LumpSum);
        assert_eq!(offers[1].installment_frequency, InstallmentFrequency::Monthly);
    }

    #[test]
    fn test_unknown_repayment_type() {
        let sheet = SHEET.replace("lump_sum", "balloon");
        assert!(load_offers_from_reader(sheet.as_bytes(), Utc::now()).is_err());
    }

    #[test]
    fn test_load_sample_sheet() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_OFFER_SHEET_PATH);
        let offers = load_offers(path, Utc::now()).unwrap();
        assert!(!offers.is_empty());
    }
}
