//! Borrower risk scoring
//!
//! Additive points model: each adverse signal adds weighted points, and the
//! total maps onto a five-level band. The band also carries a conservative
//! amount/rate recommendation for origination.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Employment status reported for the borrower
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Retired,
    Student,
    Unemployed,
}

/// Five-level risk band, ordered from safest to riskiest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "very_low",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }

    /// Whether a borrower at this level may be lent to at all
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, RiskLevel::VeryHigh)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile signals supplied by the caller or an external data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerProfile {
    pub borrower_id: String,

    /// Bureau-style credit score (roughly 300-850)
    pub credit_score: u16,

    pub income_verified: bool,

    pub employment_status: EmploymentStatus,

    /// Monthly debt service over monthly income, 0..1
    pub debt_to_income_ratio: f64,

    /// Number of prior loan defaults
    pub previous_defaults: u32,

    /// Age in years, when known
    #[serde(default)]
    pub age: Option<u8>,
}

/// Point weights for each adverse signal
#[derive(Debug, Clone)]
pub struct RiskWeights {
    /// Credit score below 500
    pub credit_below_500: u32,
    /// Credit score below 650
    pub credit_below_650: u32,
    /// Credit score below 750
    pub credit_below_750: u32,
    pub income_unverified: u32,
    pub unemployed: u32,
    /// Debt-to-income above `dti_threshold`
    pub high_debt_to_income: u32,
    pub dti_threshold: f64,
    pub per_previous_default: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            credit_below_500: 3,
            credit_below_650: 2,
            credit_below_750: 1,
            income_unverified: 2,
            unemployed: 3,
            high_debt_to_income: 2,
            dti_threshold: 0.4,
            per_previous_default: 1,
        }
    }
}

/// Score thresholds for each band (score >= threshold)
#[derive(Debug, Clone)]
pub struct RiskThresholds {
    pub very_high: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            very_high: 8,
            high: 6,
            medium: 4,
            low: 2,
        }
    }
}

/// Recommended ceilings for one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation {
    pub max_amount: Decimal,
    /// Annual percentage
    pub max_rate: Decimal,
}

/// Point-in-time risk judgment for a borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub borrower_id: String,
    pub credit_score: u16,
    pub income_verified: bool,
    pub employment_status: EmploymentStatus,
    pub debt_to_income_ratio: f64,
    pub previous_defaults: u32,
    #[serde(default)]
    pub age: Option<u8>,

    /// Accumulated points
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub recommended_max_amount: Decimal,
    pub recommended_max_rate: Decimal,
    pub assessed_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// The stricter of the recorded band and the band its score maps onto
    pub fn effective_level(&self, model: &RiskModel) -> RiskLevel {
        self.risk_level.max(model.level_for(self.risk_score))
    }
}

/// Scoring model
#[derive(Debug, Clone, Default)]
pub struct RiskModel {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
}

impl RiskModel {
    pub fn new(weights: RiskWeights, thresholds: RiskThresholds) -> Self {
        Self { weights, thresholds }
    }

    /// Accumulate the integer risk score for a profile
    pub fn score(&self, profile: &BorrowerProfile) -> u32 {
        let w = &self.weights;
        let mut score = 0;

        // Credit score bands are exclusive: only the worst band applies
        score += if profile.credit_score < 500 {
            w.credit_below_500
        } else if profile.credit_score < 650 {
            w.credit_below_650
        } else if profile.credit_score < 750 {
            w.credit_below_750
        } else {
            0
        };

        if !profile.income_verified {
            score += w.income_unverified;
        }

        if profile.employment_status == EmploymentStatus::Unemployed {
            score += w.unemployed;
        }

        if profile.debt_to_income_ratio > w.dti_threshold {
            score += w.high_debt_to_income;
        }

        score + profile.previous_defaults.saturating_mul(w.per_previous_default)
    }

    /// Map a score onto a band
    pub fn level_for(&self, score: u32) -> RiskLevel {
        let t = &self.thresholds;
        if score >= t.very_high {
            RiskLevel::VeryHigh
        } else if score >= t.high {
            RiskLevel::High
        } else if score >= t.medium {
            RiskLevel::Medium
        } else if score >= t.low {
            RiskLevel::Low
        } else {
            RiskLevel::VeryLow
        }
    }

    /// Conservative ceilings for a band
    pub fn recommendation(&self, level: RiskLevel) -> Recommendation {
        let (max_amount, max_rate) = match level {
            RiskLevel::VeryLow => (dec!(50000), dec!(12)),
            RiskLevel::Low => (dec!(25000), dec!(15)),
            RiskLevel::Medium => (dec!(10000), dec!(18)),
            RiskLevel::High => (dec!(3000), dec!(20)),
            RiskLevel::VeryHigh => (Decimal::ZERO, Decimal::ZERO),
        };
        Recommendation { max_amount, max_rate }
    }

    /// Assess a profile at a given instant
    pub fn assess(&self, profile: &BorrowerProfile, at: DateTime<Utc>) -> RiskAssessment {
        let risk_score = self.score(profile);
        let risk_level = self.level_for(risk_score);
        let rec = self.recommendation(risk_level);

        RiskAssessment {
            borrower_id: profile.borrower_id.clone(),
            credit_score: profile.credit_score,
            income_verified: profile.income_verified,
            employment_status: profile.employment_status,
            debt_to_income_ratio: profile.debt_to_income_ratio,
            previous_defaults: profile.previous_defaults,
            age: profile.age,
            risk_score,
            risk_level,
            recommended_max_amount: rec.max_amount,
            recommended_max_rate: rec.max_rate,
            assessed_at: at,
        }
    }
}
