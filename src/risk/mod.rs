//! Borrower risk assessment

mod assessment;
mod source;

pub use assessment::{
    BorrowerProfile, EmploymentStatus, Recommendation, RiskAssessment, RiskLevel, RiskModel,
    RiskThresholds, RiskWeights,
};
pub use source::{RiskDataSource, StaticRiskSource};
