//! Lending Engine - peer-to-peer lending contract engine
//!
//! This library provides:
//! - Offer and request intake with validation and filtering
//! - Jurisdiction compliance ceilings (usury cap, loan amount, penalty rate, age)
//! - Borrower risk scoring behind an injectable data source
//! - Contract origination with repayment schedules and capacity reservation
//! - Payment ledger with grace/penalty/default tracking
//! - Fee disclosure with an APR-equivalent cost
//! - Dispute cases attached to contracts

pub mod catalog;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod contract;
pub mod dispute;
pub mod engine;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod money;
pub mod risk;
pub mod schedule;
pub mod store;

// Re-export commonly used types
pub use catalog::{LendingOffer, LendingRequest, NewOffer, NewRequest, OfferFilter, RequestFilter};
pub use compliance::{ComplianceTable, ComplianceValidator, JurisdictionRules};
pub use config::EngineConfig;
pub use contract::{LegalStatus, LoanContract, NegotiatedTerms, Party};
pub use engine::LendingEngine;
pub use error::{LendingError, LendingResult};
pub use fees::{CostCalculator, CostDisclosure, FeeSchedule};
pub use ledger::PaymentInput;
pub use risk::{BorrowerProfile, RiskAssessment, RiskDataSource, RiskLevel, RiskModel};
pub use schedule::{PaymentSchedule, ScheduleCalculator, ScheduleTerms};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
