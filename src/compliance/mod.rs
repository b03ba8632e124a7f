//! Jurisdiction compliance: legal ceilings and the validator that enforces them

mod table;
mod validator;
pub mod loader;

pub use table::{
    ComplianceTable, JurisdictionRules, DEFAULT_JURISDICTION, DEFAULT_PENALTY_RATE_MULTIPLE,
};
pub use validator::{ComplianceError, ComplianceValidator, TermsUnderTest};
pub use loader::{load_table, load_table_from_reader, DEFAULT_JURISDICTIONS_PATH};
