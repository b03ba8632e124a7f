//! Loan contracts and their origination

mod model;
mod originator;

pub use model::{
    AllocatedAmount, DigitalSignatures, LegalStatus, LoanContract, LoanPayment, Party, PaymentAllocation,
};
pub use originator::{AgreedTerms, ContractOriginator, MatchError, NegotiatedTerms};
