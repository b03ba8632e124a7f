//! Repayment schedule calculation

mod calculator;
mod entry;

pub use calculator::{
    AmortizationMethod, InstallmentFrequency, InstallmentSplit, RepaymentType, ScheduleCalculator,
    ScheduleTerms,
};
pub use entry::{EntryStatus, PaymentSchedule, PaymentScheduleEntry};
