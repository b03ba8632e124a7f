//! Cost and fee calculation

pub mod apr;
mod calculator;

pub use calculator::{CostCalculator, CostDisclosure, FeeSchedule, OfferQuote};
