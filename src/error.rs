//! Crate-wide error type
//!
//! Every failure the engine surfaces to its caller is a variant of
//! [`LendingError`]. Validation failures are always detected before any
//! record store write.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::compliance::ComplianceError;
use crate::contract::MatchError;
use crate::risk::RiskLevel;

/// Result alias used throughout the crate
pub type LendingResult<T> = Result<T, LendingError>;

/// Kind of entity referenced by a lookup failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Offer,
    Request,
    Contract,
    Dispute,
    Jurisdiction,
    Borrower,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Offer => "offer",
            EntityKind::Request => "request",
            EntityKind::Contract => "contract",
            EntityKind::Dispute => "dispute",
            EntityKind::Jurisdiction => "jurisdiction",
            EntityKind::Borrower => "borrower",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the lending engine
#[derive(Debug, Error)]
pub enum LendingError {
    /// Terms exceed a jurisdiction ceiling
    #[error(transparent)]
    Compliance(#[from] ComplianceError),

    /// Borrower risk too high to accept a request or contract
    #[error("borrower {borrower_id} rejected: risk level {level}")]
    RiskRejection { borrower_id: String, level: RiskLevel },

    /// Offer and request (or negotiated terms) are incompatible
    #[error(transparent)]
    Match(#[from] MatchError),

    /// Unknown id
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// Payment exceeds the remaining balance
    #[error("payment of {attempted} exceeds remaining balance {remaining}")]
    Overpayment { attempted: Decimal, remaining: Decimal },

    /// Malformed caller input
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Operation not permitted in the entity's current status
    #[error("{entity} {id} is {status}; cannot {operation}")]
    InvalidState {
        entity: EntityKind,
        id: String,
        status: String,
        operation: &'static str,
    },

    /// No injected risk source and no explicit assessment supplied
    #[error("no risk assessment available for borrower {0}")]
    MissingRiskAssessment(String),

    /// Record store failure (including poisoned locks)
    #[error("record store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl LendingError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        LendingError::NotFound { kind, id: id.into() }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        LendingError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
