//! Dispute cases attached to loan contracts
//!
//! Cases are append-only: outcomes add history events, nothing is removed.
//! Opening or resolving a dispute never changes the contract itself.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contract::LoanContract;
use crate::error::{EntityKind, LendingError, LendingResult};
use crate::store::{self, Collection, Record, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    Resolved,
    Rejected,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::UnderReview => "under_review",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Rejected => "rejected",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, DisputeStatus::Resolved | DisputeStatus::Rejected)
    }

    fn can_move_to(&self, next: DisputeStatus) -> bool {
        match (self, next) {
            (_, DisputeStatus::Open) => false,
            (DisputeStatus::Open, _) => true,
            (DisputeStatus::UnderReview, DisputeStatus::UnderReview) => false,
            (DisputeStatus::UnderReview, _) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeEvent {
    pub at: DateTime<Utc>,
    pub status: DisputeStatus,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeCase {
    pub id: String,
    pub loan_id: String,
    pub opened_by: String,
    pub reason: String,
    #[serde(default)]
    pub description: String,
    pub status: DisputeStatus,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<DisputeEvent>,
}

impl Record for DisputeCase {
    const COLLECTION: Collection = Collection::Disputes;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Caller input for a new dispute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDispute {
    pub loan_id: String,
    pub opened_by: String,
    pub reason: String,
    #[serde(default)]
    pub description: String,
}

/// Dispute case store operations
///
/// Callers serialise access to the disputes collection; the engine holds
/// its disputes guard around every call.
pub struct DisputeManager<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> DisputeManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Open a case against an existing contract
    pub fn open(&self, input: NewDispute, now: DateTime<Utc>) -> LendingResult<DisputeCase> {
        if input.reason.trim().is_empty() {
            return Err(LendingError::invalid("reason", "must not be empty"));
        }
        if input.opened_by.trim().is_empty() {
            return Err(LendingError::invalid("opened_by", "must not be empty"));
        }

        let contracts: Vec<LoanContract> = store::load_all(self.store)?;
        store::find(&contracts, &input.loan_id)?;

        let case = DisputeCase {
            id: uuid::Uuid::new_v4().to_string(),
            loan_id: input.loan_id,
            opened_by: input.opened_by,
            reason: input.reason,
            description: input.description,
            status: DisputeStatus::Open,
            opened_at: now,
            updated_at: now,
            history: vec![DisputeEvent {
                at: now,
                status: DisputeStatus::Open,
                note: String::new(),
            }],
        };

        let mut cases: Vec<DisputeCase> = store::load_all(self.store)?;
        cases.push(case.clone());
        store::save_all(self.store, &cases)?;

        info!("Dispute {} opened on contract {} by {}", case.id, case.loan_id, case.opened_by);
        Ok(case)
    }

    pub fn get(&self, dispute_id: &str) -> LendingResult<DisputeCase> {
        let cases: Vec<DisputeCase> = store::load_all(self.store)?;
        store::find(&cases, dispute_id).cloned()
    }

    /// Cases for a contract, oldest first
    pub fn list_for_loan(&self, loan_id: &str) -> LendingResult<Vec<DisputeCase>> {
        let mut cases: Vec<DisputeCase> = store::load_all(self.store)?;
        cases.retain(|c| c.loan_id == loan_id);
        cases.sort_by_key(|c| c.opened_at);
        Ok(cases)
    }

    /// Move a case forward and append the event to its history
    pub fn record_outcome(
        &self,
        dispute_id: &str,
        status: DisputeStatus,
        note: &str,
        now: DateTime<Utc>,
    ) -> LendingResult<DisputeCase> {
        let mut cases: Vec<DisputeCase> = store::load_all(self.store)?;
        let case = store::find_mut(&mut cases, dispute_id)?;

        if !case.status.can_move_to(status) {
            return Err(LendingError::InvalidState {
                entity: EntityKind::Dispute,
                id: case.id.clone(),
                status: case.status.to_string(),
                operation: "move to the requested status",
            });
        }

        case.status = status;
        case.updated_at = now;
        case.history.push(DisputeEvent {
            at: now,
            status,
            note: note.to_string(),
        });
        let updated = case.clone();

        store::save_all(self.store, &cases)?;
        info!("Dispute {} is now {}", updated.id, updated.status);
        Ok(updated)
    }
}
