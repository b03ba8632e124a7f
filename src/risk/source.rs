//! Injection seam for external borrower risk data

use chrono::Utc;
use std::collections::HashMap;

use super::assessment::{BorrowerProfile, RiskAssessment, RiskModel};
use crate::error::{EntityKind, LendingError, LendingResult};

/// External source of borrower assessments (credit bureau, income verification)
///
/// Implementations must return real data or an error; they must never
/// invent a favorable score for an unknown borrower.
pub trait RiskDataSource: Send + Sync {
    /// Assess a borrower by id
    fn assess(&self, borrower_id: &str) -> LendingResult<RiskAssessment>;
}

/// Source backed by profiles supplied up front, scored with a [`RiskModel`]
#[derive(Debug, Clone, Default)]
pub struct StaticRiskSource {
    model: RiskModel,
    profiles: HashMap<String, BorrowerProfile>,
}

impl StaticRiskSource {
    pub fn new(model: RiskModel) -> Self {
        Self {
            model,
            profiles: HashMap::new(),
        }
    }

    /// Register or replace a borrower's profile
    pub fn insert(&mut self, profile: BorrowerProfile) {
        self.profiles.insert(profile.borrower_id.clone(), profile);
    }

    pub fn with_profile(mut self, profile: BorrowerProfile) -> Self {
        self.insert(profile);
        self
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl RiskDataSource for StaticRiskSource {
    fn assess(&self, borrower_id: &str) -> LendingResult<RiskAssessment> {
        let profile = self
            .profiles
            .get(borrower_id)
            .ok_or_else(|| LendingError::not_found(EntityKind::Borrower, borrower_id))?;
        Ok(self.model.assess(profile, Utc::now()))
    }
}
