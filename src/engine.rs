//! Lending engine facade
//!
//! An explicit instance holding the record store, the jurisdiction table and
//! the optional risk source. Operations are synchronous. The store persists
//! whole collections, so every read-modify-write holds the guards of the
//! collections it touches, always taken in the order
//! offers -> requests -> contracts -> disputes.
//!
//! # Example
//! ```ignore
//! let engine = LendingEngine::new(MemoryStore::new(), ComplianceTable::default_table(), EngineConfig::default())
//!     .with_risk_source(Arc::new(source));
//!
//! let offer = engine.create_offer(new_offer)?;
//! let request = engine.submit_request(new_request)?;
//! let contract = engine.originate(&offer.id, &request.id, &NegotiatedTerms::default())?;
//! ```

use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{
    sort_offers, sort_requests, LendingOffer, LendingRequest, NewOffer, NewRequest, OfferFilter,
    OfferStatus, RequestFilter, RequestStatus,
};
use crate::clock::{Clock, SystemClock};
use crate::compliance::{ComplianceTable, ComplianceValidator};
use crate::config::EngineConfig;
use crate::contract::{ContractOriginator, LegalStatus, LoanContract, LoanPayment, NegotiatedTerms, Party};
use crate::dispute::{DisputeCase, DisputeManager, DisputeStatus, NewDispute};
use crate::error::{EntityKind, LendingError, LendingResult};
use crate::fees::{CostCalculator, CostDisclosure, OfferQuote};
use crate::ledger::{DelinquencyStatus, PaymentInput, PaymentLedger, SweepOutcome};
use crate::risk::{RiskAssessment, RiskDataSource, RiskModel};
use crate::schedule::{ScheduleCalculator, ScheduleTerms};
use crate::store::{self, Collection, Record, RecordStore};

/// A collection rewrite waiting to be committed
struct Staged {
    collection: Collection,
    before: Vec<Value>,
    after: Vec<Value>,
}

/// Loaded collection with its raw snapshot kept for rollback
struct Loaded<T> {
    before: Vec<Value>,
    records: Vec<T>,
}

impl<T: Record> Loaded<T> {
    fn stage(self) -> LendingResult<Staged> {
        Ok(Staged {
            collection: T::COLLECTION,
            before: self.before,
            after: store::encode_all(&self.records)?,
        })
    }
}

/// Peer-to-peer lending engine
pub struct LendingEngine<S: RecordStore> {
    store: S,
    validator: ComplianceValidator,
    config: EngineConfig,
    calculator: ScheduleCalculator,
    costs: CostCalculator,
    risk_source: Option<Arc<dyn RiskDataSource>>,
    clock: Arc<dyn Clock>,

    offers_lock: Mutex<()>,
    requests_lock: Mutex<()>,
    contracts_lock: Mutex<()>,
    disputes_lock: Mutex<()>,
}

impl<S: RecordStore> LendingEngine<S> {
    pub fn new(store: S, table: ComplianceTable, config: EngineConfig) -> Self {
        let calculator = ScheduleCalculator::new(config.amortization);
        Self {
            store,
            validator: ComplianceValidator::new(table),
            costs: CostCalculator::new(config.fees.clone(), calculator),
            calculator,
            config,
            risk_source: None,
            clock: Arc::new(SystemClock),
            offers_lock: Mutex::new(()),
            requests_lock: Mutex::new(()),
            contracts_lock: Mutex::new(()),
            disputes_lock: Mutex::new(()),
        }
    }

    /// Build from configuration, loading the jurisdiction table it names
    pub fn from_config(store: S, config: EngineConfig) -> LendingResult<Self> {
        config.validate()?;
        let table = match &config.jurisdictions_path {
            Some(path) => ComplianceTable::from_csv_path(path)?,
            None => ComplianceTable::default_table(),
        };
        if table.get(&config.default_jurisdiction).is_none() {
            return Err(LendingError::not_found(EntityKind::Jurisdiction, &config.default_jurisdiction));
        }
        Ok(Self::new(store, table, config))
    }

    pub fn with_risk_source(mut self, source: Arc<dyn RiskDataSource>) -> Self {
        self.risk_source = Some(source);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn validator(&self) -> &ComplianceValidator {
        &self.validator
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn guard<'a>(lock: &'a Mutex<()>, collection: Collection) -> LendingResult<MutexGuard<'a, ()>> {
        lock.lock()
            .map_err(|_| LendingError::Store(format!("{} lock poisoned", collection)))
    }

    fn load<T: Record>(&self) -> LendingResult<Loaded<T>> {
        let before = self.store.load(T::COLLECTION)?;
        let records = store::decode_all(before.clone())?;
        Ok(Loaded { before, records })
    }

    /// Save staged collections in order; on failure restore the ones already written
    fn commit(&self, staged: Vec<Staged>) -> LendingResult<()> {
        for (idx, item) in staged.iter().enumerate() {
            if let Err(e) = self.store.save(item.collection, item.after.clone()) {
                for done in staged[..idx].iter().rev() {
                    if let Err(restore) = self.store.save(done.collection, done.before.clone()) {
                        error!("Failed to restore {} after aborted write: {}", done.collection, restore);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    // ---- Offers ----

    /// Validate and publish a new offer
    pub fn create_offer(&self, input: NewOffer) -> LendingResult<LendingOffer> {
        let now = self.now();
        let jurisdiction = input
            .jurisdiction
            .clone()
            .unwrap_or_else(|| self.config.default_jurisdiction.clone())
            .trim()
            .to_uppercase();

        let offer = LendingOffer::from_new(input, jurisdiction, now)?;
        self.validator.check_offer(&offer)?;

        let _offers = Self::guard(&self.offers_lock, Collection::Offers)?;
        let mut offers: Vec<LendingOffer> = store::load_all(&self.store)?;
        offers.push(offer.clone());
        store::save_all(&self.store, &offers)?;

        info!(
            "Offer {} created by {}: {}..{} at {}% ({})",
            offer.id, offer.lender_id, offer.min_amount, offer.max_amount, offer.interest_rate, offer.jurisdiction
        );
        Ok(offer)
    }

    fn update_offer<F>(&self, offer_id: &str, operation: &'static str, apply: F) -> LendingResult<LendingOffer>
    where
        F: FnOnce(&mut LendingOffer, DateTime<Utc>) -> bool,
    {
        let now = self.now();
        let _offers = Self::guard(&self.offers_lock, Collection::Offers)?;
        let mut offers: Vec<LendingOffer> = store::load_all(&self.store)?;
        let offer = store::find_mut(&mut offers, offer_id)?;

        if !apply(offer, now) {
            return Err(LendingError::InvalidState {
                entity: EntityKind::Offer,
                id: offer.id.clone(),
                status: offer.status.as_str().to_string(),
                operation,
            });
        }
        let updated = offer.clone();

        store::save_all(&self.store, &offers)?;
        info!("Offer {} is now {}", updated.id, updated.status.as_str());
        Ok(updated)
    }

    pub fn pause_offer(&self, offer_id: &str) -> LendingResult<LendingOffer> {
        self.update_offer(offer_id, "pause", |offer, _| {
            if offer.status != OfferStatus::Active {
                return false;
            }
            offer.status = OfferStatus::Paused;
            true
        })
    }

    pub fn resume_offer(&self, offer_id: &str) -> LendingResult<LendingOffer> {
        self.update_offer(offer_id, "resume", |offer, now| {
            if offer.status != OfferStatus::Paused || offer.is_expired_at(now) {
                return false;
            }
            offer.status = if offer.available_amount.is_zero() {
                OfferStatus::Closed
            } else {
                OfferStatus::Active
            };
            true
        })
    }

    /// Mark offers past their expiry; returns the ids that changed
    pub fn expire_offers(&self) -> LendingResult<Vec<String>> {
        let now = self.now();
        let _offers = Self::guard(&self.offers_lock, Collection::Offers)?;
        let mut offers: Vec<LendingOffer> = store::load_all(&self.store)?;

        let mut expired = Vec::new();
        for offer in offers.iter_mut() {
            let live = matches!(offer.status, OfferStatus::Active | OfferStatus::Paused);
            if live && offer.is_expired_at(now) {
                offer.status = OfferStatus::Expired;
                expired.push(offer.id.clone());
            }
        }

        if !expired.is_empty() {
            store::save_all(&self.store, &offers)?;
            info!("Expired {} offers", expired.len());
        }
        Ok(expired)
    }

    /// Offers matching a filter, cheapest first
    pub fn offers(&self, filter: &OfferFilter) -> LendingResult<Vec<LendingOffer>> {
        let mut offers: Vec<LendingOffer> = store::load_all(&self.store)?;
        offers.retain(|o| filter.matches(o));
        sort_offers(&mut offers);
        Ok(offers)
    }

    pub fn offer(&self, offer_id: &str) -> LendingResult<LendingOffer> {
        let offers: Vec<LendingOffer> = store::load_all(&self.store)?;
        store::find(&offers, offer_id).cloned()
    }

    // ---- Requests ----

    /// Submit a request, assessing the borrower through the injected risk source
    pub fn submit_request(&self, input: NewRequest) -> LendingResult<LendingRequest> {
        let source = self
            .risk_source
            .as_ref()
            .ok_or_else(|| LendingError::MissingRiskAssessment(input.borrower_id.clone()))?;
        let assessment = source.assess(&input.borrower_id)?;
        self.submit_request_with_assessment(input, &assessment)
    }

    /// Submit a request with a caller-supplied assessment
    pub fn submit_request_with_assessment(
        &self,
        input: NewRequest,
        assessment: &RiskAssessment,
    ) -> LendingResult<LendingRequest> {
        input.validate()?;
        if assessment.borrower_id != input.borrower_id {
            return Err(LendingError::invalid(
                "assessment",
                format!("assessment is for {}, request is from {}", assessment.borrower_id, input.borrower_id),
            ));
        }
        let level = assessment.effective_level(&RiskModel::default());
        if !level.is_acceptable() {
            warn!("Request from {} rejected: risk level {}", input.borrower_id, level);
            return Err(LendingError::RiskRejection {
                borrower_id: input.borrower_id,
                level,
            });
        }
        self.validator
            .check_borrower_age(&self.config.default_jurisdiction, assessment.age)?;

        let request = LendingRequest::from_new(input, level, self.now())?;

        let _requests = Self::guard(&self.requests_lock, Collection::Requests)?;
        let mut requests: Vec<LendingRequest> = store::load_all(&self.store)?;
        requests.push(request.clone());
        store::save_all(&self.store, &requests)?;

        info!(
            "Request {} submitted by {} for {} ({} risk)",
            request.id, request.borrower_id, request.requested_amount, request.intake_risk_level
        );
        Ok(request)
    }

    pub fn withdraw_request(&self, request_id: &str) -> LendingResult<LendingRequest> {
        let _requests = Self::guard(&self.requests_lock, Collection::Requests)?;
        let mut requests: Vec<LendingRequest> = store::load_all(&self.store)?;
        let request = store::find_mut(&mut requests, request_id)?;

        if request.status != RequestStatus::Pending {
            return Err(LendingError::InvalidState {
                entity: EntityKind::Request,
                id: request.id.clone(),
                status: request.status.as_str().to_string(),
                operation: "withdraw",
            });
        }
        request.status = RequestStatus::Withdrawn;
        let updated = request.clone();

        store::save_all(&self.store, &requests)?;
        info!("Request {} withdrawn", updated.id);
        Ok(updated)
    }

    /// Requests matching a filter, most urgent first
    pub fn requests(&self, filter: &RequestFilter) -> LendingResult<Vec<LendingRequest>> {
        let mut requests: Vec<LendingRequest> = store::load_all(&self.store)?;
        requests.retain(|r| filter.matches(r));
        sort_requests(&mut requests);
        Ok(requests)
    }

    pub fn request(&self, request_id: &str) -> LendingResult<LendingRequest> {
        let requests: Vec<LendingRequest> = store::load_all(&self.store)?;
        store::find(&requests, request_id).cloned()
    }

    // ---- Origination and contract lifecycle ----

    /// Originate a contract, reassessing the borrower through the risk source when configured
    pub fn originate(
        &self,
        offer_id: &str,
        request_id: &str,
        terms: &NegotiatedTerms,
    ) -> LendingResult<LoanContract> {
        let assessment = match (&self.risk_source, self.config.reassess_at_origination) {
            (Some(source), true) => {
                let request = self.request(request_id)?;
                Some(source.assess(&request.borrower_id)?)
            }
            _ => None,
        };
        self.originate_locked(offer_id, request_id, terms, assessment.as_ref())
    }

    /// Originate a contract held to a caller-supplied assessment
    pub fn originate_with_assessment(
        &self,
        offer_id: &str,
        request_id: &str,
        terms: &NegotiatedTerms,
        assessment: &RiskAssessment,
    ) -> LendingResult<LoanContract> {
        self.originate_locked(offer_id, request_id, terms, Some(assessment))
    }

    fn originate_locked(
        &self,
        offer_id: &str,
        request_id: &str,
        terms: &NegotiatedTerms,
        assessment: Option<&RiskAssessment>,
    ) -> LendingResult<LoanContract> {
        let _offers = Self::guard(&self.offers_lock, Collection::Offers)?;
        let _requests = Self::guard(&self.requests_lock, Collection::Requests)?;
        let _contracts = Self::guard(&self.contracts_lock, Collection::Contracts)?;
        let now = self.now();

        let mut offers = self.load::<LendingOffer>()?;
        let mut requests = self.load::<LendingRequest>()?;
        let mut contracts = self.load::<LoanContract>()?;

        let contract = {
            let offer = store::find(&offers.records, offer_id)?;
            let request = store::find(&requests.records, request_id)?;
            ContractOriginator::new(&self.validator, self.calculator)
                .originate(offer, request, terms, assessment, now)?
        };

        store::find_mut(&mut offers.records, offer_id)?.reserve(contract.principal);
        store::find_mut(&mut requests.records, request_id)?.status = RequestStatus::Matched;
        contracts.records.push(contract.clone());

        self.commit(vec![offers.stage()?, requests.stage()?, contracts.stage()?])?;

        info!(
            "Contract {} originated: {} at {}% for {} days, offer {} -> request {}",
            contract.id, contract.principal, contract.interest_rate, contract.duration, offer_id, request_id
        );
        Ok(contract)
    }

    fn update_contract<F, T>(&self, contract_id: &str, apply: F) -> LendingResult<T>
    where
        F: FnOnce(&mut LoanContract, DateTime<Utc>) -> LendingResult<T>,
    {
        let now = self.now();
        let _contracts = Self::guard(&self.contracts_lock, Collection::Contracts)?;
        let mut contracts: Vec<LoanContract> = store::load_all(&self.store)?;
        let contract = store::find_mut(&mut contracts, contract_id)?;

        let out = apply(contract, now)?;

        store::save_all(&self.store, &contracts)?;
        Ok(out)
    }

    fn invalid_contract_state(contract: &LoanContract, operation: &'static str) -> LendingError {
        LendingError::InvalidState {
            entity: EntityKind::Contract,
            id: contract.id.clone(),
            status: contract.legal_status.to_string(),
            operation,
        }
    }

    /// Record a party's signature; the contract is `signed` once both have signed
    pub fn sign(&self, contract_id: &str, party: Party) -> LendingResult<LoanContract> {
        self.update_contract(contract_id, |contract, now| {
            if contract.legal_status != LegalStatus::Draft {
                return Err(Self::invalid_contract_state(contract, "sign"));
            }
            contract.digital_signatures.sign(party, now);
            if contract.digital_signatures.is_complete() {
                contract.legal_status = LegalStatus::Signed;
                info!("Contract {} signed by both parties", contract.id);
            }
            contract.touch(now);
            Ok(contract.clone())
        })
    }

    /// Move a signed contract whose start date has passed to `active`
    pub fn activate(&self, contract_id: &str) -> LendingResult<LoanContract> {
        self.update_contract(contract_id, |contract, now| {
            if contract.legal_status != LegalStatus::Signed || contract.start_date > now {
                return Err(Self::invalid_contract_state(contract, "activate"));
            }
            contract.legal_status = LegalStatus::Active;
            contract.touch(now);
            info!("Contract {} active", contract.id);
            Ok(contract.clone())
        })
    }

    /// Cancel a draft, or a signed contract inside its cooling-off period with no payments
    pub fn cancel(&self, contract_id: &str) -> LendingResult<LoanContract> {
        let _offers = Self::guard(&self.offers_lock, Collection::Offers)?;
        let _contracts = Self::guard(&self.contracts_lock, Collection::Contracts)?;
        let now = self.now();

        let mut offers = self.load::<LendingOffer>()?;
        let mut contracts = self.load::<LoanContract>()?;
        let contract = store::find_mut(&mut contracts.records, contract_id)?;

        let cancellable = match contract.legal_status {
            LegalStatus::Draft => true,
            LegalStatus::Signed => {
                let rules = self.validator.rules(&contract.jurisdiction)?;
                contract.payments.is_empty() && contract.in_cooling_off(now, rules.cooling_off_period_hours)
            }
            _ => false,
        };
        if !cancellable {
            return Err(Self::invalid_contract_state(contract, "cancel"));
        }

        contract.legal_status = LegalStatus::Cancelled;
        contract.touch(now);
        let cancelled = contract.clone();

        let mut staged = Vec::with_capacity(2);
        if self.config.restore_capacity_on_cancel {
            // The offer may have been removed from the store since origination
            if let Some(offer) = offers.records.iter_mut().find(|o| o.id == cancelled.offer_id) {
                offer.release(cancelled.principal);
                staged.push(offers.stage()?);
            }
        }
        staged.push(contracts.stage()?);
        self.commit(staged)?;

        info!("Contract {} cancelled", cancelled.id);
        Ok(cancelled)
    }

    pub fn contract(&self, contract_id: &str) -> LendingResult<LoanContract> {
        let contracts: Vec<LoanContract> = store::load_all(&self.store)?;
        store::find(&contracts, contract_id).cloned()
    }

    pub fn contracts_for_borrower(&self, borrower_id: &str) -> LendingResult<Vec<LoanContract>> {
        let mut contracts: Vec<LoanContract> = store::load_all(&self.store)?;
        contracts.retain(|c| c.borrower_id == borrower_id);
        contracts.sort_by_key(|c| c.created_at);
        Ok(contracts)
    }

    pub fn contracts_for_lender(&self, lender_id: &str) -> LendingResult<Vec<LoanContract>> {
        let mut contracts: Vec<LoanContract> = store::load_all(&self.store)?;
        contracts.retain(|c| c.lender_id == lender_id);
        contracts.sort_by_key(|c| c.created_at);
        Ok(contracts)
    }

    // ---- Payments ----

    pub fn record_payment(&self, contract_id: &str, input: PaymentInput) -> LendingResult<LoanPayment> {
        self.update_contract(contract_id, |contract, now| PaymentLedger::record(contract, input, now))
    }

    /// Mark overdue installments across every contract; returns the contracts that changed
    pub fn sweep_delinquency(&self) -> LendingResult<Vec<(String, SweepOutcome)>> {
        let now = self.now();
        let _contracts = Self::guard(&self.contracts_lock, Collection::Contracts)?;
        let mut contracts: Vec<LoanContract> = store::load_all(&self.store)?;

        let changed: Vec<(String, SweepOutcome)> = contracts
            .iter_mut()
            .filter_map(|c| {
                let outcome = PaymentLedger::sweep(c, now);
                (!outcome.is_empty()).then(|| (c.id.clone(), outcome))
            })
            .collect();

        if !changed.is_empty() {
            store::save_all(&self.store, &contracts)?;
            info!("Delinquency sweep updated {} contracts", changed.len());
        }
        Ok(changed)
    }

    pub fn delinquency(&self, contract_id: &str) -> LendingResult<DelinquencyStatus> {
        Ok(PaymentLedger::delinquency(&self.contract(contract_id)?, self.now()))
    }

    pub fn accrued_penalty(&self, contract_id: &str) -> LendingResult<Decimal> {
        Ok(PaymentLedger::accrued_penalty(&self.contract(contract_id)?, self.now()))
    }

    /// Late and collection fees owed on installments unpaid past their grace period
    pub fn late_charges(&self, contract_id: &str) -> LendingResult<Decimal> {
        let contract = self.contract(contract_id)?;
        let now = self.now();
        let grace = Duration::days(i64::from(contract.grace_period));

        let unpaid: Decimal = contract
            .repayment_schedule
            .unsettled()
            .filter(|e| now > e.due_date + grace)
            .map(|e| (e.amount - contract.paid_towards(e.installment_number)).max(Decimal::ZERO))
            .sum();

        if unpaid.is_zero() {
            return Ok(Decimal::ZERO);
        }
        Ok(self.costs.late_charges(unpaid))
    }

    // ---- Disputes ----

    pub fn open_dispute(&self, input: NewDispute) -> LendingResult<DisputeCase> {
        let _contracts = Self::guard(&self.contracts_lock, Collection::Contracts)?;
        let _disputes = Self::guard(&self.disputes_lock, Collection::Disputes)?;
        DisputeManager::new(&self.store).open(input, self.now())
    }

    pub fn record_dispute_outcome(
        &self,
        dispute_id: &str,
        status: DisputeStatus,
        note: &str,
    ) -> LendingResult<DisputeCase> {
        let _disputes = Self::guard(&self.disputes_lock, Collection::Disputes)?;
        DisputeManager::new(&self.store).record_outcome(dispute_id, status, note, self.now())
    }

    pub fn dispute(&self, dispute_id: &str) -> LendingResult<DisputeCase> {
        DisputeManager::new(&self.store).get(dispute_id)
    }

    pub fn disputes_for_loan(&self, loan_id: &str) -> LendingResult<Vec<DisputeCase>> {
        DisputeManager::new(&self.store).list_for_loan(loan_id)
    }

    // ---- Disclosure ----

    pub fn disclose(&self, terms: &ScheduleTerms) -> LendingResult<CostDisclosure> {
        self.costs.disclose(terms)
    }

    /// Quote every stored active offer able to fund the loan, cheapest APR first
    pub fn compare_offers(&self, principal: Decimal, duration: u32) -> LendingResult<Vec<OfferQuote>> {
        let now = self.now();
        let mut offers: Vec<LendingOffer> = store::load_all(&self.store)?;
        offers.retain(|o| o.is_open_at(now));
        Ok(self.costs.compare(&offers, principal, duration))
    }
}
