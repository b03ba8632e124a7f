//! Payment ledger: recording payments and tracking delinquency
//!
//! All checks run before the contract is touched, so a rejected payment
//! leaves the contract exactly as it was.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::contract::{AllocatedAmount, LegalStatus, LoanContract, LoanPayment, PaymentAllocation};
use crate::error::{EntityKind, LendingError, LendingResult};
use crate::money::simple_interest;
use crate::schedule::{EntryStatus, PaymentScheduleEntry};

/// A payment as reported by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    /// principal + interest
    pub amount: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    pub paid_at: DateTime<Utc>,
    /// Installment to apply the payment to; earliest unsettled when absent
    #[serde(default)]
    pub installment: Option<u32>,
}

/// Where the earliest unsettled installment stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelinquencyStatus {
    /// Not yet due, or nothing left to pay
    Current,
    InGrace,
    InPenalty,
    InDefault,
}

/// Changes applied by a delinquency sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub marked_late: Vec<u32>,
    pub marked_defaulted: Vec<u32>,
    pub contract_defaulted: bool,
}

impl SweepOutcome {
    pub fn is_empty(&self) -> bool {
        self.marked_late.is_empty() && self.marked_defaulted.is_empty() && !self.contract_defaulted
    }
}

/// Stateless ledger operations over a contract
pub struct PaymentLedger;

impl PaymentLedger {
    fn grace_end(contract: &LoanContract, entry: &PaymentScheduleEntry) -> DateTime<Utc> {
        entry.due_date + Duration::days(i64::from(contract.grace_period))
    }

    fn penalty_end(contract: &LoanContract, entry: &PaymentScheduleEntry) -> DateTime<Utc> {
        Self::grace_end(contract, entry) + Duration::days(i64::from(contract.max_penalty_duration))
    }

    /// Timing status of an installment paid (or looked at) at `at`
    fn timing_status(contract: &LoanContract, entry: &PaymentScheduleEntry, at: DateTime<Utc>) -> EntryStatus {
        if at <= Self::grace_end(contract, entry) {
            EntryStatus::Paid
        } else if at <= Self::penalty_end(contract, entry) {
            EntryStatus::Late
        } else {
            EntryStatus::Defaulted
        }
    }

    fn validate(contract: &LoanContract, input: &PaymentInput) -> LendingResult<()> {
        if !contract.legal_status.accepts_payments() {
            return Err(LendingError::InvalidState {
                entity: EntityKind::Contract,
                id: contract.id.clone(),
                status: contract.legal_status.to_string(),
                operation: "record a payment",
            });
        }
        if input.amount <= Decimal::ZERO {
            return Err(LendingError::invalid("amount", format!("{} must be positive", input.amount)));
        }
        if input.principal.is_sign_negative() || input.interest.is_sign_negative() {
            return Err(LendingError::invalid("principal/interest", "must not be negative"));
        }
        if input.amount != input.principal + input.interest {
            return Err(LendingError::invalid(
                "amount",
                format!(
                    "{} does not equal principal {} + interest {}",
                    input.amount, input.principal, input.interest
                ),
            ));
        }
        if input.amount > contract.remaining_amount {
            warn!(
                "Overpayment on contract {}: {} > remaining {}",
                contract.id, input.amount, contract.remaining_amount
            );
            return Err(LendingError::Overpayment {
                attempted: input.amount,
                remaining: contract.remaining_amount,
            });
        }
        if let Some(n) = input.installment {
            match contract.repayment_schedule.get(n) {
                None => {
                    return Err(LendingError::invalid("installment", format!("contract has no installment {}", n)))
                }
                Some(entry) if entry.is_settled() => {
                    return Err(LendingError::invalid("installment", format!("installment {} is already settled", n)))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Spread a payment over unsettled installments and settle those it covers
    ///
    /// The named installment (or the earliest unsettled one) is served first,
    /// then the remaining unsettled installments in schedule order. Anything
    /// left once every installment is covered is unscheduled.
    fn allocate(contract: &mut LoanContract, input: &PaymentInput) -> Vec<AllocatedAmount> {
        let first = input
            .installment
            .or_else(|| contract.repayment_schedule.first_unsettled().map(|e| e.installment_number));
        let mut order: Vec<u32> = first.into_iter().collect();
        order.extend(
            contract
                .repayment_schedule
                .unsettled()
                .map(|e| e.installment_number)
                .filter(|n| Some(*n) != first),
        );

        let mut left = input.amount;
        let mut splits = Vec::new();
        for n in order {
            if left <= Decimal::ZERO {
                break;
            }
            let (owed, status) = match contract.repayment_schedule.get(n) {
                Some(entry) => (
                    (entry.amount - contract.paid_towards(n)).max(Decimal::ZERO),
                    Self::timing_status(contract, entry, input.paid_at),
                ),
                None => continue,
            };
            if owed.is_zero() {
                continue;
            }

            let applied = left.min(owed);
            left -= applied;
            let allocation = if applied == owed {
                contract.repayment_schedule.settle(n, status, input.paid_at);
                PaymentAllocation::Scheduled(n)
            } else {
                PaymentAllocation::Partial(n)
            };
            splits.push(AllocatedAmount { allocation, amount: applied });
        }

        if left > Decimal::ZERO {
            splits.push(AllocatedAmount {
                allocation: PaymentAllocation::Unscheduled,
                amount: left,
            });
        }
        splits
    }

    /// Record a payment against a contract
    pub fn record(
        contract: &mut LoanContract,
        input: PaymentInput,
        now: DateTime<Utc>,
    ) -> LendingResult<LoanPayment> {
        Self::validate(contract, &input)?;

        if contract.legal_status == LegalStatus::Signed && contract.start_date <= now {
            contract.legal_status = LegalStatus::Active;
        }

        let splits = Self::allocate(contract, &input);
        let allocation = splits
            .first()
            .map(|s| s.allocation)
            .unwrap_or(PaymentAllocation::Unscheduled);

        let payment = LoanPayment {
            id: uuid::Uuid::new_v4().to_string(),
            paid_at: input.paid_at,
            amount: input.amount,
            principal: input.principal,
            interest: input.interest,
            allocation,
            splits,
            recorded_at: now,
        };

        contract.payments.push(payment.clone());
        // Remaining is the whole obligation, interest included
        contract.remaining_amount -= input.amount;
        contract.outstanding_principal = (contract.outstanding_principal - input.principal).max(Decimal::ZERO);

        debug!(
            "Payment {} on contract {} ({:?}): remaining {}",
            input.amount, contract.id, payment.splits, contract.remaining_amount
        );

        if contract.remaining_amount.is_zero() {
            let open: Vec<u32> = contract
                .repayment_schedule
                .unsettled()
                .map(|e| e.installment_number)
                .collect();
            for n in open {
                contract.repayment_schedule.settle(n, EntryStatus::Paid, input.paid_at);
            }
            contract.outstanding_principal = Decimal::ZERO;
            contract.legal_status = LegalStatus::Completed;
            info!("Contract {} completed", contract.id);
        }

        contract.touch(now);
        Ok(payment)
    }

    /// Mark overdue unsettled installments late or defaulted
    ///
    /// A defaulted installment moves a signed or active contract to `defaulted`.
    pub fn sweep(contract: &mut LoanContract, as_of: DateTime<Utc>) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        if !contract.legal_status.accepts_payments() {
            return outcome;
        }

        let overdue: Vec<(u32, EntryStatus)> = contract
            .repayment_schedule
            .unsettled()
            .filter(|e| as_of > Self::grace_end(contract, e))
            .map(|e| (e.installment_number, Self::timing_status(contract, e, as_of)))
            .filter(|(n, status)| contract.repayment_schedule.get(*n).map(|e| e.status) != Some(*status))
            .collect();

        for (n, status) in overdue {
            contract.repayment_schedule.set_status(n, status);
            match status {
                EntryStatus::Defaulted => outcome.marked_defaulted.push(n),
                _ => outcome.marked_late.push(n),
            }
        }

        let any_defaulted = contract
            .repayment_schedule
            .unsettled()
            .any(|e| e.status == EntryStatus::Defaulted);
        if any_defaulted {
            contract.legal_status = LegalStatus::Defaulted;
            outcome.contract_defaulted = true;
            warn!("Contract {} defaulted", contract.id);
        }

        if !outcome.is_empty() {
            contract.touch(as_of);
        }
        outcome
    }

    /// Delinquency of the earliest unsettled installment
    pub fn delinquency(contract: &LoanContract, as_of: DateTime<Utc>) -> DelinquencyStatus {
        match contract.repayment_schedule.first_unsettled() {
            None => DelinquencyStatus::Current,
            Some(entry) if as_of <= entry.due_date => DelinquencyStatus::Current,
            Some(entry) if as_of <= Self::grace_end(contract, entry) => DelinquencyStatus::InGrace,
            Some(entry) if as_of <= Self::penalty_end(contract, entry) => DelinquencyStatus::InPenalty,
            Some(_) => DelinquencyStatus::InDefault,
        }
    }

    /// Penalty interest accrued on overdue unsettled installments
    ///
    /// `unpaid × penalty_rate × days / 365` per installment, with penalty days
    /// counted from the end of grace and capped at `max_penalty_duration`.
    pub fn accrued_penalty(contract: &LoanContract, as_of: DateTime<Utc>) -> Decimal {
        contract
            .repayment_schedule
            .unsettled()
            .filter_map(|entry| {
                let overdue_days = (as_of - Self::grace_end(contract, entry)).num_days();
                if overdue_days <= 0 {
                    return None;
                }
                let days = u32::try_from(overdue_days)
                    .unwrap_or(u32::MAX)
                    .min(contract.max_penalty_duration);
                let unpaid = (entry.amount - contract.paid_towards(entry.installment_number)).max(Decimal::ZERO);
                Some(simple_interest(unpaid, contract.penalty_rate, days))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LendingOffer, LendingRequest, NewOffer, NewRequest, Urgency};
    use crate::compliance::ComplianceValidator;
    use crate::contract::{ContractOriginator, NegotiatedTerms, Party};
    use crate::risk::RiskLevel;
    use crate::schedule::{AmortizationMethod, InstallmentFrequency, RepaymentType, ScheduleCalculator};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn contract(repayment_type: RepaymentType) -> LoanContract {
        contract_with(repayment_type, ScheduleCalculator::default())
    }

    fn contract_with(repayment_type: RepaymentType, calculator: ScheduleCalculator) -> LoanContract {
        let offer = LendingOffer::from_new(
            NewOffer {
                lender_id: "lender-1".to_string(),
                min_amount: dec!(1000),
                max_amount: dec!(10000),
                min_duration: 30,
                max_duration: 365,
                interest_rate: dec!(8.5),
                repayment_type,
                installment_frequency: InstallmentFrequency::Monthly,
                grace_period: 5,
                penalty_rate: dec!(12),
                max_penalty_duration: 60,
                total_offered: dec!(20000),
                category: None,
                jurisdiction: None,
                expires_at: None,
            },
            "FR".to_string(),
            start(),
        )
        .unwrap();
        let request = LendingRequest::from_new(
            NewRequest {
                borrower_id: "borrower-1".to_string(),
                requested_amount: dec!(3000),
                max_interest_rate: dec!(10),
                preferred_duration: 180,
                max_duration: 180,
                accepted_repayment_types: vec![RepaymentType::LumpSum, RepaymentType::Installments],
                purpose: String::new(),
                urgency: Urgency::Low,
            },
            RiskLevel::Low,
            start(),
        )
        .unwrap();

        let validator = ComplianceValidator::default();
        let mut contract = ContractOriginator::new(&validator, calculator)
            .originate(&offer, &request, &NegotiatedTerms::default(), None, start())
            .unwrap();
        contract.digital_signatures.sign(Party::Lender, start());
        contract.digital_signatures.sign(Party::Borrower, start());
        contract.legal_status = LegalStatus::Signed;
        contract
    }

    fn pay(entry: &PaymentScheduleEntry, at: DateTime<Utc>) -> PaymentInput {
        PaymentInput {
            amount: entry.amount,
            principal: entry.principal,
            interest: entry.interest,
            paid_at: at,
            installment: None,
        }
    }

    #[test]
    fn test_on_time_installment() {
        let mut c = contract(RepaymentType::Installments);
        let first = c.repayment_schedule.entries()[0].clone();

        let payment = PaymentLedger::record(&mut c, pay(&first, first.due_date), first.due_date).unwrap();

        assert_eq!(payment.allocation, PaymentAllocation::Scheduled(1));
        assert_eq!(c.legal_status, LegalStatus::Active);
        assert_eq!(c.repayment_schedule.entries()[0].status, EntryStatus::Paid);
        assert_eq!(c.remaining_amount, c.total_amount - first.amount);
        assert_eq!(c.outstanding_principal, dec!(3000) - first.principal);
    }

    #[test]
    fn test_late_and_defaulted_settlement() {
        let mut c = contract(RepaymentType::Installments);
        let first = c.repayment_schedule.entries()[0].clone();
        let second = c.repayment_schedule.entries()[1].clone();

        let late_at = first.due_date + Duration::days(10);
        PaymentLedger::record(&mut c, pay(&first, late_at), late_at).unwrap();
        assert_eq!(c.repayment_schedule.entries()[0].status, EntryStatus::Late);

        let very_late = second.due_date + Duration::days(5 + 60 + 1);
        PaymentLedger::record(&mut c, pay(&second, very_late), very_late).unwrap();
        assert_eq!(c.repayment_schedule.entries()[1].status, EntryStatus::Defaulted);
    }

    #[test]
    fn test_partial_payments_accumulate() {
        let mut c = contract(RepaymentType::Installments);
        let first = c.repayment_schedule.entries()[0].clone();
        let half = PaymentInput {
            amount: dec!(200),
            principal: dec!(200),
            interest: Decimal::ZERO,
            paid_at: start(),
            installment: Some(1),
        };

        let p = PaymentLedger::record(&mut c, half.clone(), start()).unwrap();
        assert_eq!(p.allocation, PaymentAllocation::Partial(1));
        assert_eq!(c.repayment_schedule.entries()[0].status, EntryStatus::Pending);
        assert!(!c.repayment_schedule.entries()[0].is_settled());

        let rest = first.amount - dec!(200);
        let p = PaymentLedger::record(
            &mut c,
            PaymentInput {
                amount: rest,
                principal: rest,
                interest: Decimal::ZERO,
                ..half
            },
            start(),
        )
        .unwrap();
        assert_eq!(p.allocation, PaymentAllocation::Scheduled(1));
        assert!(c.repayment_schedule.entries()[0].is_settled());
    }

    #[test]
    fn test_prepayment_settles_following_installments() {
        let mut c = contract(RepaymentType::Installments);
        let first = c.repayment_schedule.entries()[0].clone();
        let second = c.repayment_schedule.entries()[1].clone();
        let both = PaymentInput {
            amount: first.amount + second.amount,
            principal: first.principal + second.principal,
            interest: first.interest + second.interest,
            paid_at: first.due_date,
            installment: None,
        };

        let payment = PaymentLedger::record(&mut c, both, first.due_date).unwrap();

        assert_eq!(payment.allocation, PaymentAllocation::Scheduled(1));
        let applied: Vec<PaymentAllocation> = payment.splits.iter().map(|s| s.allocation).collect();
        assert_eq!(
            applied,
            vec![PaymentAllocation::Scheduled(1), PaymentAllocation::Scheduled(2)]
        );
        assert!(c.repayment_schedule.entries()[1].is_settled());
        assert_eq!(c.paid_towards(2), second.amount);

        // Well past the second due date only the later installments are overdue
        let outcome = PaymentLedger::sweep(&mut c, second.due_date + Duration::days(70));
        assert_eq!(outcome.marked_late, vec![3, 4]);
        assert!(outcome.marked_defaulted.is_empty());
        assert!(!outcome.contract_defaulted);
        assert_eq!(c.legal_status, LegalStatus::Active);

        let third = c.repayment_schedule.entries()[2].clone();
        let at = second.due_date + Duration::days(70);
        PaymentLedger::record(&mut c, pay(&third, at), at).unwrap();
        assert!(c.repayment_schedule.entries()[2].is_settled());
    }

    #[test]
    fn test_excess_carries_into_next_installment() {
        let mut c = contract(RepaymentType::Installments);
        let first = c.repayment_schedule.entries()[0].clone();
        let input = PaymentInput {
            amount: first.amount + dec!(100),
            principal: first.principal + dec!(100),
            interest: first.interest,
            paid_at: start(),
            installment: None,
        };

        let payment = PaymentLedger::record(&mut c, input, start()).unwrap();

        assert_eq!(
            payment.splits,
            vec![
                AllocatedAmount {
                    allocation: PaymentAllocation::Scheduled(1),
                    amount: first.amount,
                },
                AllocatedAmount {
                    allocation: PaymentAllocation::Partial(2),
                    amount: dec!(100),
                },
            ]
        );
        assert!(!c.repayment_schedule.entries()[1].is_settled());
        assert_eq!(c.paid_towards(2), dec!(100));
    }

    #[test]
    fn test_full_repayment_completes() {
        let mut c = contract(RepaymentType::LumpSum);
        let total = c.total_amount;
        let input = PaymentInput {
            amount: total,
            principal: dec!(3000),
            interest: total - dec!(3000),
            paid_at: start(),
            installment: None,
        };

        PaymentLedger::record(&mut c, input, start()).unwrap();

        assert_eq!(c.legal_status, LegalStatus::Completed);
        assert_eq!(c.remaining_amount, Decimal::ZERO);
        assert!(c.repayment_schedule.unsettled().next().is_none());
    }

    #[test]
    fn test_linear_balance_schedule_pays_off() {
        let mut c = contract_with(
            RepaymentType::Installments,
            ScheduleCalculator::new(AmortizationMethod::LinearBalance),
        );
        assert_eq!(c.total_amount, c.repayment_schedule.total_amount());

        let entries = c.repayment_schedule.entries().to_vec();
        for entry in &entries {
            PaymentLedger::record(&mut c, pay(entry, entry.due_date), entry.due_date).unwrap();
        }

        assert_eq!(c.legal_status, LegalStatus::Completed);
        assert!(c.remaining_amount.is_zero());
        assert!(c.outstanding_principal.is_zero());
        assert!(c.repayment_schedule.entries().iter().all(|e| e.status == EntryStatus::Paid));
    }

    #[test]
    fn test_principal_equal_to_remaining_completes() {
        let mut c = contract(RepaymentType::LumpSum);
        let remaining = c.remaining_amount;

        PaymentLedger::record(
            &mut c,
            PaymentInput {
                amount: remaining,
                principal: remaining,
                interest: Decimal::ZERO,
                paid_at: start(),
                installment: None,
            },
            start(),
        )
        .unwrap();

        assert_eq!(c.legal_status, LegalStatus::Completed);
    }

    #[test]
    fn test_interest_on_top_of_remaining_is_overpayment() {
        let mut c = contract(RepaymentType::LumpSum);
        let remaining = c.remaining_amount;

        // Remaining covers interest already, so interest on top overshoots it
        let err = PaymentLedger::record(
            &mut c,
            PaymentInput {
                amount: remaining + dec!(1),
                principal: remaining,
                interest: dec!(1),
                paid_at: start(),
                installment: None,
            },
            start(),
        )
        .unwrap_err();

        assert!(matches!(err, LendingError::Overpayment { .. }));
        assert_eq!(c.remaining_amount, remaining);
        assert!(c.payments.is_empty());
    }

    #[test]
    fn test_overpayment_leaves_contract_untouched() {
        let mut c = contract(RepaymentType::Installments);
        let before = c.clone();
        let too_much = c.remaining_amount + dec!(0.01);

        let err = PaymentLedger::record(
            &mut c,
            PaymentInput {
                amount: too_much,
                principal: too_much,
                interest: Decimal::ZERO,
                paid_at: start(),
                installment: None,
            },
            start(),
        )
        .unwrap_err();

        assert!(matches!(err, LendingError::Overpayment { .. }));
        assert_eq!(c, before);
    }

    #[test]
    fn test_amount_must_equal_components() {
        let mut c = contract(RepaymentType::Installments);
        let err = PaymentLedger::record(
            &mut c,
            PaymentInput {
                amount: dec!(100),
                principal: dec!(90),
                interest: dec!(5),
                paid_at: start(),
                installment: None,
            },
            start(),
        )
        .unwrap_err();

        assert!(matches!(err, LendingError::InvalidInput { field: "amount", .. }));
        assert!(c.payments.is_empty());
    }

    #[test]
    fn test_draft_rejects_payments() {
        let mut c = contract(RepaymentType::Installments);
        c.legal_status = LegalStatus::Draft;
        let first = c.repayment_schedule.entries()[0].clone();

        let err = PaymentLedger::record(&mut c, pay(&first, start()), start()).unwrap_err();
        assert!(matches!(err, LendingError::InvalidState { .. }));
    }

    #[test]
    fn test_sweep_boundaries() {
        let mut c = contract(RepaymentType::Installments);
        c.legal_status = LegalStatus::Active;
        let due = c.repayment_schedule.entries()[0].due_date;

        // Last instant of grace: nothing changes
        assert!(PaymentLedger::sweep(&mut c, due + Duration::days(5)).is_empty());

        let outcome = PaymentLedger::sweep(&mut c, due + Duration::days(6));
        assert_eq!(outcome.marked_late, vec![1]);
        assert_eq!(c.legal_status, LegalStatus::Active);

        let outcome = PaymentLedger::sweep(&mut c, due + Duration::days(66));
        assert!(outcome.marked_defaulted.contains(&1));
        assert!(outcome.contract_defaulted);
        assert_eq!(c.legal_status, LegalStatus::Defaulted);
    }

    #[test]
    fn test_delinquency() {
        let c = contract(RepaymentType::Installments);
        let due = c.repayment_schedule.entries()[0].due_date;

        assert_eq!(PaymentLedger::delinquency(&c, due), DelinquencyStatus::Current);
        assert_eq!(PaymentLedger::delinquency(&c, due + Duration::days(3)), DelinquencyStatus::InGrace);
        assert_eq!(PaymentLedger::delinquency(&c, due + Duration::days(30)), DelinquencyStatus::InPenalty);
        assert_eq!(PaymentLedger::delinquency(&c, due + Duration::days(70)), DelinquencyStatus::InDefault);
    }

    #[test]
    fn test_accrued_penalty_capped() {
        let c = contract(RepaymentType::LumpSum);
        let entry = c.repayment_schedule.entries()[0].clone();
        let grace_end = entry.due_date + Duration::days(5);

        assert_eq!(PaymentLedger::accrued_penalty(&c, grace_end), Decimal::ZERO);

        let expected = simple_interest(entry.amount, dec!(12), 30);
        assert_eq!(PaymentLedger::accrued_penalty(&c, grace_end + Duration::days(30)), expected);

        // Capped at max_penalty_duration (60 days)
        let capped = simple_interest(entry.amount, dec!(12), 60);
        assert_eq!(PaymentLedger::accrued_penalty(&c, grace_end + Duration::days(400)), capped);
    }
}
