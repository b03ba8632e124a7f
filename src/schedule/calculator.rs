//! Repayment schedule calculator
//!
//! Turns (principal, rate, duration, repayment policy) into an ordered list of
//! installments. Pure: identical inputs and start date always produce an
//! identical schedule.

use chrono::{DateTime, Duration, Months, Utc};
use log::debug;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use super::entry::{EntryStatus, PaymentSchedule, PaymentScheduleEntry};
use crate::error::{LendingError, LendingResult};
use crate::money::{pct, round_money, simple_interest};

/// Repayment policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentType {
    /// Single payment of principal plus simple interest at maturity
    LumpSum,
    /// Level installments
    Installments,
}

/// Installment period length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl InstallmentFrequency {
    /// Days covered by one period
    pub fn period_days(&self) -> u32 {
        match self {
            InstallmentFrequency::Weekly => 7,
            InstallmentFrequency::Biweekly => 14,
            InstallmentFrequency::Monthly => 30,
        }
    }

    /// Periods used to convert the annual rate into a periodic rate
    pub fn periods_per_year(&self) -> u32 {
        match self {
            InstallmentFrequency::Weekly => 52,
            InstallmentFrequency::Biweekly => 26,
            InstallmentFrequency::Monthly => 12,
        }
    }
}

impl Default for InstallmentFrequency {
    fn default() -> Self {
        InstallmentFrequency::Monthly
    }
}

/// How each installment is split into principal and interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationMethod {
    /// Textbook amortization: interest on the true outstanding balance,
    /// principal is the rest of the level payment, final installment clears
    /// the rounding residual
    Standard,
    /// Compatibility mode: interest on a linearly reduced balance
    /// `P - (P/n)(k-1)`, principal = level payment - interest; the final
    /// installment is shortened to the principal still unpaid
    LinearBalance,
}

impl Default for AmortizationMethod {
    fn default() -> Self {
        AmortizationMethod::Standard
    }
}

/// Loan terms the calculator works from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleTerms {
    pub principal: Decimal,
    /// Annual percentage
    pub annual_rate: Decimal,
    /// Days
    pub duration: u32,
    pub repayment_type: RepaymentType,
    pub frequency: InstallmentFrequency,
}

/// One installment's amounts before dates are attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstallmentSplit {
    pub amount: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
}

/// Schedule calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleCalculator {
    method: AmortizationMethod,
}

impl ScheduleCalculator {
    pub fn new(method: AmortizationMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> AmortizationMethod {
        self.method
    }

    /// Number of installments: ceil(duration / period_days)
    pub fn period_count(duration: u32, frequency: InstallmentFrequency) -> u32 {
        duration.div_ceil(frequency.period_days())
    }

    /// Level payment `P·i·(1+i)^n / ((1+i)^n − 1)`, or `P/n` at zero rate
    pub fn level_payment(principal: Decimal, periodic_rate: Decimal, n: u32) -> LendingResult<Decimal> {
        if n == 0 {
            return Err(LendingError::invalid("periods", "must be at least 1"));
        }
        let periods = Decimal::from(n);

        if periodic_rate.is_zero() {
            return Ok(principal / periods);
        }

        let growth = (Decimal::ONE + periodic_rate)
            .checked_powi(i64::from(n))
            .ok_or_else(|| LendingError::invalid("periods", format!("(1+i)^{} overflows", n)))?;

        Ok(principal * periodic_rate * growth / (growth - Decimal::ONE))
    }

    fn validate(terms: &ScheduleTerms) -> LendingResult<()> {
        if terms.principal <= Decimal::ZERO {
            return Err(LendingError::invalid("principal", format!("{} must be positive", terms.principal)));
        }
        if terms.annual_rate.is_sign_negative() {
            return Err(LendingError::invalid("interest_rate", format!("{} must not be negative", terms.annual_rate)));
        }
        if terms.duration == 0 {
            return Err(LendingError::invalid("duration", "must be at least one day"));
        }
        Ok(())
    }

    /// Installment amounts without dates
    pub fn splits(&self, terms: &ScheduleTerms) -> LendingResult<Vec<InstallmentSplit>> {
        Self::validate(terms)?;

        match terms.repayment_type {
            RepaymentType::LumpSum => {
                let interest = simple_interest(terms.principal, terms.annual_rate, terms.duration);
                Ok(vec![InstallmentSplit {
                    amount: terms.principal + interest,
                    principal: terms.principal,
                    interest,
                }])
            }
            RepaymentType::Installments => {
                let n = Self::period_count(terms.duration, terms.frequency);
                let periodic_rate =
                    pct(terms.annual_rate) / Decimal::from(terms.frequency.periods_per_year());
                let payment = round_money(Self::level_payment(terms.principal, periodic_rate, n)?);

                debug!(
                    "Amortizing {} at {}% over {} periods ({:?}): level payment {}",
                    terms.principal, terms.annual_rate, n, self.method, payment
                );

                Ok(match self.method {
                    AmortizationMethod::Standard => {
                        Self::standard_splits(terms.principal, periodic_rate, payment, n)
                    }
                    AmortizationMethod::LinearBalance => {
                        Self::linear_balance_splits(terms.principal, periodic_rate, payment, n)
                    }
                })
            }
        }
    }

    fn standard_splits(
        principal: Decimal,
        periodic_rate: Decimal,
        payment: Decimal,
        n: u32,
    ) -> Vec<InstallmentSplit> {
        let mut balance = principal;
        let mut splits = Vec::with_capacity(n as usize);

        for k in 1..=n {
            let interest = round_money(balance * periodic_rate);
            let principal_part = if k == n {
                balance
            } else {
                (payment - interest).max(Decimal::ZERO).min(balance)
            };

            splits.push(InstallmentSplit {
                amount: principal_part + interest,
                principal: principal_part,
                interest,
            });
            balance -= principal_part;
        }

        splits
    }

    fn linear_balance_splits(
        principal: Decimal,
        periodic_rate: Decimal,
        payment: Decimal,
        n: u32,
    ) -> Vec<InstallmentSplit> {
        let step = principal / Decimal::from(n);
        let mut unpaid = principal;
        let mut splits = Vec::with_capacity(n as usize);

        for k in 1..=n {
            let balance = principal - step * Decimal::from(k - 1);
            let interest = round_money(balance * periodic_rate).min(payment);
            let principal_part = if k == n {
                unpaid
            } else {
                (payment - interest).min(unpaid)
            };

            splits.push(InstallmentSplit {
                amount: principal_part + interest,
                principal: principal_part,
                interest,
            });
            unpaid -= principal_part;
        }

        splits
    }

    /// Due date of installment `number`: calendar months after `start` for
    /// monthly schedules, fixed 7/14-day steps otherwise
    fn due_date(terms: &ScheduleTerms, start: DateTime<Utc>, number: u32) -> LendingResult<DateTime<Utc>> {
        let due = match (terms.repayment_type, terms.frequency) {
            (RepaymentType::LumpSum, _) => Some(start + Duration::days(i64::from(terms.duration))),
            (RepaymentType::Installments, InstallmentFrequency::Monthly) => {
                start.checked_add_months(Months::new(number))
            }
            (RepaymentType::Installments, frequency) => {
                Some(start + Duration::days(i64::from(frequency.period_days() * number)))
            }
        };
        due.ok_or_else(|| LendingError::invalid("start_date", format!("installment {} falls out of range", number)))
    }

    /// Full schedule with due dates counted from `start`
    pub fn build(&self, terms: &ScheduleTerms, start: DateTime<Utc>) -> LendingResult<PaymentSchedule> {
        let splits = self.splits(terms)?;

        let mut entries = Vec::with_capacity(splits.len());
        for (idx, split) in splits.into_iter().enumerate() {
            let number = idx as u32 + 1;
            entries.push(PaymentScheduleEntry {
                installment_number: number,
                due_date: Self::due_date(terms, start, number)?,
                amount: split.amount,
                principal: split.principal,
                interest: split.interest,
                status: EntryStatus::Pending,
                settled_at: None,
            });
        }

        Ok(PaymentSchedule::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn installments(principal: Decimal, rate: Decimal, duration: u32) -> ScheduleTerms {
        ScheduleTerms {
            principal,
            annual_rate: rate,
            duration,
            repayment_type: RepaymentType::Installments,
            frequency: InstallmentFrequency::Monthly,
        }
    }

    #[test]
    fn test_lump_sum_single_entry() {
        let terms = ScheduleTerms {
            principal: dec!(5000),
            annual_rate: dec!(10),
            duration: 90,
            repayment_type: RepaymentType::LumpSum,
            frequency: InstallmentFrequency::Monthly,
        };
        let schedule = ScheduleCalculator::default().build(&terms, start()).unwrap();

        assert_eq!(schedule.len(), 1);
        let entry = &schedule.entries()[0];
        // 5000 * 0.10 * 90/365 = 123.287...
        assert_eq!(entry.interest, dec!(123.29));
        assert_eq!(entry.amount, dec!(5123.29));
        assert_eq!(entry.due_date, start() + Duration::days(90));
        assert_eq!(entry.status, EntryStatus::Pending);
    }

    #[test]
    fn test_period_count_rounds_up() {
        assert_eq!(ScheduleCalculator::period_count(180, InstallmentFrequency::Monthly), 6);
        assert_eq!(ScheduleCalculator::period_count(181, InstallmentFrequency::Monthly), 7);
        assert_eq!(ScheduleCalculator::period_count(29, InstallmentFrequency::Monthly), 1);
        assert_eq!(ScheduleCalculator::period_count(28, InstallmentFrequency::Weekly), 4);
    }

    #[test]
    fn test_level_payment_formula() {
        // 12000 at 12% over 12 months: classic 1066.19
        let payment = ScheduleCalculator::level_payment(dec!(12000), dec!(0.01), 12).unwrap();
        assert_eq!(round_money(payment), dec!(1066.19));
    }

    #[test]
    fn test_standard_principal_sums_to_loan() {
        let schedule = ScheduleCalculator::default()
            .build(&installments(dec!(3000), dec!(8.5), 180), start())
            .unwrap();

        assert_eq!(schedule.len(), 6);
        assert_eq!(schedule.total_principal(), dec!(3000));
        assert!(schedule.is_sorted_by_due_date());
        for entry in schedule.entries() {
            assert_eq!(entry.amount, entry.principal + entry.interest);
        }
        assert!(schedule.total_amount() > dec!(3000));
    }

    #[test]
    fn test_standard_interest_declines() {
        let schedule = ScheduleCalculator::default()
            .build(&installments(dec!(10000), dec!(12), 365), start())
            .unwrap();

        let interest: Vec<Decimal> = schedule.entries().iter().map(|e| e.interest).collect();
        assert!(interest.windows(2).all(|w| w[0] >= w[1]));
        // First period interest = 10000 * 1% = 100
        assert_eq!(interest[0], dec!(100.00));
    }

    #[test]
    fn test_zero_rate_installments() {
        let schedule = ScheduleCalculator::default()
            .build(&installments(dec!(1000), Decimal::ZERO, 90), start())
            .unwrap();

        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.total_interest(), Decimal::ZERO);
        assert_eq!(schedule.entries()[0].amount, dec!(333.33));
        // Final installment absorbs the rounding residual
        assert_eq!(schedule.entries()[2].amount, dec!(333.34));
        assert_eq!(schedule.total_principal(), dec!(1000));
    }

    #[test]
    fn test_linear_balance_compatibility_mode() {
        let calc = ScheduleCalculator::new(AmortizationMethod::LinearBalance);
        let schedule = calc
            .build(&installments(dec!(3000), dec!(8.5), 180), start())
            .unwrap();

        let entries = schedule.entries();
        let payment = entries[0].amount;
        assert!(entries[..5].iter().all(|e| e.amount == payment));
        // Linear-balance interest undercounts, so the last installment is short
        assert!(entries[5].amount < payment);
        assert_eq!(schedule.total_principal(), dec!(3000));
        for entry in entries {
            assert_eq!(entry.amount, entry.principal + entry.interest);
        }
        assert_eq!(schedule.total_amount(), dec!(3000) + schedule.total_interest());
    }

    #[test]
    fn test_idempotent() {
        let calc = ScheduleCalculator::default();
        let terms = installments(dec!(7500), dec!(14.9), 400);

        let a = calc.build(&terms, start()).unwrap();
        let b = calc.build(&terms, start()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_invalid_terms() {
        let calc = ScheduleCalculator::default();

        assert!(calc.build(&installments(Decimal::ZERO, dec!(5), 30), start()).is_err());
        assert!(calc.build(&installments(dec!(100), dec!(-1), 30), start()).is_err());
        assert!(calc.build(&installments(dec!(100), dec!(5), 0), start()).is_err());
    }

    #[test]
    fn test_weekly_due_dates() {
        let terms = ScheduleTerms {
            frequency: InstallmentFrequency::Weekly,
            ..installments(dec!(700), dec!(10), 28)
        };
        let schedule = ScheduleCalculator::default().build(&terms, start()).unwrap();

        assert_eq!(schedule.len(), 4);
        assert_eq!(schedule.entries()[0].due_date, start() + Duration::days(7));
        assert_eq!(schedule.final_due_date(), Some(start() + Duration::days(28)));
    }

    #[test]
    fn test_monthly_due_dates_follow_calendar() {
        let schedule = ScheduleCalculator::default()
            .build(&installments(dec!(3000), dec!(8.5), 90), start())
            .unwrap();

        let dues: Vec<_> = schedule.entries().iter().map(|e| e.due_date).collect();
        assert_eq!(dues[0], Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(dues[1], Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(dues[2], Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
    }
}
