//! Repayment schedule output structures

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settlement status of a scheduled installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Paid,
    Late,
    Defaulted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Paid => "paid",
            EntryStatus::Late => "late",
            EntryStatus::Defaulted => "defaulted",
        }
    }
}

impl Default for EntryStatus {
    fn default() -> Self {
        EntryStatus::Pending
    }
}

/// A single scheduled installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentScheduleEntry {
    /// 1-indexed position in the schedule
    pub installment_number: u32,

    pub due_date: DateTime<Utc>,

    /// principal + interest
    pub amount: Decimal,

    pub principal: Decimal,

    pub interest: Decimal,

    /// Timing status; `late`/`defaulted` may be set on an unpaid entry by a sweep
    #[serde(default)]
    pub status: EntryStatus,

    /// When cumulative payments covered `amount`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl PaymentScheduleEntry {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

/// Ordered repayment schedule, sorted ascending by due date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentSchedule {
    entries: Vec<PaymentScheduleEntry>,
}

impl PaymentSchedule {
    pub(crate) fn from_entries(entries: Vec<PaymentScheduleEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PaymentScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, installment_number: u32) -> Option<&PaymentScheduleEntry> {
        self.entries
            .iter()
            .find(|e| e.installment_number == installment_number)
    }

    /// Update the timing status of an installment; amounts are never touched
    pub fn set_status(&mut self, installment_number: u32, status: EntryStatus) -> bool {
        match self.entry_mut(installment_number) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    /// Mark an installment settled with its final timing status
    pub fn settle(&mut self, installment_number: u32, status: EntryStatus, at: DateTime<Utc>) -> bool {
        match self.entry_mut(installment_number) {
            Some(entry) => {
                entry.status = status;
                entry.settled_at = Some(at);
                true
            }
            None => false,
        }
    }

    fn entry_mut(&mut self, installment_number: u32) -> Option<&mut PaymentScheduleEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.installment_number == installment_number)
    }

    /// Earliest installment not yet covered by payments
    pub fn first_unsettled(&self) -> Option<&PaymentScheduleEntry> {
        self.entries.iter().find(|e| !e.is_settled())
    }

    pub fn unsettled(&self) -> impl Iterator<Item = &PaymentScheduleEntry> {
        self.entries.iter().filter(|e| !e.is_settled())
    }

    pub fn total_interest(&self) -> Decimal {
        self.entries.iter().map(|e| e.interest).sum()
    }

    pub fn total_principal(&self) -> Decimal {
        self.entries.iter().map(|e| e.principal).sum()
    }

    pub fn total_amount(&self) -> Decimal {
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// Last due date in the schedule
    pub fn final_due_date(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.due_date)
    }

    pub fn is_sorted_by_due_date(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].due_date <= w[1].due_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn schedule() -> PaymentSchedule {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let entries = (1..=3)
            .map(|n| PaymentScheduleEntry {
                installment_number: n,
                due_date: start + Duration::days(30 * i64::from(n)),
                amount: dec!(110),
                principal: dec!(100),
                interest: dec!(10),
                status: EntryStatus::Pending,
                settled_at: None,
            })
            .collect();
        PaymentSchedule::from_entries(entries)
    }

    #[test]
    fn test_totals() {
        let s = schedule();
        assert_eq!(s.total_amount(), dec!(330));
        assert_eq!(s.total_principal(), dec!(300));
        assert_eq!(s.total_interest(), dec!(30));
    }

    #[test]
    fn test_settle_moves_first_unsettled() {
        let mut s = schedule();
        let at = s.entries()[0].due_date;

        assert!(s.settle(1, EntryStatus::Paid, at));
        assert_eq!(s.first_unsettled().map(|e| e.installment_number), Some(2));
        assert_eq!(s.unsettled().count(), 2);

        // A swept late entry is still unsettled
        assert!(s.set_status(2, EntryStatus::Late));
        assert_eq!(s.first_unsettled().map(|e| e.installment_number), Some(2));

        assert!(!s.settle(9, EntryStatus::Paid, at));
    }
}
