use crate::period::PeriodKey;
use crate::record::MonthlyMisRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a month holds, for "no data" states and gap warnings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthAvailability {
    pub month: PeriodKey,
    pub balance_sheet_jurisdictions: Vec<String>,
    pub has_primary_balance_sheet: bool,
    pub has_journal: bool,
    pub has_sales: bool,
    pub journal_count: usize,
    pub sales_count: usize,
    pub unclassified_count: usize,
}

impl MonthAvailability {
    pub fn from_record(record: &MonthlyMisRecord) -> Self {
        Self {
            month: record.month,
            balance_sheet_jurisdictions: record.balance_sheets.keys().cloned().collect(),
            has_primary_balance_sheet: record.has_primary_balance_sheet(),
            has_journal: !record.journal_entries.is_empty(),
            has_sales: !record.sales_entries.is_empty(),
            journal_count: record.journal_entries.len(),
            sales_count: record.sales_entries.len(),
            unclassified_count: record.computed.unclassified_count,
        }
    }

    pub fn missing(month: PeriodKey) -> Self {
        Self {
            month,
            balance_sheet_jurisdictions: Vec::new(),
            has_primary_balance_sheet: false,
            has_journal: false,
            has_sales: false,
            journal_count: 0,
            sales_count: 0,
            unclassified_count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.balance_sheet_jurisdictions.is_empty() || self.has_journal || self.has_sales
    }

    /// Every journal entry has a head.
    pub fn is_fully_reconciled(&self) -> bool {
        self.unclassified_count == 0
    }
}

pub fn availability_for_range(
    records: &BTreeMap<PeriodKey, MonthlyMisRecord>,
    start: PeriodKey,
    end: PeriodKey,
) -> Vec<MonthAvailability> {
    PeriodKey::range_inclusive(start, end)
        .into_iter()
        .map(|month| match records.get(&month) {
            Some(record) => MonthAvailability::from_record(record),
            None => MonthAvailability::missing(month),
        })
        .collect()
}
