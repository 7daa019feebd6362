use crate::margins::{compute_margins, HeadTotals, MarginWaterfall, StockFigures};
use crate::period::PeriodKey;
use crate::record::MonthlyMisRecord;
use crate::taxonomy::Head;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Several months merged into one summary. Derived on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedRangeRecord {
    pub start: PeriodKey,
    pub end: PeriodKey,
    /// Months in the range that actually had data, in order.
    pub included_months: Vec<PeriodKey>,
    /// Months in the range with no data at all.
    pub missing_months: Vec<PeriodKey>,
    /// Opening stock of the first included month, purchases summed, closing
    /// stock of the last included month.
    pub stock: StockFigures,
    pub raw_material_cost: f64,
    pub totals: HeadTotals,
    pub stock_transfers: f64,
    pub output_tax: f64,
    pub unclassified_count: usize,
    pub unclassified_amount: f64,
    pub waterfall: MarginWaterfall,
}

impl AggregatedRangeRecord {
    fn empty(start: PeriodKey, end: PeriodKey, missing_months: Vec<PeriodKey>) -> Self {
        Self {
            start,
            end,
            included_months: Vec::new(),
            missing_months,
            stock: StockFigures::default(),
            raw_material_cost: 0.0,
            totals: HeadTotals::new(),
            stock_transfers: 0.0,
            output_tax: 0.0,
            unclassified_count: 0,
            unclassified_amount: 0.0,
            waterfall: MarginWaterfall::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.included_months.is_empty()
    }

    pub fn head_total(&self, head: Head) -> f64 {
        self.totals.head(head)
    }

    pub fn subhead_total(&self, head: Head, subhead: &str) -> f64 {
        self.totals.subhead(head, subhead)
    }
}

/// Merges `start..=end` into one record. Flow quantities are summed, stock
/// is taken from the first and last month with data, and the waterfall is
/// recomputed once on the merged totals.
pub fn aggregate_records(
    records: &BTreeMap<PeriodKey, MonthlyMisRecord>,
    start: PeriodKey,
    end: PeriodKey,
) -> AggregatedRangeRecord {
    let mut included: Vec<&MonthlyMisRecord> = Vec::new();
    let mut missing_months = Vec::new();

    for month in PeriodKey::range_inclusive(start, end) {
        match records.get(&month).filter(|r| r.has_data()) {
            Some(record) => included.push(record),
            None => missing_months.push(month),
        }
    }

    let (first, last) = match (included.first(), included.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            info!("No data between {} and {}", start, end);
            return AggregatedRangeRecord::empty(start, end, missing_months);
        }
    };

    let stock = StockFigures {
        opening_stock: first.stock_figures().opening_stock,
        purchases: included.iter().map(|r| r.stock_figures().purchases).sum(),
        closing_stock: last.stock_figures().closing_stock,
    };

    let mut totals = HeadTotals::new();
    let mut stock_transfers = 0.0;
    let mut output_tax = 0.0;
    let mut unclassified_count = 0;
    let mut unclassified_amount = 0.0;

    for record in &included {
        totals.merge(&record.head_totals());
        stock_transfers += record.computed.stock_transfers;
        output_tax += record.computed.output_tax;
        unclassified_count += record.computed.unclassified_count;
        unclassified_amount += record.computed.unclassified_amount;
    }

    let waterfall = compute_margins(&totals, &stock);

    info!(
        "Aggregated {} to {}: {} months with data, {} missing",
        start,
        end,
        included.len(),
        missing_months.len()
    );

    AggregatedRangeRecord {
        start,
        end,
        included_months: included.iter().map(|r| r.month).collect(),
        missing_months,
        stock,
        raw_material_cost: stock.raw_material_cost(),
        totals,
        stock_transfers,
        output_tax,
        unclassified_count,
        unclassified_amount,
        waterfall,
    }
}
