//! One calendar month of MIS data: raw inputs plus the derived block.
//!
//! Derived fields are never patched incrementally. Every mutation goes
//! through [`MonthlyMisRecord::refresh`], which rebuilds the
//! classification index and the computed block from the raw inputs.

use crate::config::is_stock_transfer;
use crate::ingestion::sanitize_amount;
use crate::margins::{compute_margins, HeadTotals, MarginWaterfall, StockFigures};
use crate::period::PeriodKey;
use crate::rules::RuleSet;
use crate::schema::{BalanceSheetSnapshot, JournalEntry, SalesEntry};
use crate::taxonomy::{revenue_subhead_for_channel, Head, HeadAssignment};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-month identifier of a stored journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredJournalEntry {
    pub id: TxnId,
    pub entry: JournalEntry,
}

/// The assignment a rule produced, with the rule that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleAssignment {
    pub assignment: HeadAssignment,
    pub rule_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedTransaction {
    pub id: TxnId,
    pub entry: JournalEntry,
    /// What the rule engine decided.
    pub rule_match: Option<RuleAssignment>,
    /// A manual reassignment, which wins over `rule_match`.
    pub manual_override: Option<HeadAssignment>,
    /// Amount this entry contributes to its head total.
    pub counted_amount: f64,
}

impl ClassifiedTransaction {
    pub fn effective(&self) -> Option<&HeadAssignment> {
        self.manual_override
            .as_ref()
            .or(self.rule_match.as_ref().map(|m| &m.assignment))
    }

    pub fn is_classified(&self) -> bool {
        self.effective().is_some()
    }

    pub fn is_reassigned(&self) -> bool {
        match (&self.manual_override, &self.rule_match) {
            (Some(manual), Some(rule)) => *manual != rule.assignment,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubheadBucket {
    pub total: f64,
    pub transaction_ids: Vec<TxnId>,
    pub sales_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeadBucket {
    pub total: f64,
    pub subheads: BTreeMap<String, SubheadBucket>,
}

/// head -> subhead -> aggregate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClassificationIndex {
    pub heads: BTreeMap<Head, HeadBucket>,
}

impl ClassificationIndex {
    fn bucket_mut(&mut self, head: Head, subhead: &str) -> (&mut f64, &mut SubheadBucket) {
        let head_bucket = self.heads.entry(head).or_default();
        let subhead_bucket = head_bucket.subheads.entry(subhead.to_string()).or_default();
        (&mut head_bucket.total, subhead_bucket)
    }

    fn record_transaction(&mut self, head: Head, subhead: &str, amount: f64, id: TxnId) {
        let (head_total, bucket) = self.bucket_mut(head, subhead);
        *head_total += amount;
        bucket.total += amount;
        bucket.transaction_ids.push(id);
    }

    fn record_sale(&mut self, subhead: &str, amount: f64) {
        let (head_total, bucket) = self.bucket_mut(Head::Revenue, subhead);
        *head_total += amount;
        bucket.total += amount;
        bucket.sales_count += 1;
    }

    pub fn head_total(&self, head: Head) -> f64 {
        self.heads.get(&head).map(|b| b.total).unwrap_or(0.0)
    }

    pub fn subhead_total(&self, head: Head, subhead: &str) -> f64 {
        self.heads
            .get(&head)
            .and_then(|b| b.subheads.get(subhead))
            .map(|s| s.total)
            .unwrap_or(0.0)
    }

    pub fn totals(&self) -> HeadTotals {
        let mut totals = HeadTotals::new();
        for (head, bucket) in &self.heads {
            for (subhead, sub) in &bucket.subheads {
                totals.add(*head, subhead, sub.total);
            }
        }
        totals
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComputedBlock {
    pub gross_revenue: f64,
    pub net_revenue: f64,
    /// Stock figures of the primary jurisdiction only.
    pub stock: StockFigures,
    pub raw_material_cost: f64,
    pub stock_transfers: f64,
    pub output_tax: f64,
    pub unclassified_count: usize,
    pub unclassified_amount: f64,
    pub waterfall: MarginWaterfall,
}

pub(crate) struct RecomputeContext<'a> {
    pub rules: &'a RuleSet,
    pub stock_transfer_channels: &'a [String],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyMisRecord {
    pub month: PeriodKey,
    pub primary_jurisdiction: String,
    #[serde(default)]
    pub balance_sheets: BTreeMap<String, BalanceSheetSnapshot>,
    #[serde(default)]
    pub journal_entries: Vec<StoredJournalEntry>,
    #[serde(default)]
    pub sales_entries: Vec<SalesEntry>,
    #[serde(default)]
    pub overrides: BTreeMap<TxnId, HeadAssignment>,
    #[serde(default)]
    next_txn_id: u64,

    #[serde(default)]
    pub classified: Vec<ClassifiedTransaction>,
    #[serde(default)]
    pub classification: ClassificationIndex,
    #[serde(default)]
    pub computed: ComputedBlock,
}

impl MonthlyMisRecord {
    pub fn new(month: PeriodKey, primary_jurisdiction: impl Into<String>) -> Self {
        Self {
            month,
            primary_jurisdiction: primary_jurisdiction.into(),
            balance_sheets: BTreeMap::new(),
            journal_entries: Vec::new(),
            sales_entries: Vec::new(),
            overrides: BTreeMap::new(),
            next_txn_id: 1,
            classified: Vec::new(),
            classification: ClassificationIndex::default(),
            computed: ComputedBlock::default(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.balance_sheets.is_empty()
            || !self.journal_entries.is_empty()
            || !self.sales_entries.is_empty()
    }

    pub fn has_primary_balance_sheet(&self) -> bool {
        self.balance_sheets.contains_key(&self.primary_jurisdiction)
    }

    pub fn primary_snapshot(&self) -> Option<&BalanceSheetSnapshot> {
        self.balance_sheets.get(&self.primary_jurisdiction)
    }

    pub fn stock_figures(&self) -> StockFigures {
        self.primary_snapshot()
            .map(|s| StockFigures {
                opening_stock: s.opening_stock,
                purchases: s.purchases,
                closing_stock: s.closing_stock,
            })
            .unwrap_or_default()
    }

    pub fn head_totals(&self) -> HeadTotals {
        self.classification.totals()
    }

    pub fn unclassified(&self) -> Vec<&ClassifiedTransaction> {
        self.classified.iter().filter(|t| !t.is_classified()).collect()
    }

    pub fn transaction(&self, id: TxnId) -> Option<&ClassifiedTransaction> {
        self.classified.iter().find(|t| t.id == id)
    }

    /// Drill-down: every journal entry filed under `head`/`subhead`.
    pub fn transactions_for(&self, head: Head, subhead: &str) -> Vec<&ClassifiedTransaction> {
        self.classified
            .iter()
            .filter(|t| {
                t.effective()
                    .is_some_and(|a| a.head == head && a.subhead == subhead)
            })
            .collect()
    }

    pub(crate) fn upsert_balance_sheet(&mut self, jurisdiction: &str, mut snapshot: BalanceSheetSnapshot) {
        snapshot.jurisdiction = jurisdiction.to_string();
        snapshot.opening_stock = sanitize_amount(snapshot.opening_stock, "opening stock");
        snapshot.purchases = sanitize_amount(snapshot.purchases, "purchases");
        snapshot.closing_stock = sanitize_amount(snapshot.closing_stock, "closing stock");
        snapshot.gross_sales = sanitize_amount(snapshot.gross_sales, "gross sales");
        snapshot.gross_profit = sanitize_amount(snapshot.gross_profit, "gross profit");
        self.balance_sheets.insert(jurisdiction.to_string(), snapshot);
    }

    pub(crate) fn replace_journal(&mut self, entries: Vec<JournalEntry>) {
        self.journal_entries.clear();
        self.overrides.clear();
        self.append_journal(entries);
    }

    pub(crate) fn append_journal(&mut self, entries: Vec<JournalEntry>) {
        if self.next_txn_id == 0 {
            self.next_txn_id = self
                .journal_entries
                .iter()
                .map(|e| e.id.0 + 1)
                .max()
                .unwrap_or(1);
        }
        for mut entry in entries {
            entry.amount = sanitize_amount(entry.amount, "journal entry");
            let id = TxnId(self.next_txn_id);
            self.next_txn_id += 1;
            self.journal_entries.push(StoredJournalEntry { id, entry });
        }
    }

    pub(crate) fn replace_sales(&mut self, entries: Vec<SalesEntry>) {
        self.sales_entries.clear();
        self.append_sales(entries);
    }

    pub(crate) fn append_sales(&mut self, entries: Vec<SalesEntry>) {
        self.sales_entries.extend(entries.into_iter().map(|mut e| {
            e.taxable_amount = sanitize_amount(e.taxable_amount, "sales taxable amount");
            e.tax_amount = sanitize_amount(e.tax_amount, "sales tax amount");
            e
        }));
    }

    /// Brings loaded overrides back onto the taxonomy: subheads get their
    /// canonical spelling and pairs that are not permitted are dropped.
    pub(crate) fn normalize_overrides(&mut self) {
        let month = self.month;
        self.overrides.retain(|id, assignment| {
            match assignment.head.canonical_subhead(&assignment.subhead) {
                Some(canonical) => {
                    assignment.subhead = canonical.to_string();
                    true
                }
                None => {
                    warn!(
                        "Dropping override for {} in {}: subhead '{}' is not permitted under '{}'",
                        id, month, assignment.subhead, assignment.head
                    );
                    false
                }
            }
        });
    }

    pub(crate) fn refresh(&mut self, ctx: &RecomputeContext<'_>) {
        self.reclassify(ctx.rules);
        self.recompute(ctx.stock_transfer_channels);
    }

    /// Rebuilds `classified` and the journal part of the index from scratch.
    fn reclassify(&mut self, rules: &RuleSet) {
        self.classified = classify_entries(&self.journal_entries, &self.overrides, rules);
    }

    fn recompute(&mut self, stock_transfer_channels: &[String]) {
        let mut index = ClassificationIndex::default();
        let mut unclassified_count = 0;
        let mut unclassified_amount = 0.0;

        for txn in &self.classified {
            match txn.effective() {
                Some(assignment) => index.record_transaction(
                    assignment.head,
                    &assignment.subhead,
                    txn.counted_amount,
                    txn.id,
                ),
                None => {
                    unclassified_count += 1;
                    unclassified_amount += txn.entry.amount.abs();
                }
            }
        }

        let mut stock_transfers = 0.0;
        let mut output_tax = 0.0;
        for sale in &self.sales_entries {
            if is_stock_transfer(stock_transfer_channels, &sale.channel) {
                stock_transfers += sale.taxable_amount;
                continue;
            }
            index.record_sale(revenue_subhead_for_channel(&sale.channel), sale.taxable_amount);
            output_tax += sale.tax_amount;
        }

        let stock = self.stock_figures();
        let waterfall = compute_margins(&index.totals(), &stock);

        debug!(
            "Recomputed {}: {} journal entries ({} unclassified), {} sales, gross revenue {:.2}, COGM {:.2}",
            self.month,
            self.classified.len(),
            unclassified_count,
            self.sales_entries.len(),
            waterfall.gross_revenue,
            waterfall.cogm
        );

        self.classification = index;
        self.computed = ComputedBlock {
            gross_revenue: waterfall.gross_revenue,
            net_revenue: waterfall.net_revenue,
            stock,
            raw_material_cost: stock.raw_material_cost(),
            stock_transfers,
            output_tax,
            unclassified_count,
            unclassified_amount,
            waterfall,
        };
    }
}

fn classify_entries(
    entries: &[StoredJournalEntry],
    overrides: &BTreeMap<TxnId, HeadAssignment>,
    rules: &RuleSet,
) -> Vec<ClassifiedTransaction> {
    entries
        .iter()
        .map(|stored| {
            let rule_match = rules
                .classify(&stored.entry.account_description)
                .map(|rule| RuleAssignment {
                    assignment: rule.assignment(),
                    rule_id: rule.id.clone(),
                });
            let manual_override = overrides.get(&stored.id).cloned();

            let counted_amount = manual_override
                .as_ref()
                .or(rule_match.as_ref().map(|m| &m.assignment))
                .map(|a| a.head.head_type().countable_amount(stored.entry.amount))
                .unwrap_or(0.0);

            ClassifiedTransaction {
                id: stored.id,
                entry: stored.entry.clone(),
                rule_match,
                manual_override,
                counted_amount,
            }
        })
        .collect()
}
