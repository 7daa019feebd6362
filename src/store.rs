use crate::aggregate::{aggregate_records, AggregatedRangeRecord};
use crate::availability::{availability_for_range, MonthAvailability};
use crate::config::MisConfig;
use crate::error::{MisError, Result};
use crate::period::PeriodKey;
use crate::persistence::{MisPersistence, StoreSnapshot};
use crate::record::{ClassifiedTransaction, MonthlyMisRecord, RecomputeContext, TxnId};
use crate::report::MisStatement;
use crate::rules::{suggest_pattern, ClassificationRule, MatchMode, RuleSet, RuleSource};
use crate::schema::{BalanceSheetSnapshot, JournalEntry, ParsedDocumentBatch, SalesEntry};
use crate::taxonomy::{Head, HeadAssignment};
use chrono::Utc;
use log::info;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Discard the month's prior entries of the same kind first. Used when a
    /// register is re-uploaded.
    Replace,
    Append,
}

#[derive(Debug, Clone)]
pub enum TransactionBatch {
    Journal(Vec<JournalEntry>),
    Sales(Vec<SalesEntry>),
}

impl From<Vec<JournalEntry>> for TransactionBatch {
    fn from(entries: Vec<JournalEntry>) -> Self {
        TransactionBatch::Journal(entries)
    }
}

impl From<Vec<SalesEntry>> for TransactionBatch {
    fn from(entries: Vec<SalesEntry>) -> Self {
        TransactionBatch::Sales(entries)
    }
}

#[derive(Debug, Clone)]
pub struct ReclassifyRequest {
    pub txn_id: TxnId,
    pub head: Head,
    pub subhead: String,
    /// Also create a rule so future entries with the same description land
    /// in the new head.
    pub create_rule: bool,
    /// Pattern for the new rule. Derived from the account description when
    /// absent.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReclassifyOutcome {
    pub previous: Option<HeadAssignment>,
    pub assignment: HeadAssignment,
    pub created_rule: Option<ClassificationRule>,
}

/// Owns every monthly record plus the active rule set. Each mutating call
/// recomputes the affected derived blocks before returning.
#[derive(Debug)]
pub struct MisStore {
    config: MisConfig,
    rules: RuleSet,
    records: BTreeMap<PeriodKey, MonthlyMisRecord>,
}

impl MisStore {
    pub fn new(config: MisConfig) -> Self {
        Self::with_rules(config, Vec::new())
    }

    pub fn with_rules(config: MisConfig, rules: Vec<ClassificationRule>) -> Self {
        Self {
            config,
            rules: RuleSet::new(rules),
            records: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &MisConfig {
        &self.config
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        self.rules.rules()
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn get(&self, month: PeriodKey) -> Option<&MonthlyMisRecord> {
        self.records.get(&month)
    }

    pub fn records(&self) -> &BTreeMap<PeriodKey, MonthlyMisRecord> {
        &self.records
    }

    pub fn months(&self) -> Vec<PeriodKey> {
        self.records.keys().copied().collect()
    }

    pub fn get_or_create(&mut self, month: PeriodKey) -> &MonthlyMisRecord {
        self.record_mut(month)
    }

    fn record_mut(&mut self, month: PeriodKey) -> &mut MonthlyMisRecord {
        let ctx = RecomputeContext {
            rules: &self.rules,
            stock_transfer_channels: &self.config.stock_transfer_channels,
        };
        let primary = &self.config.primary_jurisdiction;
        self.records.entry(month).or_insert_with(|| {
            let mut record = MonthlyMisRecord::new(month, primary.clone());
            record.refresh(&ctx);
            record
        })
    }

    fn refresh_month(&mut self, month: PeriodKey) {
        let ctx = RecomputeContext {
            rules: &self.rules,
            stock_transfer_channels: &self.config.stock_transfer_channels,
        };
        if let Some(record) = self.records.get_mut(&month) {
            record.refresh(&ctx);
        }
    }

    fn refresh_all(&mut self) {
        let ctx = RecomputeContext {
            rules: &self.rules,
            stock_transfer_channels: &self.config.stock_transfer_channels,
        };
        for record in self.records.values_mut() {
            record.refresh(&ctx);
        }
    }

    pub fn store_balance_sheet(
        &mut self,
        month: PeriodKey,
        jurisdiction: &str,
        snapshot: BalanceSheetSnapshot,
    ) {
        self.record_mut(month)
            .upsert_balance_sheet(jurisdiction, snapshot);
        self.refresh_month(month);
        info!("Stored {} balance sheet for {}", jurisdiction, month);
    }

    /// Stores journal or sales entries and returns how many entries of that
    /// kind the month now holds.
    pub fn store_transactions(
        &mut self,
        month: PeriodKey,
        batch: impl Into<TransactionBatch>,
        mode: StoreMode,
    ) -> usize {
        let record = self.record_mut(month);
        let (kind, incoming, held) = match batch.into() {
            TransactionBatch::Journal(entries) => {
                let incoming = entries.len();
                match mode {
                    StoreMode::Replace => record.replace_journal(entries),
                    StoreMode::Append => record.append_journal(entries),
                }
                ("journal", incoming, record.journal_entries.len())
            }
            TransactionBatch::Sales(entries) => {
                let incoming = entries.len();
                match mode {
                    StoreMode::Replace => record.replace_sales(entries),
                    StoreMode::Append => record.append_sales(entries),
                }
                ("sales", incoming, record.sales_entries.len())
            }
        };
        self.refresh_month(month);
        info!(
            "Stored {} {} entries for {} ({:?}); month now holds {}",
            incoming, kind, month, mode, held
        );
        held
    }

    /// Pushes everything a parser produced for one month.
    pub fn ingest(&mut self, batch: ParsedDocumentBatch, mode: StoreMode) {
        let month = batch.month;
        for snapshot in batch.balance_sheets {
            let jurisdiction = snapshot.jurisdiction.clone();
            self.store_balance_sheet(month, &jurisdiction, snapshot);
        }
        if !batch.journal_entries.is_empty() {
            self.store_transactions(month, batch.journal_entries, mode);
        }
        if !batch.sales_entries.is_empty() {
            self.store_transactions(month, batch.sales_entries, mode);
        }
    }

    pub fn set_primary_jurisdiction(&mut self, month: PeriodKey, jurisdiction: &str) {
        self.record_mut(month).primary_jurisdiction = jurisdiction.to_string();
        self.refresh_month(month);
    }

    pub fn has_data(&self, month: PeriodKey) -> bool {
        self.records.get(&month).is_some_and(|r| r.has_data())
    }

    pub fn unclassified(&self, month: PeriodKey) -> Vec<&ClassifiedTransaction> {
        self.records
            .get(&month)
            .map(|r| r.unclassified())
            .unwrap_or_default()
    }

    /// Manually moves one journal entry to another head/subhead, optionally
    /// turning the correction into a top-priority rule.
    pub fn reclassify_transaction(
        &mut self,
        month: PeriodKey,
        request: ReclassifyRequest,
    ) -> Result<ReclassifyOutcome> {
        let assignment = HeadAssignment::new(request.head, &request.subhead)?;

        let not_found = || MisError::TransactionNotFound {
            month: month.to_string(),
            id: request.txn_id.0,
        };
        let txn = self
            .records
            .get(&month)
            .and_then(|r| r.transaction(request.txn_id))
            .ok_or_else(not_found)?;
        let previous = txn.effective().cloned();
        let description = txn.entry.account_description.clone();
        let voucher_id = txn.entry.voucher_id.clone();

        let created_rule = if request.create_rule {
            let pattern = request
                .pattern
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| suggest_pattern(&description));

            Some(ClassificationRule {
                id: format!("reclass-{}-{}", month, request.txn_id.0),
                pattern,
                match_mode: MatchMode::Substring,
                head: assignment.head,
                subhead: assignment.subhead.clone(),
                priority: self.rules.correction_priority(),
                active: true,
                source: RuleSource::Reclassification,
                notes: Some(format!(
                    "Created from reclassification of voucher {} in {}",
                    voucher_id, month
                )),
                created_at: Utc::now(),
            })
        } else {
            None
        };

        if let Some(record) = self.records.get_mut(&month) {
            record.overrides.insert(request.txn_id, assignment.clone());
        }

        match &created_rule {
            Some(rule) => {
                let mut rules: Vec<ClassificationRule> = self
                    .rules
                    .rules()
                    .iter()
                    .filter(|r| r.id != rule.id)
                    .cloned()
                    .collect();
                rules.push(rule.clone());
                self.install_rules(rules);
            }
            None => self.refresh_month(month),
        }

        info!(
            "Reclassified {} in {} to {} / {}{}",
            request.txn_id,
            month,
            assignment.head,
            assignment.subhead,
            if created_rule.is_some() {
                " (rule created)"
            } else {
                ""
            }
        );

        Ok(ReclassifyOutcome {
            previous,
            assignment,
            created_rule,
        })
    }

    fn install_rules(&mut self, rules: Vec<ClassificationRule>) {
        self.rules = RuleSet::new(rules);
        self.refresh_all();
    }

    /// Replaces the rule list and reclassifies every month.
    pub fn set_rules(&mut self, rules: Vec<ClassificationRule>) {
        let count = rules.len();
        self.install_rules(rules);
        info!(
            "Installed {} classification rules ({} invalid)",
            count,
            self.rules.invalid_rule_ids().len()
        );
    }

    pub fn add_rule(&mut self, rule: ClassificationRule) -> Result<()> {
        rule.head.validate_subhead(&rule.subhead)?;
        let mut rules = self.rules.rules().to_vec();
        rules.push(rule);
        self.install_rules(rules);
        Ok(())
    }

    pub fn remove_rule(&mut self, id: &str) -> Result<ClassificationRule> {
        let mut rules = self.rules.rules().to_vec();
        let position = rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| MisError::RuleNotFound(id.to_string()))?;
        let removed = rules.remove(position);
        self.install_rules(rules);
        Ok(removed)
    }

    /// Removes a month together with its overrides. Returns whether the
    /// month existed.
    pub fn clear(&mut self, month: PeriodKey) -> bool {
        let removed = self.records.remove(&month).is_some();
        if removed {
            info!("Cleared {}", month);
        }
        removed
    }

    pub fn clear_all(&mut self) {
        let count = self.records.len();
        self.records.clear();
        info!("Cleared all {} months", count);
    }

    /// Availability of every month currently holding data.
    pub fn data_availability(&self) -> Vec<MonthAvailability> {
        self.records
            .values()
            .filter(|r| r.has_data())
            .map(MonthAvailability::from_record)
            .collect()
    }

    /// Availability of every calendar month in the range, gaps included.
    pub fn availability_for_range(&self, start: PeriodKey, end: PeriodKey) -> Vec<MonthAvailability> {
        availability_for_range(&self.records, start, end)
    }

    pub fn aggregate(&self, start: PeriodKey, end: PeriodKey) -> AggregatedRangeRecord {
        aggregate_records(&self.records, start, end)
    }

    /// Roll-up of the fiscal year beginning in `fy_start_year`.
    pub fn aggregate_fiscal_year(&self, fy_start_year: i32) -> Result<AggregatedRangeRecord> {
        let months =
            PeriodKey::fiscal_year_months(fy_start_year, self.config.fiscal_year_start_month)?;
        match (months.first(), months.last()) {
            (Some(start), Some(end)) => Ok(self.aggregate(*start, *end)),
            _ => Err(MisError::InvalidFiscalYearStartMonth(
                self.config.fiscal_year_start_month,
            )),
        }
    }

    pub fn monthly_statement(&self, month: PeriodKey) -> Option<MisStatement> {
        self.records
            .get(&month)
            .map(|r| MisStatement::from_waterfall(format!("MIS {}", month), &r.computed.waterfall))
    }

    pub fn range_statement(&self, start: PeriodKey, end: PeriodKey) -> MisStatement {
        let aggregated = self.aggregate(start, end);
        MisStatement::from_waterfall(format!("MIS {} to {}", start, end), &aggregated.waterfall)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            records: self.records.values().cloned().collect(),
            rules: self.rules.rules().to_vec(),
        }
    }

    /// Replaces all state with `snapshot` and recomputes every month.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.rules = RuleSet::new(snapshot.rules);
        self.records = snapshot
            .records
            .into_iter()
            .map(|mut record| {
                record.normalize_overrides();
                (record.month, record)
            })
            .collect();
        self.refresh_all();
        info!(
            "Restored {} months and {} rules",
            self.records.len(),
            self.rules.len()
        );
    }

    pub fn save_to(&self, backend: &dyn MisPersistence) -> Result<()> {
        backend.save(&self.snapshot())
    }

    pub fn load_from(&mut self, backend: &dyn MisPersistence) -> Result<()> {
        let snapshot = backend.load()?;
        self.restore(snapshot);
        Ok(())
    }
}

impl Default for MisStore {
    fn default() -> Self {
        Self::new(MisConfig::default())
    }
}
