//! # Monthly MIS Builder
//!
//! Turns a company's monthly accounting documents into a Management
//! Information System report: a contribution-margin waterfall from gross
//! revenue down to net income.
//!
//! ## Core Concepts
//!
//! - **Monthly record**: one calendar month of raw inputs (per-jurisdiction
//!   balance sheets, journal entries, sales entries) plus a derived block
//!   that is always rebuilt from those inputs.
//! - **Head / subhead**: the fixed two-level taxonomy every journal entry is
//!   classified into. Each head counts only one side of the ledger.
//! - **Classification rules**: ordered pattern rules mapping an account
//!   description to a head/subhead. Lower priority number wins.
//! - **Stock-derived raw material cost**: opening stock + purchases - closing
//!   stock, taken from the primary jurisdiction's balance sheet only.
//! - **Range aggregation**: several months merged with stock taken from the
//!   first and last month that has data, and margins recomputed once.
//!
//! ## Example
//!
//! ```rust,ignore
//! use monthly_mis_builder::*;
//! use chrono::NaiveDate;
//!
//! let mut store = MisStore::with_rules(MisConfig::default(), default_system_rules());
//! let april: PeriodKey = "2024-04".parse().unwrap();
//!
//! store.store_balance_sheet(
//!     april,
//!     "HQ",
//!     BalanceSheetSnapshot::new("HQ").with_stock(100_000.0, 40_000.0, 90_000.0),
//! );
//! store.store_transactions(
//!     april,
//!     vec![JournalEntry {
//!         date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
//!         voucher_id: "JV-101".to_string(),
//!         account_description: "Amazon Seller Fee".to_string(),
//!         amount: 5_000.0,
//!         jurisdiction: "HQ".to_string(),
//!     }],
//!     StoreMode::Append,
//! );
//!
//! let record = store.get(april).unwrap();
//! println!("CM1: {:.2}", record.computed.waterfall.cm1);
//! println!("{}", store.monthly_statement(april).unwrap().to_markdown(2));
//! ```

pub mod aggregate;
pub mod availability;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod margins;
pub mod period;
pub mod persistence;
pub mod record;
pub mod report;
pub mod rules;
pub mod schema;
pub mod store;
pub mod taxonomy;

pub use aggregate::{aggregate_records, AggregatedRangeRecord};
pub use availability::{availability_for_range, MonthAvailability};
pub use config::MisConfig;
pub use error::{MisError, Result};
pub use ingestion::{parse_amount, sanitize_amount};
pub use margins::{
    compute_margins, percent_of, HeadTotals, MarginPercentages, MarginWaterfall, StockFigures,
};
pub use period::PeriodKey;
pub use persistence::{JsonFilePersistence, MisPersistence, StoreSnapshot};
pub use record::{
    ClassificationIndex, ClassifiedTransaction, ComputedBlock, HeadBucket, MonthlyMisRecord,
    RuleAssignment, SubheadBucket, TxnId,
};
pub use report::{round_currency, LineKind, MisStatement, StatementLine};
pub use rules::{
    default_system_rules, suggest_pattern, ClassificationRule, MatchMode, RuleSet, RuleSource,
    SYSTEM_RULE_PRIORITY, USER_RULE_PRIORITY,
};
pub use schema::*;
pub use store::{MisStore, ReclassifyOutcome, ReclassifyRequest, StoreMode, TransactionBatch};
pub use taxonomy::{CostGroup, Head, HeadAssignment, HeadType};

use log::{debug, info};

pub struct MisProcessor;

impl MisProcessor {
    /// Builds a store from parser output in one pass. Batches are applied in
    /// the given order, so a later batch for the same month appends to (or,
    /// with [`StoreMode::Replace`], replaces) what an earlier one stored.
    pub fn process(
        config: MisConfig,
        rules: Vec<ClassificationRule>,
        batches: Vec<ParsedDocumentBatch>,
        mode: StoreMode,
    ) -> Result<MisStore> {
        config.validate()?;

        info!(
            "Building MIS for organization: {}",
            config.organization_name
        );
        debug!(
            "{} rules, {} document batches",
            rules.len(),
            batches.len()
        );

        let mut store = MisStore::with_rules(config, rules);
        for batch in batches {
            store.ingest(batch, mode);
        }

        for month in store.months() {
            if let Some(record) = store.get(month) {
                if record.computed.unclassified_count > 0 {
                    debug!(
                        "{} has {} unclassified journal entries",
                        month, record.computed.unclassified_count
                    );
                }
            }
        }

        Ok(store)
    }
}

pub fn process_document_batches(
    config: MisConfig,
    rules: Vec<ClassificationRule>,
    batches: Vec<ParsedDocumentBatch>,
) -> Result<MisStore> {
    MisProcessor::process(config, rules, batches, StoreMode::Append)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn batch(month: &str) -> ParsedDocumentBatch {
        let key: PeriodKey = month.parse().unwrap();
        ParsedDocumentBatch {
            month: key,
            journal_entries: vec![
                JournalEntry {
                    date: key.last_day(),
                    voucher_id: "JV-1".to_string(),
                    account_description: "Amazon Seller Fee".to_string(),
                    amount: 1_000.0,
                    jurisdiction: "HQ".to_string(),
                },
                JournalEntry {
                    date: key.last_day(),
                    voucher_id: "JV-2".to_string(),
                    account_description: "Office Rent".to_string(),
                    amount: 2_000.0,
                    jurisdiction: "HQ".to_string(),
                },
            ],
            sales_entries: vec![SalesEntry {
                date: NaiveDate::from_ymd_opt(key.year(), key.month(), 5).unwrap(),
                invoice_id: "INV-1".to_string(),
                jurisdiction: "HQ".to_string(),
                channel: "Amazon".to_string(),
                taxable_amount: 20_000.0,
                tax_amount: 3_600.0,
            }],
            balance_sheets: vec![BalanceSheetSnapshot::new("HQ").with_stock(10_000.0, 5_000.0, 8_000.0)],
        }
    }

    fn fee_rule() -> ClassificationRule {
        ClassificationRule::new(
            "amazon-fee",
            "amazon.*fee",
            MatchMode::Regex,
            Head::ChannelFulfillment,
            "Amazon Fees",
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_process_document_batches() {
        let mut rules = default_system_rules();
        rules.push(fee_rule());
        let store = process_document_batches(
            MisConfig::default(),
            rules,
            vec![batch("2024-04"), batch("2024-05")],
        )
        .unwrap();

        assert_eq!(store.months().len(), 2);
        let w = &store.get("2024-04".parse().unwrap()).unwrap().computed.waterfall;
        assert!((w.gross_revenue - 20_000.0).abs() < 0.01);
        assert!((w.raw_material_cost - 7_000.0).abs() < 0.01);
        assert!((w.gross_margin - 13_000.0).abs() < 0.01);
        assert!((w.channel_fulfillment - 1_000.0).abs() < 0.01);
        assert!((w.operating_expenses - 2_000.0).abs() < 0.01);
        assert!((w.ebitda - 10_000.0).abs() < 0.01);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = MisConfig {
            fiscal_year_start_month: 13,
            ..MisConfig::default()
        };
        let result = process_document_batches(config, Vec::new(), Vec::new());
        assert!(matches!(result, Err(MisError::InvalidFiscalYearStartMonth(13))));
    }

    #[test]
    fn test_replace_mode_processing() {
        let store = MisProcessor::process(
            MisConfig::default(),
            vec![fee_rule()],
            vec![batch("2024-04"), batch("2024-04")],
            StoreMode::Replace,
        )
        .unwrap();
        let record = store.get("2024-04".parse().unwrap()).unwrap();
        assert_eq!(record.journal_entries.len(), 2);
        assert_eq!(record.sales_entries.len(), 1);
    }
}
