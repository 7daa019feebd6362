use crate::ingestion::lenient_amount;
use crate::period::PeriodKey;
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct JournalEntry {
    #[schemars(description = "Voucher date in YYYY-MM-DD format")]
    pub date: NaiveDate,

    #[schemars(description = "Voucher or invoice number as printed in the journal register")]
    pub voucher_id: String,

    #[schemars(
        description = "Free-text account or party description exactly as it appears in the register (e.g. 'Amazon Seller Services - Commission A/c')"
    )]
    pub account_description: String,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(
        with = "f64",
        description = "Signed amount. Positive values are debits, negative values are credits."
    )]
    pub amount: f64,

    #[schemars(description = "Jurisdiction (state) whose books this entry belongs to")]
    pub jurisdiction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SalesEntry {
    #[schemars(description = "Invoice date in YYYY-MM-DD format")]
    pub date: NaiveDate,

    pub invoice_id: String,

    #[schemars(description = "Jurisdiction (state) the sale was billed from")]
    pub jurisdiction: String,

    #[schemars(
        description = "Sales channel, usually a marketplace name (e.g. 'Amazon', 'Flipkart', 'Website'). Use 'Stock Transfer' for inter-state stock movements."
    )]
    pub channel: String,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64", description = "Taxable value of the invoice, excluding tax")]
    pub taxable_amount: f64,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64", description = "Total tax charged on the invoice")]
    pub tax_amount: f64,
}

/// Net profit and net loss are mutually exclusive on a balance sheet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NetResult {
    #[schemars(description = "Net profit for the period (positive number)")]
    NetProfit(f64),
    #[schemars(description = "Net loss for the period (positive number)")]
    NetLoss(f64),
}

impl NetResult {
    /// Builds a result from the two optional fields a parser may emit. A
    /// non-zero profit wins; otherwise a loss is used.
    pub fn from_parts(net_profit: Option<f64>, net_loss: Option<f64>) -> Option<Self> {
        match (net_profit, net_loss) {
            (Some(p), _) if p != 0.0 => Some(NetResult::NetProfit(p.abs())),
            (_, Some(l)) if l != 0.0 => Some(NetResult::NetLoss(l.abs())),
            (Some(p), _) => Some(NetResult::NetProfit(p)),
            _ => None,
        }
    }

    /// Profit as a positive number, loss as a negative one.
    pub fn signed(&self) -> f64 {
        match self {
            NetResult::NetProfit(v) => *v,
            NetResult::NetLoss(v) => -v.abs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ExtractedField {
    #[schemars(description = "Label as printed in the document (e.g. 'Closing Stock')")]
    pub label: String,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64")]
    pub value: f64,

    #[schemars(description = "Where in the document the value was found (page, cell, line)")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SnapshotProvenance {
    #[schemars(description = "File name of the uploaded balance sheet")]
    pub source_file: String,

    pub extracted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    #[schemars(description = "Every label/value pair read from the document, kept for audit")]
    pub extracted_fields: Vec<ExtractedField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BalanceSheetSnapshot {
    #[schemars(description = "Jurisdiction (state) this balance sheet was prepared for")]
    pub jurisdiction: String,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64")]
    pub opening_stock: f64,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64")]
    pub purchases: f64,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64")]
    pub closing_stock: f64,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64")]
    pub gross_sales: f64,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schemars(with = "f64")]
    pub gross_profit: f64,

    #[serde(default)]
    pub net_result: Option<NetResult>,

    #[serde(default)]
    pub provenance: SnapshotProvenance,
}

impl BalanceSheetSnapshot {
    pub fn new(jurisdiction: impl Into<String>) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            opening_stock: 0.0,
            purchases: 0.0,
            closing_stock: 0.0,
            gross_sales: 0.0,
            gross_profit: 0.0,
            net_result: None,
            provenance: SnapshotProvenance::default(),
        }
    }

    #[must_use]
    pub fn with_stock(mut self, opening_stock: f64, purchases: f64, closing_stock: f64) -> Self {
        self.opening_stock = opening_stock;
        self.purchases = purchases;
        self.closing_stock = closing_stock;
        self
    }

    /// `opening + purchases - closing` for this snapshot alone.
    pub fn raw_material_cost(&self) -> f64 {
        self.opening_stock + self.purchases - self.closing_stock
    }
}

/// Envelope a document-parsing collaborator emits for one month.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParsedDocumentBatch {
    #[schemars(description = "Month the documents cover, in YYYY-MM format")]
    pub month: PeriodKey,

    #[serde(default)]
    pub journal_entries: Vec<JournalEntry>,

    #[serde(default)]
    pub sales_entries: Vec<SalesEntry>,

    #[serde(default)]
    pub balance_sheets: Vec<BalanceSheetSnapshot>,
}

impl ParsedDocumentBatch {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ParsedDocumentBatch)
    }
}

/// Pretty-printed JSON schema of [`ParsedDocumentBatch`].
pub fn input_schema_json() -> Result<String, serde_json::Error> {
    let schema = ParsedDocumentBatch::generate_json_schema();
    serde_json::to_string_pretty(&schema)
}
