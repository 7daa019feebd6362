use crate::error::{MisError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a head counts credit amounts, debit amounts, or nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HeadType {
    #[schemars(description = "Credit-side amounts are counted (as positive values)")]
    Revenue,
    #[schemars(description = "Debit-side amounts are counted")]
    Expense,
    #[schemars(description = "Nothing is counted; transactions are kept for drill-down only")]
    Ignore,
}

impl HeadType {
    /// Contribution of a signed journal amount (debit positive, credit
    /// negative) to a head of this type. The opposite side is dropped,
    /// not netted.
    pub fn countable_amount(self, amount: f64) -> f64 {
        match self {
            HeadType::Revenue if amount < 0.0 => -amount,
            HeadType::Expense if amount > 0.0 => amount,
            _ => 0.0,
        }
    }
}

/// The fixed chart of heads, in P&L presentation order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub enum Head {
    Revenue,
    Returns,
    Discounts,
    Taxes,
    #[serde(rename = "COGM")]
    Cogm,
    #[serde(rename = "Channel & Fulfillment")]
    ChannelFulfillment,
    #[serde(rename = "Sales & Marketing")]
    SalesMarketing,
    #[serde(rename = "Platform Costs")]
    PlatformCosts,
    #[serde(rename = "Operating Expenses")]
    OperatingExpenses,
    #[serde(rename = "Non-Operating")]
    NonOperating,
    Exclude,
    Ignore,
}

const REVENUE_SUBHEADS: &[&str] = &[
    "Amazon",
    "Flipkart",
    "Meesho",
    "Myntra",
    "Website",
    "Offline",
    "Other Channels",
    "Other Operating Revenue",
];
const RETURNS_SUBHEADS: &[&str] = &["Sales Returns", "RTO Losses"];
const DISCOUNTS_SUBHEADS: &[&str] = &["Trade Discounts", "Promotional Discounts"];
const TAXES_SUBHEADS: &[&str] = &["GST", "TDS", "TCS", "Other Taxes"];

pub const DIRECT_LABOR_SUBHEADS: &[&str] = &["Direct Labor", "Job Work"];
pub const DIRECT_EXPENSE_SUBHEADS: &[&str] = &[
    "Factory Power & Fuel",
    "Packaging Material",
    "Freight Inward",
    "Consumables",
    "Other Direct Expenses",
];
const COGM_SUBHEADS: &[&str] = &[
    "Direct Labor",
    "Job Work",
    "Factory Power & Fuel",
    "Packaging Material",
    "Freight Inward",
    "Consumables",
    "Other Direct Expenses",
];

const CHANNEL_FULFILLMENT_SUBHEADS: &[&str] = &[
    "Amazon Fees",
    "Flipkart Fees",
    "Marketplace Commission",
    "Shipping & Logistics",
    "Payment Gateway",
    "Warehousing",
];
const SALES_MARKETING_SUBHEADS: &[&str] = &[
    "Google Ads",
    "Meta Ads",
    "Amazon Ads",
    "Influencer Marketing",
    "Other Marketing",
];
const PLATFORM_COSTS_SUBHEADS: &[&str] = &["Shopify", "Software Subscriptions", "Hosting"];
const OPERATING_EXPENSES_SUBHEADS: &[&str] = &[
    "Salaries",
    "Rent",
    "Utilities",
    "Professional Fees",
    "Office Expenses",
    "Travel",
    "Bank Charges",
    "Repairs & Maintenance",
    "Other Operating Expenses",
];

pub const INTEREST_SUBHEAD: &str = "Interest";
pub const DEPRECIATION_SUBHEAD: &str = "Depreciation";
pub const AMORTIZATION_SUBHEAD: &str = "Amortization";
pub const INCOME_TAX_SUBHEAD: &str = "Income Tax";
const NON_OPERATING_SUBHEADS: &[&str] = &[
    INTEREST_SUBHEAD,
    DEPRECIATION_SUBHEAD,
    AMORTIZATION_SUBHEAD,
    INCOME_TAX_SUBHEAD,
];

const EXCLUDE_SUBHEADS: &[&str] = &[
    "Stock Transfer",
    "Capital Expenditure",
    "Loans & Advances",
    "Inter-company",
    "GST Input Credit",
];
const IGNORE_SUBHEADS: &[&str] = &["Ignore"];

/// Revenue subhead used for sales channels that match no known marketplace.
pub const OTHER_CHANNELS_SUBHEAD: &str = "Other Channels";

// channel aliases checked after direct subhead-name containment
const CHANNEL_ALIASES: &[(&str, &str)] = &[
    ("shopify", "Website"),
    ("d2c", "Website"),
    ("web store", "Website"),
    ("distributor", "Offline"),
    ("retail store", "Offline"),
    ("b2b", "Offline"),
];

impl Head {
    pub const ALL: [Head; 12] = [
        Head::Revenue,
        Head::Returns,
        Head::Discounts,
        Head::Taxes,
        Head::Cogm,
        Head::ChannelFulfillment,
        Head::SalesMarketing,
        Head::PlatformCosts,
        Head::OperatingExpenses,
        Head::NonOperating,
        Head::Exclude,
        Head::Ignore,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Head::Revenue => "Revenue",
            Head::Returns => "Returns",
            Head::Discounts => "Discounts",
            Head::Taxes => "Taxes",
            Head::Cogm => "COGM",
            Head::ChannelFulfillment => "Channel & Fulfillment",
            Head::SalesMarketing => "Sales & Marketing",
            Head::PlatformCosts => "Platform Costs",
            Head::OperatingExpenses => "Operating Expenses",
            Head::NonOperating => "Non-Operating",
            Head::Exclude => "Exclude",
            Head::Ignore => "Ignore",
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Result<Head> {
        let wanted = name.trim();
        Head::ALL
            .iter()
            .copied()
            .find(|h| h.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MisError::UnknownHead(name.to_string()))
    }

    pub fn head_type(self) -> HeadType {
        match self {
            Head::Revenue => HeadType::Revenue,
            Head::Exclude | Head::Ignore => HeadType::Ignore,
            _ => HeadType::Expense,
        }
    }

    pub fn subheads(self) -> &'static [&'static str] {
        match self {
            Head::Revenue => REVENUE_SUBHEADS,
            Head::Returns => RETURNS_SUBHEADS,
            Head::Discounts => DISCOUNTS_SUBHEADS,
            Head::Taxes => TAXES_SUBHEADS,
            Head::Cogm => COGM_SUBHEADS,
            Head::ChannelFulfillment => CHANNEL_FULFILLMENT_SUBHEADS,
            Head::SalesMarketing => SALES_MARKETING_SUBHEADS,
            Head::PlatformCosts => PLATFORM_COSTS_SUBHEADS,
            Head::OperatingExpenses => OPERATING_EXPENSES_SUBHEADS,
            Head::NonOperating => NON_OPERATING_SUBHEADS,
            Head::Exclude => EXCLUDE_SUBHEADS,
            Head::Ignore => IGNORE_SUBHEADS,
        }
    }

    /// Returns the canonical spelling of `subhead` if it is permitted under
    /// this head (matched case-insensitively).
    pub fn canonical_subhead(self, subhead: &str) -> Option<&'static str> {
        let wanted = subhead.trim();
        self.subheads()
            .iter()
            .copied()
            .find(|s| s.eq_ignore_ascii_case(wanted))
    }

    pub fn validate_subhead(self, subhead: &str) -> Result<&'static str> {
        self.canonical_subhead(subhead)
            .ok_or_else(|| MisError::InvalidSubhead {
                head: self.name().to_string(),
                subhead: subhead.to_string(),
            })
    }
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated (head, subhead) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeadAssignment {
    pub head: Head,
    pub subhead: String,
}

impl HeadAssignment {
    pub fn new(head: Head, subhead: &str) -> Result<Self> {
        let canonical = head.validate_subhead(subhead)?;
        Ok(Self {
            head,
            subhead: canonical.to_string(),
        })
    }
}

/// Static grouping of subheads that feed named steps of the margin
/// waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostGroup {
    DirectLabor,
    DirectExpense,
    Interest,
    Depreciation,
    Amortization,
    IncomeTax,
}

pub fn cost_group(head: Head, subhead: &str) -> Option<CostGroup> {
    match head {
        Head::Cogm if DIRECT_LABOR_SUBHEADS.contains(&subhead) => Some(CostGroup::DirectLabor),
        Head::Cogm if DIRECT_EXPENSE_SUBHEADS.contains(&subhead) => {
            Some(CostGroup::DirectExpense)
        }
        Head::NonOperating => match subhead {
            INTEREST_SUBHEAD => Some(CostGroup::Interest),
            DEPRECIATION_SUBHEAD => Some(CostGroup::Depreciation),
            AMORTIZATION_SUBHEAD => Some(CostGroup::Amortization),
            INCOME_TAX_SUBHEAD => Some(CostGroup::IncomeTax),
            _ => None,
        },
        _ => None,
    }
}

/// Maps a free-text sales channel onto a Revenue subhead.
pub fn revenue_subhead_for_channel(channel: &str) -> &'static str {
    let lower = channel.trim().to_lowercase();
    if lower.is_empty() {
        return OTHER_CHANNELS_SUBHEAD;
    }

    if let Some(direct) = REVENUE_SUBHEADS
        .iter()
        .copied()
        .filter(|s| !s.starts_with("Other"))
        .find(|s| lower.contains(&s.to_lowercase()))
    {
        return direct;
    }

    CHANNEL_ALIASES
        .iter()
        .find(|(alias, _)| lower.contains(alias))
        .map(|(_, subhead)| *subhead)
        .unwrap_or(OTHER_CHANNELS_SUBHEAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_order_and_names() {
        assert_eq!(Head::ALL.len(), 12);
        assert!(Head::Revenue < Head::Cogm);
        assert!(Head::NonOperating < Head::Ignore);
        assert_eq!(Head::ChannelFulfillment.to_string(), "Channel & Fulfillment");
        assert_eq!(
            Head::from_name("channel & fulfillment").unwrap(),
            Head::ChannelFulfillment
        );
        assert!(matches!(
            Head::from_name("Marketing"),
            Err(MisError::UnknownHead(_))
        ));
    }

    #[test]
    fn test_head_types() {
        assert_eq!(Head::Revenue.head_type(), HeadType::Revenue);
        assert_eq!(Head::SalesMarketing.head_type(), HeadType::Expense);
        assert_eq!(Head::Exclude.head_type(), HeadType::Ignore);
        assert_eq!(Head::Ignore.head_type(), HeadType::Ignore);
    }

    #[test]
    fn test_countable_amount_is_one_sided() {
        assert_eq!(HeadType::Expense.countable_amount(500.0), 500.0);
        assert_eq!(HeadType::Expense.countable_amount(-500.0), 0.0);
        assert_eq!(HeadType::Revenue.countable_amount(-1200.0), 1200.0);
        assert_eq!(HeadType::Revenue.countable_amount(1200.0), 0.0);
        assert_eq!(HeadType::Ignore.countable_amount(99.0), 0.0);
    }

    #[test]
    fn test_subhead_validation() {
        let assignment = HeadAssignment::new(Head::SalesMarketing, "google ads").unwrap();
        assert_eq!(assignment.subhead, "Google Ads");

        let err = HeadAssignment::new(Head::Revenue, "Google Ads").unwrap_err();
        assert!(matches!(err, MisError::InvalidSubhead { .. }));
    }

    #[test]
    fn test_every_head_has_subheads() {
        for head in Head::ALL {
            assert!(!head.subheads().is_empty(), "{} has no subheads", head);
        }
    }

    #[test]
    fn test_cost_groups() {
        assert_eq!(
            cost_group(Head::Cogm, "Job Work"),
            Some(CostGroup::DirectLabor)
        );
        assert_eq!(
            cost_group(Head::Cogm, "Packaging Material"),
            Some(CostGroup::DirectExpense)
        );
        assert_eq!(
            cost_group(Head::NonOperating, "Income Tax"),
            Some(CostGroup::IncomeTax)
        );
        assert_eq!(cost_group(Head::OperatingExpenses, "Rent"), None);

        for subhead in Head::Cogm.subheads() {
            assert!(cost_group(Head::Cogm, subhead).is_some());
        }
        for subhead in Head::NonOperating.subheads() {
            assert!(cost_group(Head::NonOperating, subhead).is_some());
        }
    }

    #[test]
    fn test_channel_mapping() {
        assert_eq!(revenue_subhead_for_channel("Amazon IN"), "Amazon");
        assert_eq!(revenue_subhead_for_channel("FLIPKART"), "Flipkart");
        assert_eq!(revenue_subhead_for_channel("Shopify D2C"), "Website");
        assert_eq!(revenue_subhead_for_channel("Distributor - Pune"), "Offline");
        assert_eq!(revenue_subhead_for_channel("Nykaa"), OTHER_CHANNELS_SUBHEAD);
        assert_eq!(revenue_subhead_for_channel("  "), OTHER_CHANNELS_SUBHEAD);
    }

    #[test]
    fn test_head_serializes_as_display_name() {
        let json = serde_json::to_string(&Head::ChannelFulfillment).unwrap();
        assert_eq!(json, "\"Channel & Fulfillment\"");
        let head: Head = serde_json::from_str("\"COGM\"").unwrap();
        assert_eq!(head, Head::Cogm);
    }
}
