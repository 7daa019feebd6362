use crate::taxonomy::{cost_group, CostGroup, Head};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Head and subhead totals, the input to the waterfall. Both levels are
/// explicit maps so iteration order follows the taxonomy and subhead name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeadTotals {
    pub heads: BTreeMap<Head, f64>,
    pub subheads: BTreeMap<Head, BTreeMap<String, f64>>,
}

impl HeadTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, head: Head, subhead: &str, amount: f64) {
        *self.heads.entry(head).or_default() += amount;
        *self
            .subheads
            .entry(head)
            .or_default()
            .entry(subhead.to_string())
            .or_default() += amount;
    }

    pub fn head(&self, head: Head) -> f64 {
        self.heads.get(&head).copied().unwrap_or(0.0)
    }

    pub fn subhead(&self, head: Head, subhead: &str) -> f64 {
        self.subheads
            .get(&head)
            .and_then(|s| s.get(subhead))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn merge(&mut self, other: &HeadTotals) {
        for (head, subheads) in &other.subheads {
            for (subhead, amount) in subheads {
                self.add(*head, subhead, *amount);
            }
        }
        // heads without subhead detail
        for (head, amount) in &other.heads {
            if !other.subheads.contains_key(head) {
                *self.heads.entry(*head).or_default() += amount;
            }
        }
    }

    pub fn group_total(&self, group: CostGroup) -> f64 {
        self.subheads
            .iter()
            .flat_map(|(head, subheads)| subheads.iter().map(move |(s, v)| (*head, s, *v)))
            .filter(|(head, subhead, _)| cost_group(*head, subhead) == Some(group))
            .map(|(_, _, v)| v)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StockFigures {
    pub opening_stock: f64,
    pub purchases: f64,
    pub closing_stock: f64,
}

impl StockFigures {
    pub fn raw_material_cost(&self) -> f64 {
        self.opening_stock + self.purchases - self.closing_stock
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MarginPercentages {
    pub cogm_pct: f64,
    pub gross_margin_pct: f64,
    pub cm1_pct: f64,
    pub cm2_pct: f64,
    pub cm3_pct: f64,
    pub ebitda_pct: f64,
    pub ebt_pct: f64,
    pub net_income_pct: f64,
}

/// Gross revenue down to net income. Every margin is the previous step
/// minus its deduction; negative values are kept as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarginWaterfall {
    pub gross_revenue: f64,
    pub returns: f64,
    pub discounts: f64,
    pub taxes: f64,
    pub net_revenue: f64,

    pub raw_material_cost: f64,
    pub direct_labor: f64,
    pub direct_expenses: f64,
    pub cogm: f64,
    pub gross_margin: f64,

    pub channel_fulfillment: f64,
    pub cm1: f64,

    pub sales_marketing: f64,
    pub cm2: f64,

    pub platform_costs: f64,
    pub cm3: f64,

    pub operating_expenses: f64,
    pub ebitda: f64,

    pub interest: f64,
    pub depreciation: f64,
    pub amortization: f64,
    pub ebt: f64,

    pub income_tax: f64,
    pub net_income: f64,

    pub percentages: MarginPercentages,
}

/// `value / net_revenue * 100`, or 0 when net revenue is 0 (or the result
/// would not be finite).
pub fn percent_of(value: f64, net_revenue: f64) -> f64 {
    if net_revenue == 0.0 {
        return 0.0;
    }
    let pct = value / net_revenue * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

pub fn compute_margins(totals: &HeadTotals, stock: &StockFigures) -> MarginWaterfall {
    let gross_revenue = totals.head(Head::Revenue);
    let returns = totals.head(Head::Returns);
    let discounts = totals.head(Head::Discounts);
    let taxes = totals.head(Head::Taxes);
    let net_revenue = gross_revenue - returns - discounts - taxes;

    let raw_material_cost = stock.raw_material_cost();
    let direct_labor = totals.group_total(CostGroup::DirectLabor);
    let direct_expenses = totals.group_total(CostGroup::DirectExpense);
    let cogm = raw_material_cost + direct_labor + direct_expenses;
    let gross_margin = net_revenue - cogm;

    let channel_fulfillment = totals.head(Head::ChannelFulfillment);
    let cm1 = gross_margin - channel_fulfillment;

    let sales_marketing = totals.head(Head::SalesMarketing);
    let cm2 = cm1 - sales_marketing;

    let platform_costs = totals.head(Head::PlatformCosts);
    let cm3 = cm2 - platform_costs;

    let operating_expenses = totals.head(Head::OperatingExpenses);
    let ebitda = cm3 - operating_expenses;

    let interest = totals.group_total(CostGroup::Interest);
    let depreciation = totals.group_total(CostGroup::Depreciation);
    let amortization = totals.group_total(CostGroup::Amortization);
    let ebt = ebitda - (interest + depreciation + amortization);

    let income_tax = totals.group_total(CostGroup::IncomeTax);
    let net_income = ebt - income_tax;

    let percentages = MarginPercentages {
        cogm_pct: percent_of(cogm, net_revenue),
        gross_margin_pct: percent_of(gross_margin, net_revenue),
        cm1_pct: percent_of(cm1, net_revenue),
        cm2_pct: percent_of(cm2, net_revenue),
        cm3_pct: percent_of(cm3, net_revenue),
        ebitda_pct: percent_of(ebitda, net_revenue),
        ebt_pct: percent_of(ebt, net_revenue),
        net_income_pct: percent_of(net_income, net_revenue),
    };

    MarginWaterfall {
        gross_revenue,
        returns,
        discounts,
        taxes,
        net_revenue,
        raw_material_cost,
        direct_labor,
        direct_expenses,
        cogm,
        gross_margin,
        channel_fulfillment,
        cm1,
        sales_marketing,
        cm2,
        platform_costs,
        cm3,
        operating_expenses,
        ebitda,
        interest,
        depreciation,
        amortization,
        ebt,
        income_tax,
        net_income,
        percentages,
    }
}
