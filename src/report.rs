use crate::margins::{percent_of, MarginWaterfall};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    Item,
    Subtotal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub label: String,
    pub value: f64,
    /// Share of net revenue, 0 when net revenue is 0.
    pub pct_of_net_revenue: f64,
    pub kind: LineKind,
}

/// The waterfall as ordered, labelled lines for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisStatement {
    pub title: String,
    pub lines: Vec<StatementLine>,
}

pub fn round_currency(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    // avoid printing "-0.00"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

impl MisStatement {
    pub fn from_waterfall(title: impl Into<String>, w: &MarginWaterfall) -> Self {
        let net = w.net_revenue;
        let rows: [(&str, f64, LineKind); 24] = [
            ("Gross Revenue", w.gross_revenue, LineKind::Item),
            ("Returns", w.returns, LineKind::Item),
            ("Discounts", w.discounts, LineKind::Item),
            ("Taxes", w.taxes, LineKind::Item),
            ("Net Revenue", w.net_revenue, LineKind::Subtotal),
            ("Raw Material Cost", w.raw_material_cost, LineKind::Item),
            ("Direct Labor", w.direct_labor, LineKind::Item),
            ("Direct Expenses", w.direct_expenses, LineKind::Item),
            ("COGM", w.cogm, LineKind::Subtotal),
            ("Gross Margin", w.gross_margin, LineKind::Subtotal),
            ("Channel & Fulfillment", w.channel_fulfillment, LineKind::Item),
            ("CM1", w.cm1, LineKind::Subtotal),
            ("Sales & Marketing", w.sales_marketing, LineKind::Item),
            ("CM2", w.cm2, LineKind::Subtotal),
            ("Platform Costs", w.platform_costs, LineKind::Item),
            ("CM3", w.cm3, LineKind::Subtotal),
            ("Operating Expenses", w.operating_expenses, LineKind::Item),
            ("EBITDA", w.ebitda, LineKind::Subtotal),
            ("Interest", w.interest, LineKind::Item),
            ("Depreciation", w.depreciation, LineKind::Item),
            ("Amortization", w.amortization, LineKind::Item),
            ("EBT", w.ebt, LineKind::Subtotal),
            ("Income Tax", w.income_tax, LineKind::Item),
            ("Net Income", w.net_income, LineKind::Subtotal),
        ];

        let lines = rows
            .iter()
            .map(|(label, value, kind)| StatementLine {
                label: label.to_string(),
                value: *value,
                pct_of_net_revenue: percent_of(*value, net),
                kind: *kind,
            })
            .collect();

        Self {
            title: title.into(),
            lines,
        }
    }

    pub fn line(&self, label: &str) -> Option<&StatementLine> {
        self.lines.iter().find(|l| l.label == label)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self, precision: usize) -> String {
        let mut output = String::new();
        output.push_str("Line,Amount,% of Net Revenue\n");

        for line in &self.lines {
            output.push_str(&format!(
                "{},{:.p$},{:.2}\n",
                csv_field(&line.label),
                round_currency(line.value, precision),
                round_currency(line.pct_of_net_revenue, 2),
                p = precision
            ));
        }

        output
    }

    pub fn to_markdown(&self, precision: usize) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str("| Line | Amount | % of Net Revenue |\n");
        output.push_str("|---|---:|---:|\n");

        for line in &self.lines {
            let label = match line.kind {
                LineKind::Subtotal => format!("**{}**", line.label),
                LineKind::Item => line.label.clone(),
            };
            output.push_str(&format!(
                "| {} | {:.p$} | {:.2}% |\n",
                label,
                round_currency(line.value, precision),
                round_currency(line.pct_of_net_revenue, 2),
                p = precision
            ));
        }

        output
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
