//! Ordered pattern rules that map ledger descriptions onto heads.
//!
//! Rules are evaluated in ascending priority (ties keep insertion order)
//! and the first match wins. Patterns are compiled once per rule-set load;
//! a regex that fails to compile is logged and skipped, never surfaced.

use crate::error::Result;
use crate::taxonomy::{Head, HeadAssignment};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const USER_RULE_PRIORITY: i32 = 10;
pub const SYSTEM_RULE_PRIORITY: i32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[schemars(description = "Whole description equals the pattern (case-insensitive)")]
    Exact,
    #[schemars(description = "Description contains the pattern (case-insensitive)")]
    Substring,
    #[schemars(description = "Pattern is a regular expression, matched case-insensitively")]
    Regex,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    #[default]
    User,
    System,
    Reclassification,
    Imported,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ClassificationRule {
    pub id: String,

    pub pattern: String,

    pub match_mode: MatchMode,

    pub head: Head,

    #[schemars(description = "Must be one of the permitted subheads of `head`")]
    pub subhead: String,

    #[schemars(description = "Lower numbers are applied first. User rules outrank system rules.")]
    pub priority: i32,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub source: RuleSource,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl ClassificationRule {
    /// Creates an active user rule. Fails if `subhead` is not permitted
    /// under `head`.
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        match_mode: MatchMode,
        head: Head,
        subhead: &str,
        priority: i32,
    ) -> Result<Self> {
        let assignment = HeadAssignment::new(head, subhead)?;
        Ok(Self {
            id: id.into(),
            pattern: pattern.into(),
            match_mode,
            head: assignment.head,
            subhead: assignment.subhead,
            priority,
            active: true,
            source: RuleSource::User,
            notes: None,
            created_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn with_source(mut self, source: RuleSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn assignment(&self) -> HeadAssignment {
        HeadAssignment {
            head: self.head,
            subhead: self.subhead.clone(),
        }
    }
}

#[derive(Debug)]
enum Matcher {
    Exact(String),
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    fn compile(rule: &ClassificationRule) -> std::result::Result<Matcher, String> {
        let pattern = rule.pattern.trim();
        if pattern.is_empty() {
            return Err("empty pattern".to_string());
        }

        match rule.match_mode {
            MatchMode::Exact => Ok(Matcher::Exact(pattern.to_lowercase())),
            MatchMode::Substring => Ok(Matcher::Substring(pattern.to_lowercase())),
            MatchMode::Regex => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(Matcher::Regex)
                .map_err(|e| e.to_string()),
        }
    }

    fn is_match(&self, lowered: &str) -> bool {
        match self {
            Matcher::Exact(p) => lowered == p,
            Matcher::Substring(p) => lowered.contains(p.as_str()),
            Matcher::Regex(re) => re.is_match(lowered),
        }
    }
}

/// A rule list sorted by priority with its patterns compiled.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
    // (index into `rules`, matcher) for active rules that compiled
    compiled: Vec<(usize, Matcher)>,
    invalid: Vec<String>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<ClassificationRule>) -> Self {
        // stable: equal priorities keep insertion order
        rules.sort_by_key(|r| r.priority);

        let mut compiled = Vec::new();
        let mut invalid = Vec::new();

        for (idx, rule) in rules.iter_mut().enumerate() {
            if !rule.active {
                continue;
            }
            match rule.head.canonical_subhead(&rule.subhead) {
                Some(canonical) => rule.subhead = canonical.to_string(),
                None => {
                    warn!(
                        "Skipping classification rule '{}': subhead '{}' is not permitted under '{}'",
                        rule.id, rule.subhead, rule.head
                    );
                    invalid.push(rule.id.clone());
                    continue;
                }
            }
            match Matcher::compile(rule) {
                Ok(matcher) => compiled.push((idx, matcher)),
                Err(reason) => {
                    warn!(
                        "Skipping classification rule '{}' with invalid pattern '{}': {}",
                        rule.id, rule.pattern, reason
                    );
                    invalid.push(rule.id.clone());
                }
            }
        }

        debug!(
            "Compiled {} of {} classification rules ({} invalid)",
            compiled.len(),
            rules.len(),
            invalid.len()
        );

        Self {
            rules,
            compiled,
            invalid,
        }
    }

    /// First active, valid rule whose pattern matches `description`.
    pub fn classify(&self, description: &str) -> Option<&ClassificationRule> {
        let lowered = description.trim().to_lowercase();
        self.compiled
            .iter()
            .find(|(_, matcher)| matcher.is_match(&lowered))
            .map(|(idx, _)| &self.rules[*idx])
    }

    /// All rules in evaluation order, including inactive and invalid ones.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<ClassificationRule> {
        self.rules
    }

    /// Ids of active rules whose pattern could not be compiled or whose
    /// subhead is not permitted under their head.
    pub fn invalid_rule_ids(&self) -> &[String] {
        &self.invalid
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn lowest_priority(&self) -> Option<i32> {
        self.rules.first().map(|r| r.priority)
    }

    /// Priority for a rule synthesised from a user correction: 0, or lower
    /// if something already sits at or below 0.
    pub fn correction_priority(&self) -> i32 {
        match self.lowest_priority() {
            Some(lowest) if lowest <= 0 => lowest.saturating_sub(1),
            _ => 0,
        }
    }
}

const BOILERPLATE_TOKENS: &[&str] = &[
    "to", "by", "a/c", "ac", "acct", "account", "ledger", "m/s", "dr", "cr", "(dr)", "(cr)",
];
const SUGGESTED_WORD_COUNT: usize = 3;

fn is_boilerplate(token: &str) -> bool {
    let cleaned = token
        .trim_matches(|c: char| c == '.' || c == ',' || c == ';')
        .to_lowercase();
    cleaned.is_empty() || BOILERPLATE_TOKENS.contains(&cleaned.as_str())
}

fn strip_boilerplate(text: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    while tokens.first().is_some_and(|t| is_boilerplate(t)) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(|t| is_boilerplate(t)) {
        tokens.pop();
    }
    tokens
}

/// Extracts a short, reusable pattern from an account description: leading
/// and trailing boilerplate (`To`, `By`, `A/c`, `Dr`, ...) is dropped, then
/// the segment after a `:` or ` - ` separator is used, else the first few
/// words.
pub fn suggest_pattern(account_description: &str) -> String {
    let core = strip_boilerplate(account_description).join(" ");

    let after_separator = core
        .split_once(':')
        .or_else(|| core.split_once(" - "))
        .map(|(_, rest)| strip_boilerplate(rest).join(" "))
        .filter(|rest| !rest.is_empty());

    let suggestion = match after_separator {
        Some(segment) => segment,
        None => core
            .split_whitespace()
            .take(SUGGESTED_WORD_COUNT)
            .collect::<Vec<_>>()
            .join(" "),
    };

    if suggestion.is_empty() {
        account_description.trim().to_string()
    } else {
        suggestion
    }
}

// (pattern, mode, head, subhead)
const SYSTEM_RULES: &[(&str, MatchMode, Head, &str)] = &[
    ("stock transfer|branch transfer", MatchMode::Regex, Head::Exclude, "Stock Transfer"),
    ("input (igst|cgst|sgst|gst)", MatchMode::Regex, Head::Exclude, "GST Input Credit"),
    (r"\bloans?\b", MatchMode::Regex, Head::Exclude, "Loans & Advances"),
    ("fixed asset|plant & machinery|plant and machinery", MatchMode::Regex, Head::Exclude, "Capital Expenditure"),
    ("sales return", MatchMode::Substring, Head::Returns, "Sales Returns"),
    (r"\brto\b", MatchMode::Regex, Head::Returns, "RTO Losses"),
    ("discount", MatchMode::Substring, Head::Discounts, "Trade Discounts"),
    ("income tax|advance tax", MatchMode::Regex, Head::NonOperating, "Income Tax"),
    (r"\btds\b", MatchMode::Regex, Head::Taxes, "TDS"),
    (r"\btcs\b", MatchMode::Regex, Head::Taxes, "TCS"),
    (r"\b(igst|cgst|sgst|gst)\b", MatchMode::Regex, Head::Taxes, "GST"),
    ("amazon ads|sponsored products", MatchMode::Regex, Head::SalesMarketing, "Amazon Ads"),
    ("amazon.*(fee|commission|closing)", MatchMode::Regex, Head::ChannelFulfillment, "Amazon Fees"),
    ("flipkart.*(fee|commission)", MatchMode::Regex, Head::ChannelFulfillment, "Flipkart Fees"),
    ("shiprocket|delhivery|bluedart|courier|freight outward", MatchMode::Regex, Head::ChannelFulfillment, "Shipping & Logistics"),
    ("razorpay|payu|cashfree|payment gateway", MatchMode::Regex, Head::ChannelFulfillment, "Payment Gateway"),
    ("warehous", MatchMode::Substring, Head::ChannelFulfillment, "Warehousing"),
    ("google ads", MatchMode::Substring, Head::SalesMarketing, "Google Ads"),
    ("facebook|meta ads|instagram", MatchMode::Regex, Head::SalesMarketing, "Meta Ads"),
    ("influencer", MatchMode::Substring, Head::SalesMarketing, "Influencer Marketing"),
    ("shopify", MatchMode::Substring, Head::PlatformCosts, "Shopify"),
    (r"\baws\b|hosting|godaddy", MatchMode::Regex, Head::PlatformCosts, "Hosting"),
    ("factory wages|labour charges|labor charges", MatchMode::Regex, Head::Cogm, "Direct Labor"),
    ("job work", MatchMode::Substring, Head::Cogm, "Job Work"),
    ("packing material|packaging", MatchMode::Regex, Head::Cogm, "Packaging Material"),
    ("freight inward|carriage inward", MatchMode::Regex, Head::Cogm, "Freight Inward"),
    ("factory power|power and fuel|power & fuel", MatchMode::Regex, Head::Cogm, "Factory Power & Fuel"),
    ("salary|salaries|wages", MatchMode::Regex, Head::OperatingExpenses, "Salaries"),
    (r"\brent\b", MatchMode::Regex, Head::OperatingExpenses, "Rent"),
    ("electricity|internet|telephone", MatchMode::Regex, Head::OperatingExpenses, "Utilities"),
    ("audit fee|legal|professional|consultancy", MatchMode::Regex, Head::OperatingExpenses, "Professional Fees"),
    ("bank charges", MatchMode::Substring, Head::OperatingExpenses, "Bank Charges"),
    ("travel|conveyance", MatchMode::Regex, Head::OperatingExpenses, "Travel"),
    ("interest", MatchMode::Substring, Head::NonOperating, "Interest"),
    ("depreciation", MatchMode::Substring, Head::NonOperating, "Depreciation"),
    ("amortisation|amortization", MatchMode::Regex, Head::NonOperating, "Amortization"),
];

/// Built-in rules covering common ledger names. They start at
/// [`SYSTEM_RULE_PRIORITY`] so any user rule outranks them.
pub fn default_system_rules() -> Vec<ClassificationRule> {
    let created_at = Utc::now();
    SYSTEM_RULES
        .iter()
        .enumerate()
        .map(|(idx, (pattern, mode, head, subhead))| ClassificationRule {
            id: format!("sys-{:03}", idx + 1),
            pattern: pattern.to_string(),
            match_mode: *mode,
            head: *head,
            subhead: subhead.to_string(),
            priority: SYSTEM_RULE_PRIORITY + idx as i32,
            active: true,
            source: RuleSource::System,
            notes: None,
            created_at,
        })
        .collect()
}
