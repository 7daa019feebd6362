use crate::error::{MisError, Result};
use crate::period::validate_fiscal_year_start_month;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MisConfig {
    #[serde(default)]
    pub organization_name: String,

    /// Jurisdiction whose balance sheet drives stock-derived raw material
    /// cost. Other jurisdictions hold transferred stock only.
    #[serde(default = "default_primary_jurisdiction")]
    pub primary_jurisdiction: String,

    /// First month of the fiscal year (4 = April).
    #[serde(default = "default_fiscal_year_start_month")]
    pub fiscal_year_start_month: u32,

    /// Sales channels (matched case-insensitively by containment) that are
    /// inter-jurisdiction stock transfers rather than revenue.
    #[serde(default = "default_stock_transfer_channels")]
    pub stock_transfer_channels: Vec<String>,

    /// Decimal places used when rendering statements.
    #[serde(default = "default_currency_precision")]
    pub currency_precision: usize,
}

fn default_primary_jurisdiction() -> String {
    "HQ".to_string()
}

fn default_fiscal_year_start_month() -> u32 {
    4
}

fn default_stock_transfer_channels() -> Vec<String> {
    vec!["stock transfer".to_string(), "branch transfer".to_string()]
}

fn default_currency_precision() -> usize {
    2
}

impl Default for MisConfig {
    fn default() -> Self {
        Self {
            organization_name: String::new(),
            primary_jurisdiction: default_primary_jurisdiction(),
            fiscal_year_start_month: default_fiscal_year_start_month(),
            stock_transfer_channels: default_stock_transfer_channels(),
            currency_precision: default_currency_precision(),
        }
    }
}

impl MisConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        validate_fiscal_year_start_month(self.fiscal_year_start_month)?;
        if self.primary_jurisdiction.trim().is_empty() {
            return Err(MisError::InvalidConfig(
                "primary_jurisdiction must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_stock_transfer_channel(&self, channel: &str) -> bool {
        is_stock_transfer(&self.stock_transfer_channels, channel)
    }
}

pub(crate) fn is_stock_transfer(channels: &[String], channel: &str) -> bool {
    let lower = channel.to_lowercase();
    channels
        .iter()
        .map(|c| c.trim().to_lowercase())
        .any(|c| !c.is_empty() && lower.contains(&c))
}
