use thiserror::Error;

#[derive(Error, Debug)]
pub enum MisError {
    #[error("Invalid period key '{0}': expected YYYY-MM")]
    InvalidPeriod(String),

    #[error("Unknown head: {0}")]
    UnknownHead(String),

    #[error("Subhead '{subhead}' is not permitted under head '{head}'")]
    InvalidSubhead { head: String, subhead: String },

    #[error("Invalid fiscal year start month {0}: must be between 1 and 12")]
    InvalidFiscalYearStartMonth(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transaction {id} not found in {month}")]
    TransactionNotFound { month: String, id: u64 },

    #[error("Classification rule not found: {0}")]
    RuleNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MisError>;
