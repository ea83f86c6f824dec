//! Error types for tabsplit-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tabsplit-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// LLM transport or response error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Receipt recognition failed or returned unusable output
    #[error("receipt recognition failed: {0}")]
    Recognition(String),

    /// The receipt image could not be read
    #[error("failed to read image {path:?}: {message}")]
    ImageRead { path: PathBuf, message: String },

    /// Assignment service returned a list that does not cover the receipt
    #[error("assignment update has {actual} entries for {expected} receipt items")]
    InvalidReconciliationShape { expected: usize, actual: usize },

    /// Stored bill collection could not be decoded
    #[error("malformed stored state: {0}")]
    MalformedState(String),

    /// Rejected user input (blank name, bad price, out-of-range tip)
    #[error("invalid input: {0}")]
    Validation(String),

    /// Bill not found
    #[error("bill not found: {0}")]
    BillNotFound(String),

    /// Receipt item not found
    #[error("receipt item not found: {0}")]
    ItemNotFound(u32),

    /// Diner not on the bill
    #[error("diner not found: {0}")]
    DinerNotFound(String),

    /// A reconciliation call for this bill has not settled yet
    #[error("an assignment update is already in progress for bill {0}")]
    ReconciliationInFlight(String),
}

/// Result type alias for tabsplit-core
pub type Result<T> = std::result::Result<T, Error>;
