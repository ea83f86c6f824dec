//! # tabsplit-core
//!
//! Core library for tabsplit - a receipt-driven bill splitter.
//!
//! This library provides:
//! - Domain types for bills, receipts, assignments, and diners
//! - Settlement computation (per-diner subtotal, tax, tip, total)
//! - Assignment reconciliation against an LLM assignment service
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! - **Bills** are the only persisted state. The [`BillStore`] owns the
//!   collection and writes all of it back after every mutation.
//! - **Totals and dashboard views** are derived on demand and never stored.
//! - **Receipt recognition and assignment updates** come from external
//!   services behind the [`llm::ReceiptRecognizer`] and
//!   [`llm::AssignmentService`] traits.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tabsplit_core::{BillStore, Config, Database};
//!
//! let config = Config::load().expect("failed to load config");
//! let _guard = tabsplit_core::logging::init(&config.logging).expect("failed to start logging");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! let store = BillStore::open(db).expect("failed to load bills");
//! println!("{} bills", store.bills().len());
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{compute_totals, BillSummary, Dashboard};
pub use config::Config;
pub use db::Database;
pub use diners::{frequent_diners, StagedDiners};
pub use error::{Error, Result};
pub use reconcile::{PendingReconciliation, Reconciled};
pub use store::BillStore;
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod diners;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod llm;
pub mod logging;
pub mod reconcile;
pub mod store;
pub mod types;
