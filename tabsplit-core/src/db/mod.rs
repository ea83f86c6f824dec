//! Database layer for tabsplit
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Whole-collection load and replace of bill records

pub mod repo;
pub mod schema;

pub use repo::Database;
