//! Derived views over bills
//!
//! Nothing here is persisted; every value is recomputed from bill state.

pub mod dashboard;
pub mod settlement;

pub use dashboard::{BillSummary, Dashboard};
pub use settlement::compute_totals;
