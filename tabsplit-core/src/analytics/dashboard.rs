//! Dashboard aggregation for the bill list view.
//!
//! Splits the collection into unsettled bills (shown newest first) and a
//! count of settled bills eligible for bulk clearing.

use chrono::{DateTime, Utc};

use super::settlement::compute_totals;
use crate::types::Bill;

/// One card in the unsettled bill list.
#[derive(Debug, Clone, PartialEq)]
pub struct BillSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub diners: Vec<String>,
    /// Diners in the totals marked settled
    pub settled_count: usize,
    /// Names appearing in the settlement totals
    pub participant_count: usize,
    /// Receipt total, 0 when the receipt is missing
    pub receipt_total: f64,
}

impl BillSummary {
    pub fn from_bill(bill: &Bill) -> Self {
        let totals = compute_totals(bill);
        let settled_count = totals
            .iter()
            .filter(|t| bill.diner_settlement.get(&t.name))
            .count();

        Self {
            id: bill.id.clone(),
            title: bill.title.clone(),
            created_at: bill.created_at,
            diners: bill.diners.clone(),
            settled_count,
            participant_count: totals.len(),
            receipt_total: bill
                .parsed_receipt
                .as_ref()
                .map(|r| r.total)
                .unwrap_or(0.0),
        }
    }

    /// Progress label, e.g. "1 / 3 settled"
    pub fn format_progress(&self) -> String {
        format!("{} / {} settled", self.settled_count, self.participant_count)
    }
}

/// Dashboard partition of the bill collection.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    /// Unsettled bills, newest first
    pub unsettled: Vec<BillSummary>,
    /// Bills eligible for "clear settled"
    pub settled_count: usize,
}

impl Dashboard {
    pub fn build(bills: &[Bill]) -> Self {
        let mut unsettled: Vec<&Bill> = bills.iter().filter(|b| !b.is_settled()).collect();
        unsettled.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Self {
            settled_count: bills.len() - unsettled.len(),
            unsettled: unsettled.into_iter().map(BillSummary::from_bill).collect(),
        }
    }
}
