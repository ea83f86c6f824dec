//! Per-diner settlement totals.
//!
//! Apportions each assigned item evenly across its assignees, then spreads
//! receipt tax in proportion to each diner's share of the receipt subtotal
//! and adds the diner's own tip percentage on top.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{Bill, PersonTotal};

/// Compute what every diner owes on a bill.
///
/// Pure and cheap enough to run on every render. The result covers every
/// name in `bill.diners` plus any assignee missing from it, sorted by
/// total descending with ties broken by name.
pub fn compute_totals(bill: &Bill) -> Vec<PersonTotal> {
    // Relevant names in first-seen order: diners, then stray assignees
    let mut names: Vec<&str> = Vec::new();
    let mut subtotals: HashMap<&str, f64> = HashMap::new();
    let all_names = bill
        .diners
        .iter()
        .chain(bill.assignments.iter().flat_map(|a| a.person_names.iter()));
    for name in all_names {
        if !subtotals.contains_key(name.as_str()) {
            subtotals.insert(name.as_str(), 0.0);
            names.push(name.as_str());
        }
    }

    let (receipt_subtotal, receipt_tax) = bill
        .parsed_receipt
        .as_ref()
        .map(|r| (r.subtotal, r.tax))
        .unwrap_or((0.0, 0.0));

    if let Some(receipt) = &bill.parsed_receipt {
        for assignment in bill.assignments.iter().filter(|a| a.is_assigned()) {
            let Some(item) = receipt.item(assignment.item_id) else {
                continue;
            };
            let cost_per_person = item.price / assignment.person_names.len() as f64;
            for name in &assignment.person_names {
                *subtotals.entry(name.as_str()).or_insert(0.0) += cost_per_person;
            }
        }
    }

    let mut totals: Vec<PersonTotal> = names
        .into_iter()
        .map(|name| {
            let subtotal = subtotals.get(name).copied().unwrap_or(0.0);
            let tax = if receipt_subtotal > 0.0 {
                subtotal / receipt_subtotal * receipt_tax
            } else {
                0.0
            };
            let tip = bill.diner_tips.get(name).apply(subtotal);
            PersonTotal {
                name: name.to_string(),
                subtotal,
                tax,
                tip,
                total: subtotal + tax + tip,
            }
        })
        .collect();

    totals.sort_by(|a, b| match b.total.total_cmp(&a.total) {
        Ordering::Equal => a.name.cmp(&b.name),
        other => other,
    });

    totals
}
