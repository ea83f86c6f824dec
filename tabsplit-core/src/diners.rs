//! Diner directory
//!
//! Per-bill diner management (add, remove with cascade, tips, settlement),
//! the staged list collected before a bill exists, and cross-bill frequency
//! ranking used for suggestions.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Bill, TipPercent};

/// How many suggestions [`frequent_diners`] returns at most
pub const FREQUENT_DINER_LIMIT: usize = 10;

impl Bill {
    /// Add a diner with default tip and settlement.
    ///
    /// Returns false (and leaves the bill alone) when the name is blank or
    /// already present.
    pub fn add_diner(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.has_diner(name) {
            return false;
        }
        self.diners.push(name.to_string());
        self.diner_tips.init(name);
        self.diner_settlement.init(name);
        tracing::debug!(bill_id = %self.id, diner = name, "Diner added");
        true
    }

    /// Remove a diner, prune their tip/settlement entries, and detach them
    /// from every assignment. Other assignees keep their items.
    pub fn remove_diner(&mut self, name: &str) -> bool {
        let before = self.diners.len();
        self.diners.retain(|d| d != name);
        let tip = self.diner_tips.remove(name);
        let settled = self.diner_settlement.remove(name);

        let mut detached = 0usize;
        for assignment in &mut self.assignments {
            if assignment.person_names.remove(name) {
                detached += 1;
            }
        }

        let removed =
            before != self.diners.len() || tip.is_some() || settled.is_some() || detached > 0;
        if removed {
            tracing::debug!(bill_id = %self.id, diner = name, detached, "Diner removed");
        }
        removed
    }

    /// Set one diner's tip percentage.
    pub fn set_tip(&mut self, name: &str, percent: u8) -> Result<()> {
        let tip = TipPercent::new(percent)?;
        if !self.has_diner(name) {
            return Err(Error::DinerNotFound(name.to_string()));
        }
        self.diner_tips.set(name, tip);
        Ok(())
    }

    /// Set the same tip percentage for every current diner.
    pub fn apply_tip_to_all(&mut self, percent: u8) -> Result<()> {
        let tip = TipPercent::new(percent)?;
        for diner in &self.diners {
            self.diner_tips.set(diner, tip);
        }
        Ok(())
    }

    /// Flip a diner's settled flag, returning the new value.
    pub fn toggle_settled(&mut self, name: &str) -> Result<bool> {
        if !self.has_diner(name) {
            return Err(Error::DinerNotFound(name.to_string()));
        }
        let settled = !self.diner_settlement.get(name);
        self.diner_settlement.set(name, settled);
        Ok(settled)
    }

    /// Flip the gratuity-included flag, returning the new value.
    pub fn toggle_gratuity_included(&mut self) -> bool {
        self.gratuity_included = !self.gratuity_included;
        self.gratuity_included
    }
}

/// Names entered before a bill exists.
///
/// Consumed when the next bill is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedDiners {
    names: Vec<String>,
}

impl StagedDiners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a name; blank or duplicate names are ignored.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| n != name);
        before != self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Most common diner names across all bills, most frequent first.
///
/// Names with equal counts keep the order in which they were first seen.
/// At most [`FREQUENT_DINER_LIMIT`] names are returned.
pub fn frequent_diners(bills: &[Bill]) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for diner in bills.iter().flat_map(|b| b.diners.iter()) {
        let count = counts.entry(diner.as_str()).or_insert(0);
        if *count == 0 {
            order.push(diner.as_str());
        }
        *count += 1;
    }

    // stable sort keeps first-seen order for ties
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(FREQUENT_DINER_LIMIT)
        .map(str::to_string)
        .collect()
}
