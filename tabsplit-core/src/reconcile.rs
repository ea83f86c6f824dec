//! Assignment reconciliation
//!
//! Applies a free-text instruction to a bill through an
//! [`AssignmentService`]. The flow has two phases:
//!
//! 1. [`BillStore::begin_reconciliation`] appends the user's message to the
//!    chat log and persists it, then hands back a snapshot of the receipt
//!    and assignments for the service call.
//! 2. [`BillStore::finish_reconciliation`] takes the service result and
//!    either commits the new assignments with an acknowledgement, or leaves
//!    them untouched and appends a failure notice.
//!
//! Bill state between the phases is always a complete, valid bill.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::llm::AssignmentService;
use crate::store::BillStore;
use crate::types::{Assignment, Bill, ReceiptData, Sender};

/// Assistant reply after an accepted update
pub const ACKNOWLEDGEMENT: &str = "Got it. Who's next?";

/// Assistant reply after a failed or rejected update
pub const FAILURE_NOTICE: &str = "Sorry, I didn't get that. Can you try again?";

/// Snapshot handed to the assignment service between the two phases.
#[derive(Debug, Clone)]
pub struct PendingReconciliation {
    pub bill_id: String,
    pub instruction: String,
    pub receipt: ReceiptData,
    pub assignments: Vec<Assignment>,
}

/// Result of an accepted update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Names that joined the diner list through this update
    pub new_diners: Vec<String>,
}

/// Check a service reply against the receipt.
///
/// The reply must cover every receipt item exactly once. Returns the list
/// reordered to receipt item order.
pub fn validate_shape(receipt: &ReceiptData, proposed: Vec<Assignment>) -> Result<Vec<Assignment>> {
    let expected = receipt.items.len();
    let actual = proposed.len();
    let shape_error = || Error::InvalidReconciliationShape { expected, actual };

    if actual != expected {
        return Err(shape_error());
    }

    let mut by_item: HashMap<u32, Assignment> = HashMap::with_capacity(actual);
    for assignment in proposed {
        if by_item.insert(assignment.item_id, assignment).is_some() {
            return Err(shape_error());
        }
    }

    receipt
        .items
        .iter()
        .map(|item| by_item.remove(&item.id).ok_or_else(shape_error))
        .collect()
}

impl Bill {
    /// Replace the assignment list and grow the diner list to cover every
    /// assignee. Diners no longer referenced stay on the bill.
    ///
    /// `assignments` must already have passed [`validate_shape`].
    pub fn apply_assignments(&mut self, assignments: Vec<Assignment>) -> Vec<String> {
        self.assignments = assignments;

        let assignees: Vec<String> = self
            .assignments
            .iter()
            .flat_map(|a| a.person_names.iter().cloned())
            .collect();

        let mut added = Vec::new();
        for name in assignees {
            if self.add_diner(&name) {
                added.push(name);
            }
        }
        added
    }
}

impl BillStore {
    /// Phase one: record the user's instruction and snapshot the bill.
    ///
    /// Fails without touching the bill when the instruction is blank, the
    /// bill has no receipt, or another update for the bill is pending.
    pub fn begin_reconciliation(
        &mut self,
        bill_id: &str,
        instruction: &str,
    ) -> Result<PendingReconciliation> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(Error::Validation("instruction must not be blank".to_string()));
        }

        let bill = self.bill(bill_id)?;
        let receipt = bill
            .parsed_receipt
            .clone()
            .ok_or_else(|| Error::Validation(format!("bill {} has no receipt", bill_id)))?;
        let assignments = bill.assignments.clone();

        if self.is_in_flight(bill_id) {
            return Err(Error::ReconciliationInFlight(bill_id.to_string()));
        }

        self.update(bill_id, |bill| {
            bill.push_chat(Sender::User, instruction);
            Ok(())
        })?;
        self.begin_flight(bill_id);

        tracing::debug!(bill_id, items = receipt.items.len(), "Reconciliation started");

        Ok(PendingReconciliation {
            bill_id: bill_id.to_string(),
            instruction: instruction.to_string(),
            receipt,
            assignments,
        })
    }

    /// Phase two: commit or reject the service result.
    ///
    /// On rejection the bill's assignments are unchanged, a single failure
    /// notice is appended to the chat, and the original error is returned.
    pub fn finish_reconciliation(
        &mut self,
        pending: PendingReconciliation,
        result: Result<Vec<Assignment>>,
    ) -> Result<Reconciled> {
        let bill_id = pending.bill_id;
        self.end_flight(&bill_id);

        let accepted = result.and_then(|proposed| validate_shape(&pending.receipt, proposed));

        match accepted {
            Ok(assignments) => {
                let new_diners = self.update(&bill_id, |bill| {
                    let added = bill.apply_assignments(assignments);
                    bill.push_chat(Sender::Ai, ACKNOWLEDGEMENT);
                    Ok(added)
                })?;
                tracing::info!(
                    bill_id = %bill_id,
                    new_diners = new_diners.len(),
                    "Assignments reconciled"
                );
                Ok(Reconciled { new_diners })
            }
            Err(err) => {
                tracing::warn!(bill_id = %bill_id, error = %err, "Reconciliation rejected");
                self.update(&bill_id, |bill| {
                    bill.push_chat(Sender::Ai, FAILURE_NOTICE);
                    Ok(())
                })?;
                Err(err)
            }
        }
    }

    /// Run both phases around a blocking service call.
    pub fn reconcile(
        &mut self,
        bill_id: &str,
        instruction: &str,
        service: &dyn AssignmentService,
    ) -> Result<Reconciled> {
        let pending = self.begin_reconciliation(bill_id, instruction)?;
        let result =
            service.update_assignments(&pending.instruction, &pending.receipt, &pending.assignments);
        self.finish_reconciliation(pending, result)
    }
}
