//! Bill lifecycle
//!
//! Creation from a recognized receipt, title and item edits, bulk
//! assignment actions, and settlement classification.

use chrono::{DateTime, Local, Utc};

use crate::error::{Error, Result};
use crate::types::{
    Assignment, Bill, DinerSettlement, DinerTips, ReceiptData, ReceiptImage, Sender,
};

/// First chat message on every new bill
pub const GREETING: &str =
    "Ok, I've scanned the receipt. You can assign items to the diners you've added or use the chat!";

impl Bill {
    /// Build a bill from a freshly recognized receipt.
    ///
    /// Every item starts unassigned and every staged diner starts with the
    /// default tip and unsettled.
    pub fn from_receipt(
        receipt: ReceiptData,
        image: Option<&ReceiptImage>,
        staged: &[String],
        created_at: DateTime<Utc>,
    ) -> Self {
        let assignments = receipt
            .items
            .iter()
            .map(|item| Assignment::unassigned(item.id))
            .collect();

        let mut diner_tips = DinerTips::default();
        let mut diner_settlement = DinerSettlement::default();
        for diner in staged {
            diner_tips.init(diner);
            diner_settlement.init(diner);
        }

        let mut bill = Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: default_title(created_at),
            created_at,
            receipt_image: image.map(ReceiptImage::to_data_url),
            parsed_receipt: Some(receipt),
            assignments,
            chat_history: Vec::new(),
            diners: staged.to_vec(),
            diner_tips,
            diner_settlement,
            gratuity_included: false,
        };
        bill.push_chat(Sender::Ai, GREETING);
        bill
    }

    /// Replace the title if the new one is non-blank.
    ///
    /// Blank input keeps the previous title; returns whether it changed.
    pub fn rename(&mut self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        self.title = title.to_string();
        true
    }

    /// Correct an item's name and price, then recompute the receipt totals
    /// keeping the receipt's original effective tax rate.
    pub fn edit_item(&mut self, item_id: u32, name: &str, price: f64) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("item name must not be blank".to_string()));
        }
        if !price.is_finite() || price < 0.0 {
            return Err(Error::Validation(format!("invalid item price: {}", price)));
        }

        let receipt = self
            .parsed_receipt
            .as_mut()
            .ok_or(Error::ItemNotFound(item_id))?;
        let item = receipt
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(Error::ItemNotFound(item_id))?;

        item.name = name.to_string();
        item.price = price;

        let tax_rate = if receipt.subtotal > 0.0 {
            receipt.tax / receipt.subtotal
        } else {
            0.0
        };
        let subtotal = receipt.items_total();
        let tax = subtotal * tax_rate;

        receipt.subtotal = subtotal;
        receipt.tax = tax;
        receipt.total = subtotal + tax;

        tracing::debug!(bill_id = %self.id, item_id, subtotal, tax, "Receipt item edited");
        Ok(())
    }

    /// Replace one item's assignee set.
    ///
    /// Every name must already be a diner on the bill; otherwise the bill is
    /// left unchanged and [`Error::DinerNotFound`] names the first stranger.
    pub fn assign_item<I, S>(&mut self, item_id: u32, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let replacement = Assignment::with_names(item_id, names);
        if let Some(stranger) = replacement
            .person_names
            .iter()
            .find(|name| !self.has_diner(name))
        {
            return Err(Error::DinerNotFound(stranger.clone()));
        }

        let assignment = self
            .assignments
            .iter_mut()
            .find(|a| a.item_id == item_id)
            .ok_or(Error::ItemNotFound(item_id))?;
        *assignment = replacement;
        Ok(())
    }

    /// Unassign every item and reopen every diner's settlement.
    pub fn clear_assignments(&mut self) {
        for assignment in &mut self.assignments {
            assignment.person_names.clear();
        }
        let names: Vec<String> = self.diner_settlement.names().map(str::to_string).collect();
        for name in names {
            self.diner_settlement.set(&name, false);
        }
    }

    /// Assign every item to every current diner. No-op without diners.
    pub fn split_evenly(&mut self) {
        if self.diners.is_empty() {
            return;
        }
        for assignment in &mut self.assignments {
            assignment.person_names = self.diners.iter().cloned().collect();
        }
    }

    /// Add an existing diner to every item's assignee set (idempotent).
    pub fn add_diner_to_all_items(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if !self.has_diner(name) {
            return Err(Error::DinerNotFound(name.to_string()));
        }
        for assignment in &mut self.assignments {
            assignment.person_names.insert(name.to_string());
        }
        Ok(())
    }

    /// A bill is settled when it has diners and all of them are settled.
    pub fn is_settled(&self) -> bool {
        !self.diners.is_empty() && self.diners.iter().all(|d| self.diner_settlement.get(d))
    }

    /// Number of diners marked settled
    pub fn settled_diner_count(&self) -> usize {
        self.diners
            .iter()
            .filter(|d| self.diner_settlement.get(d))
            .count()
    }
}

/// Title given to a new bill, based on the local creation date.
pub fn default_title(created_at: DateTime<Utc>) -> String {
    format!(
        "New Bill - {}",
        created_at.with_timezone(&Local).format("%-m/%-d/%Y")
    )
}

/// Drop every settled bill, returning how many were removed.
pub fn remove_settled(bills: &mut Vec<Bill>) -> usize {
    let before = bills.len();
    bills.retain(|bill| !bill.is_settled());
    before - bills.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReceiptItem;

    fn receipt() -> ReceiptData {
        ReceiptData {
            items: vec![
                ReceiptItem {
                    id: 1,
                    name: "Pasta".to_string(),
                    price: 10.0,
                    quantity: 1,
                },
                ReceiptItem {
                    id: 2,
                    name: "Wine".to_string(),
                    price: 40.0,
                    quantity: 2,
                },
            ],
            subtotal: 50.0,
            tax: 4.0,
            total: 54.0,
        }
    }

    fn new_bill(diners: &[&str]) -> Bill {
        let staged: Vec<String> = diners.iter().map(|d| d.to_string()).collect();
        Bill::from_receipt(receipt(), None, &staged, Utc::now())
    }

    #[test]
    fn test_from_receipt_initial_state() {
        let bill = new_bill(&["A", "B"]);
        assert_eq!(bill.assignments.len(), 2);
        assert!(bill.assignments.iter().all(|a| !a.is_assigned()));
        assert_eq!(bill.diners, vec!["A", "B"]);
        assert_eq!(bill.diner_tips.get("A").get(), 18);
        assert_eq!(bill.diner_settlement.explicit("B"), Some(false));
        assert_eq!(bill.chat_history.len(), 1);
        assert_eq!(bill.chat_history[0].sender, Sender::Ai);
        assert_eq!(bill.chat_history[0].text, GREETING);
        assert!(bill.title.starts_with("New Bill - "));
        assert!(!bill.gratuity_included);
    }

    #[test]
    fn test_from_receipt_keeps_image_reference() {
        let image = ReceiptImage {
            mime_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let bill = Bill::from_receipt(receipt(), Some(&image), &[], Utc::now());
        assert_eq!(
            bill.receipt_image.as_deref(),
            Some("data:image/png;base64,AQID")
        );
    }

    #[test]
    fn test_rename_rejects_blank() {
        let mut bill = new_bill(&[]);
        assert!(bill.rename("  Team lunch "));
        assert_eq!(bill.title, "Team lunch");
        assert!(!bill.rename("   "));
        assert_eq!(bill.title, "Team lunch");
    }

    #[test]
    fn test_edit_item_preserves_tax_rate() {
        let mut bill = new_bill(&[]);
        bill.edit_item(1, "Pasta", 12.0).unwrap();

        let r = bill.parsed_receipt.as_ref().unwrap();
        assert!((r.subtotal - 52.0).abs() < 1e-9);
        assert!((r.tax - 4.16).abs() < 1e-9);
        assert!((r.total - 56.16).abs() < 1e-9);
        assert_eq!(r.item(1).unwrap().price, 12.0);
    }

    #[test]
    fn test_edit_item_with_zero_subtotal_has_no_tax() {
        let mut bill = new_bill(&[]);
        {
            let r = bill.parsed_receipt.as_mut().unwrap();
            r.subtotal = 0.0;
            r.tax = 5.0;
        }
        bill.edit_item(2, "Red wine", 30.0).unwrap();

        let r = bill.parsed_receipt.as_ref().unwrap();
        assert_eq!(r.tax, 0.0);
        assert!((r.total - 40.0).abs() < 1e-9);
        assert_eq!(r.item(2).unwrap().name, "Red wine");
    }

    #[test]
    fn test_edit_item_validation_leaves_bill_unchanged() {
        let mut bill = new_bill(&[]);
        let before = bill.clone();

        assert!(matches!(
            bill.edit_item(1, " ", 5.0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            bill.edit_item(1, "Pasta", f64::NAN),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            bill.edit_item(9, "Pasta", 5.0),
            Err(Error::ItemNotFound(9))
        ));
        assert_eq!(bill, before);
    }

    #[test]
    fn test_clear_assignments_reopens_settlement() {
        let mut bill = new_bill(&["A", "B"]);
        bill.split_evenly();
        bill.toggle_settled("A").unwrap();

        bill.clear_assignments();

        assert!(bill.assignments.iter().all(|a| !a.is_assigned()));
        assert!(!bill.diner_settlement.get("A"));
        assert_eq!(bill.diner_settlement.len(), 2);
    }

    #[test]
    fn test_split_evenly_is_idempotent() {
        let mut bill = new_bill(&["A", "B"]);
        bill.split_evenly();
        let once = bill.assignments.clone();
        bill.split_evenly();
        assert_eq!(bill.assignments, once);
        assert!(once.iter().all(|a| a.person_names.len() == 2));
    }

    #[test]
    fn test_split_evenly_without_diners_is_noop() {
        let mut bill = new_bill(&[]);
        let before = bill.assignments.clone();
        bill.split_evenly();
        assert_eq!(bill.assignments, before);
    }

    #[test]
    fn test_add_diner_to_all_items_is_idempotent() {
        let mut bill = new_bill(&["A", "B"]);
        bill.assign_item(1, ["B"]).unwrap();
        bill.add_diner_to_all_items("A").unwrap();
        bill.add_diner_to_all_items(" A ").unwrap();

        assert_eq!(bill.assignment(1).unwrap().person_names.len(), 2);
        assert_eq!(bill.assignment(2).unwrap().person_names.len(), 1);
    }

    #[test]
    fn test_assign_item_unknown_id() {
        let mut bill = new_bill(&["A"]);
        assert!(matches!(
            bill.assign_item(7, ["A"]),
            Err(Error::ItemNotFound(7))
        ));
    }

    #[test]
    fn test_assign_item_rejects_non_diner() {
        let mut bill = new_bill(&["Ana"]);
        bill.assign_item(1, ["Ana"]).unwrap();
        let before = bill.clone();

        assert!(matches!(
            bill.assign_item(2, ["Ana", "Ghost"]),
            Err(Error::DinerNotFound(name)) if name == "Ghost"
        ));
        assert_eq!(bill, before);

        // nobody outside the diner list can be charged
        let totals = crate::analytics::compute_totals(&bill);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].name, "Ana");
    }

    #[test]
    fn test_add_to_all_items_rejects_non_diner() {
        let mut bill = new_bill(&["Ana"]);
        bill.assign_item(1, ["Ana"]).unwrap();
        let before = bill.clone();

        assert!(matches!(
            bill.add_diner_to_all_items("Casper"),
            Err(Error::DinerNotFound(_))
        ));
        assert!(matches!(
            bill.add_diner_to_all_items("  "),
            Err(Error::DinerNotFound(_))
        ));
        assert_eq!(bill, before);

        // with Ana settled the bill is fully settled, and only Ana was charged
        bill.toggle_settled("Ana").unwrap();
        assert!(bill.is_settled());
        assert_eq!(crate::analytics::compute_totals(&bill).len(), 1);
    }

    #[test]
    fn test_settled_classification() {
        let mut bill = new_bill(&["A", "B"]);
        assert!(!bill.is_settled());

        bill.toggle_settled("A").unwrap();
        bill.toggle_settled("B").unwrap();
        assert!(bill.is_settled());
        assert_eq!(bill.settled_diner_count(), 2);

        bill.toggle_settled("B").unwrap();
        assert!(!bill.is_settled());
    }

    #[test]
    fn test_bill_without_diners_is_never_settled() {
        let mut bills = vec![new_bill(&[]), new_bill(&["A"])];
        bills[1].toggle_settled("A").unwrap();

        assert_eq!(remove_settled(&mut bills), 1);
        assert_eq!(bills.len(), 1);
        assert!(bills[0].diners.is_empty());
    }
}
