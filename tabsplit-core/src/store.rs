//! Bill store
//!
//! The single owner of the bill collection. Every mutation works on a copy
//! of the targeted bill, swaps it in whole, and then writes the entire
//! collection back to the database.

use std::collections::HashSet;

use chrono::Utc;

use crate::analytics::{compute_totals, Dashboard};
use crate::db::Database;
use crate::diners::{frequent_diners, StagedDiners};
use crate::error::{Error, Result};
use crate::lifecycle::remove_settled;
use crate::llm::ReceiptRecognizer;
use crate::types::{Bill, PersonTotal, ReceiptImage};

/// In-memory bill collection backed by SQLite.
pub struct BillStore {
    db: Database,
    bills: Vec<Bill>,
    staged: StagedDiners,
    /// Bills with an assignment update awaiting its service reply
    in_flight: HashSet<String>,
}

impl BillStore {
    /// Load the collection from `db`, migrating it first.
    ///
    /// A collection that fails to decode is discarded and the store starts
    /// empty.
    pub fn open(db: Database) -> Result<Self> {
        db.migrate()?;

        let bills = match db.load_bills() {
            Ok(bills) => bills,
            Err(Error::MalformedState(reason)) => {
                tracing::warn!(%reason, "Discarding malformed bill collection");
                db.replace_bills(&[])?;
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        tracing::info!(count = bills.len(), "Bill collection loaded");

        Ok(Self {
            db,
            bills,
            staged: StagedDiners::new(),
            in_flight: HashSet::new(),
        })
    }

    /// Store over a fresh in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Database::open_in_memory()?)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn bills(&self) -> &[Bill] {
        &self.bills
    }

    pub fn bill(&self, id: &str) -> Result<&Bill> {
        self.bills
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::BillNotFound(id.to_string()))
    }

    /// Find a bill by exact id, falling back to a unique id prefix.
    pub fn resolve(&self, query: &str) -> Result<&Bill> {
        if let Ok(bill) = self.bill(query) {
            return Ok(bill);
        }

        let mut matches = self.bills.iter().filter(|b| b.id.starts_with(query));
        match (matches.next(), matches.next()) {
            (Some(bill), None) if !query.is_empty() => Ok(bill),
            (Some(_), Some(_)) => Err(Error::Validation(format!(
                "bill id prefix '{}' is ambiguous",
                query
            ))),
            _ => Err(Error::BillNotFound(query.to_string())),
        }
    }

    /// Apply `f` to one bill.
    ///
    /// `f` runs against a copy; the copy replaces the stored bill only when
    /// `f` succeeds, so a failed edit leaves the bill exactly as it was.
    pub fn update<R, F>(&mut self, id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Bill) -> Result<R>,
    {
        let idx = self
            .bills
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| Error::BillNotFound(id.to_string()))?;

        let mut draft = self.bills[idx].clone();
        let result = f(&mut draft)?;
        self.bills[idx] = draft;
        self.flush()?;
        Ok(result)
    }

    /// Add a bill to the collection.
    pub fn insert(&mut self, bill: Bill) -> Result<()> {
        if self.bills.iter().any(|b| b.id == bill.id) {
            return Err(Error::Validation(format!("duplicate bill id {}", bill.id)));
        }
        tracing::info!(bill_id = %bill.id, items = bill.assignments.len(), "Bill added");
        self.bills.push(bill);
        self.flush()
    }

    /// Delete one bill unconditionally.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let before = self.bills.len();
        self.bills.retain(|b| b.id != id);
        if self.bills.len() == before {
            return Err(Error::BillNotFound(id.to_string()));
        }
        self.in_flight.remove(id);
        tracing::info!(bill_id = id, "Bill deleted");
        self.flush()
    }

    /// Delete every settled bill, returning how many were removed.
    pub fn clear_settled(&mut self) -> Result<usize> {
        let removed = remove_settled(&mut self.bills);
        let bills = &self.bills;
        self.in_flight.retain(|id| bills.iter().any(|b| &b.id == id));
        tracing::info!(removed, "Cleared settled bills");
        self.flush()?;
        Ok(removed)
    }

    // ============================================
    // Staged diners
    // ============================================

    pub fn stage_diner(&mut self, name: &str) -> bool {
        self.staged.add(name)
    }

    pub fn unstage_diner(&mut self, name: &str) -> bool {
        self.staged.remove(name)
    }

    pub fn staged_diners(&self) -> &[String] {
        self.staged.names()
    }

    // ============================================
    // Derived views
    // ============================================

    /// Suggested diner names across all bills
    pub fn frequent_diners(&self) -> Vec<String> {
        frequent_diners(&self.bills)
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::build(&self.bills)
    }

    pub fn totals(&self, id: &str) -> Result<Vec<PersonTotal>> {
        Ok(compute_totals(self.bill(id)?))
    }

    // ============================================
    // Creation
    // ============================================

    /// Recognize a receipt and create a bill from it with the staged diners.
    ///
    /// On recognition failure nothing is created and the staged diners are
    /// kept for the next attempt.
    pub fn create_bill(
        &mut self,
        image: &ReceiptImage,
        recognizer: &dyn ReceiptRecognizer,
    ) -> Result<&Bill> {
        let receipt = recognizer.recognize(image).map_err(|e| match e {
            Error::Recognition(_) => e,
            other => Error::Recognition(other.to_string()),
        })?;

        let bill = Bill::from_receipt(receipt, Some(image), self.staged.names(), Utc::now());
        let id = bill.id.clone();
        self.insert(bill)?;
        self.staged.clear();

        self.bill(&id)
    }

    // ============================================
    // In-flight tracking
    // ============================================

    /// Mark a bill as awaiting a service reply; false if it already is.
    pub(crate) fn begin_flight(&mut self, id: &str) -> bool {
        self.in_flight.insert(id.to_string())
    }

    pub(crate) fn end_flight(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    fn flush(&self) -> Result<()> {
        self.db.replace_bills(&self.bills)
    }
}
