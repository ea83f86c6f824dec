//! Integration tests for the bill store
//!
//! These tests drive the public API end to end against an on-disk SQLite
//! database in a temp directory, with canned LLM collaborators.

use tabsplit_core::llm::{AssignmentService, LlmClient, LlmServices, ReceiptRecognizer};
use tabsplit_core::reconcile::{ACKNOWLEDGEMENT, FAILURE_NOTICE};
use tabsplit_core::{
    Assignment, BillStore, Database, Error, ReceiptData, ReceiptImage, Result, Sender,
};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

const RECEIPT_JSON: &str = r#"```json
{
  "items": [
    {"id": 1, "name": "Margherita", "price": 18.00, "quantity": 1},
    {"id": 2, "name": "Caesar Salad", "price": 12.00, "quantity": 1},
    {"id": 3, "name": "Lemonade", "price": "6.00", "quantity": 2}
  ],
  "subtotal": 36.00,
  "tax": 3.60,
  "total": 39.60
}
```"#;

/// Replays scripted completions in order
struct ScriptedClient {
    replies: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(replies: &[&str]) -> Self {
        let mut replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
        }
    }
}

impl LlmClient for ScriptedClient {
    fn complete(&self, _prompt: &str, _image: Option<&ReceiptImage>) -> Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| Error::Llm("no scripted reply left".to_string()))
    }
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("tabsplit/bills.db")
}

fn open_store(dir: &TempDir) -> BillStore {
    let db = Database::open(&db_path(dir)).expect("failed to open db");
    BillStore::open(db).expect("failed to open store")
}

fn image() -> ReceiptImage {
    ReceiptImage {
        mime_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

// ============================================
// Persistence
// ============================================

#[test]
fn test_bills_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let services = LlmServices::new(Box::new(ScriptedClient::new(&[RECEIPT_JSON])));

    let id = {
        let mut store = open_store(&dir);
        store.stage_diner("Ana");
        let id = store.create_bill(&image(), &services).unwrap().id.clone();
        store
            .update(&id, |bill| {
                bill.rename("Pizza night");
                bill.set_tip("Ana", 20)
            })
            .unwrap();
        id
    };

    let store = open_store(&dir);
    let bill = store.bill(&id).expect("bill should be reloaded");
    assert_eq!(bill.title, "Pizza night");
    assert_eq!(bill.diners, vec!["Ana"]);
    assert_eq!(bill.diner_tips.get("Ana").get(), 20);
    assert_eq!(bill.assignments.len(), 3);
    let receipt = bill.parsed_receipt.as_ref().unwrap();
    assert_eq!(receipt.items[2].price, 6.0);
    assert_eq!(receipt.items[2].quantity, 2);
    assert!(bill.receipt_image.as_deref().unwrap().starts_with("data:image/png;base64,"));
}

#[test]
fn test_malformed_collection_resets_to_empty() {
    let dir = TempDir::new().unwrap();
    {
        let db = Database::open(&db_path(&dir)).unwrap();
        db.migrate().unwrap();
        db.connection()
            .execute(
                "INSERT INTO bills (id, created_at, payload) VALUES ('x', '2024-01-01T00:00:00Z', '{\"id\": 42}')",
                [],
            )
            .unwrap();
    }

    let store = open_store(&dir);
    assert!(store.bills().is_empty());

    // the bad row is gone, so the next open is clean too
    let db = Database::open(&db_path(&dir)).unwrap();
    assert_eq!(db.count_bills().unwrap(), 0);
}

// ============================================
// Full flow
// ============================================

#[test]
fn test_create_chat_settle_clear_flow() {
    let dir = TempDir::new().unwrap();
    let recognizer = LlmServices::new(Box::new(ScriptedClient::new(&[RECEIPT_JSON])));
    let chat = LlmServices::new(Box::new(ScriptedClient::new(&[
        // too short: rejected
        r#"{"assignments":[{"itemId":1,"personNames":["Ana"]}]}"#,
        r#"Sure! {"assignments":[
            {"itemId":1,"personNames":["Ana","Ben"]},
            {"itemId":2,"personNames":["Ben"]},
            {"itemId":3,"personNames":["Ana"]}
        ]}"#,
    ])));

    let mut store = open_store(&dir);
    store.stage_diner("Ana");
    let id = store.create_bill(&image(), &recognizer).unwrap().id.clone();

    let err = store
        .reconcile(&id, "Ana had the pizza", &chat)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidReconciliationShape {
            expected: 3,
            actual: 1
        }
    ));
    assert!(store
        .bill(&id)
        .unwrap()
        .assignments
        .iter()
        .all(|a| !a.is_assigned()));

    let outcome = store
        .reconcile(&id, "Ana and Ben split the pizza, Ben had the salad", &chat)
        .unwrap();
    assert_eq!(outcome.new_diners, vec!["Ben"]);

    let bill = store.bill(&id).unwrap();
    let texts: Vec<(Sender, &str)> = bill
        .chat_history
        .iter()
        .map(|m| (m.sender, m.text.as_str()))
        .collect();
    assert_eq!(texts.len(), 5);
    assert_eq!(texts[2], (Sender::Ai, FAILURE_NOTICE));
    assert_eq!(texts[4], (Sender::Ai, ACKNOWLEDGEMENT));

    // Ana: 9 + 6 = 15, Ben: 9 + 12 = 21; tax rate 10%, tip 18%
    let totals = store.totals(&id).unwrap();
    assert_eq!(totals[0].name, "Ben");
    assert!((totals[0].total - 21.0 * 1.28).abs() < 1e-9);
    assert!((totals[1].total - 15.0 * 1.28).abs() < 1e-9);

    assert_eq!(store.dashboard().unsettled.len(), 1);
    for diner in ["Ana", "Ben"] {
        store
            .update(&id, |bill| bill.toggle_settled(diner).map(|_| ()))
            .unwrap();
    }
    let dashboard = store.dashboard();
    assert!(dashboard.unsettled.is_empty());
    assert_eq!(dashboard.settled_count, 1);

    assert_eq!(store.clear_settled().unwrap(), 1);
    drop(store);
    assert!(open_store(&dir).bills().is_empty());
}

#[test]
fn test_recognizer_and_assignment_service_are_swappable() {
    struct Fixed;

    impl ReceiptRecognizer for Fixed {
        fn recognize(&self, _image: &ReceiptImage) -> Result<ReceiptData> {
            Ok(ReceiptData {
                items: Vec::new(),
                subtotal: 0.0,
                tax: 0.0,
                total: 0.0,
            })
        }
    }

    impl AssignmentService for Fixed {
        fn update_assignments(
            &self,
            _instruction: &str,
            _receipt: &ReceiptData,
            current: &[Assignment],
        ) -> Result<Vec<Assignment>> {
            Ok(current.to_vec())
        }
    }

    let mut store = BillStore::open_in_memory().unwrap();
    let id = store.create_bill(&image(), &Fixed).unwrap().id.clone();
    let outcome = store.reconcile(&id, "nobody ate anything", &Fixed).unwrap();
    assert!(outcome.new_diners.is_empty());
    assert!(store.totals(&id).unwrap().is_empty());
}
