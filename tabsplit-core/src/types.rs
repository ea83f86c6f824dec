//! Core domain types for tabsplit
//!
//! These types are the persisted bill model. Field names serialize in
//! camelCase so a stored payload reads the same as the bill shape shown
//! to the front end.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Bill** | One receipt plus its diners, assignments, chat log, and settlement state |
//! | **Diner** | A named participant who may be assigned items on a bill |
//! | **Assignment** | The set of diners sharing one receipt item's cost |
//! | **Settled** | A diner (or, aggregated, a bill) marked as paid |
//! | **Staged diner** | A name entered before a bill exists, applied to the next bill |

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{Error, Result};

// ============================================
// Receipt
// ============================================

/// One line of a recognized receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// Unique within the receipt, assigned by the recognizer (1-based)
    pub id: u32,
    pub name: String,
    /// Line total, not unit price
    pub price: f64,
    pub quantity: u32,
}

/// Structured receipt as returned by the recognition service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub items: Vec<ReceiptItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl ReceiptData {
    /// Look up an item by id
    pub fn item(&self, id: u32) -> Option<&ReceiptItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Sum of the line prices
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(|item| item.price).sum()
    }
}

/// Receipt photo handed to the recognizer.
#[derive(Debug, Clone)]
pub struct ReceiptImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReceiptImage {
    /// Read an image from disk, deriving its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let mime_type = match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "heic" => "image/heic",
            "heif" => "image/heif",
            _ => {
                return Err(Error::ImageRead {
                    path: path.to_path_buf(),
                    message: format!("unsupported image type '{}'", ext),
                })
            }
        };

        let bytes = std::fs::read(path).map_err(|e| Error::ImageRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// Base64 body without any prefix
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL reference stored on the bill
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

// ============================================
// Assignments
// ============================================

/// Diners sharing one receipt item. An empty set means unassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub item_id: u32,
    pub person_names: BTreeSet<String>,
}

impl Assignment {
    pub fn unassigned(item_id: u32) -> Self {
        Self {
            item_id,
            person_names: BTreeSet::new(),
        }
    }

    /// Build an assignment from raw names, trimming and dropping blanks.
    pub fn with_names<I, S>(item_id: u32, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let person_names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self {
            item_id,
            person_names,
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.person_names.is_empty()
    }
}

// ============================================
// Chat
// ============================================

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
}

// ============================================
// Per-diner maps
// ============================================

/// Value a diner gets when they join a bill.
pub trait DinerDefault: Copy {
    fn diner_default() -> Self;
}

/// Tip percentage for one diner, 0 to 30 inclusive.
///
/// Stored values above the maximum are clamped on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct TipPercent(u8);

impl TipPercent {
    pub const DEFAULT: TipPercent = TipPercent(18);
    pub const MAX: u8 = 30;

    pub fn new(percent: u8) -> Result<Self> {
        if percent > Self::MAX {
            return Err(Error::Validation(format!(
                "tip must be between 0 and {}%, got {}%",
                Self::MAX,
                percent
            )));
        }
        Ok(Self(percent))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Tip on `amount` at this rate
    pub fn apply(self, amount: f64) -> f64 {
        amount * f64::from(self.0) / 100.0
    }
}

impl From<u8> for TipPercent {
    fn from(percent: u8) -> Self {
        Self(percent.min(Self::MAX))
    }
}

impl From<TipPercent> for u8 {
    fn from(tip: TipPercent) -> Self {
        tip.0
    }
}

impl DinerDefault for TipPercent {
    fn diner_default() -> Self {
        TipPercent::DEFAULT
    }
}

impl DinerDefault for bool {
    fn diner_default() -> Self {
        false
    }
}

/// Mapping keyed by diner name.
///
/// Reads of a missing key return the diner default, but [`DinerMap::contains`]
/// still tells an explicit entry apart from an absent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DinerMap<V> {
    entries: BTreeMap<String, V>,
}

impl<V> Default for DinerMap<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V: DinerDefault> DinerMap<V> {
    /// Value for `name`, or the diner default when no entry exists
    pub fn get(&self, name: &str) -> V {
        self.entries
            .get(name)
            .copied()
            .unwrap_or_else(V::diner_default)
    }

    /// Explicit entry for `name`, if any
    pub fn explicit(&self, name: &str) -> Option<V> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: V) {
        self.entries.insert(name.to_string(), value);
    }

    /// Insert the default for `name` if it has no entry yet.
    ///
    /// Returns true when an entry was created.
    pub fn init(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), V::diner_default());
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.entries.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type DinerTips = DinerMap<TipPercent>;
pub type DinerSettlement = DinerMap<bool>;

// ============================================
// Bill
// ============================================

/// One receipt with its diners, assignments, chat log, and settlement state.
///
/// Invariant: `assignments` holds exactly one entry per receipt item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// `data:` URL of the scanned receipt
    pub receipt_image: Option<String>,
    pub parsed_receipt: Option<ReceiptData>,
    pub assignments: Vec<Assignment>,
    pub chat_history: Vec<ChatMessage>,
    /// Unique names in insertion order
    pub diners: Vec<String>,
    pub diner_tips: DinerTips,
    pub diner_settlement: DinerSettlement,
    #[serde(default)]
    pub gratuity_included: bool,
}

impl Bill {
    pub fn has_diner(&self, name: &str) -> bool {
        self.diners.iter().any(|d| d == name)
    }

    pub fn assignment(&self, item_id: u32) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.item_id == item_id)
    }

    /// Append a chat message with the next sequential id.
    pub fn push_chat(&mut self, sender: Sender, text: impl Into<String>) -> u64 {
        let id = self.chat_history.last().map(|m| m.id + 1).unwrap_or(1);
        self.chat_history.push(ChatMessage {
            id,
            sender,
            text: text.into(),
        });
        id
    }
}

// ============================================
// Derived totals
// ============================================

/// What one diner owes. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonTotal {
    pub name: String,
    pub subtotal: f64,
    pub tax: f64,
    pub tip: f64,
    pub total: f64,
}
