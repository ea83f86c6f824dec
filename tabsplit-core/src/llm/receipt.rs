//! Receipt recognition prompt and response sanitising.

use serde_json::Value;

use super::parse_json_object;
use crate::error::{Error, Result};
use crate::types::{ReceiptData, ReceiptItem};

/// Instruction sent alongside the receipt image
pub const RECEIPT_PROMPT: &str = "Analyze this receipt image and extract all line items with their quantity and price. \
Also, extract the subtotal, tax, and the final total. Provide a unique integer ID for each item starting from 1. \
If a quantity is not specified, assume it is 1. Calculate the line item total if it is not present.\n\n\
Return only JSON of the form \
{\"items\": [{\"id\": 1, \"name\": \"...\", \"price\": 0.0, \"quantity\": 1}], \"subtotal\": 0.0, \"tax\": 0.0, \"total\": 0.0} \
where price is the total for the line (quantity * unit price).";

/// Decode a recognizer response into receipt data.
///
/// Numbers may arrive as JSON numbers or numeric strings; anything else
/// becomes 0 (quantity becomes 1). A missing or non-array `items` yields an
/// empty receipt rather than an error.
pub fn parse_receipt(raw: &str) -> Result<ReceiptData> {
    let value = parse_json_object(raw).map_err(|e| Error::Recognition(e.to_string()))?;

    let items = value
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(idx, item)| sanitize_item(idx, item))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(ReceiptData {
        items,
        subtotal: coerce_amount(value.get("subtotal")),
        tax: coerce_amount(value.get("tax")),
        total: coerce_amount(value.get("total")),
    })
}

fn sanitize_item(idx: usize, item: &Value) -> ReceiptItem {
    let id = coerce_amount(item.get("id"));
    let id = if id >= 1.0 && id.fract() == 0.0 && id <= f64::from(u32::MAX) {
        id as u32
    } else {
        idx as u32 + 1
    };

    let quantity = coerce_amount(item.get("quantity"));
    let quantity = if quantity >= 1.0 && quantity <= f64::from(u32::MAX) {
        quantity as u32
    } else {
        1
    };

    ReceiptItem {
        id,
        name: item
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        price: coerce_amount(item.get("price")),
        quantity,
    }
}

/// Numeric coercion: numbers and numeric strings pass, everything else is 0.
fn coerce_amount(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_receipt() {
        let raw = r#"{"items":[{"id":1,"name":"Burger","price":12.5,"quantity":1},{"id":2,"name":"Fries","price":8,"quantity":2}],"subtotal":20.5,"tax":1.64,"total":22.14}"#;
        let receipt = parse_receipt(raw).unwrap();

        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[1].quantity, 2);
        assert_eq!(receipt.items[1].price, 8.0);
        assert_eq!(receipt.subtotal, 20.5);
        assert_eq!(receipt.total, 22.14);
    }

    #[test]
    fn strips_fences_and_chatter() {
        let raw = "Here is the receipt:\n```json\n{\"items\":[],\"subtotal\":1,\"tax\":0,\"total\":1}\n```\nEnjoy!";
        let receipt = parse_receipt(raw).unwrap();
        assert!(receipt.items.is_empty());
        assert_eq!(receipt.total, 1.0);
    }

    #[test]
    fn coerces_non_numeric_fields() {
        let raw = r#"{"items":[{"id":"3","name":" Soda ","price":"2.50","quantity":"abc"}],"subtotal":"n/a","tax":null,"total":" 2.50"}"#;
        let receipt = parse_receipt(raw).unwrap();

        let item = &receipt.items[0];
        assert_eq!(item.id, 3);
        assert_eq!(item.name, "Soda");
        assert_eq!(item.price, 2.5);
        assert_eq!(item.quantity, 1);
        assert_eq!(receipt.subtotal, 0.0);
        assert_eq!(receipt.tax, 0.0);
        assert_eq!(receipt.total, 2.5);
    }

    #[test]
    fn zero_quantity_defaults_to_one_and_missing_id_uses_position() {
        let raw = r#"{"items":[{"name":"A","price":1,"quantity":0},{"name":"B","price":2}],"subtotal":3,"tax":0,"total":3}"#;
        let receipt = parse_receipt(raw).unwrap();
        assert_eq!(receipt.items[0].quantity, 1);
        assert_eq!(receipt.items[0].id, 1);
        assert_eq!(receipt.items[1].id, 2);
    }

    #[test]
    fn missing_items_defaults_to_empty() {
        let receipt = parse_receipt(r#"{"items":"none","subtotal":5,"tax":1,"total":6}"#).unwrap();
        assert!(receipt.items.is_empty());
        assert_eq!(receipt.subtotal, 5.0);
    }

    #[test]
    fn unparseable_output_is_recognition_failure() {
        assert!(matches!(
            parse_receipt("I could not read this receipt"),
            Err(Error::Recognition(_))
        ));
    }
}
