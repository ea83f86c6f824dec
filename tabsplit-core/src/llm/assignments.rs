//! Natural-language assignment prompt and response decoding.

use serde::Deserialize;

use super::parse_json_object;
use crate::error::{Error, Result};
use crate::types::{Assignment, ReceiptData};

#[derive(Debug, Deserialize)]
struct AssignmentsPayload {
    assignments: Vec<RawAssignment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssignment {
    item_id: u32,
    #[serde(default)]
    person_names: Vec<String>,
}

/// Build the instruction prompt listing items and current assignments.
pub fn build_assignment_prompt(
    instruction: &str,
    receipt: &ReceiptData,
    current: &[Assignment],
) -> String {
    let items = receipt
        .items
        .iter()
        .map(|item| format!("- ID {}: {} (${:.2})", item.id, item.name, item.price))
        .collect::<Vec<_>>()
        .join("\n");

    let assignments = current
        .iter()
        .map(|a| {
            let names = if a.is_assigned() {
                a.person_names
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                "Unassigned".to_string()
            };
            format!("- Item ID {}: {}", a.item_id, names)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Your task is to update item assignments based on user commands.

Current Bill Items:
{items}

Current Assignments:
{assignments}

User Command: "{instruction}"

Based on the user command, update the assignments for the relevant items.
- If a user says "I had...", assign the item to them.
- If a user says "Alice and Bob shared...", assign the item to both Alice and Bob.
- A person can be assigned multiple items.
- An item can be assigned to multiple people.
- If the user's command is unclear or doesn't seem to relate to assigning items, return the current assignments unchanged.
- IMPORTANT: Respond with the complete, updated list of ALL assignments, not just the ones that changed.

Return only JSON of the form {{"assignments": [{{"itemId": 1, "personNames": ["Alice"]}}]}}."#
    )
}

/// Decode an assignment service response.
///
/// Names are trimmed and deduplicated; the list length is not checked here.
pub fn parse_assignments(raw: &str) -> Result<Vec<Assignment>> {
    let value = parse_json_object(raw)?;
    let payload: AssignmentsPayload = serde_json::from_value(value)
        .map_err(|e| Error::Llm(format!("invalid assignment payload: {}", e)))?;

    Ok(payload
        .assignments
        .into_iter()
        .map(|raw| Assignment::with_names(raw.item_id, raw.person_names))
        .collect())
}
