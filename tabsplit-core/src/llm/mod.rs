//! LLM-backed collaborators.
//!
//! Two external services feed the bill engine: receipt recognition (image to
//! [`ReceiptData`]) and natural-language assignment (instruction to a full
//! replacement assignment list). Both are traits so the store can be driven
//! by mocks; [`LlmServices`] implements them over any [`LlmClient`].

mod assignments;
mod http;
mod receipt;

pub use assignments::{build_assignment_prompt, parse_assignments};
pub use http::HttpLlmClient;
pub use receipt::{parse_receipt, RECEIPT_PROMPT};

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::{Assignment, ReceiptData, ReceiptImage};

/// System prompt shared by both services
pub(crate) const SYSTEM_PROMPT: &str =
    "You are an intelligent bill-splitting assistant. Respond with strict JSON only, no prose.";

/// LLM completion interface.
pub trait LlmClient: Send + Sync {
    /// Complete `prompt`, optionally with an attached image.
    fn complete(&self, prompt: &str, image: Option<&ReceiptImage>) -> Result<String>;
}

/// Turns a receipt photo into structured receipt data.
pub trait ReceiptRecognizer {
    fn recognize(&self, image: &ReceiptImage) -> Result<ReceiptData>;
}

/// Turns a free-text instruction into a complete replacement assignment list.
pub trait AssignmentService {
    fn update_assignments(
        &self,
        instruction: &str,
        receipt: &ReceiptData,
        current: &[Assignment],
    ) -> Result<Vec<Assignment>>;
}

/// Create the default HTTP-backed client.
pub fn create_llm_client(llm: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    Ok(Box::new(HttpLlmClient::new(llm)?))
}

/// Both collaborators over one LLM client.
pub struct LlmServices {
    client: Box<dyn LlmClient>,
}

impl LlmServices {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn from_config(llm: &LlmConfig) -> Result<Self> {
        Ok(Self::new(create_llm_client(llm)?))
    }
}

impl ReceiptRecognizer for LlmServices {
    fn recognize(&self, image: &ReceiptImage) -> Result<ReceiptData> {
        let raw = self
            .client
            .complete(RECEIPT_PROMPT, Some(image))
            .map_err(|e| Error::Recognition(e.to_string()))?;
        parse_receipt(&raw)
    }
}

impl AssignmentService for LlmServices {
    fn update_assignments(
        &self,
        instruction: &str,
        receipt: &ReceiptData,
        current: &[Assignment],
    ) -> Result<Vec<Assignment>> {
        let prompt = build_assignment_prompt(instruction, receipt, current);
        let raw = self.client.complete(&prompt, None)?;
        parse_assignments(&raw)
    }
}

/// Strip formatting noise (code fences, chatter) around a JSON object.
pub(crate) fn parse_json_object(raw: &str) -> Result<serde_json::Value> {
    let parsed = match serde_json::from_str::<serde_json::Value>(raw.trim()) {
        Ok(value) => value,
        Err(_) => {
            let extracted = extract_json_object(raw)?;
            serde_json::from_str::<serde_json::Value>(&extracted)?
        }
    };

    if !parsed.is_object() {
        return Err(Error::Llm("response must be a JSON object".to_string()));
    }

    Ok(parsed)
}

fn extract_json_object(raw: &str) -> Result<String> {
    let start = raw
        .find('{')
        .ok_or_else(|| Error::Llm("response did not contain JSON object".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| Error::Llm("response did not contain JSON object".to_string()))?;
    if end <= start {
        return Err(Error::Llm("response JSON bounds are invalid".to_string()));
    }
    Ok(raw[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records (prompt, had_image) for each call
    type CallLog = Arc<Mutex<Vec<(String, bool)>>>;

    struct MockClient {
        response: String,
        prompts: CallLog,
    }

    impl MockClient {
        fn new(response: &str) -> (Self, CallLog) {
            let log = CallLog::default();
            let client = Self {
                response: response.to_string(),
                prompts: Arc::clone(&log),
            };
            (client, log)
        }
    }

    impl LlmClient for MockClient {
        fn complete(&self, prompt: &str, image: Option<&ReceiptImage>) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), image.is_some()));
            Ok(self.response.clone())
        }
    }

    struct FailingClient;

    impl LlmClient for FailingClient {
        fn complete(&self, _prompt: &str, _image: Option<&ReceiptImage>) -> Result<String> {
            Err(Error::Llm("connection refused".to_string()))
        }
    }

    fn image() -> ReceiptImage {
        ReceiptImage {
            mime_type: "image/jpeg".to_string(),
            bytes: vec![0xff, 0xd8],
        }
    }

    #[test]
    fn parse_json_object_accepts_fenced_payload() {
        let raw = "```json\n{\"subtotal\": 5}\n```";
        let value = parse_json_object(raw).unwrap();
        assert_eq!(value["subtotal"], 5);
    }

    #[test]
    fn parse_json_object_rejects_non_objects() {
        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object("no json here").is_err());
    }

    #[test]
    fn recognize_sends_image_and_parses() {
        let (client, log) = MockClient::new(
            r#"{"items":[{"id":1,"name":"Tea","price":3.5,"quantity":1}],"subtotal":3.5,"tax":0.3,"total":3.8}"#,
        );
        let services = LlmServices::new(Box::new(client));

        let receipt = services.recognize(&image()).unwrap();
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].name, "Tea");

        let calls = log.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1, "receipt prompt should carry the image");
    }

    #[test]
    fn recognize_maps_transport_failure() {
        let services = LlmServices::new(Box::new(FailingClient));
        assert!(matches!(
            services.recognize(&image()),
            Err(Error::Recognition(_))
        ));
    }

    #[test]
    fn update_assignments_uses_text_only_prompt() {
        let (client, log) =
            MockClient::new(r#"{"assignments":[{"itemId":1,"personNames":["Ana"]}]}"#);
        let receipt = parse_receipt(
            r#"{"items":[{"id":1,"name":"Tea","price":3.5,"quantity":1}],"subtotal":3.5,"tax":0,"total":3.5}"#,
        )
        .unwrap();
        let current = vec![Assignment::unassigned(1)];

        let services = LlmServices::new(Box::new(client));
        let updated = services
            .update_assignments("Ana had the tea", &receipt, &current)
            .unwrap();

        assert_eq!(updated.len(), 1);
        assert!(updated[0].person_names.contains("Ana"));

        let calls = log.lock().unwrap();
        assert!(!calls[0].1);
        assert!(calls[0].0.contains("Ana had the tea"));
    }
}
