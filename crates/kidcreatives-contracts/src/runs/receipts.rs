use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// Keys whose values are base64 image payloads. Matched case-insensitively.
const OMITTED_KEYS: [&str; 5] = ["b64_json", "image", "image_bytes", "imagebytes", "data"];

/// What was asked of the image service for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default = "default_mode")]
    pub mode: String,
    pub intent_statement: String,
    pub narrative_prompt: String,
    pub original_intent: String,
    #[serde(default)]
    pub style_instructions: String,
    pub reference_mime_type: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Receipt for one generated image, with every image payload replaced by
/// `<omitted>`.
pub fn build_receipt(
    request: &GenerationRequest,
    provider_request: &Map<String, Value>,
    provider_response: &Map<String, Value>,
    image_path: &Path,
    receipt_path: &Path,
) -> Value {
    sanitize_payload(&json!({
        "schema_version": RECEIPT_SCHEMA_VERSION,
        "request": request,
        "provider_request": provider_request,
        "provider_response": provider_response,
        "artifacts": {
            "image_path": image_path.to_string_lossy(),
            "receipt_path": receipt_path.to_string_lossy(),
        },
    }))
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pretty = serde_json::to_string_pretty(payload)?;
    std::fs::write(path, pretty).with_context(|| format!("failed to write {}", path.display()))
}

pub fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Array(rows) => rows.iter().map(sanitize_payload).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, row)| {
                let lowered = key.to_ascii_lowercase();
                let row = if OMITTED_KEYS.contains(&lowered.as_str()) {
                    Value::String("<omitted>".to_string())
                } else {
                    sanitize_payload(row)
                };
                (key.clone(), row)
            })
            .collect::<Map<String, Value>>()
            .into(),
        scalar => scalar.clone(),
    }
}

fn default_mode() -> String {
    "image_to_image".to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{build_receipt, write_receipt, GenerationRequest, RECEIPT_SCHEMA_VERSION};

    #[test]
    fn receipt_builder_writes_expected_shape_without_image_data() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let receipt_path = temp.path().join("receipt.json");
        let image_path = temp.path().join("generated.png");

        let request = GenerationRequest {
            mode: "image_to_image".to_string(),
            intent_statement: "A cat".to_string(),
            narrative_prompt: "A cat, in a cartoon style".to_string(),
            original_intent: "A cat".to_string(),
            style_instructions: "Art Style: cartoon".to_string(),
            reference_mime_type: Some("image/png".to_string()),
            model: Some("gemini-2.5-flash-image".to_string()),
            metadata: Map::new(),
        };
        let provider_request = json!({
            "endpoint": "https://example.test/models/gemini-2.5-flash-image:generateContent",
            "payload": {"contents": [{"parts": [
                {"inline_data": {"data": "aGVsbG8=", "mime_type": "image/png"}},
                {"text": "Enhance this drawing"}
            ]}]}
        });
        let provider_response = json!({"mime_type": "image/png", "image_bytes": "aGVsbG8="});

        let payload = build_receipt(
            &request,
            provider_request.as_object().unwrap_or(&Map::new()),
            provider_response.as_object().unwrap_or(&Map::new()),
            &image_path,
            &receipt_path,
        );
        write_receipt(&receipt_path, &payload)?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&receipt_path)?)?;
        assert_eq!(parsed["schema_version"], json!(RECEIPT_SCHEMA_VERSION));
        assert_eq!(parsed["request"]["narrative_prompt"], json!("A cat, in a cartoon style"));
        assert_eq!(
            parsed["provider_request"]["payload"]["contents"][0]["parts"][0]["inline_data"]["data"],
            json!("<omitted>")
        );
        assert_eq!(parsed["provider_response"]["image_bytes"], json!("<omitted>"));
        assert_eq!(parsed["provider_response"]["mime_type"], json!("image/png"));
        assert_eq!(
            parsed["artifacts"]["image_path"],
            json!(image_path.to_string_lossy())
        );
        Ok(())
    }
}
