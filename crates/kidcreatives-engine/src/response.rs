use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

/// A 2xx `generateContent` payload that does not carry what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedResponse {
    #[error("No candidates in API response")]
    NoCandidates,
    #[error("Invalid candidate structure in API response")]
    InvalidCandidate,
    #[error("No text response from API")]
    NoText,
    #[error("No image data in API response")]
    NoImageData,
    #[error("Image data in API response is not valid base64")]
    InvalidImageData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub data: String,
    pub mime_type: Option<String>,
}

pub fn first_candidate_parts(payload: &Value) -> Result<&[Value], MalformedResponse> {
    let candidate = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or(MalformedResponse::NoCandidates)?;
    candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or(MalformedResponse::InvalidCandidate)
}

/// First non-blank text part of the first candidate, trimmed.
pub fn first_text(payload: &Value) -> Result<String, MalformedResponse> {
    let parts = first_candidate_parts(payload).map_err(|_| MalformedResponse::NoText)?;
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(MalformedResponse::NoText)
}

/// First `inlineData` part with a non-empty payload, which must be base64.
/// Image parts with empty data are skipped.
pub fn first_inline_image(payload: &Value) -> Result<InlineImage, MalformedResponse> {
    let parts = first_candidate_parts(payload)?;
    let (inline, data) = parts
        .iter()
        .filter_map(|part| part.get("inlineData").and_then(Value::as_object))
        .find_map(|inline| {
            let data = inline.get("data").and_then(Value::as_str).map(str::trim)?;
            (!data.is_empty()).then_some((inline, data))
        })
        .ok_or(MalformedResponse::NoImageData)?;
    if BASE64.decode(data.as_bytes()).is_err() {
        return Err(MalformedResponse::InvalidImageData);
    }
    let mime_type = inline
        .get("mimeType")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .map(str::to_string);
    Ok(InlineImage {
        data: data.to_string(),
        mime_type,
    })
}
