use std::io::Cursor;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

const ERROR_BODY_MAX_CHARS: usize = 512;

/// Where the API key travels on a `generateContent` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyPlacement {
    Header,
    Query,
}

/// What a caller expects back from a call. Live transports ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Text,
    Image,
}

#[derive(Debug, Clone)]
pub struct ContentCall {
    pub endpoint: String,
    pub api_key: String,
    pub placement: ApiKeyPlacement,
    pub expects: ResponseKind,
    pub payload: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("service returned an invalid JSON payload: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build the HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("offline transport failed: {0}")]
    Offline(String),
}

/// One-shot POST of a `generateContent` payload. Implementations never retry.
pub trait GenerateContentTransport: Send + Sync {
    fn name(&self) -> &str;
    fn generate_content(&self, call: &ContentCall) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    /// Generation calls run to completion; reqwest's 30s default is lifted.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| TransportError::Client { source })?;
        Ok(Self { http })
    }
}

impl GenerateContentTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn generate_content(&self, call: &ContentCall) -> Result<Value, TransportError> {
        let request = self.http.post(&call.endpoint);
        let request = match call.placement {
            ApiKeyPlacement::Header => request.header("x-goog-api-key", &call.api_key),
            ApiKeyPlacement::Query => request.query(&[("key", call.api_key.as_str())]),
        };
        let response = request
            .json(&call.payload)
            .send()
            .map_err(|source| TransportError::Network {
                endpoint: call.endpoint.clone(),
                source,
            })?;
        response_json_or_error(&call.endpoint, response)
    }
}

fn response_json_or_error(endpoint: &str, response: HttpResponse) -> Result<Value, TransportError> {
    let status = response.status();
    let body = response.text().map_err(|source| TransportError::Network {
        endpoint: endpoint.to_string(),
        source,
    })?;
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            message: service_error_message(&body),
        });
    }
    serde_json::from_str(&body).map_err(|source| TransportError::InvalidJson { source })
}

/// Prefers the service's `error.message`, else the truncated raw body.
pub fn service_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|parsed| {
            parsed
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), ERROR_BODY_MAX_CHARS))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Offline transport answering with deterministic content: a canned
/// question for text calls, a solid PNG tinted by the prompt for image calls.
pub struct DryrunTransport {
    width: u32,
    height: u32,
}

impl DryrunTransport {
    pub fn new() -> Self {
        Self::with_size(256, 256)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

impl Default for DryrunTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerateContentTransport for DryrunTransport {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_content(&self, call: &ContentCall) -> Result<Value, TransportError> {
        let prompt = request_text(&call.payload);
        let part = match call.expects {
            ResponseKind::Text => json!({
                "text": format!(
                    "What would make your picture even more special? (dryrun {})",
                    short_id(&prompt)
                )
            }),
            ResponseKind::Image => {
                let png = dryrun_png(self.width, self.height, &prompt)?;
                json!({
                    "inlineData": {
                        "mimeType": "image/png",
                        "data": BASE64.encode(png),
                    }
                })
            }
        };
        Ok(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [part] },
                "finishReason": "STOP",
            }]
        }))
    }
}

fn request_text(payload: &Value) -> String {
    payload
        .pointer("/contents/0/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn dryrun_png(width: u32, height: u32, prompt: &str) -> Result<Vec<u8>, TransportError> {
    let (r, g, b) = color_from_prompt(prompt);
    let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| TransportError::Offline(format!("png encode failed: {err}")))?;
    Ok(bytes)
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..4])
}
