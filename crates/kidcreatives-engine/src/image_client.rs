use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use kidcreatives_contracts::prompts::sanitize_prompt;
use serde_json::{json, Value};

use crate::config::GeminiConfig;
use crate::response::{first_inline_image, MalformedResponse};
use crate::transport::{
    ApiKeyPlacement, ContentCall, GenerateContentTransport, ResponseKind, TransportError,
};

pub const DEFAULT_OUTPUT_MIME_TYPE: &str = "image/png";

#[derive(Debug, thiserror::Error)]
pub enum ImageGenerationError {
    #[error("Image generation failed: service error: {0}")]
    Service(#[from] TransportError),
    #[error("Image generation failed: unusable response: {0}")]
    UnusableResponse(#[from] MalformedResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    TextToImage,
    ImageToImage,
    Edit,
}

impl ImageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToImage => "text_to_image",
            Self::ImageToImage => "image_to_image",
            Self::Edit => "edit",
        }
    }
}

/// Base64 image sent ahead of the text part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceImage<'a> {
    pub data: &'a str,
    pub mime_type: &'a str,
}

impl<'a> ReferenceImage<'a> {
    pub fn new(data: &'a str, mime_type: &'a str) -> Self {
        Self { data, mime_type }
    }

    fn is_usable(&self) -> bool {
        !self.data.trim().is_empty() && !self.mime_type.trim().is_empty()
    }

    fn to_part(self) -> Value {
        json!({
            "inline_data": {
                "data": self.data,
                "mime_type": self.mime_type,
            }
        })
    }
}

/// A decoded image response. A new request always yields a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub image_bytes: String,
    pub mime_type: String,
    /// Sanitized prompt actually sent.
    pub prompt: String,
}

impl GenerationResult {
    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.image_bytes.as_bytes())
            .context("generated image base64 decode failed")
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.image_bytes)
    }
}

/// A request ready to send, kept around so callers can record it.
#[derive(Debug, Clone)]
pub struct PreparedImageRequest {
    pub mode: ImageMode,
    pub sanitized_prompt: String,
    pub call: ContentCall,
}

pub struct ImageClient {
    config: GeminiConfig,
    transport: Arc<dyn GenerateContentTransport>,
}

impl ImageClient {
    pub fn new(config: GeminiConfig, transport: Arc<dyn GenerateContentTransport>) -> Self {
        Self { config, transport }
    }

    pub fn model(&self) -> &str {
        &self.config.image_model
    }

    pub fn generate_image(
        &self,
        prompt: &str,
        reference: Option<ReferenceImage<'_>>,
    ) -> Result<GenerationResult, ImageGenerationError> {
        self.send(&self.prepare_generation(prompt, reference))
    }

    /// Applies a follow-up edit to `current`, keeping the rest of the picture.
    pub fn edit_image(
        &self,
        edit_request: &str,
        current: ReferenceImage<'_>,
    ) -> Result<GenerationResult, ImageGenerationError> {
        self.send(&self.prepare_edit(edit_request, current))
    }

    pub fn prepare_generation(
        &self,
        prompt: &str,
        reference: Option<ReferenceImage<'_>>,
    ) -> PreparedImageRequest {
        let sanitized_prompt = sanitize_prompt(prompt);
        let (mode, parts) = match reference.filter(ReferenceImage::is_usable) {
            Some(reference) => (
                ImageMode::ImageToImage,
                vec![
                    reference.to_part(),
                    json!({ "text": enhancement_framing(&sanitized_prompt) }),
                ],
            ),
            None => (
                ImageMode::TextToImage,
                vec![json!({ "text": sanitized_prompt })],
            ),
        };
        self.prepared(mode, sanitized_prompt, parts)
    }

    pub fn prepare_edit(&self, edit_request: &str, current: ReferenceImage<'_>) -> PreparedImageRequest {
        let sanitized_prompt = sanitize_prompt(edit_request);
        let parts = vec![
            current.to_part(),
            json!({ "text": edit_framing(&sanitized_prompt) }),
        ];
        self.prepared(ImageMode::Edit, sanitized_prompt, parts)
    }

    /// Exactly one transport call; no retry.
    pub fn send(
        &self,
        request: &PreparedImageRequest,
    ) -> Result<GenerationResult, ImageGenerationError> {
        let payload = self.transport.generate_content(&request.call)?;
        let image = first_inline_image(&payload)?;
        Ok(GenerationResult {
            image_bytes: image.data,
            mime_type: image
                .mime_type
                .unwrap_or_else(|| DEFAULT_OUTPUT_MIME_TYPE.to_string()),
            prompt: request.sanitized_prompt.clone(),
        })
    }

    fn prepared(
        &self,
        mode: ImageMode,
        sanitized_prompt: String,
        parts: Vec<Value>,
    ) -> PreparedImageRequest {
        PreparedImageRequest {
            mode,
            sanitized_prompt,
            call: ContentCall {
                endpoint: self.config.image_endpoint(),
                api_key: self.config.api_key().to_string(),
                placement: ApiKeyPlacement::Header,
                expects: ResponseKind::Image,
                payload: json!({ "contents": [{ "parts": parts }] }),
            },
        }
    }
}

pub fn enhancement_framing(prompt: &str) -> String {
    format!(
        "Enhance this child's drawing while preserving its core composition, elements, and artistic choices.\n\n{prompt}\n\nIMPORTANT: Keep the same subject, pose, proportions, and layout. Only change the art style, lighting, and visual effects as specified. The child should recognize their original creation."
    )
}

fn edit_framing(edit_request: &str) -> String {
    format!(
        "Edit this image following the child's request below. Leave everything the request does not mention unchanged.\n\n{edit_request}\n\nIMPORTANT: Keep the same subject and layout so the child still recognizes their picture."
    )
}
