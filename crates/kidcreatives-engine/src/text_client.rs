use std::sync::Arc;

use anyhow::{Context, Result};
use kidcreatives_contracts::prompts::{
    fallback_question, sanitize_prompt, variable_description, ColorCategory, PromptVariable,
};
use serde_json::{json, Value};

use crate::config::GeminiConfig;
use crate::response::first_text;
use crate::transport::{ApiKeyPlacement, ContentCall, GenerateContentTransport, ResponseKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Generated,
    Fallback,
}

impl QuestionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionGenerationResult {
    pub question: String,
    pub variable: PromptVariable,
    pub color_category: ColorCategory,
    pub source: QuestionSource,
    /// Why the fixed question was used, when it was.
    pub fallback_reason: Option<String>,
}

pub struct QuestionClient {
    config: GeminiConfig,
    transport: Arc<dyn GenerateContentTransport>,
}

impl QuestionClient {
    pub fn new(config: GeminiConfig, transport: Arc<dyn GenerateContentTransport>) -> Self {
        Self { config, transport }
    }

    /// Never fails: any transport or response problem yields the fixed
    /// question for `variable`.
    pub fn generate_question(
        &self,
        intent_statement: &str,
        vision_analysis: &str,
        variable: &PromptVariable,
        color_category: ColorCategory,
    ) -> QuestionGenerationResult {
        let instruction = build_question_instruction(
            &sanitize_prompt(intent_statement),
            &sanitize_prompt(vision_analysis),
            variable,
        );
        match self.request_text(vec![json!({ "text": instruction })]) {
            Ok(question) => QuestionGenerationResult {
                question,
                variable: variable.clone(),
                color_category,
                source: QuestionSource::Generated,
                fallback_reason: None,
            },
            Err(err) => QuestionGenerationResult {
                question: fallback_question(variable).to_string(),
                variable: variable.clone(),
                color_category,
                source: QuestionSource::Fallback,
                fallback_reason: Some(format!("{err:#}")),
            },
        }
    }

    /// Describes the uploaded drawing for later question rounds. Errors are
    /// returned so the handshake can be retried.
    pub fn analyze_drawing(
        &self,
        image_base64: &str,
        mime_type: &str,
        intent_statement: &str,
    ) -> Result<String> {
        let parts = vec![
            json!({
                "inline_data": {
                    "data": image_base64,
                    "mime_type": mime_type,
                }
            }),
            json!({ "text": build_analysis_instruction(&sanitize_prompt(intent_statement)) }),
        ];
        self.request_text(parts).context("drawing analysis failed")
    }

    fn request_text(&self, parts: Vec<Value>) -> Result<String> {
        let call = ContentCall {
            endpoint: self.config.text_endpoint(),
            api_key: self.config.api_key().to_string(),
            placement: ApiKeyPlacement::Query,
            expects: ResponseKind::Text,
            payload: json!({ "contents": [{ "parts": parts }] }),
        };
        let payload = self
            .transport
            .generate_content(&call)
            .with_context(|| format!("{} text request failed", self.transport.name()))?;
        Ok(first_text(&payload)?)
    }
}

pub fn build_question_instruction(
    intent_statement: &str,
    vision_analysis: &str,
    variable: &PromptVariable,
) -> String {
    let description = variable_description(variable);
    let variable = variable.as_str();
    format!(
        r#"You are Sparky, a curious and encouraging AI art teacher for 7-10 year olds.

Context:
- The child drew: "{intent_statement}"
- Visual analysis: "{vision_analysis}"

Task: Generate ONE specific question about {variable}.

Variable definition: {description}

Requirements:
1. Reference SPECIFIC visual details from the drawing (prove you see it!)
   - Mention concrete elements: "your robot's metal arms", "the stars around it", "the backflip motion"
   - Don't be generic: avoid "your creation", "your drawing", "it"
2. Ask about the {variable} in a way that fits the drawing
3. Use simple, exciting language (Grade 2-3 level)
4. Keep under 100 characters
5. End with a question mark

Examples of GOOD questions:
- Texture: "Your robot's metal arms look cool! Are they smooth and shiny, or rough and rusty?"
- Lighting: "I see stars around your robot! Are they glowing bright like the sun, or twinkling softly?"
- Mood: "Your robot is doing a backflip! Is it feeling super excited, or brave and daring?"
- Background: "I notice your robot is in space! Should we add more planets and stars, or keep it dark?"
- Style: "Your robot drawing is awesome! Should we make it look like a cartoon or more realistic?"

Examples of BAD questions (too generic):
- "How does your creation feel?" ❌
- "What kind of light is there?" ❌
- "What is the mood?" ❌

Generate the question:"#
    )
}

fn build_analysis_instruction(intent_statement: &str) -> String {
    format!(
        "Describe this child's drawing for an art teacher in two or three short sentences. \
Name the main subject, what it is doing and the colors and objects around it.\n\n\
The child says the drawing shows: \"{intent_statement}\""
    )
}
