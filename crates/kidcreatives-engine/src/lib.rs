//! Gemini-backed clients and the session driver that walks a drawing
//! through Handshake, PromptBuilder, Generation, Refinement and Trophy.

pub mod config;
pub mod image_client;
pub mod response;
pub mod text_client;
pub mod transport;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use kidcreatives_contracts::events::{EventWriter, SessionEvent};
use kidcreatives_contracts::phases::{
    Phase, PhaseCompletion, PhaseOrchestrator, SessionData, TransitionKind,
    DEFAULT_IMAGE_MIME_TYPE,
};
use kidcreatives_contracts::prompts::{
    color_category, select_variables, synthesize_enhancement_prompt, PromptState, PromptVariable,
};
use kidcreatives_contracts::runs::trophy::{write_trophy, TrophySummary};
use serde_json::{json, Map, Value};

pub use config::{ConfigError, GeminiConfig};
pub use image_client::{
    GenerationResult, ImageClient, ImageGenerationError, ImageMode, PreparedImageRequest,
    ReferenceImage, DEFAULT_OUTPUT_MIME_TYPE,
};
pub use response::MalformedResponse;
pub use text_client::{QuestionClient, QuestionGenerationResult, QuestionSource};
pub use transport::{
    ApiKeyPlacement, ContentCall, DryrunTransport, GenerateContentTransport, HttpTransport,
    ResponseKind, TransportError,
};

#[derive(Debug, Clone)]
struct RefinementDraft {
    current_image: String,
    mime_type: String,
    edit_count: u32,
}

/// Drives one child's session against the [`PhaseOrchestrator`].
///
/// Every operation first re-renders the current phase so the entry guard
/// runs, and every transition the orchestrator records ends up in
/// `events.jsonl`.
pub struct StudioEngine {
    session_dir: PathBuf,
    session_id: String,
    events: EventWriter,
    orchestrator: PhaseOrchestrator,
    questions: QuestionClient,
    images: ImageClient,
    generated_mime_type: Option<String>,
    refined_mime_type: Option<String>,
    refinement: Option<RefinementDraft>,
    last_image_request: Option<PreparedImageRequest>,
    started_at: DateTime<Utc>,
}

impl StudioEngine {
    pub fn new(
        session_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        config: GeminiConfig,
        transport: Arc<dyn GenerateContentTransport>,
    ) -> Result<Self> {
        let session_dir = session_dir.into();
        fs::create_dir_all(&session_dir)
            .with_context(|| format!("failed to create {}", session_dir.display()))?;
        let session_id = session_dir
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(kidcreatives_contracts::events::new_session_id);
        let events = EventWriter::new(events_path.into(), session_id.clone());

        events.emit(
            SessionEvent::SessionStarted,
            map_object(json!({
                "out_dir": session_dir.to_string_lossy().to_string(),
                "transport": transport.name(),
                "text_model": config.text_model,
                "image_model": config.image_model,
            })),
        )?;

        Ok(Self {
            session_dir,
            session_id,
            events,
            orchestrator: PhaseOrchestrator::new(),
            questions: QuestionClient::new(config.clone(), transport.clone()),
            images: ImageClient::new(config, transport),
            generated_mime_type: None,
            refined_mime_type: None,
            refinement: None,
            last_image_request: None,
            started_at: Utc::now(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn events_path(&self) -> &Path {
        self.events.path()
    }

    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    pub fn data(&self) -> &SessionData {
        self.orchestrator.data()
    }

    /// Edits applied so far in the current refinement round.
    pub fn pending_edit_count(&self) -> u32 {
        self.refinement
            .as_ref()
            .map(|draft| draft.edit_count)
            .unwrap_or(self.orchestrator.data().edit_count)
    }

    /// The most recent image request sent, successful or not.
    pub fn last_image_request(&self) -> Option<&PreparedImageRequest> {
        self.last_image_request.as_ref()
    }

    /// Runs the entry guard. `None` means this cycle redirected to Handshake.
    pub fn render_phase(&mut self) -> Result<Option<Phase>> {
        let rendered = self.orchestrator.render().is_some();
        self.flush_transitions()?;
        Ok(rendered.then(|| self.orchestrator.phase()))
    }

    pub fn navigate(&mut self, phase: Phase) -> Result<()> {
        self.orchestrator.navigate(phase);
        self.flush_transitions()
    }

    pub fn back(&mut self) -> Result<Phase> {
        let phase = self.orchestrator.back();
        self.flush_transitions()?;
        if phase != Phase::Refinement {
            self.refinement = None;
        }
        Ok(phase)
    }

    /// Merges a completion payload produced outside the engine.
    pub fn complete(&mut self, completion: PhaseCompletion) -> Result<Phase> {
        let phase = self.orchestrator.complete(completion)?;
        self.flush_transitions()?;
        Ok(phase)
    }

    /// Stores the drawing and its description, then advances to PromptBuilder.
    /// Without `analysis` the text model describes the drawing.
    pub fn handshake(
        &mut self,
        image: &[u8],
        mime_type: &str,
        intent_statement: &str,
        analysis: Option<&str>,
    ) -> Result<String> {
        self.require_phase(Phase::Handshake)?;
        if image.is_empty() {
            bail!("the drawing is empty");
        }
        let original_image = BASE64.encode(image);
        let mime_type = match mime_type.trim() {
            "" => DEFAULT_IMAGE_MIME_TYPE,
            trimmed => trimmed,
        };
        let provided = analysis.map(str::trim).filter(|value| !value.is_empty());
        let vision_analysis = match provided {
            Some(value) => value.to_string(),
            None => self
                .questions
                .analyze_drawing(&original_image, mime_type, intent_statement)?,
        };
        self.events.emit(
            SessionEvent::VisionAnalyzed,
            map_object(json!({
                "source": if provided.is_some() { "provided" } else { "model" },
                "mime_type": mime_type,
                "image_bytes": image.len(),
                "analysis": vision_analysis,
            })),
        )?;

        self.complete(PhaseCompletion::Handshake {
            original_image,
            image_mime_type: mime_type.to_string(),
            intent_statement: intent_statement.trim().to_string(),
            vision_analysis: vision_analysis.clone(),
        })?;
        Ok(vision_analysis)
    }

    /// One question per selected variable. Question failures degrade to the
    /// fixed fallback and are only visible in the log.
    pub fn prompt_questions(&mut self, count: usize) -> Result<Vec<QuestionGenerationResult>> {
        self.require_phase(Phase::PromptBuilder)?;
        let data = self.orchestrator.data();
        let intent_statement = data.intent_statement.clone();
        let vision_analysis = data.vision_analysis.clone().unwrap_or_default();

        let mut questions = Vec::new();
        for variable in select_variables(count) {
            let category = color_category(&variable);
            let result =
                self.questions
                    .generate_question(&intent_statement, &vision_analysis, &variable, category);
            self.events.emit(
                SessionEvent::QuestionGenerated,
                map_object(json!({
                    "variable": result.variable.as_str(),
                    "color_category": result.color_category.as_str(),
                    "source": result.source.as_str(),
                    "fallback_reason": result.fallback_reason,
                })),
            )?;
            questions.push(result);
        }
        Ok(questions)
    }

    pub fn submit_answers<I, S>(&mut self, answers: I) -> Result<PromptState>
    where
        I: IntoIterator<Item = (PromptVariable, S)>,
        S: Into<String>,
    {
        self.require_phase(Phase::PromptBuilder)?;
        let state = PromptState::from_answers(
            self.orchestrator.data().intent_statement.clone(),
            answers,
        );
        let prompt_state_json = state.to_json()?;
        self.complete(PhaseCompletion::PromptBuilder { prompt_state_json })?;
        Ok(state)
    }

    /// Enhances the original drawing with the synthesized style instructions.
    /// A failure leaves the session in Generation so the call can be retried.
    pub fn generate(&mut self) -> Result<GenerationResult> {
        self.require_phase(Phase::Generation)?;
        let data = self.orchestrator.data();
        let state = PromptState::from_json_lenient(
            data.prompt_state_json.as_deref().unwrap_or_default(),
            &data.intent_statement,
        );
        let prompt = synthesize_enhancement_prompt(&state).combined();
        let original_image = data.original_image.clone().unwrap_or_default();
        let mime_type = data.image_mime_type.clone();

        let request = self
            .images
            .prepare_generation(&prompt, Some(ReferenceImage::new(&original_image, &mime_type)));
        let outcome = self.images.send(&request);
        self.log_image_outcome("generation", &request, &outcome)?;
        self.last_image_request = Some(request);
        Ok(outcome?)
    }

    pub fn accept_generation(&mut self, result: &GenerationResult) -> Result<Phase> {
        self.require_phase(Phase::Generation)?;
        let phase = self.complete(PhaseCompletion::Generation {
            generated_image: result.image_bytes.clone(),
        })?;
        self.generated_mime_type = Some(result.mime_type.clone());
        self.refined_mime_type = None;
        self.refinement = None;
        Ok(phase)
    }

    /// Applies one edit to the latest image. Each success bumps the edit count.
    pub fn refine(&mut self, edit_request: &str) -> Result<GenerationResult> {
        self.require_phase(Phase::Refinement)?;
        let draft = self.refinement_draft();
        let request = self.images.prepare_edit(
            edit_request,
            ReferenceImage::new(&draft.current_image, &draft.mime_type),
        );
        let outcome = self.images.send(&request);
        self.log_image_outcome("refinement", &request, &outcome)?;
        self.last_image_request = Some(request);
        let result = outcome?;

        let edit_count = draft.edit_count + 1;
        self.refinement = Some(RefinementDraft {
            current_image: result.image_bytes.clone(),
            mime_type: result.mime_type.clone(),
            edit_count,
        });
        self.events.emit(
            SessionEvent::RefinementApplied,
            map_object(json!({
                "edit_count": edit_count,
                "prompt": result.prompt,
            })),
        )?;
        Ok(result)
    }

    /// Completes Refinement with the latest image, the generated one when no
    /// edit was applied.
    pub fn finish_refinement(&mut self) -> Result<Phase> {
        self.require_phase(Phase::Refinement)?;
        let draft = self.refinement_draft();
        let phase = self.complete(PhaseCompletion::Refinement {
            refined_image: draft.current_image,
            edit_count: draft.edit_count,
        })?;
        self.refined_mime_type = Some(draft.mime_type);
        self.refinement = None;
        Ok(phase)
    }

    /// Decodes the session images next to a `trophy.json` summary.
    pub fn write_trophy(&mut self) -> Result<TrophySummary> {
        self.require_phase(Phase::Trophy)?;
        let trophy_dir = self.session_dir.join("trophy");
        fs::create_dir_all(&trophy_dir)
            .with_context(|| format!("failed to create {}", trophy_dir.display()))?;

        let data = self.orchestrator.data().clone();
        let roles = [
            (
                "original",
                data.original_image.as_deref(),
                Some(data.image_mime_type.as_str()),
            ),
            (
                "generated",
                data.generated_image.as_deref(),
                self.generated_mime_type.as_deref(),
            ),
            (
                "refined",
                data.refined_image.as_deref(),
                self.refined_mime_type.as_deref(),
            ),
        ];
        let mut images = Map::new();
        for (role, payload, mime_type) in roles {
            let Some(payload) = payload.filter(|value| !value.is_empty()) else {
                continue;
            };
            let bytes = BASE64
                .decode(payload.as_bytes())
                .with_context(|| format!("{role} image base64 decode failed"))?;
            let extension = extension_for_mime(mime_type.unwrap_or(DEFAULT_OUTPUT_MIME_TYPE));
            let path = trophy_dir.join(format!("{role}.{extension}"));
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            images.insert(
                role.to_string(),
                Value::String(path.to_string_lossy().to_string()),
            );
        }

        let summary = TrophySummary::from_session(&self.session_id, &data, self.started_at, images);
        let trophy_path = trophy_dir.join("trophy.json");
        write_trophy(&trophy_path, &summary, None)?;
        self.events.emit(
            SessionEvent::TrophyWritten,
            map_object(json!({
                "path": trophy_path.to_string_lossy().to_string(),
                "edit_count": summary.stats.edit_count,
                "variables_used": summary.stats.variables_used,
            })),
        )?;
        Ok(summary)
    }

    /// "Create another": clears everything and returns to Handshake.
    pub fn create_another(&mut self) -> Result<Phase> {
        self.require_phase(Phase::Trophy)?;
        self.complete(PhaseCompletion::Trophy)
    }

    fn require_phase(&mut self, phase: Phase) -> Result<()> {
        let Some(current) = self.render_phase()? else {
            bail!("{phase} inputs were incomplete; the session returned to handshake");
        };
        if current != phase {
            bail!("session is in the {current} phase, not {phase}");
        }
        Ok(())
    }

    fn refinement_draft(&self) -> RefinementDraft {
        if let Some(draft) = &self.refinement {
            return draft.clone();
        }
        let data = self.orchestrator.data();
        match data.refined_image.as_ref() {
            Some(refined) => RefinementDraft {
                current_image: refined.clone(),
                mime_type: self
                    .refined_mime_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OUTPUT_MIME_TYPE.to_string()),
                edit_count: data.edit_count,
            },
            None => RefinementDraft {
                current_image: data.generated_image.clone().unwrap_or_default(),
                mime_type: self
                    .generated_mime_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OUTPUT_MIME_TYPE.to_string()),
                edit_count: 0,
            },
        }
    }

    fn log_image_outcome(
        &self,
        stage: &str,
        request: &PreparedImageRequest,
        outcome: &Result<GenerationResult, ImageGenerationError>,
    ) -> Result<()> {
        let (event, payload) = match outcome {
            Ok(result) => (
                SessionEvent::ImageGenerated,
                json!({
                    "stage": stage,
                    "mode": request.mode.as_str(),
                    "model": self.images.model(),
                    "mime_type": result.mime_type,
                    "prompt": result.prompt,
                }),
            ),
            Err(err) => (
                SessionEvent::ImageGenerationFailed,
                json!({
                    "stage": stage,
                    "mode": request.mode.as_str(),
                    "error": err.to_string(),
                }),
            ),
        };
        self.events.emit(event, map_object(payload))?;
        Ok(())
    }

    fn flush_transitions(&mut self) -> Result<()> {
        for transition in self.orchestrator.take_transitions() {
            match transition.kind {
                TransitionKind::Redirect => {
                    self.events.emit(
                        SessionEvent::PhaseRedirected,
                        map_object(json!({
                            "attempted": transition.from,
                            "to": transition.to,
                            "missing": transition.missing,
                        })),
                    )?;
                }
                kind => {
                    self.events.emit(
                        SessionEvent::PhaseTransition,
                        map_object(json!({
                            "from": transition.from,
                            "to": transition.to,
                            "kind": kind,
                        })),
                    )?;
                    if kind == TransitionKind::Reset {
                        self.generated_mime_type = None;
                        self.refined_mime_type = None;
                        self.refinement = None;
                        self.started_at = Utc::now();
                        self.events.emit(SessionEvent::SessionReset, Map::new())?;
                    }
                }
            }
        }
        Ok(())
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let lowered = mime_type.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::Value;

    use crate::transport::{ContentCall, GenerateContentTransport, TransportError};

    /// Records calls and replays canned responses in order.
    #[derive(Default)]
    pub struct StubTransport {
        calls: Mutex<Vec<ContentCall>>,
        responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    }

    impl StubTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_ok(&self, payload: Value) {
            self.responses.lock().unwrap().push_back(Ok(payload));
        }

        pub fn push_status(&self, status: u16, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(TransportError::Status {
                    status,
                    message: message.to_string(),
                }));
        }

        pub fn calls(&self) -> Vec<ContentCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GenerateContentTransport for StubTransport {
        fn name(&self) -> &str {
            "stub"
        }

        fn generate_content(&self, call: &ContentCall) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push(call.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Offline("no canned response".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use kidcreatives_contracts::events::read_events;

    use super::*;
    use crate::test_support::StubTransport;

    fn text_response(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    fn image_response(bytes: &[u8], mime_type: &str) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [{ "inlineData": { "mimeType": mime_type, "data": BASE64.encode(bytes) } }]
                }
            }]
        })
    }

    fn engine(root: &Path, transport: &Arc<StubTransport>) -> anyhow::Result<StudioEngine> {
        StudioEngine::new(
            root.join("session-test"),
            root.join("events.jsonl"),
            GeminiConfig::new("test-key")?,
            transport.clone(),
        )
    }

    fn event_types(path: &Path) -> anyhow::Result<Vec<String>> {
        Ok(read_events(path)?
            .iter()
            .map(|event| event["type"].as_str().unwrap_or_default().to_string())
            .collect())
    }

    fn drive_to_generation(engine: &mut StudioEngine) -> anyhow::Result<()> {
        engine.handshake(
            b"drawing-bytes",
            "image/jpeg",
            "A robot doing a backflip",
            Some("A silver robot flipping in space."),
        )?;
        engine.submit_answers([
            (PromptVariable::Texture, "metallic"),
            (PromptVariable::Lighting, "glowing"),
        ])?;
        Ok(())
    }

    #[test]
    fn full_session_reaches_trophy_and_resets() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(StubTransport::new());
        transport.push_ok(text_response("A silver robot flipping in space."));
        transport.push_ok(text_response("Are your robot's arms shiny or rusty?"));
        transport.push_ok(json!({ "candidates": [] }));
        transport.push_ok(image_response(b"generated-png", "image/png"));
        transport.push_ok(image_response(b"refined-webp", "image/webp"));
        let mut engine = engine(temp.path(), &transport)?;

        let analysis = engine.handshake(b"drawing-bytes", "image/jpeg", "A robot doing a backflip", None)?;
        assert_eq!(analysis, "A silver robot flipping in space.");
        assert_eq!(engine.phase(), Phase::PromptBuilder);

        let questions = engine.prompt_questions(2)?;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].variable, PromptVariable::Texture);
        assert_eq!(questions[0].source, QuestionSource::Generated);
        assert_eq!(questions[1].variable, PromptVariable::Lighting);
        assert_eq!(questions[1].source, QuestionSource::Fallback);

        engine.submit_answers([
            (PromptVariable::Texture, "metallic"),
            (PromptVariable::Lighting, "glowing"),
        ])?;
        assert_eq!(engine.phase(), Phase::Generation);

        let generated = engine.generate()?;
        assert_eq!(
            generated.prompt,
            "A robot doing a backflip\n\nTexture: metallic\nLighting: glowing"
        );
        let calls = transport.calls();
        let generation_call = &calls[3];
        assert_eq!(
            generation_call.payload["contents"][0]["parts"][0]["inline_data"]["data"],
            json!(BASE64.encode(b"drawing-bytes"))
        );
        assert_eq!(
            generation_call.payload["contents"][0]["parts"][0]["inline_data"]["mime_type"],
            json!("image/jpeg")
        );

        assert_eq!(engine.accept_generation(&generated)?, Phase::Refinement);
        let refined = engine.refine("add more stars")?;
        assert_eq!(engine.pending_edit_count(), 1);
        assert_eq!(
            transport.calls()[4].payload["contents"][0]["parts"][0]["inline_data"]["data"],
            json!(generated.image_bytes)
        );

        assert_eq!(engine.finish_refinement()?, Phase::Trophy);
        assert_eq!(engine.data().edit_count, 1);
        assert_eq!(engine.data().refined_image.as_deref(), Some(refined.image_bytes.as_str()));

        let summary = engine.write_trophy()?;
        assert_eq!(summary.stats.edit_count, 1);
        assert_eq!(summary.stats.variables_used, 2);
        assert_eq!(summary.subject, "robot backflip");
        let trophy_dir = temp.path().join("session-test").join("trophy");
        assert_eq!(fs::read(trophy_dir.join("original.jpg"))?, b"drawing-bytes".to_vec());
        assert_eq!(fs::read(trophy_dir.join("generated.png"))?, b"generated-png".to_vec());
        assert_eq!(fs::read(trophy_dir.join("refined.webp"))?, b"refined-webp".to_vec());
        assert!(trophy_dir.join("trophy.json").exists());

        assert_eq!(engine.create_another()?, Phase::Handshake);
        assert_eq!(engine.data(), &SessionData::default());

        let types = event_types(&temp.path().join("events.jsonl"))?;
        assert_eq!(types.first().map(String::as_str), Some("session_started"));
        for expected in [
            "vision_analyzed",
            "question_generated",
            "phase_transition",
            "image_generated",
            "refinement_applied",
            "trophy_written",
            "session_reset",
        ] {
            assert!(types.iter().any(|kind| kind == expected), "missing {expected}");
        }
        Ok(())
    }

    #[test]
    fn failed_generation_keeps_session_for_retry() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(StubTransport::new());
        let mut engine = engine(temp.path(), &transport)?;
        drive_to_generation(&mut engine)?;

        transport.push_ok(json!({ "candidates": [] }));
        let err = match engine.generate() {
            Ok(_) => anyhow::bail!("expected generation to fail"),
            Err(err) => err,
        };
        let message = format!("{err:#}");
        assert!(message.starts_with("Image generation failed:"));
        assert!(message.to_lowercase().contains("no candidates"));
        assert_eq!(engine.phase(), Phase::Generation);
        assert!(engine.data().prompt_state_json.is_some());
        assert_eq!(
            engine.last_image_request().map(|request| request.mode),
            Some(ImageMode::ImageToImage)
        );

        transport.push_ok(image_response(b"second-try", "image/png"));
        let result = engine.generate()?;
        assert_eq!(result.decode_bytes()?, b"second-try".to_vec());

        let types = event_types(&temp.path().join("events.jsonl"))?;
        assert!(types.iter().any(|kind| kind == "image_generation_failed"));
        Ok(())
    }

    #[test]
    fn question_fallback_and_image_failure_from_same_empty_response() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(StubTransport::new());
        let mut engine = engine(temp.path(), &transport)?;
        engine.handshake(b"drawing-bytes", "image/png", "A cat", Some("An orange cat"))?;

        transport.push_ok(json!({ "candidates": [] }));
        let questions = engine.prompt_questions(1)?;
        assert_eq!(
            questions[0].question,
            "What does it feel like to touch? Smooth, rough, fluffy, or something else?"
        );

        engine.submit_answers([(PromptVariable::Texture, "fluffy")])?;
        transport.push_ok(json!({ "candidates": [] }));
        let err = engine.generate().err().map(|err| format!("{err:#}")).unwrap_or_default();
        assert!(err.to_lowercase().contains("no candidates"));
        Ok(())
    }

    #[test]
    fn navigating_ahead_redirects_to_handshake() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(StubTransport::new());
        let mut engine = engine(temp.path(), &transport)?;

        engine.navigate(Phase::PromptBuilder)?;
        assert_eq!(engine.render_phase()?, None);
        assert_eq!(engine.phase(), Phase::Handshake);
        assert_eq!(engine.render_phase()?, Some(Phase::Handshake));
        assert!(engine.generate().is_err());
        assert!(transport.calls().is_empty());

        let redirect = read_events(&temp.path().join("events.jsonl"))?
            .into_iter()
            .find(|event| event["type"] == json!("phase_redirected"))
            .unwrap_or_default();
        assert_eq!(redirect["attempted"], json!("prompt-builder"));
        assert_eq!(
            redirect["missing"],
            json!(["originalImage", "visionAnalysis"])
        );
        Ok(())
    }

    #[test]
    fn refinement_without_edits_uses_generated_image() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(StubTransport::new());
        let mut engine = engine(temp.path(), &transport)?;
        drive_to_generation(&mut engine)?;
        transport.push_ok(image_response(b"generated", "image/png"));
        let generated = engine.generate()?;
        engine.accept_generation(&generated)?;

        assert_eq!(engine.back()?, Phase::Generation);
        assert_eq!(engine.data().generated_image.as_deref(), Some(generated.image_bytes.as_str()));
        engine.navigate(Phase::Refinement)?;

        assert_eq!(engine.finish_refinement()?, Phase::Trophy);
        assert_eq!(engine.data().refined_image, engine.data().generated_image);
        assert_eq!(engine.data().edit_count, 0);
        Ok(())
    }

    #[test]
    fn handshake_with_provided_analysis_skips_the_text_model() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(StubTransport::new());
        let mut engine = engine(temp.path(), &transport)?;
        engine.handshake(b"png", "", "  A castle  ", Some("A pink castle"))?;
        assert!(transport.calls().is_empty());
        assert_eq!(engine.data().image_mime_type, DEFAULT_IMAGE_MIME_TYPE);
        assert_eq!(engine.data().intent_statement, "A castle");
        assert!(engine.handshake(b"png", "image/png", "again", Some("x")).is_err());
        Ok(())
    }

    #[test]
    fn extension_follows_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("IMAGE/WEBP"), "webp");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }
}
