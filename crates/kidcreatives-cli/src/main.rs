use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use kidcreatives_contracts::chat::{parse_intent, Intent, SESSION_HELP_COMMANDS};
use kidcreatives_contracts::phases::{Phase, DEFAULT_IMAGE_MIME_TYPE};
use kidcreatives_contracts::prompts::{
    color_category, select_variables, synthesize_enhancement_prompt, synthesize_narrative_prompt,
    PromptState, PromptVariable, DEFAULT_QUESTION_COUNT,
};
use kidcreatives_contracts::runs::receipts::{build_receipt, write_receipt, GenerationRequest};
use kidcreatives_engine::{
    extension_for_mime, DryrunTransport, GeminiConfig, GenerateContentTransport, GenerationResult,
    HttpTransport, QuestionClient, QuestionGenerationResult, StudioEngine,
};
use serde_json::{json, Map, Value};

#[derive(Debug, Parser)]
#[command(name = "kidcreatives", version, about = "KidCreatives drawing studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive five-phase session.
    Session(SessionArgs),
    /// Enhance one drawing from answers given on the command line.
    Generate(GenerateArgs),
    /// Print the prompts a set of answers would produce. Offline.
    Synthesize(SynthesizeArgs),
    /// Print the questions the studio would ask about a drawing.
    Questions(QuestionsArgs),
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_QUESTION_COUNT)]
    questions: usize,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    intent: Option<String>,
    /// Use this description instead of asking the model to describe the drawing.
    #[arg(long)]
    analysis: Option<String>,
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    intent: String,
    #[arg(long = "answer", value_name = "VARIABLE=VALUE")]
    answers: Vec<String>,
    #[arg(long)]
    analysis: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct SynthesizeArgs {
    #[arg(long)]
    intent: String,
    #[arg(long = "answer", value_name = "VARIABLE=VALUE")]
    answers: Vec<String>,
}

#[derive(Debug, Parser)]
struct QuestionsArgs {
    #[arg(long)]
    intent: String,
    #[arg(long)]
    analysis: String,
    #[arg(long, default_value_t = DEFAULT_QUESTION_COUNT)]
    questions: usize,
    #[arg(long)]
    dryrun: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("kidcreatives error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::Synthesize(args) => run_synthesize(args),
        Command::Questions(args) => run_questions(args),
    }
}

/// Resolved before any phase runs so a missing key never surfaces mid-session.
fn resolve_backend(dryrun: bool) -> Result<(GeminiConfig, Arc<dyn GenerateContentTransport>)> {
    if dryrun {
        return Ok((GeminiConfig::dryrun(), Arc::new(DryrunTransport::new())));
    }
    let config = GeminiConfig::from_env().context("Gemini configuration is incomplete")?;
    let transport = HttpTransport::new().context("HTTP transport setup failed")?;
    Ok((config, Arc::new(transport)))
}

fn open_engine(out: &Path, events: Option<&Path>, dryrun: bool) -> Result<StudioEngine> {
    let (config, transport) = resolve_backend(dryrun)?;
    let events_path = events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out.join("events.jsonl"));
    StudioEngine::new(out, events_path, config, transport)
}

fn run_session(args: SessionArgs) -> Result<()> {
    let engine = open_engine(&args.out, args.events.as_deref(), args.dryrun)?;
    let mut session = SessionLoop::new(engine, args.out.clone(), args.questions, args.analysis);

    println!("KidCreatives studio started. Type /help for commands.");
    if let Some(path) = args.image.as_deref() {
        session.upload(path)?;
    }
    if let Some(intent) = args.intent {
        session.set_intent(&intent)?;
    }
    session.announce();

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{}> ", session.engine.phase());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match session.handle(&intent) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("{err:#}"),
        }
    }
    Ok(())
}

/// Terminal stand-in for the phase components: it collects each phase's
/// output and hands it to the engine.
struct SessionLoop {
    engine: StudioEngine,
    out: PathBuf,
    question_count: usize,
    analysis: Option<String>,
    pending_image: Option<(Vec<u8>, String)>,
    pending_intent: Option<String>,
    questions: Vec<QuestionGenerationResult>,
    next_question: usize,
    answers: Vec<(PromptVariable, String)>,
    last_result: Option<GenerationResult>,
    previews: usize,
}

impl SessionLoop {
    fn new(
        engine: StudioEngine,
        out: PathBuf,
        question_count: usize,
        analysis: Option<String>,
    ) -> Self {
        Self {
            engine,
            out,
            question_count,
            analysis,
            pending_image: None,
            pending_intent: None,
            questions: Vec::new(),
            next_question: 0,
            answers: Vec::new(),
            last_result: None,
            previews: 0,
        }
    }

    /// Returns false when the user asked to leave.
    fn handle(&mut self, intent: &Intent) -> Result<bool> {
        let phase = self.engine.phase();
        match intent.action.as_str() {
            "noop" => {}
            "quit" => return Ok(false),
            "help" => println!("Commands: {}", SESSION_HELP_COMMANDS.join(" ")),
            "show_phase" => self.announce(),
            "upload" => match intent.arg_str("path") {
                Some(path) => self.upload(Path::new(path))?,
                None => println!("/upload requires a path"),
            },
            "set_intent" => match intent.arg_str("text") {
                Some(text) => self.set_intent(text)?,
                None => println!("/intent requires a description"),
            },
            "answer" => {
                let text = intent.text.as_deref().unwrap_or_default();
                match phase {
                    Phase::Handshake => self.set_intent(text)?,
                    Phase::PromptBuilder => self.record_answer(text)?,
                    Phase::Refinement => self.refine(text)?,
                    Phase::Generation | Phase::Trophy => self.announce(),
                }
            }
            "refine" => match (phase, intent.arg_str("text")) {
                (Phase::Refinement, Some(text)) => self.refine(text)?,
                (Phase::Refinement, None) => println!("/edit requires a change to make"),
                _ => println!("Edits happen in the refinement phase."),
            },
            "skip" if phase == Phase::PromptBuilder => {
                self.next_question += 1;
                self.ask_or_submit()?;
            }
            "retry" if phase == Phase::Generation => self.run_generation()?,
            "done" => self.done()?,
            "back" => {
                let phase = self.engine.back()?;
                self.last_result = None;
                match phase {
                    Phase::PromptBuilder => self.start_questions()?,
                    Phase::Handshake => {
                        self.resume_handshake()?;
                        self.announce();
                    }
                    _ => self.announce(),
                }
            }
            "export" if phase == Phase::Trophy => match intent.arg_str("path") {
                Some(path) => self.export(Path::new(path))?,
                None => println!("/export requires a path"),
            },
            "create_another" if phase == Phase::Trophy => {
                self.engine.create_another()?;
                self.reset();
                self.announce();
            }
            "unknown" => println!("Unknown command: {}", intent.raw.trim()),
            _ => println!("{} is not available in the {phase} phase.", intent.raw.trim()),
        }
        Ok(true)
    }

    fn announce(&self) {
        match self.engine.phase() {
            Phase::Handshake => {
                let image = if self.pending_image.is_some() { "ready" } else { "missing (/upload PATH)" };
                let intent = self.pending_intent.as_deref().unwrap_or("missing (type what it shows)");
                println!("Handshake: drawing {image}; intent {intent}");
            }
            Phase::PromptBuilder => match self.questions.get(self.next_question) {
                Some(question) => println!("Sparky: {}", question.question),
                None => println!("All questions answered. /done to continue."),
            },
            Phase::Generation => {
                println!("Generation: /retry to make a picture, /done to keep it, /back to change answers.")
            }
            Phase::Refinement => println!(
                "Refinement: describe a change, or /done to finish ({} edits so far).",
                self.engine.pending_edit_count()
            ),
            Phase::Trophy => println!("Trophy: /export PATH to save the picture, /another to start over."),
        }
    }

    fn upload(&mut self, path: &Path) -> Result<()> {
        if self.engine.phase() != Phase::Handshake {
            println!("Drawings are uploaded in the handshake phase.");
            return Ok(());
        }
        let (bytes, mime_type) = load_drawing(path)?;
        println!("Loaded {} ({mime_type}, {} bytes)", path.display(), bytes.len());
        self.pending_image = Some((bytes, mime_type));
        self.try_handshake()
    }

    fn set_intent(&mut self, text: &str) -> Result<()> {
        if self.engine.phase() != Phase::Handshake {
            println!("The intent is set in the handshake phase.");
            return Ok(());
        }
        self.pending_intent = Some(text.trim().to_string());
        self.try_handshake()
    }

    fn try_handshake(&mut self) -> Result<()> {
        let (Some((bytes, mime_type)), Some(intent)) = (&self.pending_image, &self.pending_intent)
        else {
            self.announce();
            return Ok(());
        };
        let analysis = self
            .engine
            .handshake(bytes, mime_type, intent, self.analysis.as_deref())?;
        println!("I see: {analysis}");
        self.pending_image = None;
        self.pending_intent = None;
        self.start_questions()
    }

    /// Refills the pending drawing and intent from what the session already
    /// holds, so going back to Handshake does not force a re-upload.
    fn resume_handshake(&mut self) -> Result<()> {
        let data = self.engine.data();
        if self.pending_image.is_none() {
            if let Some(encoded) = data.original_image.as_deref().filter(|value| !value.is_empty()) {
                let bytes = BASE64
                    .decode(encoded.as_bytes())
                    .context("stored drawing is not valid base64")?;
                self.pending_image = Some((bytes, data.image_mime_type.clone()));
            }
        }
        if self.pending_intent.is_none() && !data.intent_statement.trim().is_empty() {
            self.pending_intent = Some(data.intent_statement.clone());
        }
        Ok(())
    }

    fn start_questions(&mut self) -> Result<()> {
        self.questions = self.engine.prompt_questions(self.question_count)?;
        self.next_question = 0;
        self.answers.clear();
        self.ask_or_submit()
    }

    fn record_answer(&mut self, text: &str) -> Result<()> {
        let Some(question) = self.questions.get(self.next_question) else {
            return self.ask_or_submit();
        };
        self.answers.push((question.variable.clone(), text.trim().to_string()));
        self.next_question += 1;
        self.ask_or_submit()
    }

    fn ask_or_submit(&mut self) -> Result<()> {
        if self.next_question < self.questions.len() {
            self.announce();
            return Ok(());
        }
        let state = self.engine.submit_answers(self.answers.clone())?;
        println!("Prompt: {}", synthesize_narrative_prompt(&state));
        self.run_generation()
    }

    fn run_generation(&mut self) -> Result<()> {
        let result = self.engine.generate()?;
        let path = self.write_preview("generated", &result)?;
        println!("Picture saved to {}", path.display());
        self.last_result = Some(result);
        self.announce();
        Ok(())
    }

    fn refine(&mut self, text: &str) -> Result<()> {
        let result = self.engine.refine(text)?;
        let path = self.write_preview("refined", &result)?;
        println!("Updated picture saved to {}", path.display());
        self.announce();
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        match self.engine.phase() {
            Phase::Handshake => self.announce(),
            Phase::PromptBuilder => {
                self.next_question = self.questions.len();
                self.ask_or_submit()?;
            }
            Phase::Generation => {
                let Some(result) = self.last_result.take() else {
                    println!("Nothing generated yet. /retry to make a picture.");
                    return Ok(());
                };
                self.engine.accept_generation(&result)?;
                self.announce();
            }
            Phase::Refinement => {
                self.engine.finish_refinement()?;
                let summary = self.engine.write_trophy()?;
                println!(
                    "Trophy for \"{}\": {} edits, {} choices, made {}",
                    summary.subject,
                    summary.stats.edit_count,
                    summary.stats.variables_used,
                    summary.stats.creation_date
                );
                self.announce();
            }
            Phase::Trophy => self.announce(),
        }
        Ok(())
    }

    fn export(&self, path: &Path) -> Result<()> {
        let Some(refined) = self.engine.data().refined_image.as_deref() else {
            bail!("no finished picture to export");
        };
        let bytes = BASE64
            .decode(refined.as_bytes())
            .context("finished picture base64 decode failed")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Exported to {}", path.display());
        Ok(())
    }

    fn write_preview(&mut self, stem: &str, result: &GenerationResult) -> Result<PathBuf> {
        self.previews += 1;
        let path = self.out.join(format!(
            "{stem}-{:02}.{}",
            self.previews,
            extension_for_mime(&result.mime_type)
        ));
        fs::write(&path, result.decode_bytes()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    fn reset(&mut self) {
        self.pending_image = None;
        self.pending_intent = None;
        self.questions.clear();
        self.next_question = 0;
        self.answers.clear();
        self.last_result = None;
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let answers = parse_answers(&args.answers)?;
    let (bytes, mime_type) = load_drawing(&args.image)?;
    let mut engine = open_engine(&args.out, args.events.as_deref(), args.dryrun)?;

    engine.handshake(&bytes, &mime_type, &args.intent, args.analysis.as_deref())?;
    let state = engine.submit_answers(answers)?;
    let result = engine.generate()?;

    let image_path = args
        .out
        .join(format!("generation.{}", extension_for_mime(&result.mime_type)));
    fs::write(&image_path, result.decode_bytes()?)
        .with_context(|| format!("failed to write {}", image_path.display()))?;

    let enhancement = synthesize_enhancement_prompt(&state);
    let request = GenerationRequest {
        mode: engine
            .last_image_request()
            .map(|request| request.mode.as_str())
            .unwrap_or("image_to_image")
            .to_string(),
        intent_statement: state.intent_statement.clone(),
        narrative_prompt: synthesize_narrative_prompt(&state),
        original_intent: enhancement.original_intent.clone(),
        style_instructions: enhancement.style_instructions.clone(),
        reference_mime_type: Some(mime_type),
        model: None,
        metadata: Map::new(),
    };
    let provider_request = engine
        .last_image_request()
        .map(|request| {
            map_object(json!({
                "endpoint": request.call.endpoint,
                "payload": request.call.payload,
            }))
        })
        .unwrap_or_default();
    let provider_response = map_object(json!({
        "mime_type": result.mime_type,
        "prompt": result.prompt,
        "image_bytes": result.image_bytes,
    }));
    let receipt_path = args.out.join("receipt-generation.json");
    let receipt = build_receipt(
        &request,
        &provider_request,
        &provider_response,
        &image_path,
        &receipt_path,
    );
    write_receipt(&receipt_path, &receipt)?;

    println!("Prompt: {}", request.narrative_prompt);
    println!("Image: {}", image_path.display());
    println!("Receipt: {}", receipt_path.display());
    Ok(0)
}

fn run_synthesize(args: SynthesizeArgs) -> Result<i32> {
    let state = PromptState::from_answers(args.intent, parse_answers(&args.answers)?);
    let enhancement = synthesize_enhancement_prompt(&state);
    println!("Narrative prompt:\n{}\n", synthesize_narrative_prompt(&state));
    println!("Enhancement prompt:\n{}\n", enhancement.combined());
    println!("Prompt state:\n{}", serde_json::to_string_pretty(&state)?);
    Ok(0)
}

fn run_questions(args: QuestionsArgs) -> Result<i32> {
    let (config, transport) = resolve_backend(args.dryrun)?;
    let client = QuestionClient::new(config, transport);
    for variable in select_variables(args.questions) {
        let result = client.generate_question(
            &args.intent,
            &args.analysis,
            &variable,
            color_category(&variable),
        );
        match result.fallback_reason.as_deref() {
            Some(reason) => println!("[{}] {} (fallback: {reason})", result.variable, result.question),
            None => println!("[{}] {}", result.variable, result.question),
        }
    }
    Ok(0)
}

fn parse_answers(raw: &[String]) -> Result<Vec<(PromptVariable, String)>> {
    raw.iter().map(|value| parse_answer(value)).collect()
}

fn parse_answer(raw: &str) -> Result<(PromptVariable, String)> {
    let Some((variable, answer)) = raw.split_once('=') else {
        bail!("answer must look like VARIABLE=VALUE (got {raw:?})");
    };
    if variable.trim().is_empty() {
        bail!("answer is missing its variable name (got {raw:?})");
    }
    Ok((PromptVariable::parse(variable), answer.trim().to_string()))
}

fn load_drawing(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let mime_type = image::guess_format(&bytes)
        .ok()
        .map(|format| format.to_mime_type())
        .or_else(|| mime_for_path(path))
        .unwrap_or(DEFAULT_IMAGE_MIME_TYPE)
        .to_string();
    Ok((bytes, mime_type))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use clap::Parser;
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::Value;

    use super::*;

    fn write_png(path: &Path) -> anyhow::Result<()> {
        let image = RgbImage::from_pixel(2, 2, Rgb([200, 40, 40]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    #[test]
    fn generate_args_collect_repeated_answers() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "kidcreatives",
            "generate",
            "--image",
            "drawing.png",
            "--intent",
            "A robot",
            "--answer",
            "texture=metallic",
            "--answer",
            "style=cartoon",
            "--out",
            "run",
            "--dryrun",
        ])?;
        let Command::Generate(args) = cli.command else {
            anyhow::bail!("expected generate");
        };
        assert_eq!(args.answers, vec!["texture=metallic", "style=cartoon"]);
        assert!(args.dryrun);
        assert_eq!(args.out, PathBuf::from("run"));
        Ok(())
    }

    #[test]
    fn session_defaults_to_four_questions() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["kidcreatives", "session", "--out", "run"])?;
        let Command::Session(args) = cli.command else {
            anyhow::bail!("expected session");
        };
        assert_eq!(args.questions, 4);
        assert!(!args.dryrun);
        assert!(Cli::try_parse_from(["kidcreatives", "session"]).is_err());
        Ok(())
    }

    #[test]
    fn answers_parse_variable_and_value() -> anyhow::Result<()> {
        assert_eq!(
            parse_answer("Lighting = glowing ")?,
            (PromptVariable::Lighting, "glowing".to_string())
        );
        assert_eq!(
            parse_answer("sound=loud")?,
            (PromptVariable::Other("sound".to_string()), "loud".to_string())
        );
        assert!(parse_answer("metallic").is_err());
        assert!(parse_answer("=metallic").is_err());
        Ok(())
    }

    #[test]
    fn drawing_mime_is_sniffed_before_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let misnamed = temp.path().join("drawing.jpg");
        write_png(&misnamed)?;
        assert_eq!(load_drawing(&misnamed)?.1, "image/png");

        let unknown = temp.path().join("drawing.webp");
        fs::write(&unknown, b"not really an image")?;
        assert_eq!(load_drawing(&unknown)?.1, "image/webp");

        let bare = temp.path().join("drawing");
        fs::write(&bare, b"???")?;
        assert_eq!(load_drawing(&bare)?.1, DEFAULT_IMAGE_MIME_TYPE);
        Ok(())
    }

    #[test]
    fn back_to_handshake_keeps_the_uploaded_drawing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let drawing = temp.path().join("drawing.png");
        write_png(&drawing)?;
        let out = temp.path().join("run");
        let engine = open_engine(&out, None, true)?;
        let mut session = SessionLoop::new(engine, out, 2, Some("A red square".to_string()));

        session.upload(&drawing)?;
        session.set_intent("A red robot")?;
        assert_eq!(session.engine.phase(), Phase::PromptBuilder);
        assert!(session.pending_image.is_none());

        assert!(session.handle(&parse_intent("/back"))?);
        assert_eq!(session.engine.phase(), Phase::Handshake);
        let (bytes, mime_type) = session.pending_image.clone().unwrap_or_default();
        assert_eq!(bytes, fs::read(&drawing)?);
        assert_eq!(mime_type, "image/png");
        assert_eq!(session.pending_intent.as_deref(), Some("A red robot"));

        assert!(session.handle(&parse_intent("A red robot dancing"))?);
        assert_eq!(session.engine.phase(), Phase::PromptBuilder);
        assert_eq!(session.engine.data().intent_statement, "A red robot dancing");
        Ok(())
    }

    #[test]
    fn dryrun_generate_writes_image_and_receipt() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let drawing = temp.path().join("drawing.png");
        write_png(&drawing)?;
        let out = temp.path().join("run");

        let code = run_generate(GenerateArgs {
            image: drawing,
            intent: "A robot doing a backflip".to_string(),
            answers: vec!["texture=metallic".to_string(), "style=cartoon".to_string()],
            analysis: Some("A red robot".to_string()),
            out: out.clone(),
            events: None,
            dryrun: true,
        })?;
        assert_eq!(code, 0);

        let image = image::open(out.join("generation.png"))?;
        assert_eq!((image.width(), image.height()), (256, 256));

        let receipt: Value = serde_json::from_str(&fs::read_to_string(out.join("receipt-generation.json"))?)?;
        assert_eq!(receipt["request"]["mode"], json!("image_to_image"));
        assert_eq!(
            receipt["request"]["narrative_prompt"],
            json!("A robot doing a backflip, with metallic, cartoon, in a cartoon style")
        );
        assert_eq!(receipt["provider_response"]["image_bytes"], json!("<omitted>"));
        assert_eq!(
            receipt["provider_request"]["payload"]["contents"][0]["parts"][0]["inline_data"]["data"],
            json!("<omitted>")
        );
        assert!(out.join("events.jsonl").exists());
        Ok(())
    }
}
