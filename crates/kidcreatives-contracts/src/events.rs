use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Every kind of line a session writes to `events.jsonl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    SessionStarted,
    PhaseTransition,
    PhaseRedirected,
    VisionAnalyzed,
    QuestionGenerated,
    ImageGenerated,
    ImageGenerationFailed,
    RefinementApplied,
    TrophyWritten,
    SessionReset,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::PhaseTransition => "phase_transition",
            Self::PhaseRedirected => "phase_redirected",
            Self::VisionAnalyzed => "vision_analyzed",
            Self::QuestionGenerated => "question_generated",
            Self::ImageGenerated => "image_generated",
            Self::ImageGenerationFailed => "image_generation_failed",
            Self::RefinementApplied => "refinement_applied",
            Self::TrophyWritten => "trophy_written",
            Self::SessionReset => "session_reset",
        }
    }
}

/// Append-only JSONL log for one session.
///
/// Each line carries `type`, `session_id`, `seq` and `ts` before the
/// caller's payload, which is merged last. `seq` counts up from 1 per writer.
#[derive(Debug)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    next_seq: Mutex<u64>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            next_seq: Mutex::new(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn emit(&self, event: SessionEvent, payload: EventPayload) -> anyhow::Result<Value> {
        let mut next_seq = self
            .next_seq
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;

        let mut line = Map::new();
        line.insert("type".to_string(), Value::String(event.as_str().to_string()));
        line.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        line.insert("seq".to_string(), Value::from(*next_seq));
        line.insert("ts".to_string(), Value::String(now_utc_iso()));
        line.extend(payload);
        let line = Value::Object(line);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;

        *next_seq += 1;
        Ok(line)
    }
}

/// Parses an `events.jsonl` file, skipping blank lines.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{} line {} is not JSON", path.display(), idx + 1))
        })
        .collect()
}

/// Fresh identifier for a creative session, e.g. `session-1b4e…`.
pub fn new_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4().simple())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
