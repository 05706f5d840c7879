use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::phases::SessionData;
use crate::prompts::{extract_subject, synthesize_narrative_prompt, PromptState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrophyStats {
    pub edit_count: u32,
    pub variables_used: usize,
    pub creation_date: String,
}

impl TrophyStats {
    pub fn from_session(data: &SessionData, created_at: DateTime<Utc>) -> Self {
        let variables_used = data
            .prompt_state_json
            .as_deref()
            .map(|raw| PromptState::from_json_lenient(raw, &data.intent_statement))
            .map(|state| state.variables.len())
            .unwrap_or(0);
        Self {
            edit_count: data.edit_count,
            variables_used,
            creation_date: created_at.format("%B %-d, %Y").to_string(),
        }
    }
}

/// Everything the trophy card shows, written as `trophy.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrophySummary {
    pub session_id: String,
    pub intent_statement: String,
    pub subject: String,
    pub narrative_prompt: String,
    pub stats: TrophyStats,
    /// Image role (`original`, `generated`, `refined`) to written file.
    pub images: Map<String, Value>,
}

impl TrophySummary {
    pub fn from_session(
        session_id: &str,
        data: &SessionData,
        created_at: DateTime<Utc>,
        images: Map<String, Value>,
    ) -> Self {
        let state = data
            .prompt_state_json
            .as_deref()
            .map(|raw| PromptState::from_json_lenient(raw, &data.intent_statement))
            .unwrap_or_else(|| PromptState::new(data.intent_statement.clone()));
        Self {
            session_id: session_id.to_string(),
            intent_statement: data.intent_statement.clone(),
            subject: extract_subject(&data.intent_statement),
            narrative_prompt: synthesize_narrative_prompt(&state),
            stats: TrophyStats::from_session(data, created_at),
            images,
        }
    }
}

pub fn write_trophy(
    path: &Path,
    summary: &TrophySummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
