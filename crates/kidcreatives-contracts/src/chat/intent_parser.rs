use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{lookup, ArgKind};

/// One line of interactive session input, classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    /// Free-text reply, for `answer` intents.
    pub text: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            text: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Splits a slash command into its lowercase name and trimmed remainder.
/// Returns `None` when the text is not a slash command.
fn split_command(line: &str) -> Option<(String, &str)> {
    let body = line.strip_prefix('/')?;
    let end = body
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(body.len());
    if end == 0 {
        return None;
    }
    Some((body[..end].to_ascii_lowercase(), body[end..].trim()))
}

/// Unquotes a path argument; falls back to whitespace words when the
/// quoting is unbalanced.
fn unquote_path(arg: &str) -> String {
    let words = shell_words::split(arg)
        .unwrap_or_else(|_| arg.split_whitespace().map(str::to_string).collect());
    words
        .into_iter()
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_intent(text: &str) -> Intent {
    let line = text.trim();
    if line.is_empty() {
        return Intent::new("noop", text);
    }

    let Some((name, arg)) = split_command(line) else {
        let mut intent = Intent::new("answer", text);
        intent.text = Some(line.to_string());
        return intent;
    };

    let Some(spec) = lookup(&name) else {
        let mut intent = Intent::new("unknown", text);
        intent.command_args.insert("command".to_string(), Value::String(name));
        intent
            .command_args
            .insert("arg".to_string(), Value::String(arg.to_string()));
        return intent;
    };

    let mut intent = Intent::new(spec.action, text);
    match spec.arg {
        ArgKind::None => {}
        ArgKind::Text => {
            intent
                .command_args
                .insert("text".to_string(), Value::String(arg.to_string()));
        }
        ArgKind::Path => {
            intent
                .command_args
                .insert("path".to_string(), Value::String(unquote_path(arg)));
        }
    }
    intent
}
