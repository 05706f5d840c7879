use serde::{Deserialize, Serialize};

use super::variables::{color_category, ColorCategory, PromptVariable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVariableEntry {
    pub variable: PromptVariable,
    pub answer: String,
    pub color_category: ColorCategory,
}

impl PromptVariableEntry {
    /// Entry whose category is derived from the variable.
    pub fn new(variable: PromptVariable, answer: impl Into<String>) -> Self {
        let color_category = color_category(&variable);
        Self {
            variable,
            answer: answer.into(),
            color_category,
        }
    }
}

/// Answers gathered during the PromptBuilder phase, stored in the session as
/// `promptStateJSON`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptState {
    #[serde(default)]
    pub intent_statement: String,
    #[serde(default)]
    pub variables: Vec<PromptVariableEntry>,
}

impl PromptState {
    pub fn new(intent_statement: impl Into<String>) -> Self {
        Self {
            intent_statement: intent_statement.into(),
            variables: Vec::new(),
        }
    }

    /// Builds state from `(variable, answer)` pairs. A variable is only
    /// recorded once; later answers for it are dropped.
    pub fn from_answers<I, S>(intent_statement: impl Into<String>, answers: I) -> Self
    where
        I: IntoIterator<Item = (PromptVariable, S)>,
        S: Into<String>,
    {
        let mut state = Self::new(intent_statement);
        for (variable, answer) in answers {
            state.record(variable, answer);
        }
        state
    }

    /// Returns false when `variable` was already answered.
    pub fn record(&mut self, variable: PromptVariable, answer: impl Into<String>) -> bool {
        if self.contains(&variable) {
            return false;
        }
        self.variables.push(PromptVariableEntry::new(variable, answer));
        true
    }

    pub fn contains(&self, variable: &PromptVariable) -> bool {
        self.variables.iter().any(|entry| &entry.variable == variable)
    }

    pub fn find(&self, variable: &PromptVariable) -> Option<&PromptVariableEntry> {
        self.variables.iter().find(|entry| &entry.variable == variable)
    }

    pub fn answers_in(&self, category: ColorCategory) -> impl Iterator<Item = &PromptVariableEntry> {
        self.variables
            .iter()
            .filter(move |entry| entry.color_category == category)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Parses stored state, degrading to an intent-only state when the text
    /// is not a prompt-state document.
    pub fn from_json_lenient(raw: &str, intent_statement: &str) -> Self {
        match Self::from_json(raw) {
            Ok(mut state) => {
                if state.intent_statement.trim().is_empty() {
                    state.intent_statement = intent_statement.to_string();
                }
                state
            }
            Err(_) => Self::new(intent_statement),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn from_answers_dedupes_and_derives_categories() {
        let state = PromptState::from_answers(
            "A cat",
            [
                (PromptVariable::Texture, "fluffy"),
                (PromptVariable::Lighting, "golden"),
                (PromptVariable::Texture, "spiky"),
            ],
        );
        assert_eq!(state.variables.len(), 2);
        assert_eq!(state.variables[0].answer, "fluffy");
        assert_eq!(state.variables[1].color_category, ColorCategory::Context);
    }

    #[test]
    fn json_uses_camel_case_wire_names() -> anyhow::Result<()> {
        let state = PromptState::from_answers("A cat", [(PromptVariable::Mood, "sleepy")]);
        let parsed: Value = serde_json::from_str(&state.to_json()?)?;
        assert_eq!(
            parsed,
            json!({
                "intentStatement": "A cat",
                "variables": [
                    {"variable": "mood", "answer": "sleepy", "colorCategory": "context"}
                ]
            })
        );
        assert_eq!(PromptState::from_json(&state.to_json()?)?, state);
        Ok(())
    }

    #[test]
    fn deserialization_tolerates_unknown_names() -> anyhow::Result<()> {
        let state = PromptState::from_json(
            r#"{"intentStatement":"A ship","variables":[
                {"variable":"sparkle","answer":"lots","colorCategory":"glitter"}
            ]}"#,
        )?;
        assert_eq!(
            state.variables[0].variable,
            PromptVariable::Other("sparkle".to_string())
        );
        assert_eq!(state.variables[0].color_category, ColorCategory::Variable);
        Ok(())
    }

    #[test]
    fn lenient_parse_falls_back_to_intent_only() {
        let state = PromptState::from_json_lenient("not json", "A dragon");
        assert_eq!(state, PromptState::new("A dragon"));

        let state = PromptState::from_json_lenient(r#"{"variables":[]}"#, "A dragon");
        assert_eq!(state.intent_statement, "A dragon");
    }
}
