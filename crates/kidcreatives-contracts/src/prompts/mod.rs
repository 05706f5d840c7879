mod sanitize;
mod state;
mod synthesis;
mod variables;

pub use sanitize::{sanitize_prompt, PROMPT_DENYLIST};
pub use state::{PromptState, PromptVariableEntry};
pub use synthesis::{
    extract_subject, synthesize_enhancement_prompt, synthesize_narrative_prompt,
    EnhancementPrompt, FALLBACK_INTENT,
};
pub use variables::{
    color_category, fallback_question, select_variables, variable_description, ColorCategory,
    PromptVariable, DEFAULT_QUESTION_COUNT, VARIABLE_CATALOG,
};
