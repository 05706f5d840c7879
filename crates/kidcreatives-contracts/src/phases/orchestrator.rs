//! Five-phase workflow state machine.
//!
//! The orchestrator owns [`SessionData`] and is the only thing that mutates
//! it. Phase components receive read-only [`PhaseInputs`] and report back
//! with either [`PhaseOrchestrator::back`] or a [`PhaseCompletion`]. Every
//! entry attempt goes through [`can_enter`]; a failed check sends the
//! session to Handshake and the render for that cycle yields nothing.

use serde::Serialize;

use super::session::{can_enter, missing_fields, Phase, SessionData, DEFAULT_IMAGE_MIME_TYPE};

/// Payload a phase emits when the child finishes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseCompletion {
    Handshake {
        original_image: String,
        image_mime_type: String,
        intent_statement: String,
        vision_analysis: String,
    },
    PromptBuilder {
        prompt_state_json: String,
    },
    Generation {
        generated_image: String,
    },
    Refinement {
        refined_image: String,
        edit_count: u32,
    },
    /// "Create another": wipes the session.
    Trophy,
}

impl PhaseCompletion {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Handshake { .. } => Phase::Handshake,
            Self::PromptBuilder { .. } => Phase::PromptBuilder,
            Self::Generation { .. } => Phase::Generation,
            Self::Refinement { .. } => Phase::Refinement,
            Self::Trophy => Phase::Trophy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Complete,
    Back,
    Navigate,
    Redirect,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub kind: TransitionKind,
    /// Fields that were absent, for redirects.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{completed} completion received while in {current}")]
pub struct TransitionRejected {
    pub current: Phase,
    pub completed: Phase,
}

/// Read-only slice of the session a phase component renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseInputs<'a> {
    Handshake,
    PromptBuilder {
        original_image: &'a str,
        intent_statement: &'a str,
        vision_analysis: &'a str,
    },
    Generation {
        original_image: &'a str,
        image_mime_type: &'a str,
        intent_statement: &'a str,
        prompt_state_json: &'a str,
    },
    Refinement {
        original_image: &'a str,
        image_mime_type: &'a str,
        intent_statement: &'a str,
        generated_image: &'a str,
    },
    Trophy {
        original_image: &'a str,
        image_mime_type: &'a str,
        intent_statement: &'a str,
        prompt_state_json: Option<&'a str>,
        refined_image: &'a str,
        edit_count: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PhaseOrchestrator {
    phase: Phase,
    data: SessionData,
    pending: Vec<PhaseTransition>,
}

impl PhaseOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Transitions recorded since the last call, oldest first.
    pub fn take_transitions(&mut self) -> Vec<PhaseTransition> {
        std::mem::take(&mut self.pending)
    }

    /// Jumps straight to `phase`, as a deep link or stale view would.
    /// The entry guard runs on the next [`render`](Self::render).
    pub fn navigate(&mut self, phase: Phase) {
        self.record(phase, TransitionKind::Navigate, Vec::new());
    }

    /// Steps to the preceding phase, keeping collected data.
    pub fn back(&mut self) -> Phase {
        let target = self.phase.previous();
        if target != self.phase {
            self.record(target, TransitionKind::Back, Vec::new());
        }
        self.enforce_entry_guard();
        self.phase
    }

    /// Merges a phase's output and advances. Completing Trophy resets the
    /// whole session to Handshake.
    ///
    /// A phase whose own inputs are missing cannot produce output: the
    /// completion is dropped and the session is redirected to Handshake.
    pub fn complete(&mut self, completion: PhaseCompletion) -> Result<Phase, TransitionRejected> {
        let completed = completion.phase();
        if completed != self.phase {
            return Err(TransitionRejected {
                current: self.phase,
                completed,
            });
        }
        if self.enforce_entry_guard() {
            return Ok(self.phase);
        }

        match completion {
            PhaseCompletion::Handshake {
                original_image,
                image_mime_type,
                intent_statement,
                vision_analysis,
            } => {
                self.data.original_image = Some(original_image);
                self.data.image_mime_type = if image_mime_type.trim().is_empty() {
                    DEFAULT_IMAGE_MIME_TYPE.to_string()
                } else {
                    image_mime_type
                };
                self.data.intent_statement = intent_statement;
                self.data.vision_analysis = Some(vision_analysis);
            }
            PhaseCompletion::PromptBuilder { prompt_state_json } => {
                self.data.prompt_state_json = Some(prompt_state_json);
            }
            PhaseCompletion::Generation { generated_image } => {
                self.data.generated_image = Some(generated_image);
            }
            PhaseCompletion::Refinement {
                refined_image,
                edit_count,
            } => {
                self.data.refined_image = Some(refined_image);
                self.data.edit_count = edit_count;
            }
            PhaseCompletion::Trophy => {
                self.data = SessionData::default();
                self.record(Phase::Handshake, TransitionKind::Reset, Vec::new());
                return Ok(self.phase);
            }
        }

        self.record(completed.next(), TransitionKind::Complete, Vec::new());
        self.enforce_entry_guard();
        Ok(self.phase)
    }

    /// Inputs for the current phase, or `None` when the guard redirected
    /// to Handshake this cycle.
    pub fn render(&mut self) -> Option<PhaseInputs<'_>> {
        if self.enforce_entry_guard() {
            return None;
        }
        Some(self.current_inputs())
    }

    /// Returns true when the session was sent back to Handshake.
    fn enforce_entry_guard(&mut self) -> bool {
        if can_enter(self.phase, &self.data) {
            return false;
        }
        let missing = missing_fields(self.phase, &self.data);
        self.record(Phase::Handshake, TransitionKind::Redirect, missing);
        true
    }

    fn record(&mut self, to: Phase, kind: TransitionKind, missing: Vec<&'static str>) {
        self.pending.push(PhaseTransition {
            from: self.phase,
            to,
            kind,
            missing,
        });
        self.phase = to;
    }

    fn current_inputs(&self) -> PhaseInputs<'_> {
        let data = &self.data;
        let original_image = data.original_image.as_deref().unwrap_or_default();
        let image_mime_type = data.image_mime_type.as_str();
        let intent_statement = data.intent_statement.as_str();
        match self.phase {
            Phase::Handshake => PhaseInputs::Handshake,
            Phase::PromptBuilder => PhaseInputs::PromptBuilder {
                original_image,
                intent_statement,
                vision_analysis: data.vision_analysis.as_deref().unwrap_or_default(),
            },
            Phase::Generation => PhaseInputs::Generation {
                original_image,
                image_mime_type,
                intent_statement,
                prompt_state_json: data.prompt_state_json.as_deref().unwrap_or_default(),
            },
            Phase::Refinement => PhaseInputs::Refinement {
                original_image,
                image_mime_type,
                intent_statement,
                generated_image: data.generated_image.as_deref().unwrap_or_default(),
            },
            Phase::Trophy => PhaseInputs::Trophy {
                original_image,
                image_mime_type,
                intent_statement,
                prompt_state_json: data.prompt_state_json.as_deref(),
                refined_image: data.refined_image.as_deref().unwrap_or_default(),
                edit_count: data.edit_count,
            },
        }
    }
}
