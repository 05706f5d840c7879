mod orchestrator;
mod session;

pub use orchestrator::{
    PhaseCompletion, PhaseInputs, PhaseOrchestrator, PhaseTransition, TransitionKind,
    TransitionRejected,
};
pub use session::{can_enter, missing_fields, Phase, SessionData, DEFAULT_IMAGE_MIME_TYPE};
