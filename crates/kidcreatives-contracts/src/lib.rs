pub mod chat;
pub mod events;
pub mod phases;
pub mod prompts;
pub mod runs;
