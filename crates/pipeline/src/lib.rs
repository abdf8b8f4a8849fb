//! Generation pipeline for Wayfarer.
//!
//! Drives one ideation cycle end to end: assemble the skill context, ask
//! the provider for a batch, parse and score it, validate the top items and
//! retry within a bounded budget. Drafts are then approved into full notes,
//! and viral scripts and manual wins feed the knowledge store back.
//!
//! [`Engine`] is the entry point; the modules underneath are usable on
//! their own.

pub mod context;
pub mod draft;
pub mod engine;
pub mod error;
pub mod learning;
pub mod manual_win;
pub mod note;
pub mod orchestrator;
pub mod parse;
pub mod prompts;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{SkillContext, SkillContextAssembler, load_documents};
pub use draft::{Approval, Choice, DraftError, DraftRegistry, RestoreReport};
pub use engine::{ApprovalReport, CycleReport, Engine, render_draft};
pub use error::{PipelineError, Result};
pub use learning::{LearnReport, METADATA_KEYS, ScriptAnalysis, ScriptLearner, parse_learn_command};
pub use manual_win::{WinOutcome, parse_win_command, record_manual_win};
pub use note::{HOOK_WARNING, Note, NoteWriter};
pub use orchestrator::{CycleMode, CycleState, GenerationOutcome, GenerationSettings, Orchestrator};
pub use parse::{ParseMode, parse_batch};
pub use prompts::PromptContext;
