//! # Wayfarer Core
//!
//! Domain types, traits, and error definitions for the Wayfarer travel-post
//! ideation engine. This crate has **no I/O** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`] — the generative model, treated as unreliable
//! - [`SkillStore`] — persistence for rules, ingests and logs
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted providers and in-memory stores.

pub mod error;
pub mod message;
pub mod provider;
pub mod candidate;
pub mod draft;
pub mod knowledge;
pub mod skill;

// Re-export key types at crate root for ergonomics
pub use error::{Error, GenerationError, ProviderError, Result, StoreError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, Usage};
pub use candidate::{
    Bucket, Candidate, RejectionReason, Score, ScoredCandidate, ValidationVerdict, DEFAULT_CTA,
    SUB_SCORE_MAX,
};
pub use draft::{ContentId, Draft, DraftMode, DraftStatus, Rejection};
pub use knowledge::{
    IngestRecord, IngestUpsert, KnowledgeRule, LogEvent, LogKind, RuleObservation, RuleUpsert,
    SkillStore, StoreCounts,
};
pub use skill::{SkillClass, SkillDocument};
