//! Screening — structural validation and heuristic ranking of generated ideas.
//!
//! Everything in this crate is pure: no I/O, no clock, no randomness.
//! Rejections are returned as [`ValidationVerdict`] values, never as errors.
//!
//! Three independent validators live here:
//!
//! - [`TitleValidator`] — length window, specificity, tension, filler
//! - [`HookValidator`] — short hook hitting ≥2 of 5 element groups
//! - [`RegionBatchValidator`] — atomic whole-batch check for region ideas
//!
//! and one [`Scorer`] that turns candidates into ranked
//! [`ScoredCandidate`](wayfarer_core::ScoredCandidate)s.

pub mod hook;
pub mod keywords;
pub mod region;
pub mod scoring;
pub mod title;

pub use hook::HookValidator;
pub use keywords::{HookGroups, RegionRules, ScoringTables, TitleRules};
pub use region::{distinct_regions, mixed_length, BatchVerdict, RegionBatchValidator};
pub use scoring::{MAX_TOTAL, Scorer};
pub use title::TitleValidator;

use wayfarer_core::{Candidate, ValidationVerdict};

/// A per-item validator the orchestrator can apply to its top-K.
pub trait CandidateValidator: Send + Sync {
    /// Short name used in logs (e.g. "title", "hook").
    fn name(&self) -> &str;

    fn validate(&self, candidate: &Candidate) -> ValidationVerdict;
}
