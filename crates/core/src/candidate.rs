//! Candidate, score and verdict value objects.
//!
//! Candidates come out of the generator, get a [`Score`] attached exactly once,
//! and are validated into a [`ValidationVerdict`]. None of these types carry
//! behaviour beyond construction and display; scoring and validation live in
//! the screening crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content bucket a candidate was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Growth,
    Conversion,
    Trust,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Growth => "growth",
            Bucket::Conversion => "conversion",
            Bucket::Trust => "trust",
        }
    }

    /// Parse a bucket label, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "growth" => Some(Bucket::Growth),
            "conversion" => Some(Bucket::Conversion),
            "trust" => Some(Bucket::Trust),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated content idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub bucket: Bucket,
    pub title: String,
    pub angle: String,
    pub target_audience: String,
    pub cta: String,

    /// Assigned region (region-ideation mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Concrete place the idea is anchored to (region-ideation mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
}

impl Candidate {
    pub fn new(
        bucket: Bucket,
        title: impl Into<String>,
        angle: impl Into<String>,
        target_audience: impl Into<String>,
    ) -> Self {
        Self {
            bucket,
            title: title.into(),
            angle: angle.into(),
            target_audience: target_audience.into(),
            cta: DEFAULT_CTA.into(),
            region: None,
            location_hint: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>, location_hint: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self.location_hint = Some(location_hint.into());
        self
    }
}

/// Call to action used when the generator omits one.
pub const DEFAULT_CTA: &str = "Follow / 收藏小红书";

/// Upper bound of every sub-score.
pub const SUB_SCORE_MAX: u8 = 10;

/// Heuristic score attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub save: u8,
    pub follow: u8,
    pub clarity: u8,
    pub exec: u8,
    /// Locality / budget bonus added on top of the sub-scores
    pub bonus: u8,
    pub total: u16,
    /// Set when an excluded-region keyword zeroed the score
    #[serde(default)]
    pub disqualified: bool,
}

impl Score {
    /// The all-zero score of a disqualified candidate.
    pub fn disqualified() -> Self {
        Self {
            disqualified: true,
            ..Self::default()
        }
    }
}

/// A candidate with its score, in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Position in the generated batch (0-based)
    pub index: usize,
    pub candidate: Candidate,
    pub score: Score,
}

/// Closed taxonomy of rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    LengthOutOfRange,
    MissingSpecificitySignal,
    MissingTensionSignal,
    GenericFillerWithoutTension,
    InsufficientHookElements,
    RegionMismatch,
    LocationHintTooGeneric,
    BannedGenericPhrase,
    RegionsNotCovered,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::LengthOutOfRange => "length_out_of_range",
            RejectionReason::MissingSpecificitySignal => "missing_specificity_signal",
            RejectionReason::MissingTensionSignal => "missing_tension_signal",
            RejectionReason::GenericFillerWithoutTension => "generic_filler_without_tension",
            RejectionReason::InsufficientHookElements => "insufficient_hook_elements",
            RejectionReason::RegionMismatch => "region_mismatch",
            RejectionReason::LocationHintTooGeneric => "location_hint_too_generic",
            RejectionReason::BannedGenericPhrase => "banned_generic_phrase",
            RejectionReason::RegionsNotCovered => "regions_not_covered",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl ValidationVerdict {
    pub fn pass() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn reject(reason: RejectionReason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_parse_is_case_insensitive() {
        assert_eq!(Bucket::parse(" Growth "), Some(Bucket::Growth));
        assert_eq!(Bucket::parse("TRUST"), Some(Bucket::Trust));
        assert_eq!(Bucket::parse("viral"), None);
    }

    #[test]
    fn rejection_reason_serializes_snake_case() {
        let json = serde_json::to_string(&RejectionReason::GenericFillerWithoutTension).unwrap();
        assert_eq!(json, "\"generic_filler_without_tension\"");
        assert_eq!(
            RejectionReason::RegionsNotCovered.to_string(),
            "regions_not_covered"
        );
    }

    #[test]
    fn verdict_constructors() {
        assert!(ValidationVerdict::pass().ok);
        let v = ValidationVerdict::reject(RejectionReason::RegionMismatch);
        assert!(!v.ok);
        assert_eq!(v.reason, Some(RejectionReason::RegionMismatch));
    }

    #[test]
    fn candidate_defaults_cta() {
        let c = Candidate::new(Bucket::Growth, "t", "a", "aud");
        assert_eq!(c.cta, DEFAULT_CTA);
        assert!(c.region.is_none());
    }
}
