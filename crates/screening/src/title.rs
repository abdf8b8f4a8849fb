//! Title validator: length window, specificity, tension, no bare filler.

use wayfarer_core::{Candidate, RejectionReason, ValidationVerdict};

use crate::keywords::{contains_any, is_digit, TitleRules};
use crate::CandidateValidator;

/// Checks a title line against [`TitleRules`].
///
/// Rules are evaluated in a fixed order and the first failure wins:
/// length, filler without tension, specificity, tension.
#[derive(Debug, Clone, Default)]
pub struct TitleValidator {
    rules: TitleRules,
}

impl TitleValidator {
    pub fn new(rules: TitleRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &TitleRules {
        &self.rules
    }

    pub fn check(&self, title: &str) -> ValidationVerdict {
        let title = title.trim();
        let len = title.chars().count();
        if len < self.rules.min_chars || len > self.rules.max_chars {
            return ValidationVerdict::reject(RejectionReason::LengthOutOfRange);
        }

        let lower = title.to_lowercase();
        let has_tension = contains_any(&lower, &self.rules.tension);

        if !has_tension && contains_any(&lower, &self.rules.filler) {
            return ValidationVerdict::reject(RejectionReason::GenericFillerWithoutTension);
        }

        if !self.has_specificity(&lower) {
            return ValidationVerdict::reject(RejectionReason::MissingSpecificitySignal);
        }

        if !has_tension {
            return ValidationVerdict::reject(RejectionReason::MissingTensionSignal);
        }

        ValidationVerdict::pass()
    }

    fn has_specificity(&self, lower: &str) -> bool {
        lower.chars().any(is_digit) || contains_any(lower, &self.rules.unit_markers)
    }
}

impl CandidateValidator for TitleValidator {
    fn name(&self) -> &str {
        "title"
    }

    fn validate(&self, candidate: &Candidate) -> ValidationVerdict {
        self.check(&candidate.title)
    }
}
