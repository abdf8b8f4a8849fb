//! Whole-batch validator for region-anchored ideas.
//!
//! A batch passes only if every item passes and the batch-level rules hold.
//! There is no partial acceptance.

use serde::{Deserialize, Serialize};
use wayfarer_core::{Candidate, RejectionReason, ValidationVerdict};

use crate::keywords::RegionRules;

/// Title length in mixed units: one per CJK code point, one per contiguous
/// run of ASCII letters/digits. Everything else (spaces, punctuation,
/// emoji) is free.
pub fn mixed_length(text: &str) -> usize {
    let mut units = 0;
    let mut in_latin_run = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if !in_latin_run {
                units += 1;
                in_latin_run = true;
            }
            continue;
        }
        in_latin_run = false;
        if is_cjk(c) {
            units += 1;
        }
    }
    units
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3400..=0x4DBF      // Extension A
        | 0x4E00..=0x9FFF    // Unified Ideographs
        | 0xF900..=0xFAFF    // Compatibility Ideographs
        | 0x20000..=0x2EBEF  // Extensions B–F
        | 0x3040..=0x30FF    // Hiragana, Katakana
        | 0xAC00..=0xD7AF    // Hangul syllables
    )
}

/// Letters and digits only, lower-cased.
fn collapse(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Two assigned regions are usable only if both are non-empty and they
/// differ once punctuation and case are ignored.
pub fn distinct_regions(regions: &[String; 2]) -> bool {
    let a = collapse(&regions[0]);
    let b = collapse(&regions[1]);
    !a.is_empty() && !b.is_empty() && a != b
}

/// Verdict for a whole batch, naming the first offending item if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchVerdict {
    pub verdict: ValidationVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl BatchVerdict {
    fn pass() -> Self {
        Self {
            verdict: ValidationVerdict::pass(),
            index: None,
        }
    }

    fn item(index: usize, reason: RejectionReason) -> Self {
        Self {
            verdict: ValidationVerdict::reject(reason),
            index: Some(index),
        }
    }

    fn batch(reason: RejectionReason) -> Self {
        Self {
            verdict: ValidationVerdict::reject(reason),
            index: None,
        }
    }

    pub fn ok(&self) -> bool {
        self.verdict.ok
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionBatchValidator {
    rules: RegionRules,
}

impl RegionBatchValidator {
    pub fn new(rules: RegionRules) -> Self {
        Self { rules }
    }

    /// Validate a parsed batch against the two regions assigned to it.
    pub fn check(&self, items: &[Candidate], regions: &[String; 2]) -> BatchVerdict {
        if !distinct_regions(regions) {
            return BatchVerdict::batch(RejectionReason::RegionMismatch);
        }
        let assigned: Vec<String> = regions.iter().map(|r| collapse(r)).collect();
        let mut covered = [false, false];
        let mut generic_locations = 0;

        for (index, item) in items.iter().enumerate() {
            if item.title.trim().is_empty()
                || item.angle.trim().is_empty()
                || item.target_audience.trim().is_empty()
            {
                return BatchVerdict::item(index, RejectionReason::LengthOutOfRange);
            }

            let units = mixed_length(&item.title);
            if units < self.rules.min_units || units > self.rules.max_units {
                return BatchVerdict::item(index, RejectionReason::LengthOutOfRange);
            }

            let region = item.region.as_deref().map(collapse).unwrap_or_default();
            match assigned.iter().position(|r| !r.is_empty() && *r == region) {
                Some(slot) => covered[slot] = true,
                None => return BatchVerdict::item(index, RejectionReason::RegionMismatch),
            }

            let title = collapse(&item.title);
            if assigned.iter().any(|r| *r == title) {
                return BatchVerdict::item(index, RejectionReason::BannedGenericPhrase);
            }

            if !self.is_concrete(item.location_hint.as_deref(), &assigned) {
                generic_locations += 1;
            }
        }

        if generic_locations > self.rules.max_generic_locations {
            return BatchVerdict::batch(RejectionReason::LocationHintTooGeneric);
        }

        if !covered.iter().all(|c| *c) {
            return BatchVerdict::batch(RejectionReason::RegionsNotCovered);
        }

        BatchVerdict::pass()
    }

    /// A hint is concrete when it names something narrower than the region.
    fn is_concrete(&self, hint: Option<&str>, assigned: &[String]) -> bool {
        let hint = collapse(hint.unwrap_or_default());
        if hint.is_empty() || assigned.iter().any(|r| *r == hint) {
            return false;
        }
        !self
            .rules
            .generic_locations
            .iter()
            .any(|g| collapse(g) == hint)
    }
}
