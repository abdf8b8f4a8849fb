//! Hook validator: short opening line hitting at least two of five element
//! groups (location, benefit, curiosity, emotion, decision frame).
//!
//! Independent of the title rules; the two keyword sets are never merged.

use wayfarer_core::{Candidate, RejectionReason, ValidationVerdict};

use crate::keywords::{contains_any, HookGroups};
use crate::CandidateValidator;

#[derive(Debug, Clone, Default)]
pub struct HookValidator {
    groups: HookGroups,
}

impl HookValidator {
    pub fn new(groups: HookGroups) -> Self {
        Self { groups }
    }

    /// How many of the five groups the hook touches.
    pub fn element_count(&self, hook: &str) -> usize {
        let lower = hook.to_lowercase();
        self.groups
            .groups()
            .into_iter()
            .filter(|kws| contains_any(&lower, kws))
            .count()
    }

    pub fn check(&self, hook: &str) -> ValidationVerdict {
        let hook = hook.trim();
        if hook.is_empty() || hook.chars().count() > self.groups.max_chars {
            return ValidationVerdict::reject(RejectionReason::LengthOutOfRange);
        }
        if self.element_count(hook) < self.groups.min_groups {
            return ValidationVerdict::reject(RejectionReason::InsufficientHookElements);
        }
        ValidationVerdict::pass()
    }

    pub fn is_valid(&self, hook: &str) -> bool {
        self.check(hook).ok
    }
}

impl CandidateValidator for HookValidator {
    fn name(&self) -> &str {
        "hook"
    }

    fn validate(&self, candidate: &Candidate) -> ValidationVerdict {
        self.check(&candidate.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_groups_pass() {
        // location + emotion
        let v = HookValidator::default();
        assert_eq!(v.element_count("吉隆坡机场差点崩溃"), 2);
        assert!(v.is_valid("吉隆坡机场差点崩溃"));
    }

    #[test]
    fn one_group_is_insufficient() {
        let v = HookValidator::default();
        assert_eq!(
            v.check("曼谷夜市好热闹").reason,
            Some(RejectionReason::InsufficientHookElements)
        );
    }

    #[test]
    fn repeated_keywords_in_one_group_count_once() {
        let v = HookValidator::default();
        assert_eq!(v.element_count("机场酒店海关"), 1);
    }

    #[test]
    fn empty_and_long_hooks_fail_length() {
        let v = HookValidator::default();
        assert_eq!(v.check("  ").reason, Some(RejectionReason::LengthOutOfRange));
        assert_eq!(
            v.check("为什么吉隆坡机场换钱会让你后悔一整年").reason,
            Some(RejectionReason::LengthOutOfRange)
        );
    }

    #[test]
    fn decision_frame_matches_case_insensitively() {
        let v = HookValidator::default();
        assert!(v.is_valid("酒店VS民宿先看"));
        assert!(v.is_valid("槟城VS怡保要不要"));
    }

    #[test]
    fn validates_candidate_title() {
        let v = HookValidator::default();
        let c = Candidate::new(wayfarer_core::Bucket::Trust, "首尔酒店省钱真相", "a", "b");
        assert!(v.validate(&c).ok);
    }
}
