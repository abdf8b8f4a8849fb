//! Deterministic heuristic scoring and ranking.
//!
//! `score` is a pure function of the candidate text and the tables: no
//! clock, no randomness. Ranking is a stable sort, so ties keep generation
//! order.

use wayfarer_core::{Candidate, Score, ScoredCandidate, SUB_SCORE_MAX};

use crate::keywords::{contains_any, is_digit, ScoringTables};

/// Locality and budget signals both present.
pub const BONUS_LOCAL_BUDGET: u8 = 6;
/// Locality signal only.
pub const BONUS_LOCAL: u8 = 4;
/// Budget signal only.
pub const BONUS_BUDGET: u8 = 2;

/// Highest reachable total: four capped sub-scores plus the largest bonus.
pub const MAX_TOTAL: u16 = 4 * SUB_SCORE_MAX as u16 + BONUS_LOCAL_BUDGET as u16;

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    tables: ScoringTables,
}

impl Scorer {
    pub fn new(tables: ScoringTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &ScoringTables {
        &self.tables
    }

    pub fn score(&self, candidate: &Candidate) -> Score {
        let t = &self.tables;
        let title = candidate.title.to_lowercase();
        let angle = candidate.angle.to_lowercase();
        let audience = candidate.target_audience.to_lowercase();
        let region = candidate.region.as_deref().unwrap_or_default().to_lowercase();
        let hint = candidate
            .location_hint
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        if [&title, &angle, &audience, &region, &hint]
            .into_iter()
            .any(|field| contains_any(field, &t.excluded_regions))
        {
            return Score::disqualified();
        }

        let mut save = 0u8;
        if contains_any(&title, &t.save_title) {
            save += 6;
        }
        if title.chars().any(is_digit) {
            save += 2;
        }
        if contains_any(&title, &t.save_compare) {
            save += 2;
        }

        let mut follow = 0u8;
        if contains_any(&audience, &t.follow_audience) {
            follow += 5;
        }
        if contains_any(&title, &t.follow_series_title) {
            follow += 3;
        }
        if contains_any(&angle, &t.follow_series_angle) {
            follow += 2;
        }

        let mut clarity = 0u8;
        if title.chars().count() <= t.clarity_max_chars {
            clarity += 5;
        }
        if contains_any(&title, &t.clarity_title) {
            clarity += 5;
        }

        let mut exec = 0u8;
        if contains_any(&angle, &t.exec_angle) {
            exec += 6;
        }
        if contains_any(&title, &t.exec_title) {
            exec += 4;
        }

        let local = [&title, &angle, &hint]
            .into_iter()
            .any(|field| contains_any(field, &t.locality));
        let budget = [&title, &angle]
            .into_iter()
            .any(|field| contains_any(field, &t.budget));
        let bonus = match (local, budget) {
            (true, true) => BONUS_LOCAL_BUDGET,
            (true, false) => BONUS_LOCAL,
            (false, true) => BONUS_BUDGET,
            (false, false) => 0,
        };

        let save = save.min(SUB_SCORE_MAX);
        let follow = follow.min(SUB_SCORE_MAX);
        let clarity = clarity.min(SUB_SCORE_MAX);
        let exec = exec.min(SUB_SCORE_MAX);
        let total = [save, follow, clarity, exec, bonus]
            .into_iter()
            .map(u16::from)
            .sum();

        Score {
            save,
            follow,
            clarity,
            exec,
            bonus,
            total,
            disqualified: false,
        }
    }

    /// Score every candidate and sort best first, keeping generation order on ties.
    pub fn rank(&self, candidates: &[Candidate]) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| ScoredCandidate {
                index,
                candidate: candidate.clone(),
                score: self.score(candidate),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total.cmp(&a.score.total));
        scored
    }

    /// Ranked list plus its first `k` entries (all of them when fewer exist).
    pub fn rank_top(
        &self,
        candidates: &[Candidate],
        k: usize,
    ) -> (Vec<ScoredCandidate>, Vec<ScoredCandidate>) {
        let ranked = self.rank(candidates);
        let top = ranked.iter().take(k).cloned().collect();
        (ranked, top)
    }

    pub fn rank_top2(&self, candidates: &[Candidate]) -> (Vec<ScoredCandidate>, Vec<ScoredCandidate>) {
        self.rank_top(candidates, 2)
    }
}
