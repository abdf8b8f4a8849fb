//! Draft registry — process-lifetime drafts and daily note counters.
//!
//! Owned by the engine and passed around explicitly. Losing it on restart is
//! acceptable: callers are told a draft is [`DraftError::Lost`] and can
//! regenerate. A snapshot can be written to disk and restored; restoring
//! never replaces a different draft already registered under the same id.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use wayfarer_core::{ContentId, Draft, DraftMode, DraftStatus, ScoredCandidate};

use crate::orchestrator::GenerationOutcome;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Draft {0} not found (it may have been lost on restart); regenerate")]
    Lost(ContentId),

    #[error("Unknown approval choice '{0}' (expected 1, 2 or both)")]
    UnknownChoice(String),

    #[error("Choice {choice} is not available: the draft has {available} top item(s)")]
    ChoiceUnavailable { choice: Choice, available: usize },

    #[error("Daily limit reached ({limit}/{limit}); try again tomorrow")]
    DailyLimitReached { limit: u32 },

    #[error("Draft {id} was replaced by {by}")]
    Superseded { id: ContentId, by: ContentId },

    #[error("Invalid registry snapshot: {0}")]
    Snapshot(String),
}

/// Which of the top items to approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    First,
    Second,
    Both,
}

impl Choice {
    pub fn parse(value: &str) -> Result<Self, DraftError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" => Ok(Choice::First),
            "2" => Ok(Choice::Second),
            "both" => Ok(Choice::Both),
            other => Err(DraftError::UnknownChoice(other.to_string())),
        }
    }

    fn positions(&self) -> &'static [usize] {
        match self {
            Choice::First => &[0],
            Choice::Second => &[1],
            Choice::Both => &[0, 1],
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Choice::First => "1",
            Choice::Second => "2",
            Choice::Both => "both",
        })
    }
}

/// Result of an approval: what was chosen and what fits today's quota.
#[derive(Debug, Clone)]
pub struct Approval {
    pub content_id: ContentId,
    pub day_key: String,
    pub chosen: Vec<ScoredCandidate>,
    /// `chosen` truncated to the remaining quota
    pub selected: Vec<ScoredCandidate>,
    pub over_limit: bool,
    /// Quota left before this approval
    pub remaining: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistrySnapshot {
    drafts: Vec<Draft>,
    #[serde(default)]
    daily_counts: BTreeMap<String, u32>,
}

/// Outcome of [`DraftRegistry::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub unchanged: usize,
    /// Ids whose snapshot copy differed from the registered draft
    pub conflicts: Vec<ContentId>,
}

#[derive(Debug, Clone)]
pub struct DraftRegistry {
    drafts: BTreeMap<ContentId, Draft>,
    daily_counts: BTreeMap<String, u32>,
    max_per_day: u32,
    offset: FixedOffset,
}

impl DraftRegistry {
    pub fn new(max_per_day: u32, utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours.clamp(-23, 23) * 3600)
            .unwrap_or_else(|| Utc.fix());
        Self {
            drafts: BTreeMap::new(),
            daily_counts: BTreeMap::new(),
            max_per_day,
            offset,
        }
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// `YYYYMMDD` in the configured offset.
    pub fn day_key(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset).format("%Y%m%d").to_string()
    }

    /// `YYYYMMDD-HHMM-XXXX` in the configured offset.
    pub fn make_content_id(&self, now: DateTime<Utc>) -> ContentId {
        let mut rng = rand::rng();
        let suffix: String = (0..4)
            .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        let stamp = now.with_timezone(&self.offset).format("%Y%m%d-%H%M");
        ContentId(format!("{stamp}-{suffix}"))
    }

    fn fresh_id(&self, now: DateTime<Utc>) -> ContentId {
        loop {
            let id = self.make_content_id(now);
            if !self.drafts.contains_key(&id) {
                return id;
            }
        }
    }

    /// Register a new pending draft for a finished cycle.
    pub fn create(&mut self, outcome: GenerationOutcome, mode: DraftMode, now: DateTime<Utc>) -> Draft {
        let draft = Draft {
            content_id: self.fresh_id(now),
            created_at: now,
            mode,
            ranked: outcome.ranked,
            top: outcome.top,
            used_fallback: outcome.used_fallback,
            attempts: outcome.attempts,
            rejections: outcome.rejections,
            status: DraftStatus::Pending,
        };
        info!(content_id = %draft.content_id, fallback = draft.used_fallback, "Draft created");
        self.drafts.insert(draft.content_id.clone(), draft.clone());
        draft
    }

    pub fn get(&self, id: &ContentId) -> Result<&Draft, DraftError> {
        self.drafts.get(id).ok_or_else(|| DraftError::Lost(id.clone()))
    }

    /// Mark `old` as replaced by `by`.
    pub fn supersede(&mut self, old: &ContentId, by: &ContentId) -> Result<(), DraftError> {
        let draft = self
            .drafts
            .get_mut(old)
            .ok_or_else(|| DraftError::Lost(old.clone()))?;
        draft.status = DraftStatus::Superseded { by: by.clone() };
        debug!(old = %old, new = %by, "Draft superseded");
        Ok(())
    }

    pub fn used(&self, now: DateTime<Utc>) -> u32 {
        self.daily_counts.get(&self.day_key(now)).copied().unwrap_or(0)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> u32 {
        self.max_per_day.saturating_sub(self.used(now))
    }

    pub fn max_per_day(&self) -> u32 {
        self.max_per_day
    }

    /// Select items of a draft for note generation.
    ///
    /// The quota is consumed separately, per note, via [`record_note`](Self::record_note).
    pub fn approve(
        &mut self,
        id: &ContentId,
        choice: Choice,
        now: DateTime<Utc>,
    ) -> Result<Approval, DraftError> {
        let remaining = self.remaining(now);
        let max_per_day = self.max_per_day;
        let day_key = self.day_key(now);

        let draft = self
            .drafts
            .get_mut(id)
            .ok_or_else(|| DraftError::Lost(id.clone()))?;
        if let DraftStatus::Superseded { by } = &draft.status {
            return Err(DraftError::Superseded {
                id: id.clone(),
                by: by.clone(),
            });
        }

        let positions = choice.positions();
        if positions.iter().any(|&p| p >= draft.top.len()) {
            return Err(DraftError::ChoiceUnavailable {
                choice,
                available: draft.top.len(),
            });
        }
        if remaining == 0 {
            return Err(DraftError::DailyLimitReached { limit: max_per_day });
        }

        let chosen: Vec<ScoredCandidate> = positions.iter().map(|&p| draft.top[p].clone()).collect();
        let keep = chosen.len().min(remaining as usize);
        let selected = chosen[..keep].to_vec();
        draft.status = DraftStatus::Approved {
            selected: positions[..keep].to_vec(),
        };

        let over_limit = selected.len() < chosen.len();
        if over_limit {
            warn!(content_id = %id, remaining, "Approval truncated to the daily quota");
        }
        Ok(Approval {
            content_id: id.clone(),
            day_key,
            chosen,
            selected,
            over_limit,
            remaining,
        })
    }

    /// Count one generated note against `day_key`; returns the new count.
    pub fn record_note(&mut self, day_key: &str) -> u32 {
        let used = self.daily_counts.entry(day_key.to_string()).or_insert(0);
        *used += 1;
        *used
    }

    pub fn snapshot(&self) -> Result<String, DraftError> {
        let snapshot = RegistrySnapshot {
            drafts: self.drafts.values().cloned().collect(),
            daily_counts: self.daily_counts.clone(),
        };
        serde_json::to_string_pretty(&snapshot).map_err(|e| DraftError::Snapshot(e.to_string()))
    }

    /// Merge a snapshot in. Existing drafts always win.
    pub fn restore(&mut self, json: &str) -> Result<RestoreReport, DraftError> {
        let snapshot: RegistrySnapshot =
            serde_json::from_str(json).map_err(|e| DraftError::Snapshot(e.to_string()))?;
        let mut report = RestoreReport::default();

        for draft in snapshot.drafts {
            match self.drafts.get(&draft.content_id) {
                Some(existing) if *existing == draft => report.unchanged += 1,
                Some(_) => {
                    warn!(content_id = %draft.content_id, "Snapshot draft differs from registered draft, keeping registered");
                    report.conflicts.push(draft.content_id);
                }
                None => {
                    self.drafts.insert(draft.content_id.clone(), draft);
                    report.restored += 1;
                }
            }
        }
        for (day, count) in snapshot.daily_counts {
            let used = self.daily_counts.entry(day).or_insert(0);
            *used = (*used).max(count);
        }
        Ok(report)
    }
}
