//! Draft — one generation cycle's batch plus its selection state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::candidate::{RejectionReason, ScoredCandidate};

/// Identifier of one batch: `YYYYMMDD-HHMM-XXXX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which orchestration mode produced the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DraftMode {
    /// Six titles, top-2 validated individually
    Titles,
    /// Five region-anchored titles validated as one batch
    Regions { regions: [String; 2] },
}

/// Lifecycle of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DraftStatus {
    /// Waiting for a selection
    Pending,
    /// Some or all of the top items were approved
    Approved { selected: Vec<usize> },
    /// Replaced by a regenerated draft
    Superseded { by: ContentId },
}

/// A rejected item (or a whole-batch rejection when `index` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub attempt: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub title: String,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub content_id: ContentId,
    pub created_at: DateTime<Utc>,
    pub mode: DraftMode,

    /// Every scored item of the chosen attempt, best first
    pub ranked: Vec<ScoredCandidate>,

    /// The top-K slice of `ranked`
    pub top: Vec<ScoredCandidate>,

    /// Set when no attempt passed validation and the best attempt was kept
    pub used_fallback: bool,

    /// Generation attempts consumed, including the first
    pub attempts: usize,

    /// All rejections observed across every attempt of the cycle
    #[serde(default)]
    pub rejections: Vec<Rejection>,

    pub status: DraftStatus,
}

impl Draft {
    /// Rejections that belong to the attempt this draft kept.
    pub fn rejections_for(&self, attempt: usize) -> impl Iterator<Item = &Rejection> {
        self.rejections.iter().filter(move |r| r.attempt == attempt)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, DraftStatus::Pending)
    }
}
