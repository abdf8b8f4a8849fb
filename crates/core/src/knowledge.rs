//! Knowledge trait — persistence of learned rules, ingests and event logs.
//!
//! Rules are content-addressed: the id is a hash of the normalized rule text,
//! so repeated observations merge into one record whose `seen_count` only
//! grows. Logs are append-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::StoreError;

/// A deduplicated, reusable content-structure observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRule {
    /// Hash of the normalized rule text
    pub id: String,
    pub rule_text: String,
    #[serde(default)]
    pub why: String,
    #[serde(default)]
    pub example: String,
    pub content_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub seen_count: u64,
    /// Distinct source references (script hashes), in first-seen order
    #[serde(default)]
    pub sources: Vec<String>,
    /// Bumped on every merge; used for optimistic concurrency
    #[serde(default)]
    pub version: u64,
}

/// One observation of a rule, as extracted from a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleObservation {
    pub rule_text: String,
    pub why: String,
    pub example: String,
    pub content_type: String,
    pub tags: Vec<String>,
    pub source_ref: String,
}

impl KnowledgeRule {
    /// First observation of a rule.
    pub fn from_observation(id: String, obs: &RuleObservation, now: DateTime<Utc>) -> Self {
        let mut tags = Vec::new();
        merge_unique(&mut tags, &obs.tags);
        let mut sources = Vec::new();
        merge_unique(&mut sources, std::slice::from_ref(&obs.source_ref));
        Self {
            id,
            rule_text: obs.rule_text.trim().to_string(),
            why: obs.why.trim().to_string(),
            example: obs.example.trim().to_string(),
            content_type: obs.content_type.clone(),
            tags,
            first_seen_at: now,
            last_seen_at: now,
            seen_count: 1,
            sources,
            version: 1,
        }
    }

    /// Merge a repeated observation into this record.
    ///
    /// Increments `seen_count`, refreshes `last_seen_at`, unions tags and
    /// sources, and keeps the latest non-empty `why`/`example`.
    pub fn absorb(&mut self, obs: &RuleObservation, now: DateTime<Utc>) {
        self.seen_count += 1;
        if now > self.last_seen_at {
            self.last_seen_at = now;
        }
        if !obs.why.trim().is_empty() {
            self.why = obs.why.trim().to_string();
        }
        if !obs.example.trim().is_empty() {
            self.example = obs.example.trim().to_string();
        }
        merge_unique(&mut self.tags, &obs.tags);
        merge_unique(&mut self.sources, std::slice::from_ref(&obs.source_ref));
        self.version += 1;
    }
}

fn merge_unique(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        let item = item.trim();
        if !item.is_empty() && !into.iter().any(|existing| existing == item) {
            into.push(item.to_string());
        }
    }
}

/// One learned script, keyed by the hash of its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRecord {
    pub script_hash: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Structured analysis returned by the model
    pub analysis: serde_json::Value,
    pub excerpt: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// How many times this exact script was ingested
    #[serde(default = "one")]
    pub ingest_count: u64,
}

fn one() -> u64 {
    1
}

impl IngestRecord {
    /// Apply a repeated ingest: only the mutable fields change.
    pub fn refresh(&mut self, newer: &IngestRecord) {
        self.metadata = newer.metadata.clone();
        self.analysis = newer.analysis.clone();
        if newer.last_seen_at > self.last_seen_at {
            self.last_seen_at = newer.last_seen_at;
        }
        self.ingest_count += 1;
    }
}

/// Kind of append-only log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Win,
    Failure,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Win => "win",
            LogKind::Failure => "failure",
        }
    }
}

/// Immutable, timestamped win/failure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub kind: LogKind,
    pub created_at: DateTime<Utc>,
    /// Where the event came from ("learn_script", "manual_win", "generation")
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Rejection reasons or do-not-learn entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl LogEvent {
    pub fn new(kind: LogKind, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            created_at: Utc::now(),
            source: source.into(),
            script_hash: None,
            content_type: None,
            hook_text: None,
            summary: None,
            excerpt: None,
            reasons: Vec::new(),
        }
    }

    /// Concatenated free-text fields, used for frequency statistics.
    pub fn text(&self) -> String {
        [&self.hook_text, &self.summary, &self.excerpt]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of a rule upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleUpsert {
    Created,
    Merged { seen_count: u64 },
}

/// Result of an ingest upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestUpsert {
    Created,
    Refreshed,
}

/// Aggregate counts used by audit and status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub ingests: usize,
    pub rules: usize,
    pub wins: usize,
    pub failures: usize,
}

/// The core SkillStore trait.
///
/// Implementations: in-memory (tests), JSON file, SQLite.
/// Rule upserts must be atomic per rule id.
#[async_trait]
pub trait SkillStore: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create or refresh an ingest record keyed by `script_hash`.
    async fn upsert_ingest(&self, record: IngestRecord) -> std::result::Result<IngestUpsert, StoreError>;

    /// Create or merge a rule keyed by the hash of its normalized text.
    async fn upsert_rule(&self, observation: RuleObservation) -> std::result::Result<RuleUpsert, StoreError>;

    /// Append an event to its log stream.
    async fn append_log(&self, event: LogEvent) -> std::result::Result<(), StoreError>;

    /// Most recent events of a kind, newest first.
    async fn recent_logs(&self, kind: LogKind, limit: usize) -> std::result::Result<Vec<LogEvent>, StoreError>;

    /// Rules ordered by `seen_count` desc, then `last_seen_at` desc.
    async fn top_rules(&self, limit: usize) -> std::result::Result<Vec<KnowledgeRule>, StoreError>;

    /// Get a rule by id.
    async fn get_rule(&self, id: &str) -> std::result::Result<Option<KnowledgeRule>, StoreError>;

    /// Get an ingest by script hash.
    async fn get_ingest(&self, script_hash: &str) -> std::result::Result<Option<IngestRecord>, StoreError>;

    /// Rule counts per content type, largest first (ties by name).
    async fn rule_counts_by_type(&self) -> std::result::Result<Vec<(String, usize)>, StoreError>;

    /// Aggregate counts.
    async fn counts(&self) -> std::result::Result<StoreCounts, StoreError>;

    /// Drain warnings raised by self-healing (e.g. corrupted state recovery).
    fn take_warnings(&self) -> Vec<String> {
        Vec::new()
    }
}
