//! Unavailable store — used when storage is disabled or failed to open.
//!
//! Every call returns [`StoreError::Unavailable`], so callers take the
//! soft-failure path.

use async_trait::async_trait;
use wayfarer_core::error::StoreError;
use wayfarer_core::{
    IngestRecord, IngestUpsert, KnowledgeRule, LogEvent, LogKind, RuleObservation, RuleUpsert,
    SkillStore, StoreCounts,
};

pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn err<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

#[async_trait]
impl SkillStore for UnavailableStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn upsert_ingest(&self, _record: IngestRecord) -> Result<IngestUpsert, StoreError> {
        self.err()
    }

    async fn upsert_rule(&self, _observation: RuleObservation) -> Result<RuleUpsert, StoreError> {
        self.err()
    }

    async fn append_log(&self, _event: LogEvent) -> Result<(), StoreError> {
        self.err()
    }

    async fn recent_logs(&self, _kind: LogKind, _limit: usize) -> Result<Vec<LogEvent>, StoreError> {
        self.err()
    }

    async fn top_rules(&self, _limit: usize) -> Result<Vec<KnowledgeRule>, StoreError> {
        self.err()
    }

    async fn get_rule(&self, _id: &str) -> Result<Option<KnowledgeRule>, StoreError> {
        self.err()
    }

    async fn get_ingest(&self, _script_hash: &str) -> Result<Option<IngestRecord>, StoreError> {
        self.err()
    }

    async fn rule_counts_by_type(&self) -> Result<Vec<(String, usize)>, StoreError> {
        self.err()
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.err()
    }
}
