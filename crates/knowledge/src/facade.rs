//! Soft-failing front door over any [`SkillStore`].
//!
//! Backends report every problem as a [`StoreError`]. This facade sorts
//! them: unavailability becomes a value ([`StoreWrite::Unavailable`] or an
//! empty [`StoreRead`] with a warning), corruption recovery surfaces as a
//! warning, and only contract violations (malformed documents, exhausted
//! optimistic retries) propagate as errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use wayfarer_core::error::StoreError;
use wayfarer_core::{
    IngestRecord, IngestUpsert, KnowledgeRule, LogEvent, LogKind, RuleObservation, RuleUpsert,
    SkillStore, StoreCounts,
};

/// Outcome of a mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite<T> {
    Done(T),
    /// Storage is unreachable; nothing was written.
    Unavailable(String),
}

impl<T> StoreWrite<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, StoreWrite::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            StoreWrite::Done(value) => Some(value),
            StoreWrite::Unavailable(_) => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            StoreWrite::Done(_) => None,
            StoreWrite::Unavailable(reason) => Some(reason),
        }
    }
}

/// Outcome of a read: always a value, sometimes a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRead<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> StoreRead<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

pub struct KnowledgeStore {
    inner: Arc<dyn SkillStore>,
    reported_unavailable: AtomicBool,
}

impl KnowledgeStore {
    pub fn new(inner: Arc<dyn SkillStore>) -> Self {
        Self {
            inner,
            reported_unavailable: AtomicBool::new(false),
        }
    }

    /// Backend name ("file", "sqlite", "in_memory", "none").
    pub fn backend(&self) -> &str {
        self.inner.name()
    }

    pub fn inner(&self) -> &Arc<dyn SkillStore> {
        &self.inner
    }

    /// Whether a trivial read succeeds right now.
    pub async fn ping(&self) -> bool {
        self.inner.counts().await.is_ok()
    }

    /// Drain queued warnings (e.g. corruption recoveries during writes).
    pub fn take_warnings(&self) -> Vec<String> {
        self.inner.take_warnings()
    }

    fn note_unavailable(&self, err: &StoreError) {
        if !self.reported_unavailable.swap(true, Ordering::Relaxed) {
            warn!(backend = self.backend(), error = %err, "Knowledge store unavailable, continuing degraded");
        } else {
            debug!(backend = self.backend(), error = %err, "Knowledge store still unavailable");
        }
    }

    fn write<T>(&self, result: Result<T, StoreError>) -> Result<StoreWrite<T>, StoreError> {
        match result {
            Ok(value) => Ok(StoreWrite::Done(value)),
            Err(e) if e.is_soft() => {
                self.note_unavailable(&e);
                Ok(StoreWrite::Unavailable(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn read<T: Default>(&self, result: Result<T, StoreError>) -> Result<StoreRead<T>, StoreError> {
        match result {
            Ok(value) => {
                let warnings = self.inner.take_warnings();
                Ok(StoreRead {
                    value,
                    warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
                })
            }
            Err(e) if e.is_soft() => {
                self.note_unavailable(&e);
                Ok(StoreRead {
                    value: T::default(),
                    warning: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    // ── Writes ──

    pub async fn upsert_ingest(
        &self,
        record: IngestRecord,
    ) -> Result<StoreWrite<IngestUpsert>, StoreError> {
        self.write(self.inner.upsert_ingest(record).await)
    }

    pub async fn upsert_rule(
        &self,
        observation: RuleObservation,
    ) -> Result<StoreWrite<RuleUpsert>, StoreError> {
        self.write(self.inner.upsert_rule(observation).await)
    }

    pub async fn append_log(&self, event: LogEvent) -> Result<StoreWrite<()>, StoreError> {
        self.write(self.inner.append_log(event).await)
    }

    // ── Reads ──

    pub async fn recent_logs(
        &self,
        kind: LogKind,
        limit: usize,
    ) -> Result<StoreRead<Vec<LogEvent>>, StoreError> {
        self.read(self.inner.recent_logs(kind, limit).await)
    }

    pub async fn top_rules(&self, limit: usize) -> Result<StoreRead<Vec<KnowledgeRule>>, StoreError> {
        self.read(self.inner.top_rules(limit).await)
    }

    pub async fn get_rule(&self, id: &str) -> Result<StoreRead<Option<KnowledgeRule>>, StoreError> {
        self.read(self.inner.get_rule(id).await)
    }

    pub async fn get_ingest(
        &self,
        script_hash: &str,
    ) -> Result<StoreRead<Option<IngestRecord>>, StoreError> {
        self.read(self.inner.get_ingest(script_hash).await)
    }

    pub async fn rule_counts_by_type(&self) -> Result<StoreRead<Vec<(String, usize)>>, StoreError> {
        self.read(self.inner.rule_counts_by_type().await)
    }

    pub async fn counts(&self) -> Result<StoreRead<StoreCounts>, StoreError> {
        self.read(self.inner.counts().await)
    }
}
