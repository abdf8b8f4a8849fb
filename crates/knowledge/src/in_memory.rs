//! In-memory skill store — for tests and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use wayfarer_core::error::StoreError;
use wayfarer_core::{
    IngestRecord, IngestUpsert, KnowledgeRule, LogEvent, LogKind, RuleObservation, RuleUpsert,
    SkillStore, StoreCounts,
};

use crate::snapshot::{newest_first, KnowledgeSnapshot};

#[derive(Default)]
struct State {
    snapshot: KnowledgeSnapshot,
    wins: Vec<LogEvent>,
    failures: Vec<LogEvent>,
}

impl State {
    fn log(&self, kind: LogKind) -> &[LogEvent] {
        match kind {
            LogKind::Win => &self.wins,
            LogKind::Failure => &self.failures,
        }
    }
}

/// Process-local store. All operations hold one async mutex, so every
/// upsert is atomic.
#[derive(Clone, Default)]
pub struct InMemorySkillStore {
    state: Arc<Mutex<State>>,
}

impl InMemorySkillStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SkillStore for InMemorySkillStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert_ingest(&self, record: IngestRecord) -> Result<IngestUpsert, StoreError> {
        Ok(self.state.lock().await.snapshot.upsert_ingest(record))
    }

    async fn upsert_rule(&self, observation: RuleObservation) -> Result<RuleUpsert, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .snapshot
            .upsert_rule(&observation, Utc::now()))
    }

    async fn append_log(&self, event: LogEvent) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match event.kind {
            LogKind::Win => state.wins.push(event),
            LogKind::Failure => state.failures.push(event),
        }
        Ok(())
    }

    async fn recent_logs(&self, kind: LogKind, limit: usize) -> Result<Vec<LogEvent>, StoreError> {
        Ok(newest_first(self.state.lock().await.log(kind), limit))
    }

    async fn top_rules(&self, limit: usize) -> Result<Vec<KnowledgeRule>, StoreError> {
        Ok(self.state.lock().await.snapshot.top_rules(limit))
    }

    async fn get_rule(&self, id: &str) -> Result<Option<KnowledgeRule>, StoreError> {
        Ok(self.state.lock().await.snapshot.rules.get(id).cloned())
    }

    async fn get_ingest(&self, script_hash: &str) -> Result<Option<IngestRecord>, StoreError> {
        Ok(self.state.lock().await.snapshot.ingests.get(script_hash).cloned())
    }

    async fn rule_counts_by_type(&self) -> Result<Vec<(String, usize)>, StoreError> {
        Ok(self.state.lock().await.snapshot.rule_counts_by_type())
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let state = self.state.lock().await;
        Ok(StoreCounts {
            ingests: state.snapshot.ingests.len(),
            rules: state.snapshot.rules.len(),
            wins: state.wins.len(),
            failures: state.failures.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::rule_id;

    fn obs(text: &str, source: &str) -> RuleObservation {
        RuleObservation {
            rule_text: text.into(),
            why: "why".into(),
            example: "example".into(),
            content_type: "cost_breakdown".into(),
            tags: vec!["budget".into()],
            source_ref: source.into(),
        }
    }

    #[tokio::test]
    async fn upsert_rule_twice_merges() {
        let store = InMemorySkillStore::new();
        assert_eq!(
            store.upsert_rule(obs("Lead with the price", "h1")).await.unwrap(),
            RuleUpsert::Created
        );
        assert_eq!(
            store.upsert_rule(obs("lead with  the PRICE", "h1")).await.unwrap(),
            RuleUpsert::Merged { seen_count: 2 }
        );

        let rule = store.get_rule(&rule_id("lead with the price")).await.unwrap().unwrap();
        assert_eq!(rule.seen_count, 2);
        assert_eq!(rule.sources, vec!["h1".to_string()]);
        assert_eq!(store.counts().await.unwrap().rules, 1);
    }

    #[tokio::test]
    async fn logs_are_newest_first() {
        let store = InMemorySkillStore::new();
        for i in 0..4 {
            let mut event = LogEvent::new(LogKind::Win, "test");
            event.summary = Some(format!("win {i}"));
            store.append_log(event).await.unwrap();
        }
        store
            .append_log(LogEvent::new(LogKind::Failure, "test"))
            .await
            .unwrap();

        let recent = store.recent_logs(LogKind::Win, 2).await.unwrap();
        let summaries: Vec<_> = recent.iter().filter_map(|e| e.summary.clone()).collect();
        assert_eq!(summaries, vec!["win 3", "win 2"]);
        assert_eq!(store.counts().await.unwrap().failures, 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_lose_nothing() {
        let store = InMemorySkillStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.upsert_rule(obs("Show the receipt", &format!("h{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let rule = store.get_rule(&rule_id("show the receipt")).await.unwrap().unwrap();
        assert_eq!(rule.seen_count, 16);
        assert_eq!(rule.sources.len(), 16);
    }
}
