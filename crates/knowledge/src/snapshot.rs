//! Rules and ingests as one serializable document.
//!
//! Shared by the in-memory and file backends: both keep a
//! [`KnowledgeSnapshot`] and apply upserts to it while holding their lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wayfarer_core::{
    IngestRecord, IngestUpsert, KnowledgeRule, LogEvent, RuleObservation, RuleUpsert,
};

use crate::hash::rule_id;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    #[serde(default)]
    pub ingests: BTreeMap<String, IngestRecord>,
    #[serde(default)]
    pub rules: BTreeMap<String, KnowledgeRule>,
}

impl KnowledgeSnapshot {
    pub fn upsert_ingest(&mut self, record: IngestRecord) -> IngestUpsert {
        match self.ingests.get_mut(&record.script_hash) {
            Some(existing) => {
                existing.refresh(&record);
                IngestUpsert::Refreshed
            }
            None => {
                self.ingests.insert(record.script_hash.clone(), record);
                IngestUpsert::Created
            }
        }
    }

    pub fn upsert_rule(&mut self, obs: &RuleObservation, now: DateTime<Utc>) -> RuleUpsert {
        let id = rule_id(&obs.rule_text);
        match self.rules.get_mut(&id) {
            Some(rule) => {
                rule.absorb(obs, now);
                RuleUpsert::Merged {
                    seen_count: rule.seen_count,
                }
            }
            None => {
                let rule = KnowledgeRule::from_observation(id.clone(), obs, now);
                self.rules.insert(id, rule);
                RuleUpsert::Created
            }
        }
    }

    pub fn top_rules(&self, limit: usize) -> Vec<KnowledgeRule> {
        let mut rules: Vec<&KnowledgeRule> = self.rules.values().collect();
        rules.sort_by(|a, b| {
            b.seen_count
                .cmp(&a.seen_count)
                .then(b.last_seen_at.cmp(&a.last_seen_at))
        });
        rules.into_iter().take(limit).cloned().collect()
    }

    pub fn rule_counts_by_type(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for rule in self.rules.values() {
            *counts.entry(rule.content_type.as_str()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> =
            counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        // BTreeMap order already sorts names; the stable sort keeps it on ties.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

/// Newest-first view of an append-ordered log.
pub fn newest_first(events: &[LogEvent], limit: usize) -> Vec<LogEvent> {
    events.iter().rev().take(limit).cloned().collect()
}
