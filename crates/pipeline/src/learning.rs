//! Script learning: analyze a winning script and fold it into the knowledge
//! store and the skill journal.

use chrono::Utc;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};
use wayfarer_core::error::GenerationError;
use wayfarer_core::{
    IngestRecord, IngestUpsert, LogEvent, LogKind, Provider, ProviderRequest, ResponseFormat,
    RuleObservation, RuleUpsert,
};
use wayfarer_knowledge::{
    JournalEntry, JournalRule, KnowledgeStore, SkillJournal, StoreWrite, excerpt, script_hash,
};

use crate::error::{PipelineError, Result};
use crate::parse::extract_json;
use crate::prompts::learn_messages;

static LEARN_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/learn_script(?:@\w+)?").expect("learn command pattern is valid"));

/// Metadata keys a script may carry.
pub const METADATA_KEYS: &[&str] = &["platform", "type", "performance"];
const EXCERPT_CHARS: usize = 200;

/// Split a `/learn_script` message into leading metadata and the script.
///
/// Metadata lines are `key: value` for `platform`, `type` and `performance`;
/// the script starts at the first blank line, line without a colon, or
/// line with any other key.
pub fn parse_learn_command(text: &str) -> (BTreeMap<String, String>, String) {
    let raw = text.trim();
    let body = LEARN_COMMAND.replace(raw, "");
    let body = body.trim_start();
    let mut metadata = BTreeMap::new();
    if body.is_empty() {
        return (metadata, String::new());
    }

    let lines: Vec<&str> = body.lines().collect();
    let mut start = lines.len();
    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() {
            start = i + 1;
            break;
        }
        let Some((key, value)) = stripped.split_once(':') else {
            start = i;
            break;
        };
        let key = key.trim().to_lowercase();
        if !METADATA_KEYS.contains(&key.as_str()) {
            start = i;
            break;
        }
        metadata.insert(key, value.trim().to_string());
    }

    let script = lines[start.min(lines.len())..].join("\n").trim().to_string();
    (metadata, script)
}

// ── Analysis schema ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookAnalysis {
    pub text: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureStep {
    pub step: i64,
    pub what: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtaAnalysis {
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReusableRule {
    pub rule: String,
    pub why: String,
    pub example_from_script: String,
}

/// What the model extracts from a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptAnalysis {
    pub platform: String,
    pub content_type: String,
    pub hook: HookAnalysis,
    pub target_audience: Vec<String>,
    pub decision_tension: Vec<String>,
    pub structure_steps: Vec<StructureStep>,
    pub save_worthy_lines: Vec<String>,
    pub cta: CtaAnalysis,
    pub reusable_rules: Vec<ReusableRule>,
    pub do_not_learn: Vec<String>,
    pub tags: Vec<String>,
}

impl ScriptAnalysis {
    fn content_type(&self) -> &str {
        if self.content_type.trim().is_empty() {
            "other"
        } else {
            self.content_type.trim()
        }
    }

    fn summary(&self) -> Option<String> {
        let lines: Vec<&str> = self
            .save_worthy_lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .take(3)
            .collect();
        (!lines.is_empty()).then(|| lines.join(" / "))
    }
}

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn enum_array(values: &[&str]) -> Value {
    json!({ "type": "array", "items": { "type": "string", "enum": values } })
}

/// Strict JSON schema for the `script_learning` response.
pub fn learning_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "platform": { "type": "string", "enum": ["xhs", "tiktok", "ig", "other"] },
            "content_type": {
                "type": "string",
                "enum": [
                    "cost_breakdown", "avoid_pitfalls", "local_weekend", "booking_strategy",
                    "hidden_tips", "tools", "other"
                ]
            },
            "hook": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "text": { "type": "string" },
                    "type": enum_array(&[
                        "number", "conflict", "avoid_pitfalls", "comparison", "decision_tension", "other"
                    ])
                },
                "required": ["text", "type"]
            },
            "target_audience": string_array(),
            "decision_tension": string_array(),
            "structure_steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "step": { "type": "integer" },
                        "what": { "type": "string" }
                    },
                    "required": ["step", "what"]
                }
            },
            "save_worthy_lines": string_array(),
            "cta": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "type": enum_array(&["follow", "save", "comment", "dm"]),
                    "text": { "type": "string" }
                },
                "required": ["type", "text"]
            },
            "reusable_rules": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "rule": { "type": "string" },
                        "why": { "type": "string" },
                        "example_from_script": { "type": "string" }
                    },
                    "required": ["rule", "why", "example_from_script"]
                }
            },
            "do_not_learn": string_array(),
            "tags": string_array()
        },
        "required": [
            "platform", "content_type", "hook", "target_audience", "decision_tension",
            "structure_steps", "save_worthy_lines", "cta", "reusable_rules", "do_not_learn", "tags"
        ]
    })
}

/// What one ingest did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LearnReport {
    pub script_hash: String,
    pub content_type: String,
    pub rules_processed: usize,
    pub new_rules: usize,
    pub updated_rules: usize,
    /// This exact script had been ingested before
    pub repeat_ingest: bool,
    /// Whether the knowledge store accepted the writes
    pub stored: bool,
    pub files_updated: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct ScriptLearner {
    provider: Arc<dyn Provider>,
    store: Arc<KnowledgeStore>,
    journal: SkillJournal,
    model: String,
    temperature: f32,
}

impl ScriptLearner {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<KnowledgeStore>,
        journal: SkillJournal,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            store,
            journal,
            model: model.into(),
            temperature,
        }
    }

    /// Ask the model for a structured analysis of `script`.
    pub async fn analyze(
        &self,
        script: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(ScriptAnalysis, Value)> {
        let request = ProviderRequest::new(&self.model, learn_messages(metadata, script))
            .with_temperature(self.temperature)
            .with_format(ResponseFormat::JsonSchema {
                name: "script_learning".into(),
                schema: learning_schema(),
                strict: true,
            });
        let response = self.provider.complete(request).await?;

        let raw: Value = serde_json::from_str(extract_json(&response.content))
            .map_err(|e| GenerationError::InvalidJson(e.to_string()))?;
        if !raw.is_object() {
            return Err(GenerationError::SchemaMismatch("analysis is not an object".into()).into());
        }
        let analysis: ScriptAnalysis = serde_json::from_value(raw.clone())
            .map_err(|e| GenerationError::SchemaMismatch(e.to_string()))?;
        Ok((analysis, raw))
    }

    /// Analyze and store one script.
    pub async fn ingest(&self, script: &str, metadata: BTreeMap<String, String>) -> Result<LearnReport> {
        let script = script.trim();
        if script.is_empty() {
            return Err(PipelineError::EmptyScript);
        }
        let hash = script_hash(script);
        let (analysis, raw) = self.analyze(script, &metadata).await?;
        let content_type = analysis.content_type().to_string();
        let snippet = excerpt(script, EXCERPT_CHARS);
        let now = Utc::now();

        let mut report = LearnReport {
            script_hash: hash.clone(),
            content_type: content_type.clone(),
            ..LearnReport::default()
        };

        let record = IngestRecord {
            script_hash: hash.clone(),
            metadata: metadata.clone(),
            analysis: raw,
            excerpt: snippet.clone(),
            first_seen_at: now,
            last_seen_at: now,
            ingest_count: 1,
        };
        match self.store.upsert_ingest(record).await? {
            StoreWrite::Done(outcome) => {
                report.stored = true;
                report.repeat_ingest = outcome == IngestUpsert::Refreshed;
                self.store_rules(&analysis, &content_type, &hash, &mut report).await?;
                self.store_logs(&analysis, &content_type, &hash, &snippet, &mut report).await?;
            }
            StoreWrite::Unavailable(reason) => {
                warn!(hash = %hash, "Knowledge store unavailable, skipping rule learning");
                report.warnings.push(reason);
            }
        }
        report.warnings.extend(self.store.take_warnings());

        let entry = JournalEntry {
            timestamp: now,
            metadata,
            platform: analysis.platform.clone(),
            content_type: content_type.clone(),
            hook_text: analysis.hook.text.clone(),
            hook_types: analysis.hook.types.clone(),
            script_hash: hash.clone(),
            excerpt: snippet,
            save_worthy_lines: analysis.save_worthy_lines.clone(),
            rules: analysis
                .reusable_rules
                .iter()
                .map(|r| JournalRule {
                    rule: r.rule.clone(),
                    why: r.why.clone(),
                    example: r.example_from_script.clone(),
                })
                .collect(),
            do_not_learn: analysis.do_not_learn.clone(),
        };
        match self.journal.record_learning_async(entry).await {
            Ok(files) => report.files_updated = files,
            Err(e) => {
                warn!(error = %e, "Skill journal not updated");
                report.warnings.push(e.to_string());
            }
        }

        info!(
            hash = %hash,
            rules = report.rules_processed,
            new = report.new_rules,
            updated = report.updated_rules,
            repeat = report.repeat_ingest,
            "Script learned"
        );
        Ok(report)
    }

    async fn store_rules(
        &self,
        analysis: &ScriptAnalysis,
        content_type: &str,
        hash: &str,
        report: &mut LearnReport,
    ) -> Result<()> {
        for rule in &analysis.reusable_rules {
            if rule.rule.trim().is_empty() {
                continue;
            }
            let observation = RuleObservation {
                rule_text: rule.rule.clone(),
                why: rule.why.clone(),
                example: rule.example_from_script.clone(),
                content_type: content_type.to_string(),
                tags: analysis.tags.clone(),
                source_ref: hash.to_string(),
            };
            match self.store.upsert_rule(observation).await? {
                StoreWrite::Done(RuleUpsert::Created) => report.new_rules += 1,
                StoreWrite::Done(RuleUpsert::Merged { .. }) => report.updated_rules += 1,
                StoreWrite::Unavailable(reason) => {
                    report.warnings.push(reason);
                    continue;
                }
            }
            report.rules_processed += 1;
        }
        Ok(())
    }

    async fn store_logs(
        &self,
        analysis: &ScriptAnalysis,
        content_type: &str,
        hash: &str,
        snippet: &str,
        report: &mut LearnReport,
    ) -> Result<()> {
        let mut win = LogEvent::new(LogKind::Win, "learn_script");
        win.script_hash = Some(hash.to_string());
        win.content_type = Some(content_type.to_string());
        win.hook_text = Some(analysis.hook.text.clone()).filter(|h| !h.trim().is_empty());
        win.summary = analysis.summary();
        win.excerpt = Some(snippet.to_string());

        let mut failure = LogEvent::new(LogKind::Failure, "learn_script");
        failure.script_hash = Some(hash.to_string());
        failure.content_type = Some(content_type.to_string());
        failure.reasons = analysis.do_not_learn.clone();

        for event in [win, failure] {
            if let StoreWrite::Unavailable(reason) = self.store.append_log(event).await? {
                report.warnings.push(reason);
            }
        }
        Ok(())
    }
}
