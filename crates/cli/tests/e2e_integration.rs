//! End-to-end integration tests for the Wayfarer pipeline.
//!
//! These tests drive the `Engine` the way the CLI does: a scripted provider
//! stands in for the model, and the knowledge store is a real file store in
//! a temporary directory.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use wayfarer_config::{AppConfig, StorageBackend};
use wayfarer_core::error::ProviderError;
use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use wayfarer_core::{ContentId, LogKind, RejectionReason};
use wayfarer_knowledge::{FileSkillStore, KnowledgeStore, rule_id};
use wayfarer_pipeline::{Choice, DraftError, Engine, PipelineError};
use wayfarer_screening::HookValidator;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<String>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        if requests.len() >= responses.len() {
            panic!(
                "ScriptedProvider exhausted: call #{}, have {}",
                requests.len(),
                responses.len()
            );
        }
        let content = responses[requests.len()].clone();
        requests.push(request);
        Ok(ProviderResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
        })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::File;
    config.storage.data_dir = Some(dir.join("data"));
    config.skills.dir = Some(dir.join("skills"));
    config
}

fn file_store(config: &AppConfig) -> KnowledgeStore {
    KnowledgeStore::new(Arc::new(FileSkillStore::new(config.data_dir()).unwrap()))
}

fn engine(dir: &Path, provider: Arc<ScriptedProvider>) -> Engine {
    let config = config(dir);
    let store = file_store(&config);
    Engine::new(&config, provider, store)
}

fn item(bucket: &str, title: &str, angle: &str, audience: &str) -> serde_json::Value {
    json!({
        "bucket": bucket,
        "title": title,
        "angle": angle,
        "target_audience": audience,
        "cta": "收藏备用"
    })
}

fn batch(items: Vec<serde_json::Value>) -> String {
    json!({ "items": items }).to_string()
}

/// Items 1–2 are valid hooks; item 3 outscores both but is too long.
fn hook_batch_with_long_leader() -> String {
    batch(vec![
        item("growth", "吉隆坡机场省钱", "交通", "第一次去的人"),
        item("growth", "槟城酒店真相", "避坑", "情侣"),
        item("trust", "吉隆坡机场RM30交通避坑清单攻略", "KLIA到市区步骤清单", "第一次去吉隆坡的上班族"),
        item("trust", "周末", "随便", "所有人"),
        item("conversion", "日记", "随便", "所有人"),
        item("conversion", "照片", "随便", "所有人"),
    ])
}

/// Same batch with the long leader replaced by a low scorer.
fn hook_batch_clean() -> String {
    batch(vec![
        item("growth", "吉隆坡机场省钱", "交通", "第一次去的人"),
        item("growth", "槟城酒店真相", "避坑", "情侣"),
        item("trust", "看看", "随便", "所有人"),
        item("trust", "周末", "随便", "所有人"),
        item("conversion", "日记", "随便", "所有人"),
        item("conversion", "照片", "随便", "所有人"),
    ])
}

fn title_batch() -> String {
    batch(vec![
        item("trust", "吉隆坡机场RM30交通避坑", "KLIA到市区省钱对比", "第一次去吉隆坡的上班族"),
        item("growth", "槟城3天预算RM500别踩雷", "预算拆解清单", "预算有限的学生党"),
        item("growth", "周末去哪玩", "随便逛逛", "所有人"),
        item("conversion", "旅行日记", "心情记录", "朋友们"),
        item("conversion", "美美的照片", "氛围感", "大家"),
        item("trust", "出发前看看", "一些想法", "路人"),
    ])
}

fn analysis(rules: &[&str]) -> String {
    json!({
        "platform": "xhs",
        "content_type": "cost_breakdown",
        "hook": { "text": "RM300玩3天", "type": ["number"] },
        "target_audience": ["学生党"],
        "decision_tension": ["住哪里"],
        "structure_steps": [{ "step": 1, "what": "总价" }],
        "save_worthy_lines": ["Grab 晚上10点后更便宜"],
        "cta": { "type": ["save"], "text": "收藏备用" },
        "reusable_rules": rules.iter().map(|r| json!({
            "rule": r, "why": "numbers stop the scroll", "example_from_script": "RM300"
        })).collect::<Vec<_>>(),
        "do_not_learn": ["夸张表情包"],
        "tags": ["budget"]
    })
    .to_string()
}

const NOTE: &str = "Hook\n机场省钱真相\n✍️ CAPTION\n正文";

// ── E2E: Hook-validated generation ───────────────────────────────────────

#[tokio::test]
async fn e2e_hook_validator_retries_when_top2_has_invalid_hook() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new([
        hook_batch_with_long_leader(),
        hook_batch_clean(),
    ]));
    let engine = engine(tmp.path(), provider.clone())
        .with_top_validator(Arc::new(HookValidator::default()));

    let report = engine.run_generation_cycle().await.unwrap();
    let draft = report.draft;

    // The first attempt ranked the long title first, regardless of validity.
    assert_eq!(draft.attempts, 2);
    assert!(!draft.used_fallback);
    assert_eq!(provider.calls(), 2);
    assert_eq!(draft.rejections.len(), 1);
    let rejection = &draft.rejections[0];
    assert_eq!(rejection.attempt, 1);
    assert_eq!(rejection.index, Some(2));
    assert_eq!(rejection.reason, RejectionReason::LengthOutOfRange);

    // The retry kept the two valid hooks, best first.
    let titles: Vec<&str> = draft.top.iter().map(|t| t.candidate.title.as_str()).collect();
    assert_eq!(titles, vec!["吉隆坡机场省钱", "槟城酒店真相"]);
    assert!(draft.top[0].score.total >= draft.top[1].score.total);

    // The rejection reached the failure log before the retry prompt was sent.
    let failures = engine.store().recent_logs(LogKind::Failure, 10).await.unwrap().value;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reasons, vec!["length_out_of_range".to_string()]);
    let retry = provider.request(1);
    assert!(retry.messages.last().unwrap().content.contains("length_out_of_range"));
}

// ── E2E: Script learning dedup ───────────────────────────────────────────

#[tokio::test]
async fn e2e_same_script_twice_keeps_one_ingest_and_merges_rules() {
    let tmp = tempfile::tempdir().unwrap();
    let rules = ["Lead with the total budget", "Name the cheapest transfer"];
    let provider = Arc::new(ScriptedProvider::new([analysis(&rules), analysis(&rules)]));
    let engine = engine(tmp.path(), provider);
    let script = "RM300玩3天槟城\n住宿RM120，交通RM60，吃RM120";

    let first = engine
        .ingest_learned_script(script, BTreeMap::from([("platform".into(), "xhs".into())]))
        .await
        .unwrap();
    assert!(first.stored);
    assert!(!first.repeat_ingest);
    assert_eq!(first.new_rules, 2);

    let second = engine
        .ingest_learned_script(
            &format!("  {script}\n"),
            BTreeMap::from([("platform".into(), "tiktok".into()), ("performance".into(), "10w".into())]),
        )
        .await
        .unwrap();
    assert_eq!(second.script_hash, first.script_hash);
    assert!(second.repeat_ingest);
    assert_eq!(second.rules_processed, 2);
    assert_eq!(second.new_rules, 0);
    assert_eq!(second.updated_rules, 2);

    let counts = engine.store().counts().await.unwrap().value;
    assert_eq!(counts.ingests, 1);
    assert_eq!(counts.rules, 2);

    let rule = engine
        .store()
        .get_rule(&rule_id(rules[0]))
        .await
        .unwrap()
        .value
        .unwrap();
    assert_eq!(rule.seen_count, 2);

    let hooks = std::fs::read_to_string(tmp.path().join("skills/hooks.md")).unwrap();
    let entry = format!("script_hash: {}", first.script_hash);
    assert_eq!(hooks.matches(entry.as_str()).count(), 2);
}

// ── E2E: Corrupted storage ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_corrupted_win_log_is_backed_up_and_context_still_builds() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("win_log.jsonl"), "{not json\n").unwrap();

    let engine = engine(tmp.path(), Arc::new(ScriptedProvider::new(Vec::<String>::new())));
    let read = engine.skill_context().await.unwrap();

    assert!(read.warning.is_some());
    assert!(read.value.memory_section().contains("No recorded wins yet"));

    let backups: Vec<_> = std::fs::read_dir(&data)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("win_log.jsonl.corrupt-"))
        .collect();
    assert_eq!(backups.len(), 1);

    // Reads after the reset are clean.
    let wins = engine.store().recent_logs(LogKind::Win, 5).await.unwrap();
    assert!(wins.value.is_empty());
    assert!(wins.warning.is_none());
}

#[tokio::test]
async fn e2e_audit_reports_recovered_corruption() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("failure_log.jsonl"), "not json at all\n").unwrap();

    let engine = engine(tmp.path(), Arc::new(ScriptedProvider::new(Vec::<String>::new())));
    let read = engine.audit().await.unwrap();

    assert!(read.value.unwrap().starts_with("Skill audit"));
    let warning = read.warning.unwrap();
    assert!(warning.contains("failure_log.jsonl"));
    assert!(warning.contains("backed up"));
}

// ── E2E: Draft registry across restarts ──────────────────────────────────

#[tokio::test]
async fn e2e_draft_survives_restart_or_is_reported_lost() {
    let tmp = tempfile::tempdir().unwrap();
    let first = engine(tmp.path(), Arc::new(ScriptedProvider::new([title_batch()])));
    let draft = first.run_generation_cycle().await.unwrap().draft;
    let snapshot = first.snapshot_registry().await.unwrap();

    // Restarted with the snapshot: same draft, approvable.
    let restored = engine(tmp.path(), Arc::new(ScriptedProvider::new([NOTE])));
    assert_eq!(restored.restore_registry(&snapshot).await.unwrap().restored, 1);
    assert_eq!(restored.draft(&draft.content_id).await.unwrap(), draft);
    let report = restored.approve(&draft.content_id, Choice::First).await.unwrap();
    assert_eq!(report.notes.len(), 1);
    assert_eq!(report.used_today, 1);

    // Restarted without it: the caller is told, nothing is substituted.
    let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
    let fresh = engine(tmp.path(), provider.clone());
    let err = fresh.approve(&draft.content_id, Choice::First).await.unwrap_err();
    assert!(matches!(err, PipelineError::Draft(DraftError::Lost(id)) if id == draft.content_id));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn e2e_restore_never_replaces_a_different_draft() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(tmp.path(), Arc::new(ScriptedProvider::new([title_batch()])));
    let draft = engine.run_generation_cycle().await.unwrap().draft;

    let mut snapshot: serde_json::Value =
        serde_json::from_str(&engine.snapshot_registry().await.unwrap()).unwrap();
    snapshot["drafts"][0]["top"][0]["candidate"]["title"] = json!("a different title");

    let report = engine.restore_registry(&snapshot.to_string()).await.unwrap();
    assert_eq!(report.conflicts, vec![draft.content_id.clone()]);
    assert_eq!(engine.draft(&draft.content_id).await.unwrap(), draft);
}

#[tokio::test]
async fn e2e_unknown_draft_id_is_lost() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(tmp.path(), Arc::new(ScriptedProvider::new(Vec::<String>::new())));
    let err = engine
        .regenerate(&ContentId::from("20260301-0900-ZZZZ"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Draft(DraftError::Lost(_))));
}

// ── E2E: Manual wins ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_manual_win_with_invalid_hook_records_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(tmp.path(), Arc::new(ScriptedProvider::new(Vec::<String>::new())));

    let outcome = engine.record_manual_win("/win 周末去哪玩\n随便写写").await.unwrap();
    assert!(!outcome.accepted);
    assert_eq!(outcome.message, "length_out_of_range");

    let store = engine.store();
    let failures = store.recent_logs(LogKind::Failure, 5).await.unwrap().value;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].hook_text.as_deref(), Some("周末去哪玩"));
    assert!(store.recent_logs(LogKind::Win, 5).await.unwrap().value.is_empty());

    let accepted = engine
        .record_manual_win("/win 吉隆坡机场RM30交通避坑\n正文")
        .await
        .unwrap();
    assert!(accepted.accepted);
    let audit = engine.audit().await.unwrap().value.unwrap();
    assert!(audit.contains("吉隆坡机场RM30交通避坑"));
}

#[tokio::test]
async fn e2e_wins_feed_the_next_prompt() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::new([title_batch()]));
    let engine = engine(tmp.path(), provider.clone());

    engine
        .record_manual_win("/win 吉隆坡机场RM30交通避坑\n机场快线RM55，巴士RM15")
        .await
        .unwrap();
    engine.run_generation_cycle().await.unwrap();

    let prompt = &provider.request(0).messages[1].content;
    assert!(prompt.contains("recent_wins.md"));
    assert!(prompt.contains("吉隆坡"));
}
