//! File-backed skill store — JSON snapshot plus JSON-lines logs.
//!
//! Layout under the data directory:
//! - `knowledge.json` — rules and ingests as one [`KnowledgeSnapshot`]
//! - `win_log.jsonl`, `failure_log.jsonl` — one [`LogEvent`] per line
//! - `.knowledge.lock` — exclusive OS lock held for every operation
//!
//! Every operation re-reads the files while holding the lock, so several
//! processes can share one directory without losing updates. A file that
//! cannot be parsed is renamed to `<name>.corrupt-<YYYYMMDDTHHMMSSZ>`, the
//! store continues from an empty default, and a warning is queued for
//! [`SkillStore::take_warnings`].

use async_trait::async_trait;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use wayfarer_core::error::StoreError;
use wayfarer_core::{
    IngestRecord, IngestUpsert, KnowledgeRule, LogEvent, LogKind, RuleObservation, RuleUpsert,
    SkillStore, StoreCounts,
};

use crate::snapshot::{newest_first, KnowledgeSnapshot};

const SNAPSHOT_FILE: &str = "knowledge.json";
const WIN_LOG_FILE: &str = "win_log.jsonl";
const FAILURE_LOG_FILE: &str = "failure_log.jsonl";
const LOCK_FILE: &str = ".knowledge.lock";

fn log_file(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Win => WIN_LOG_FILE,
        LogKind::Failure => FAILURE_LOG_FILE,
    }
}

/// A directory-backed [`SkillStore`].
///
/// Within one process operations are serialized by an async mutex; across
/// processes by an exclusive lock on `.knowledge.lock`.
pub struct FileSkillStore {
    dir: PathBuf,
    gate: Arc<Mutex<()>>,
    warnings: Arc<std::sync::Mutex<Vec<String>>>,
}

impl FileSkillStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", dir.display())))?;
        debug!(path = %dir.display(), "File skill store opened");
        Ok(Self {
            dir,
            gate: Arc::new(Mutex::new(())),
            warnings: Arc::new(std::sync::Mutex::new(Vec::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `op` on a blocking thread while holding both locks.
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Files) -> Result<T, StoreError> + Send + 'static,
    {
        let _gate = self.gate.lock().await;
        let mut files = Files {
            dir: self.dir.clone(),
            warnings: Vec::new(),
        };
        let (result, warnings) = tokio::task::spawn_blocking(move || {
            let result = files.locked(op);
            (result, files.warnings)
        })
        .await
        .map_err(|e| StoreError::Storage(format!("store task failed: {e}")))?;

        if !warnings.is_empty() {
            self.warnings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(warnings);
        }
        result
    }
}

/// Exclusive lock on an open file, released on drop.
struct FileLock(File);

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        file.lock()
            .map_err(|e| StoreError::Storage(format!("lock {}: {e}", path.display())))?;
        Ok(Self(file))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            warn!(error = %e, "Failed to release store lock");
        }
    }
}

/// Synchronous file operations; only used while the lock is held.
struct Files {
    dir: PathBuf,
    warnings: Vec<String>,
}

impl Files {
    fn locked<T>(
        &mut self,
        op: impl FnOnce(&mut Files) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = FileLock::acquire(&self.dir.join(LOCK_FILE))?;
        op(self)
    }

    fn read_optional(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    fn read_snapshot(&mut self) -> Result<KnowledgeSnapshot, StoreError> {
        let Some(content) = self.read_optional(SNAPSHOT_FILE)? else {
            return Ok(KnowledgeSnapshot::default());
        };
        if content.trim().is_empty() {
            return Ok(KnowledgeSnapshot::default());
        }
        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.quarantine(SNAPSHOT_FILE, &e.to_string())?;
                Ok(KnowledgeSnapshot::default())
            }
        }
    }

    /// Write to a sibling temp file, fsync, then rename over the original.
    fn write_snapshot(&self, snapshot: &KnowledgeSnapshot) -> Result<(), StoreError> {
        let path = self.dir.join(SNAPSHOT_FILE);
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::Storage(format!("serialize snapshot: {e}")))?;

        let mut file = File::create(&tmp)
            .map_err(|e| StoreError::Storage(format!("create {}: {e}", tmp.display())))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::Storage(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| StoreError::Storage(format!("rename to {}: {e}", path.display())))
    }

    fn read_log(&mut self, kind: LogKind) -> Result<Vec<LogEvent>, StoreError> {
        let name = log_file(kind);
        let Some(content) = self.read_optional(name)? else {
            return Ok(Vec::new());
        };
        let parsed: Result<Vec<LogEvent>, _> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<LogEvent>)
            .collect();
        match parsed {
            Ok(events) => Ok(events),
            Err(e) => {
                self.quarantine(name, &e.to_string())?;
                Ok(Vec::new())
            }
        }
    }

    fn append_log(&mut self, event: &LogEvent) -> Result<(), StoreError> {
        // Recover a corrupted log before writing behind its bad lines.
        self.read_log(event.kind)?;

        let path = self.dir.join(log_file(event.kind));
        let line = serde_json::to_string(event)
            .map_err(|e| StoreError::Storage(format!("serialize event: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::Storage(format!("open {}: {e}", path.display())))?;
        writeln!(file, "{line}")
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|e| StoreError::Storage(format!("append {}: {e}", path.display())))
    }

    /// Move a corrupted file aside and record a warning.
    fn quarantine(&mut self, name: &str, reason: &str) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let mut backup = self.dir.join(format!("{name}.corrupt-{stamp}"));
        let mut n = 1;
        while backup.exists() {
            backup = self.dir.join(format!("{name}.corrupt-{stamp}-{n}"));
            n += 1;
        }
        std::fs::rename(&path, &backup)
            .map_err(|e| StoreError::Storage(format!("backup {}: {e}", path.display())))?;

        let corrupted = StoreError::Corrupted {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };
        warn!(backup = %backup.display(), error = %corrupted, "Reset corrupted store file");
        self.warnings.push(format!(
            "{corrupted}; backed up to {} and reset",
            backup.display()
        ));
        Ok(())
    }
}

#[async_trait]
impl SkillStore for FileSkillStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn upsert_ingest(&self, record: IngestRecord) -> Result<IngestUpsert, StoreError> {
        self.run(move |files| {
            let mut snapshot = files.read_snapshot()?;
            let outcome = snapshot.upsert_ingest(record);
            files.write_snapshot(&snapshot)?;
            Ok(outcome)
        })
        .await
    }

    async fn upsert_rule(&self, observation: RuleObservation) -> Result<RuleUpsert, StoreError> {
        self.run(move |files| {
            let mut snapshot = files.read_snapshot()?;
            let outcome = snapshot.upsert_rule(&observation, Utc::now());
            files.write_snapshot(&snapshot)?;
            Ok(outcome)
        })
        .await
    }

    async fn append_log(&self, event: LogEvent) -> Result<(), StoreError> {
        self.run(move |files| files.append_log(&event)).await
    }

    async fn recent_logs(&self, kind: LogKind, limit: usize) -> Result<Vec<LogEvent>, StoreError> {
        self.run(move |files| Ok(newest_first(&files.read_log(kind)?, limit)))
            .await
    }

    async fn top_rules(&self, limit: usize) -> Result<Vec<KnowledgeRule>, StoreError> {
        self.run(move |files| Ok(files.read_snapshot()?.top_rules(limit)))
            .await
    }

    async fn get_rule(&self, id: &str) -> Result<Option<KnowledgeRule>, StoreError> {
        let id = id.to_string();
        self.run(move |files| Ok(files.read_snapshot()?.rules.remove(&id)))
            .await
    }

    async fn get_ingest(&self, script_hash: &str) -> Result<Option<IngestRecord>, StoreError> {
        let hash = script_hash.to_string();
        self.run(move |files| Ok(files.read_snapshot()?.ingests.remove(&hash)))
            .await
    }

    async fn rule_counts_by_type(&self) -> Result<Vec<(String, usize)>, StoreError> {
        self.run(|files| Ok(files.read_snapshot()?.rule_counts_by_type()))
            .await
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.run(|files| {
            let snapshot = files.read_snapshot()?;
            Ok(StoreCounts {
                ingests: snapshot.ingests.len(),
                rules: snapshot.rules.len(),
                wins: files.read_log(LogKind::Win)?.len(),
                failures: files.read_log(LogKind::Failure)?.len(),
            })
        })
        .await
    }

    fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::rule_id;
    use std::collections::BTreeMap;

    fn obs(text: &str, source: &str) -> RuleObservation {
        RuleObservation {
            rule_text: text.into(),
            why: "numbers stop the scroll".into(),
            example: "RM350 / 3 days".into(),
            content_type: "cost_breakdown".into(),
            tags: vec!["budget".into()],
            source_ref: source.into(),
        }
    }

    fn ingest(hash: &str, platform: &str) -> IngestRecord {
        let now = Utc::now();
        IngestRecord {
            script_hash: hash.into(),
            metadata: BTreeMap::from([("platform".to_string(), platform.to_string())]),
            analysis: serde_json::json!({"content_type": "cost_breakdown"}),
            excerpt: "excerpt".into(),
            first_seen_at: now,
            last_seen_at: now,
            ingest_count: 1,
        }
    }

    fn backups(dir: &Path, prefix: &str) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
            })
            .collect()
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = FileSkillStore::new(tmp.path()).unwrap();
            store.upsert_rule(obs("Lead with the price", "h1")).await.unwrap();
            store.upsert_ingest(ingest("h1", "xhs")).await.unwrap();
            let mut event = LogEvent::new(LogKind::Win, "test");
            event.hook_text = Some("hook".into());
            store.append_log(event).await.unwrap();
        }

        let store = FileSkillStore::new(tmp.path()).unwrap();
        let counts = store.counts().await.unwrap();
        assert_eq!(counts.rules, 1);
        assert_eq!(counts.ingests, 1);
        assert_eq!(counts.wins, 1);
        assert!(store.take_warnings().is_empty());
    }

    #[tokio::test]
    async fn ingest_upsert_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSkillStore::new(tmp.path()).unwrap();
        assert_eq!(
            store.upsert_ingest(ingest("h1", "xhs")).await.unwrap(),
            IngestUpsert::Created
        );
        assert_eq!(
            store.upsert_ingest(ingest("h1", "tiktok")).await.unwrap(),
            IngestUpsert::Refreshed
        );
        let record = store.get_ingest("h1").await.unwrap().unwrap();
        assert_eq!(record.ingest_count, 2);
        assert_eq!(record.metadata["platform"], "tiktok");
        assert_eq!(store.counts().await.unwrap().ingests, 1);
    }

    #[tokio::test]
    async fn rule_merges_keep_one_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSkillStore::new(tmp.path()).unwrap();
        store.upsert_rule(obs("Lead with the price", "h1")).await.unwrap();
        let outcome = store.upsert_rule(obs("Lead with the price", "h2")).await.unwrap();
        assert_eq!(outcome, RuleUpsert::Merged { seen_count: 2 });

        let rule = store.get_rule(&rule_id("lead with the price")).await.unwrap().unwrap();
        assert_eq!(rule.sources, vec!["h1".to_string(), "h2".to_string()]);
        assert_eq!(rule.version, 2);
    }

    #[tokio::test]
    async fn corrupted_snapshot_is_backed_up_and_reset() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(SNAPSHOT_FILE), "{ not json").unwrap();

        let store = FileSkillStore::new(tmp.path()).unwrap();
        let rules = store.top_rules(5).await.unwrap();
        assert!(rules.is_empty());

        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("knowledge.json"));
        assert_eq!(backups(tmp.path(), "knowledge.json.corrupt-").len(), 1);

        // Second read sees a clean slate, no new backup.
        store.top_rules(5).await.unwrap();
        assert!(store.take_warnings().is_empty());
        assert_eq!(backups(tmp.path(), "knowledge.json.corrupt-").len(), 1);
    }

    #[tokio::test]
    async fn corrupted_win_log_reads_empty_with_warning() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(WIN_LOG_FILE), "{\"id\":\"x\"}\ngarbage\n").unwrap();

        let store = FileSkillStore::new(tmp.path()).unwrap();
        let wins = store.recent_logs(LogKind::Win, 5).await.unwrap();
        assert!(wins.is_empty());
        assert_eq!(store.take_warnings().len(), 1);
        assert_eq!(backups(tmp.path(), "win_log.jsonl.corrupt-").len(), 1);

        store.append_log(LogEvent::new(LogKind::Win, "test")).await.unwrap();
        assert_eq!(store.recent_logs(LogKind::Win, 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_rule_upserts_all_land() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSkillStore::new(tmp.path()).unwrap());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.upsert_rule(obs("Show the receipt", &format!("h{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // A second handle on the same directory sees every merge.
        let other = FileSkillStore::new(tmp.path()).unwrap();
        let rule = other.get_rule(&rule_id("show the receipt")).await.unwrap().unwrap();
        assert_eq!(rule.seen_count, 8);
    }
}
