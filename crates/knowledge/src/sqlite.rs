//! SQLite skill store.
//!
//! Three tables:
//! - `ingests` — one row per script hash, refreshed in place
//! - `rules` — one row per rule id, with a `version` column
//! - `logs` — append-only win/failure events
//!
//! Rule merges are optimistic: read the row, merge in memory, then
//! `UPDATE … WHERE version = ?`. A lost race re-reads and tries again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use wayfarer_core::error::StoreError;
use wayfarer_core::{
    IngestRecord, IngestUpsert, KnowledgeRule, LogEvent, LogKind, RuleObservation, RuleUpsert,
    SkillStore, StoreCounts,
};

use crate::hash::rule_id;

/// Upper bound on optimistic attempts for a single rule upsert.
///
/// A lost race means another writer committed, so plain contention always
/// makes progress well inside this bound. The cap only trips when the row
/// cannot be updated at all (a trigger or an outside writer pinning the
/// `version` column); that surfaces as `StoreError::Conflict` instead of an
/// unbounded loop.
const MAX_RULE_ATTEMPTS: usize = 64;

pub struct SqliteSkillStore {
    pool: SqlitePool,
}

impl SqliteSkillStore {
    /// Open a database from a path or `sqlite:` URL; tables are created
    /// automatically.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite skill store initialized");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            (
                "ingests table",
                r#"
                CREATE TABLE IF NOT EXISTS ingests (
                    script_hash   TEXT PRIMARY KEY,
                    metadata      TEXT NOT NULL DEFAULT '{}',
                    analysis      TEXT NOT NULL,
                    excerpt       TEXT NOT NULL DEFAULT '',
                    first_seen_at TEXT NOT NULL,
                    last_seen_at  TEXT NOT NULL,
                    ingest_count  INTEGER NOT NULL DEFAULT 1
                )
                "#,
            ),
            (
                "rules table",
                r#"
                CREATE TABLE IF NOT EXISTS rules (
                    id            TEXT PRIMARY KEY,
                    rule_text     TEXT NOT NULL,
                    why           TEXT NOT NULL DEFAULT '',
                    example       TEXT NOT NULL DEFAULT '',
                    content_type  TEXT NOT NULL,
                    tags          TEXT NOT NULL DEFAULT '[]',
                    first_seen_at TEXT NOT NULL,
                    last_seen_at  TEXT NOT NULL,
                    seen_count    INTEGER NOT NULL DEFAULT 1,
                    sources       TEXT NOT NULL DEFAULT '[]',
                    version       INTEGER NOT NULL DEFAULT 1
                )
                "#,
            ),
            (
                "logs table",
                r#"
                CREATE TABLE IF NOT EXISTS logs (
                    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                    id         TEXT UNIQUE NOT NULL,
                    kind       TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    payload    TEXT NOT NULL
                )
                "#,
            ),
            (
                "rules ranking index",
                "CREATE INDEX IF NOT EXISTS idx_rules_seen ON rules(seen_count DESC, last_seen_at DESC)",
            ),
            (
                "rules type index",
                "CREATE INDEX IF NOT EXISTS idx_rules_type ON rules(content_type)",
            ),
            (
                "logs kind index",
                "CREATE INDEX IF NOT EXISTS idx_logs_kind ON logs(kind, seq DESC)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
    }

    fn json_column<T: serde::de::DeserializeOwned>(row: &SqliteRow, name: &str) -> Result<T, StoreError> {
        let raw: String = Self::column(row, name)?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Malformed(format!("{name}: {e}")))
    }

    fn time_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, StoreError> {
        let raw: String = Self::column(row, name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Malformed(format!("{name}: {e}")))
    }

    fn row_to_rule(row: &SqliteRow) -> Result<KnowledgeRule, StoreError> {
        let seen_count: i64 = Self::column(row, "seen_count")?;
        let version: i64 = Self::column(row, "version")?;
        Ok(KnowledgeRule {
            id: Self::column(row, "id")?,
            rule_text: Self::column(row, "rule_text")?,
            why: Self::column(row, "why")?,
            example: Self::column(row, "example")?,
            content_type: Self::column(row, "content_type")?,
            tags: Self::json_column(row, "tags")?,
            first_seen_at: Self::time_column(row, "first_seen_at")?,
            last_seen_at: Self::time_column(row, "last_seen_at")?,
            seen_count: seen_count.max(0) as u64,
            sources: Self::json_column(row, "sources")?,
            version: version.max(0) as u64,
        })
    }

    fn row_to_ingest(row: &SqliteRow) -> Result<IngestRecord, StoreError> {
        let ingest_count: i64 = Self::column(row, "ingest_count")?;
        Ok(IngestRecord {
            script_hash: Self::column(row, "script_hash")?,
            metadata: Self::json_column(row, "metadata")?,
            analysis: Self::json_column(row, "analysis")?,
            excerpt: Self::column(row, "excerpt")?,
            first_seen_at: Self::time_column(row, "first_seen_at")?,
            last_seen_at: Self::time_column(row, "last_seen_at")?,
            ingest_count: ingest_count.max(0) as u64,
        })
    }

    fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|e| StoreError::Storage(format!("{what}: {e}")))
    }

    /// Insert a brand-new rule; `false` if another writer got there first.
    async fn try_insert_rule(&self, rule: &KnowledgeRule) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO rules (id, rule_text, why, example, content_type, tags,
                               first_seen_at, last_seen_at, seen_count, sources, version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.rule_text)
        .bind(&rule.why)
        .bind(&rule.example)
        .bind(&rule.content_type)
        .bind(Self::to_json(&rule.tags, "tags")?)
        .bind(rule.first_seen_at.to_rfc3339())
        .bind(rule.last_seen_at.to_rfc3339())
        .bind(rule.seen_count as i64)
        .bind(Self::to_json(&rule.sources, "sources")?)
        .bind(rule.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT rule failed: {e}")))?;
        Ok(result.rows_affected() == 1)
    }

    /// Write a merged rule only if nobody bumped the version meanwhile.
    async fn try_update_rule(&self, rule: &KnowledgeRule, expected: u64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE rules SET
                why = ?2, example = ?3, tags = ?4, last_seen_at = ?5,
                seen_count = ?6, sources = ?7, version = ?8
            WHERE id = ?1 AND version = ?9
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.why)
        .bind(&rule.example)
        .bind(Self::to_json(&rule.tags, "tags")?)
        .bind(rule.last_seen_at.to_rfc3339())
        .bind(rule.seen_count as i64)
        .bind(Self::to_json(&rule.sources, "sources")?)
        .bind(rule.version as i64)
        .bind(expected as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE rule failed: {e}")))?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl SkillStore for SqliteSkillStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert_ingest(&self, record: IngestRecord) -> Result<IngestUpsert, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO ingests (script_hash, metadata, analysis, excerpt,
                                 first_seen_at, last_seen_at, ingest_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
            ON CONFLICT(script_hash) DO UPDATE SET
                metadata = excluded.metadata,
                analysis = excluded.analysis,
                last_seen_at = max(ingests.last_seen_at, excluded.last_seen_at),
                ingest_count = ingests.ingest_count + 1
            RETURNING ingest_count
            "#,
        )
        .bind(&record.script_hash)
        .bind(Self::to_json(&record.metadata, "metadata")?)
        .bind(Self::to_json(&record.analysis, "analysis")?)
        .bind(&record.excerpt)
        .bind(record.first_seen_at.to_rfc3339())
        .bind(record.last_seen_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT ingest failed: {e}")))?;

        let count: i64 = Self::column(&row, "ingest_count")?;
        Ok(if count <= 1 {
            IngestUpsert::Created
        } else {
            IngestUpsert::Refreshed
        })
    }

    async fn upsert_rule(&self, observation: RuleObservation) -> Result<RuleUpsert, StoreError> {
        let id = rule_id(&observation.rule_text);

        for attempt in 1..=MAX_RULE_ATTEMPTS {
            let now = Utc::now();
            match self.get_rule(&id).await? {
                None => {
                    let rule = KnowledgeRule::from_observation(id.clone(), &observation, now);
                    if self.try_insert_rule(&rule).await? {
                        return Ok(RuleUpsert::Created);
                    }
                }
                Some(mut rule) => {
                    let expected = rule.version;
                    rule.absorb(&observation, now);
                    if self.try_update_rule(&rule, expected).await? {
                        return Ok(RuleUpsert::Merged {
                            seen_count: rule.seen_count,
                        });
                    }
                }
            }
            debug!(rule_id = %id, attempt, "Rule upsert lost a race, retrying");
        }

        warn!(rule_id = %id, "Rule upsert gave up after {MAX_RULE_ATTEMPTS} attempts");
        Err(StoreError::Conflict(id))
    }

    async fn append_log(&self, event: LogEvent) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO logs (id, kind, created_at, payload) VALUES (?1, ?2, ?3, ?4)")
            .bind(&event.id)
            .bind(event.kind.as_str())
            .bind(event.created_at.to_rfc3339())
            .bind(Self::to_json(&event, "event")?)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT log failed: {e}")))?;
        Ok(())
    }

    async fn recent_logs(&self, kind: LogKind, limit: usize) -> Result<Vec<LogEvent>, StoreError> {
        let rows = sqlx::query("SELECT payload FROM logs WHERE kind = ?1 ORDER BY seq DESC LIMIT ?2")
            .bind(kind.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("recent logs: {e}")))?;
        rows.iter().map(|row| Self::json_column(row, "payload")).collect()
    }

    async fn top_rules(&self, limit: usize) -> Result<Vec<KnowledgeRule>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM rules ORDER BY seen_count DESC, last_seen_at DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("top rules: {e}")))?;
        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn get_rule(&self, id: &str) -> Result<Option<KnowledgeRule>, StoreError> {
        let row = sqlx::query("SELECT * FROM rules WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get rule: {e}")))?;
        row.as_ref().map(Self::row_to_rule).transpose()
    }

    async fn get_ingest(&self, script_hash: &str) -> Result<Option<IngestRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM ingests WHERE script_hash = ?1")
            .bind(script_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get ingest: {e}")))?;
        row.as_ref().map(Self::row_to_ingest).transpose()
    }

    async fn rule_counts_by_type(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT content_type, COUNT(*) AS n FROM rules
            GROUP BY content_type
            ORDER BY n DESC, content_type ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("rule counts: {e}")))?;

        rows.iter()
            .map(|row| {
                let name: String = Self::column(row, "content_type")?;
                let n: i64 = Self::column(row, "n")?;
                Ok((name, n.max(0) as usize))
            })
            .collect()
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM ingests) AS ingests,
                (SELECT COUNT(*) FROM rules) AS rules,
                (SELECT COUNT(*) FROM logs WHERE kind = 'win') AS wins,
                (SELECT COUNT(*) FROM logs WHERE kind = 'failure') AS failures
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("counts: {e}")))?;

        let get = |name: &str| -> Result<usize, StoreError> {
            let n: i64 = Self::column(&row, name)?;
            Ok(n.max(0) as usize)
        };
        Ok(StoreCounts {
            ingests: get("ingests")?,
            rules: get("rules")?,
            wins: get("wins")?,
            failures: get("failures")?,
        })
    }
}
