//! Human-readable audit of what the store has learned.

use chrono::SecondsFormat;
use wayfarer_core::error::StoreError;
use wayfarer_core::{KnowledgeRule, LogEvent, LogKind, SkillStore, StoreCounts};

use crate::facade::{KnowledgeStore, StoreRead};

/// Hard cap on the rendered report, in characters.
pub const AUDIT_MAX_CHARS: usize = 3900;
const TRUNCATION_MARKER: &str = "\n…(truncated)";

/// Everything the report shows, fetched in one pass.
#[derive(Debug, Clone, Default)]
pub struct AuditData {
    pub counts: StoreCounts,
    pub top_types: Vec<(String, usize)>,
    pub top_rules: Vec<KnowledgeRule>,
    pub latest_wins: Vec<LogEvent>,
    pub latest_failures: Vec<LogEvent>,
}

impl AuditData {
    /// Fetch report data. `Ok(None)` when the store is unavailable.
    pub async fn collect(store: &dyn SkillStore) -> Result<Option<Self>, StoreError> {
        match Self::fetch(store).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_soft() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch(store: &dyn SkillStore) -> Result<Self, StoreError> {
        let mut top_types = store.rule_counts_by_type().await?;
        top_types.truncate(5);
        Ok(Self {
            counts: store.counts().await?,
            top_types,
            top_rules: store.top_rules(5).await?,
            latest_wins: store.recent_logs(LogKind::Win, 5).await?,
            latest_failures: store.recent_logs(LogKind::Failure, 3).await?,
        })
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            "Skill audit".to_string(),
            String::new(),
            format!("Total ingests: {}", self.counts.ingests),
            format!("Total unique rules: {}", self.counts.rules),
            String::new(),
            "Top content_type by rule count:".to_string(),
        ];
        section(&mut lines, &self.top_types, |(name, n)| {
            let name = if name.is_empty() { "unknown" } else { name.as_str() };
            format!("- {name}: {n}")
        });

        lines.extend([String::new(), "Top rules by seen_count:".to_string()]);
        section(&mut lines, &self.top_rules, |rule| {
            format!("- [{}] {}", rule.seen_count, short(&rule.rule_text, 80))
        });

        lines.extend([String::new(), "Latest 5 wins:".to_string()]);
        section(&mut lines, &self.latest_wins, |event| {
            let text = event
                .summary
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .or(event.hook_text.as_deref())
                .unwrap_or_default();
            format!("- {} | {}", timestamp(event), short(text, 100))
        });

        lines.extend([String::new(), "Latest 3 failures:".to_string()]);
        section(&mut lines, &self.latest_failures, |event| {
            let first = event.reasons.first().map(|r| short(r, 100)).unwrap_or_default();
            let first = if first.is_empty() { "(empty)".to_string() } else { first };
            format!("- {} | {first}", timestamp(event))
        });

        truncate(&lines.join("\n"), AUDIT_MAX_CHARS)
    }
}

/// Build the audit report. `Ok(None)` when the store is unavailable.
pub async fn audit_report(store: &dyn SkillStore) -> Result<Option<String>, StoreError> {
    Ok(AuditData::collect(store).await?.map(|data| data.render()))
}

impl KnowledgeStore {
    /// Audit report plus any recovery warnings raised while reading it.
    /// The value is `None` when the store is unavailable.
    pub async fn audit(&self) -> Result<StoreRead<Option<String>>, StoreError> {
        let report = audit_report(self.inner().as_ref()).await?;
        let warnings = self.take_warnings();
        Ok(StoreRead {
            value: report,
            warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
        })
    }
}

fn section<T>(lines: &mut Vec<String>, items: &[T], fmt: impl Fn(&T) -> String) {
    if items.is_empty() {
        lines.push("- (none)".to_string());
    } else {
        lines.extend(items.iter().map(fmt));
    }
}

fn timestamp(event: &LogEvent) -> String {
    event.created_at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Single line, at most `size` characters, with an ellipsis when cut.
pub fn short(text: &str, size: usize) -> String {
    let flat = text.trim().replace('\n', " ");
    if flat.chars().count() <= size {
        return flat;
    }
    let head: String = flat.chars().take(size.saturating_sub(1)).collect();
    format!("{}…", head.trim_end())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let head: String = text.chars().take(keep).collect();
    format!("{}{TRUNCATION_MARKER}", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileSkillStore, InMemorySkillStore, UnavailableStore};
    use wayfarer_core::RuleObservation;

    #[tokio::test]
    async fn empty_store_renders_none_sections() {
        let store = InMemorySkillStore::new();
        let report = audit_report(&store).await.unwrap().unwrap();
        assert!(report.starts_with("Skill audit\n\nTotal ingests: 0\nTotal unique rules: 0"));
        assert_eq!(report.matches("- (none)").count(), 4);
    }

    #[tokio::test]
    async fn corrupted_log_recovery_is_reported_with_the_audit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("failure_log.jsonl"), "{broken\n").unwrap();
        let store = KnowledgeStore::new(std::sync::Arc::new(FileSkillStore::new(dir.path()).unwrap()));

        let read = store.audit().await.unwrap();
        assert!(read.value.unwrap().contains("Latest 3 failures:"));
        assert!(read.warning.unwrap().contains("failure_log.jsonl"));

        let again = store.audit().await.unwrap();
        assert!(again.warning.is_none());
    }

    #[tokio::test]
    async fn unavailable_store_gives_none() {
        let store = UnavailableStore::new("offline");
        assert!(audit_report(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn populated_report_lists_rules_and_logs() {
        let store = InMemorySkillStore::new();
        for source in ["a", "b"] {
            store
                .upsert_rule(RuleObservation {
                    rule_text: "Open with the total cost".into(),
                    why: String::new(),
                    example: String::new(),
                    content_type: "cost_breakdown".into(),
                    tags: vec![],
                    source_ref: source.into(),
                })
                .await
                .unwrap();
        }
        let mut win = LogEvent::new(LogKind::Win, "test");
        win.hook_text = Some("吉隆坡机场RM30".into());
        store.append_log(win).await.unwrap();
        store.append_log(LogEvent::new(LogKind::Failure, "test")).await.unwrap();

        let report = audit_report(&store).await.unwrap().unwrap();
        assert!(report.contains("- cost_breakdown: 1"));
        assert!(report.contains("- [2] Open with the total cost"));
        assert!(report.contains("| 吉隆坡机场RM30"));
        assert!(report.contains("| (empty)"));
    }

    #[test]
    fn short_adds_ellipsis() {
        assert_eq!(short("abc", 80), "abc");
        assert_eq!(short("line\nbreak", 80), "line break");
        let cut = short(&"x".repeat(100), 80);
        assert_eq!(cut.chars().count(), 80);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn long_reports_are_truncated() {
        let text = "行".repeat(5000);
        let cut = truncate(&text, AUDIT_MAX_CHARS);
        assert_eq!(cut.chars().count(), AUDIT_MAX_CHARS);
        assert!(cut.ends_with("…(truncated)"));
        assert_eq!(truncate("short", AUDIT_MAX_CHARS), "short");
    }
}
