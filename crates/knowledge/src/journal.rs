//! Markdown skill journal.
//!
//! Human-readable companion to the structured store: every learned script
//! is appended to `hooks.md`, its content-type file and `win_log.md`, and
//! its do-not-learn list to `failure_log.md`. These files are also what the
//! skill-context assembler loads into prompts.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use wayfarer_core::error::StoreError;

/// Every file the journal maintains, in creation order.
pub const SKILL_FILES: &[&str] = &[
    "hooks.md",
    "cost_breakdown.md",
    "avoid_pitfalls.md",
    "local_weekend.md",
    "booking_strategy.md",
    "tools.md",
    "misc.md",
    "win_log.md",
    "failure_log.md",
];

const WHY_IT_WORKED: &str = "The script pairs a concrete hook with decision-useful details \
and a clear CTA, making it save-worthy and easy to act on.";

/// Journal file for a content type; unknown types go to `misc.md`.
pub fn file_for_content_type(content_type: &str) -> &'static str {
    match content_type {
        "cost_breakdown" => "cost_breakdown.md",
        "avoid_pitfalls" => "avoid_pitfalls.md",
        "local_weekend" => "local_weekend.md",
        "booking_strategy" => "booking_strategy.md",
        "tools" => "tools.md",
        _ => "misc.md",
    }
}

/// `hidden_tips.md` → `Hidden Tips`
fn title_for(file_name: &str) -> String {
    file_name
        .trim_end_matches(".md")
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One reusable rule as it appears in the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalRule {
    pub rule: String,
    pub why: String,
    pub example: String,
}

/// Everything written for one learned script.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
    pub platform: String,
    pub content_type: String,
    pub hook_text: String,
    pub hook_types: Vec<String>,
    pub script_hash: String,
    pub excerpt: String,
    pub save_worthy_lines: Vec<String>,
    pub rules: Vec<JournalRule>,
    pub do_not_learn: Vec<String>,
}

impl JournalEntry {
    fn ts(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    /// `platform=xhs | type=cost_breakdown | performance=...`; user-supplied
    /// metadata wins over the analysis.
    fn meta_line(&self) -> String {
        let pick = |key: &str, fallback: &str| {
            self.metadata
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };
        let mut parts = vec![
            format!("platform={}", pick("platform", &self.platform)),
            format!("type={}", pick("type", &self.content_type)),
        ];
        let performance = pick("performance", "");
        if !performance.is_empty() {
            parts.push(format!("performance={performance}"));
        }
        parts.join(" | ")
    }

    pub fn render_win(&self) -> String {
        let ts = self.ts();
        let mut lines: Vec<&str> = self.save_worthy_lines.iter().take(3).map(String::as_str).collect();
        lines.resize(3, "");

        let rules = if self.rules.is_empty() {
            "- (none)".to_string()
        } else {
            self.rules
                .iter()
                .map(|r| {
                    let example: String = r.example.chars().take(120).collect();
                    format!("- {} — why: {} | example: {example}", r.rule, r.why)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let excerpt = if self.excerpt.is_empty() {
            "excerpt:".to_string()
        } else {
            format!("excerpt: {}", self.excerpt)
        };

        format!(
            "\n## {ts}\n\
             - timestamp_utc: {ts}\n\
             - metadata: {meta}\n\
             - hook: {hook} ({types})\n\
             - script_hash: {hash}\n\
             - {excerpt}\n\
             - save_worthy_lines:\n  - {l0}\n  - {l1}\n  - {l2}\n\
             - reusable_rules:\n{rules}\n\
             - why_it_worked: {WHY_IT_WORKED}\n",
            meta = self.meta_line(),
            hook = self.hook_text,
            types = self.hook_types.join(", "),
            hash = self.script_hash,
            l0 = lines[0],
            l1 = lines[1],
            l2 = lines[2],
        )
    }

    pub fn render_failure(&self) -> String {
        let ts = self.ts();
        let blocked = if self.do_not_learn.is_empty() {
            "- (none)".to_string()
        } else {
            self.do_not_learn
                .iter()
                .map(|x| format!("- {x}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "\n## {ts}\n\
             - timestamp_utc: {ts}\n\
             - metadata: {meta}\n\
             - script_hash: {hash}\n\
             - do_not_learn:\n{blocked}\n",
            meta = self.meta_line(),
            hash = self.script_hash,
        )
    }
}

/// The skills directory on disk.
#[derive(Debug, Clone)]
pub struct SkillJournal {
    dir: PathBuf,
}

impl SkillJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory and any missing skill file with its heading.
    pub fn ensure_files(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.dir.display())))?;
        for name in SKILL_FILES {
            let path = self.dir.join(name);
            if !path.exists() {
                std::fs::write(&path, format!("# {}\n", title_for(name)))
                    .map_err(|e| StoreError::Storage(format!("create {}: {e}", path.display())))?;
            }
        }
        Ok(())
    }

    /// Append under an exclusive lock, flushed and fsynced before release.
    pub fn append(&self, name: &str, text: &str) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::Storage(format!("open {}: {e}", path.display())))?;
        let guard = LockedFile::acquire(&mut file, &path)?;
        guard
            .write(text)
            .map_err(|e| StoreError::Storage(format!("append {}: {e}", path.display())))
    }

    /// Write a learned script to every relevant file; returns the files touched.
    pub fn record_learning(&self, entry: &JournalEntry) -> Result<Vec<String>, StoreError> {
        self.ensure_files()?;
        let win = entry.render_win();
        let mut updated = Vec::new();
        for name in ["hooks.md", file_for_content_type(&entry.content_type), "win_log.md"] {
            self.append(name, &win)?;
            updated.push(format!("skills/{name}"));
        }
        self.append("failure_log.md", &entry.render_failure())?;
        updated.push("skills/failure_log.md".to_string());
        debug!(files = updated.len(), hash = %entry.script_hash, "Journal updated");
        Ok(updated)
    }

    /// [`record_learning`](Self::record_learning) on the blocking pool.
    pub async fn record_learning_async(&self, entry: JournalEntry) -> Result<Vec<String>, StoreError> {
        let journal = self.clone();
        tokio::task::spawn_blocking(move || journal.record_learning(&entry))
            .await
            .map_err(|e| StoreError::Storage(format!("journal task failed: {e}")))?
    }
}

/// Exclusive lock on an open file; released when dropped.
struct LockedFile<'a> {
    file: &'a mut File,
}

impl<'a> LockedFile<'a> {
    fn acquire(file: &'a mut File, path: &Path) -> Result<Self, StoreError> {
        file.lock()
            .map_err(|e| StoreError::Storage(format!("lock {}: {e}", path.display())))?;
        Ok(Self { file })
    }

    fn write(mut self, text: &str) -> std::io::Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.flush()?;
        self.file.sync_all()
    }
}

impl Drop for LockedFile<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
