//! Frequency statistics over recent wins, fed back into prompts.
//!
//! Purely descriptive: count budget anchors, place names and topic
//! keywords in the concatenated text of the last N win events. Ties are
//! broken by first appearance, so the same events always give the same
//! summary.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use wayfarer_core::{LogEvent, LogKind};

use crate::facade::{KnowledgeStore, StoreRead};
use wayfarer_core::error::StoreError;

/// Returned when there are no wins to summarize yet.
pub const DEFAULT_NARRATIVE: &str = "No recorded wins yet. Default direction: \
lead with one concrete budget number, name one specific place per post, \
and frame a pitfall or a decision worth saving.";

/// How many entries each ranked list keeps.
const TOP_N: usize = 5;

static BUDGET_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:rm|myr|usd|sgd|thb|s\$|\$|¥|￥|฿)\s?\d+(?:[.,]\d+)?|\d+(?:[.,]\d+)?\s?(?:rm|myr|usd|sgd|thb|元|块|令吉|泰铢|新币|日元)",
    )
    .expect("budget anchor pattern is valid")
});

/// Keyword lists for place and topic counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryTables {
    pub places: Vec<String>,
    pub topics: Vec<String>,
}

impl Default for SummaryTables {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            places: list(&[
                "吉隆坡", "槟城", "马六甲", "怡保", "新山", "亚庇", "兰卡威", "云顶", "金马伦",
                "新加坡", "曼谷", "清迈", "普吉", "芭提雅", "胡志明", "河内", "岘港", "首尔",
                "釜山", "东京", "大阪", "京都", "台北", "香港", "klia", "kl",
            ]),
            topics: list(&[
                "避坑", "预算", "攻略", "机场", "酒店", "民宿", "交通", "美食", "夜市", "签证",
                "换汇", "转机", "周末", "清单", "对比", "亲子", "穷游", "打卡",
            ]),
        }
    }
}

/// Ranked signals extracted from recent wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub samples: usize,
    pub budget_anchors: Vec<(String, usize)>,
    pub places: Vec<(String, usize)>,
    pub topics: Vec<(String, usize)>,
}

impl SkillSummary {
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Prompt-ready text; the default narrative when there were no samples.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return DEFAULT_NARRATIVE.to_string();
        }
        let line = |label: &str, items: &[(String, usize)]| {
            if items.is_empty() {
                format!("{label}: (none)")
            } else {
                let joined = items
                    .iter()
                    .map(|(k, n)| format!("{k} ×{n}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{label}: {joined}")
            }
        };
        [
            format!("Recent wins analysed: {}", self.samples),
            line("Budget anchors", &self.budget_anchors),
            line("Places", &self.places),
            line("Topics", &self.topics),
        ]
        .join("\n")
    }
}

/// Count occurrences and rank by count, then first appearance.
fn rank(counts: Vec<(String, usize, usize)>) -> Vec<(String, usize)> {
    let mut counts: Vec<_> = counts.into_iter().filter(|(_, n, _)| *n > 0).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    counts
        .into_iter()
        .take(TOP_N)
        .map(|(k, n, _)| (k, n))
        .collect()
}

/// Longer keywords are matched first and their spans masked out, so a hit
/// on "klia" never also counts as "kl". Latin keyword edges must sit on a
/// letter boundary.
fn keyword_counts(text: &str, keywords: &[String]) -> Vec<(String, usize)> {
    let mut ordered: Vec<&String> = keywords.iter().filter(|kw| !kw.is_empty()).collect();
    ordered.sort_by_key(|kw| std::cmp::Reverse(kw.len()));

    let mut masked = text.to_string();
    let mut found = Vec::with_capacity(ordered.len());
    for kw in ordered {
        let needle = kw.to_lowercase();
        let starts: Vec<usize> = masked
            .match_indices(needle.as_str())
            .map(|(i, _)| i)
            .filter(|&i| on_token_boundary(&masked, i, needle.len()))
            .collect();
        for &start in &starts {
            masked.replace_range(start..start + needle.len(), &"\0".repeat(needle.len()));
        }
        let first = starts.first().copied().unwrap_or(usize::MAX);
        found.push((kw.clone(), starts.len(), first));
    }
    rank(found)
}

fn on_token_boundary(text: &str, start: usize, len: usize) -> bool {
    let latin = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphabetic());
    let needle = &text[start..start + len];
    let clash_before = latin(needle.chars().next()) && latin(text[..start].chars().next_back());
    let clash_after = latin(needle.chars().next_back()) && latin(text[start + len..].chars().next());
    !clash_before && !clash_after
}

fn budget_counts(text: &str) -> Vec<(String, usize)> {
    let mut found: Vec<(String, usize, usize)> = Vec::new();
    for m in BUDGET_ANCHOR.find_iter(text) {
        let anchor: String = m.as_str().chars().filter(|c| !c.is_whitespace()).collect();
        match found.iter_mut().find(|(k, _, _)| *k == anchor) {
            Some(entry) => entry.1 += 1,
            None => found.push((anchor, 1, m.start())),
        }
    }
    rank(found)
}

/// Summarize a window of win events. Non-win events are ignored.
pub fn summarize(events: &[LogEvent], tables: &SummaryTables) -> SkillSummary {
    let wins: Vec<&LogEvent> = events.iter().filter(|e| e.kind == LogKind::Win).collect();
    if wins.is_empty() {
        return SkillSummary::default();
    }
    let text = wins
        .iter()
        .map(|e| e.text())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    SkillSummary {
        samples: wins.len(),
        budget_anchors: budget_counts(&text),
        places: keyword_counts(&text, &tables.places),
        topics: keyword_counts(&text, &tables.topics),
    }
}

impl KnowledgeStore {
    /// Summarize the most recent `window` wins.
    pub async fn summarize(
        &self,
        window: usize,
        tables: &SummaryTables,
    ) -> Result<StoreRead<SkillSummary>, StoreError> {
        let wins = self.recent_logs(LogKind::Win, window).await?;
        Ok(StoreRead {
            value: summarize(&wins.value, tables),
            warning: wins.warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(hook: &str, summary: &str) -> LogEvent {
        let mut event = LogEvent::new(LogKind::Win, "test");
        event.hook_text = Some(hook.into());
        event.summary = Some(summary.into());
        event
    }

    #[test]
    fn longer_place_names_shadow_shorter_ones() {
        let events = vec![
            win("KLIA2转机别走错", "klia 快线RM55"),
            win("KL市区一日游", "klook 订票更便宜"),
        ];
        let summary = summarize(&events, &SummaryTables::default());
        assert!(summary.places.contains(&("klia".to_string(), 2)));
        assert!(summary.places.contains(&("kl".to_string(), 1)));
    }

    #[test]
    fn empty_window_uses_default_narrative() {
        let summary = summarize(&[], &SummaryTables::default());
        assert!(summary.is_empty());
        assert_eq!(summary.render(), DEFAULT_NARRATIVE);
    }

    #[test]
    fn counts_budget_places_and_topics() {
        let events = vec![
            win("吉隆坡机场RM30避坑", "RM 30 搞定机场交通"),
            win("槟城3天RM300预算", "槟城避坑清单"),
            win("吉隆坡夜市50元吃饱", "预算友好"),
        ];
        let summary = summarize(&events, &SummaryTables::default());
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.budget_anchors[0], ("rm30".to_string(), 2));
        assert!(summary.budget_anchors.contains(&("rm300".to_string(), 1)));
        assert!(summary.budget_anchors.contains(&("50元".to_string(), 1)));
        assert_eq!(summary.places[0].1, 2);
        assert!(summary.topics.contains(&("避坑".to_string(), 2)));
        assert!(summary.topics.contains(&("预算".to_string(), 2)));
    }

    #[test]
    fn ties_keep_first_appearance() {
        let tables = SummaryTables {
            places: vec!["槟城".into(), "吉隆坡".into()],
            topics: vec![],
        };
        let events = vec![win("吉隆坡", ""), win("槟城", "")];
        let summary = summarize(&events, &tables);
        assert_eq!(summary.places[0].0, "吉隆坡");
        assert_eq!(summary.places[1].0, "槟城");
    }

    #[test]
    fn failures_are_ignored() {
        let mut failure = win("吉隆坡", "");
        failure.kind = LogKind::Failure;
        assert!(summarize(&[failure], &SummaryTables::default()).is_empty());
    }

    #[test]
    fn summary_is_repeatable() {
        let events = vec![win("曼谷RM100", "曼谷夜市"), win("曼谷", "夜市")];
        let tables = SummaryTables::default();
        assert_eq!(summarize(&events, &tables), summarize(&events, &tables));
    }
}
