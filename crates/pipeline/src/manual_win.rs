//! Manually reported wins (`/win <hook>\n<body>`).

use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};
use wayfarer_core::{LogEvent, LogKind};
use wayfarer_knowledge::{KnowledgeStore, StoreWrite, excerpt};
use wayfarer_screening::TitleValidator;

use crate::error::Result;

static WIN_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/win(?:@\w+)?").expect("win command pattern is valid"));

const EXCERPT_CHARS: usize = 200;

/// Result of recording a win: `accepted` plus the event id or a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinOutcome {
    pub accepted: bool,
    pub message: String,
}

impl WinOutcome {
    fn accepted(id: String) -> Self {
        Self {
            accepted: true,
            message: id,
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// Split a `/win` message into (hook, body).
pub fn parse_win_command(text: &str) -> Option<(String, String)> {
    let stripped = WIN_COMMAND.replace(text.trim(), "");
    let mut lines = stripped.lines().map(str::trim).skip_while(|l| l.is_empty());
    let hook = lines.next()?.to_string();
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Some((hook, body))
}

/// Validate the hook and log a win or a failure.
pub async fn record_manual_win(
    store: &KnowledgeStore,
    validator: &TitleValidator,
    text: &str,
) -> Result<WinOutcome> {
    let Some((hook, body)) = parse_win_command(text) else {
        return Ok(WinOutcome::rejected("Nothing to record: send /win <hook> followed by the post body"));
    };

    let verdict = validator.check(&hook);
    let (event, outcome) = match verdict.reason.filter(|_| !verdict.ok) {
        Some(reason) => {
            warn!(hook = %hook, reason = %reason, "Manual win rejected");
            let mut event = LogEvent::new(LogKind::Failure, "manual_win");
            event.hook_text = Some(hook);
            event.reasons = vec![reason.as_str().to_string()];
            (event, WinOutcome::rejected(reason.as_str()))
        }
        None => {
            let mut event = LogEvent::new(LogKind::Win, "manual_win");
            event.hook_text = Some(hook);
            if !body.is_empty() {
                event.excerpt = Some(excerpt(&body, EXCERPT_CHARS));
            }
            let id = event.id.clone();
            (event, WinOutcome::accepted(id))
        }
    };

    match store.append_log(event).await? {
        StoreWrite::Done(()) => {
            info!(accepted = outcome.accepted, "Manual win recorded");
            Ok(outcome)
        }
        StoreWrite::Unavailable(reason) => Ok(WinOutcome::rejected(format!(
            "DB unavailable, win not recorded: {reason}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wayfarer_core::SkillStore;
    use wayfarer_knowledge::{InMemorySkillStore, UnavailableStore};

    #[test]
    fn command_parsing() {
        assert_eq!(
            parse_win_command("/win 吉隆坡机场RM30避坑\n\n正文第一行\n第二行"),
            Some(("吉隆坡机场RM30避坑".to_string(), "正文第一行\n第二行".to_string()))
        );
        assert_eq!(
            parse_win_command("/win@bot\n\n  hook only  "),
            Some(("hook only".to_string(), String::new()))
        );
        assert_eq!(parse_win_command("/win   "), None);
    }

    #[tokio::test]
    async fn valid_hook_records_win() {
        let skills = InMemorySkillStore::new();
        let store = KnowledgeStore::new(Arc::new(skills.clone()));
        let outcome = record_manual_win(&store, &TitleValidator::default(), "/win 吉隆坡机场RM30交通避坑\n正文")
            .await
            .unwrap();
        assert!(outcome.accepted);

        let wins = skills.recent_logs(LogKind::Win, 5).await.unwrap();
        assert_eq!(wins.len(), 1);
        assert_eq!(wins[0].id, outcome.message);
        assert_eq!(wins[0].excerpt.as_deref(), Some("正文"));
    }

    #[tokio::test]
    async fn invalid_hook_records_failure() {
        let skills = InMemorySkillStore::new();
        let store = KnowledgeStore::new(Arc::new(skills.clone()));
        let outcome = record_manual_win(&store, &TitleValidator::default(), "/win 周末去哪玩")
            .await
            .unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.message, "length_out_of_range");

        let failures = skills.recent_logs(LogKind::Failure, 5).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reasons, vec!["length_out_of_range".to_string()]);
        assert!(skills.recent_logs(LogKind::Win, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let store = KnowledgeStore::new(Arc::new(InMemorySkillStore::new()));
        let outcome = record_manual_win(&store, &TitleValidator::default(), "/win").await.unwrap();
        assert!(!outcome.accepted);
    }

    #[tokio::test]
    async fn unavailable_store_is_reported() {
        let store = KnowledgeStore::new(Arc::new(UnavailableStore::new("missing database URL")));
        let outcome = record_manual_win(&store, &TitleValidator::default(), "/win 吉隆坡机场RM30交通避坑")
            .await
            .unwrap();
        assert!(!outcome.accepted);
        assert!(outcome.message.starts_with("DB unavailable"));
    }
}
