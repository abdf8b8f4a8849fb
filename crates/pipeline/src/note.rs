//! Full-note generation with one hook repair pass.

use std::sync::Arc;
use tracing::{debug, warn};
use wayfarer_core::error::ProviderError;
use wayfarer_core::{Candidate, Provider, ProviderRequest};
use wayfarer_screening::HookValidator;

use crate::prompts::{hook_repair_messages, note_messages};

/// Appended to notes whose hook could not be repaired.
pub const HOOK_WARNING: &str = "\n\n⚠️ Hook 可能超字数，请手动微调";

const REPAIR_TEMPERATURE: f32 = 0.4;
const REPAIR_MAX_TOKENS: u32 = 60;

/// Position and text of the line following a `Hook` header.
///
/// `None` when there is no header or nothing follows it.
pub fn extract_hook_line(note: &str) -> Option<(usize, String)> {
    let lines: Vec<&str> = note.lines().collect();
    let header = lines.iter().position(|l| l.trim().eq_ignore_ascii_case("hook"))?;
    lines
        .iter()
        .enumerate()
        .skip(header + 1)
        .find(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i, l.trim().to_string()))
}

/// Swap the hook line for `hook`; unchanged when there is no hook line.
pub fn replace_hook(note: &str, hook: &str) -> String {
    let Some((idx, _)) = extract_hook_line(note) else {
        return note.to_string();
    };
    note.lines()
        .enumerate()
        .map(|(i, line)| if i == idx { hook } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub title: String,
    pub text: String,
    /// The hook is still invalid after the repair attempt
    pub needs_warning: bool,
}

impl Note {
    /// Text with the warning suffix when needed.
    pub fn rendered(&self) -> String {
        if self.needs_warning {
            format!("{}{HOOK_WARNING}", self.text)
        } else {
            self.text.clone()
        }
    }
}

pub struct NoteWriter {
    provider: Arc<dyn Provider>,
    hooks: HookValidator,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl NoteWriter {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            hooks: HookValidator::default(),
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    pub fn with_hook_validator(mut self, hooks: HookValidator) -> Self {
        self.hooks = hooks;
        self
    }

    pub async fn generate(&self, candidate: &Candidate) -> Result<Note, ProviderError> {
        let request = ProviderRequest::new(&self.model, note_messages(candidate))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let mut text = self.provider.complete(request).await?.content.trim().to_string();

        let mut needs_warning = false;
        if let Some((_, hook)) = extract_hook_line(&text) {
            if !self.hooks.is_valid(&hook) {
                match self.repair(&hook, candidate).await {
                    Some(fixed) if self.hooks.is_valid(&fixed) => {
                        debug!(old = %hook, new = %fixed, "Hook repaired");
                        text = replace_hook(&text, &fixed);
                    }
                    _ => needs_warning = true,
                }
            }
        }

        Ok(Note {
            title: candidate.title.trim().to_string(),
            text,
            needs_warning,
        })
    }

    async fn repair(&self, hook: &str, candidate: &Candidate) -> Option<String> {
        let request = ProviderRequest::new(&self.model, hook_repair_messages(hook, candidate))
            .with_temperature(REPAIR_TEMPERATURE)
            .with_max_tokens(REPAIR_MAX_TOKENS);
        match self.provider.complete(request).await {
            Ok(response) => response
                .content
                .lines()
                .next()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            Err(e) => {
                warn!(error = %e, "Hook repair failed");
                None
            }
        }
    }
}
