//! Bounded retry orchestrator.
//!
//! One generation cycle is an explicit state machine:
//!
//! ```text
//! Started → Generated → Validated → Accepted
//!                ↑           │
//!                └── Retry ──┴──→ Exhausted
//! ```
//!
//! Each attempt asks the generator for a fresh batch, scores it, and
//! validates either the top-K (title mode) or the whole batch (region
//! mode). The best attempt so far is kept by valid-count; the first attempt
//! that is fully valid wins outright. When the retry budget runs out the
//! best attempt is returned with `used_fallback = true`. Only a cycle in
//! which no attempt produced a parsable batch is an error.
//!
//! Every rejection is written to the failure log before the next attempt
//! starts, so abandoning a cycle between attempts loses nothing.

use std::sync::Arc;
use tracing::{debug, info, warn};
use wayfarer_core::error::GenerationError;
use wayfarer_core::{
    Candidate, LogEvent, LogKind, Provider, ProviderRequest, Rejection, ResponseFormat,
    ScoredCandidate,
};
use wayfarer_knowledge::KnowledgeStore;
use wayfarer_screening::{CandidateValidator, RegionBatchValidator, Scorer};

use crate::error::Result;
use crate::parse::{ParseMode, parse_batch};
use crate::prompts::{PromptContext, region_messages, title_messages};

/// What a cycle is generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleMode {
    Titles,
    Regions([String; 2]),
}

/// States of one generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Started,
    Generated { attempt: usize },
    Validated { attempt: usize, valid: usize, of: usize },
    Retry { attempt: usize },
    Accepted { attempt: usize },
    Exhausted { attempts: usize },
}

/// Result of a cycle.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Every item of the kept attempt, best first
    pub ranked: Vec<ScoredCandidate>,
    pub top: Vec<ScoredCandidate>,
    pub used_fallback: bool,
    /// Attempts consumed, including the first
    pub attempts: usize,
    /// The attempt `ranked` came from
    pub kept_attempt: usize,
    /// Rejections from every attempt, in order
    pub rejections: Vec<Rejection>,
    /// Visited states, in order
    pub trace: Vec<CycleState>,
}

/// Generation parameters for one orchestrator.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_k: usize,
    pub title_batch_size: usize,
    pub region_batch_size: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            temperature: 0.9,
            max_tokens: 900,
            top_k: 2,
            title_batch_size: 6,
            region_batch_size: 5,
        }
    }
}

struct Attempt {
    number: usize,
    ranked: Vec<ScoredCandidate>,
    top: Vec<ScoredCandidate>,
    valid: usize,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    store: Arc<KnowledgeStore>,
    scorer: Scorer,
    validator: Arc<dyn CandidateValidator>,
    region_validator: RegionBatchValidator,
    settings: GenerationSettings,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<KnowledgeStore>,
        scorer: Scorer,
        validator: Arc<dyn CandidateValidator>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            store,
            scorer,
            validator,
            region_validator: RegionBatchValidator::default(),
            settings,
        }
    }

    /// Swap the validator applied to the top-K of title cycles.
    pub fn with_validator(mut self, validator: Arc<dyn CandidateValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_region_validator(mut self, validator: RegionBatchValidator) -> Self {
        self.region_validator = validator;
        self
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Run one cycle of up to `max_retries + 1` attempts.
    pub async fn generate_validated_top(
        &self,
        mode: &CycleMode,
        max_retries: usize,
        context: &PromptContext,
    ) -> Result<GenerationOutcome> {
        let max_attempts = max_retries + 1;
        let mut trace = vec![CycleState::Started];
        let mut rejections: Vec<Rejection> = Vec::new();
        let mut best: Option<Attempt> = None;
        let mut last_error = String::from("no attempt made");

        for number in 1..=max_attempts {
            if number > 1 {
                trace.push(CycleState::Retry { attempt: number });
            }
            let previous: Vec<Rejection> = rejections
                .iter()
                .filter(|r| r.attempt + 1 == number)
                .cloned()
                .collect();

            let candidates = match self.generate(mode, context, &previous).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(attempt = number, error = %e, "Generation attempt failed");
                    last_error = e.to_string();
                    continue;
                }
            };
            trace.push(CycleState::Generated { attempt: number });

            let (ranked, top) = self.scorer.rank_top(&candidates, self.settings.top_k);
            let found = match mode {
                CycleMode::Titles => self.validate_top(number, &top),
                CycleMode::Regions(regions) => self.validate_regions(number, &candidates, regions),
            };
            let valid = if matches!(mode, CycleMode::Regions(_)) {
                if found.is_empty() { top.len() } else { 0 }
            } else {
                top.len() - found.len()
            };
            trace.push(CycleState::Validated {
                attempt: number,
                valid,
                of: top.len(),
            });

            self.log_rejections(&found).await?;
            rejections.extend(found);

            let complete = valid == top.len() && !top.is_empty();
            let attempt = Attempt {
                number,
                ranked,
                top,
                valid,
            };
            if complete {
                trace.push(CycleState::Accepted { attempt: number });
                info!(attempt = number, "Generation cycle accepted");
                return Ok(finish(attempt, false, number, rejections, trace));
            }
            if best.as_ref().is_none_or(|b| attempt.valid > b.valid) {
                best = Some(attempt);
            }
        }

        trace.push(CycleState::Exhausted {
            attempts: max_attempts,
        });
        match best {
            Some(best) => {
                warn!(
                    attempts = max_attempts,
                    kept_attempt = best.number,
                    valid = best.valid,
                    "Retry budget exhausted, using best attempt"
                );
                Ok(finish(best, true, max_attempts, rejections, trace))
            }
            None => Err(GenerationError::Exhausted {
                attempts: max_attempts,
                last_error,
            }
            .into()),
        }
    }

    async fn generate(
        &self,
        mode: &CycleMode,
        context: &PromptContext,
        previous: &[Rejection],
    ) -> std::result::Result<Vec<Candidate>, GenerationError> {
        let (messages, expected, parse_mode) = match mode {
            CycleMode::Titles => (
                title_messages(self.settings.title_batch_size, context, previous),
                self.settings.title_batch_size,
                ParseMode::Titles,
            ),
            CycleMode::Regions(regions) => (
                region_messages(self.settings.region_batch_size, regions, context, previous),
                self.settings.region_batch_size,
                ParseMode::Regions,
            ),
        };
        let request = ProviderRequest::new(&self.settings.model, messages)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
            .with_format(ResponseFormat::JsonObject);

        let response = self.provider.complete(request).await?;
        parse_batch(&response.content, expected, parse_mode).inspect_err(|e| {
            let raw: String = response.content.chars().take(500).collect();
            debug!(error = %e, raw = %raw, "Unparsable generator output");
        })
    }

    fn validate_top(&self, attempt: usize, top: &[ScoredCandidate]) -> Vec<Rejection> {
        top.iter()
            .filter_map(|item| {
                let verdict = self.validator.validate(&item.candidate);
                let reason = verdict.reason.filter(|_| !verdict.ok)?;
                warn!(
                    attempt,
                    validator = self.validator.name(),
                    index = item.index,
                    title = %item.candidate.title,
                    reason = %reason,
                    "Candidate rejected"
                );
                Some(Rejection {
                    attempt,
                    index: Some(item.index),
                    title: item.candidate.title.clone(),
                    reason,
                })
            })
            .collect()
    }

    fn validate_regions(
        &self,
        attempt: usize,
        candidates: &[Candidate],
        regions: &[String; 2],
    ) -> Vec<Rejection> {
        let verdict = self.region_validator.check(candidates, regions);
        let Some(reason) = verdict.verdict.reason.filter(|_| !verdict.ok()) else {
            return Vec::new();
        };
        let title = verdict
            .index
            .and_then(|i| candidates.get(i))
            .map(|c| c.title.clone())
            .unwrap_or_default();
        warn!(attempt, index = ?verdict.index, title = %title, reason = %reason, "Region batch rejected");
        vec![Rejection {
            attempt,
            index: verdict.index,
            title,
            reason,
        }]
    }

    async fn log_rejections(&self, rejections: &[Rejection]) -> Result<()> {
        for rejection in rejections {
            let mut event = LogEvent::new(LogKind::Failure, "generation");
            event.hook_text = (!rejection.title.is_empty()).then(|| rejection.title.clone());
            event.summary = Some(format!("attempt {}", rejection.attempt));
            event.reasons = vec![rejection.reason.as_str().to_string()];
            let outcome = self.store.append_log(event).await?;
            if let Some(reason) = outcome.unavailable_reason() {
                debug!(reason, "Rejection not persisted");
            }
        }
        Ok(())
    }
}

fn finish(
    attempt: Attempt,
    used_fallback: bool,
    attempts: usize,
    rejections: Vec<Rejection>,
    trace: Vec<CycleState>,
) -> GenerationOutcome {
    GenerationOutcome {
        ranked: attempt.ranked,
        top: attempt.top,
        used_fallback,
        attempts,
        kept_attempt: attempt.number,
        rejections,
        trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use wayfarer_core::error::ProviderError;
    use wayfarer_core::{RejectionReason, SkillStore};
    use wayfarer_knowledge::{InMemorySkillStore, UnavailableStore};
    use wayfarer_screening::{HookValidator, TitleValidator};

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        skills: Arc<dyn SkillStore>,
        validator: Arc<dyn CandidateValidator>,
    ) -> Orchestrator {
        Orchestrator::new(
            provider,
            Arc::new(KnowledgeStore::new(skills)),
            Scorer::default(),
            validator,
            GenerationSettings::default(),
        )
    }

    async fn failures(store: &InMemorySkillStore) -> Vec<LogEvent> {
        store.recent_logs(LogKind::Failure, 100).await.unwrap()
    }

    #[tokio::test]
    async fn first_valid_attempt_is_accepted() {
        let provider = Arc::new(ScriptedProvider::texts([good_titles()]));
        let store = InMemorySkillStore::new();
        let orch = orchestrator(provider.clone(), Arc::new(store.clone()), Arc::new(TitleValidator::default()));

        let outcome = orch
            .generate_validated_top(&CycleMode::Titles, 3, &PromptContext::default())
            .await
            .unwrap();
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.ranked.len(), 6);
        assert_eq!(outcome.top.len(), 2);
        assert_eq!(outcome.top[0].index, 1);
        assert_eq!(outcome.top[1].index, 0);
        assert!(outcome.rejections.is_empty());
        assert_eq!(provider.call_count(), 1);
        assert_eq!(outcome.trace.last(), Some(&CycleState::Accepted { attempt: 1 }));
        assert!(failures(&store).await.is_empty());
    }

    #[tokio::test]
    async fn imperfect_batches_fall_back_to_best_of_four() {
        let provider = Arc::new(ScriptedProvider::texts([
            weak_titles(),
            half_good_titles(),
            weak_titles(),
            half_good_titles(),
        ]));
        let store = InMemorySkillStore::new();
        let orch = orchestrator(provider.clone(), Arc::new(store.clone()), Arc::new(TitleValidator::default()));

        let outcome = orch
            .generate_validated_top(&CycleMode::Titles, 3, &PromptContext::default())
            .await
            .unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(provider.call_count(), 4);
        // ties keep the first-seen best
        assert_eq!(outcome.kept_attempt, 2);
        assert_eq!(outcome.top[0].candidate.title, "吉隆坡机场RM30交通避坑");
        // 2 + 1 + 2 + 1 rejected top items
        assert_eq!(outcome.rejections.len(), 6);
        assert_eq!(failures(&store).await.len(), 6);
        assert_eq!(outcome.trace.last(), Some(&CycleState::Exhausted { attempts: 4 }));
    }

    #[tokio::test]
    async fn rejections_are_logged_before_retry() {
        let provider = Arc::new(ScriptedProvider::texts([weak_titles(), good_titles()]));
        let store = InMemorySkillStore::new();
        let orch = orchestrator(provider.clone(), Arc::new(store.clone()), Arc::new(TitleValidator::default()));

        let outcome = orch
            .generate_validated_top(&CycleMode::Titles, 3, &PromptContext::default())
            .await
            .unwrap();
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.rejections.len(), 2);
        assert!(outcome.rejections.iter().all(|r| r.attempt == 1));
        assert!(
            outcome
                .rejections
                .iter()
                .all(|r| r.reason == RejectionReason::LengthOutOfRange)
        );

        let logged = failures(&store).await;
        assert_eq!(logged.len(), 2);
        assert!(logged.iter().all(|e| e.source == "generation"));

        let retry_prompt = &provider.requests()[1].messages;
        assert!(retry_prompt.last().unwrap().content.contains("length_out_of_range"));
    }

    #[tokio::test]
    async fn malformed_output_is_recoverable() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("not json at all".into()),
            Err(ProviderError::Timeout("30s".into())),
            Ok(batch(vec![item("growth", "x", "y", "z")])),
            Ok(good_titles()),
        ]));
        let store = InMemorySkillStore::new();
        let orch = orchestrator(provider, Arc::new(store), Arc::new(TitleValidator::default()));

        let outcome = orch
            .generate_validated_top(&CycleMode::Titles, 3, &PromptContext::default())
            .await
            .unwrap();
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.kept_attempt, 4);
    }

    #[tokio::test]
    async fn nothing_parsable_is_exhausted() {
        let provider = Arc::new(ScriptedProvider::texts(["{}", "nope"]));
        let orch = orchestrator(provider, Arc::new(InMemorySkillStore::new()), Arc::new(TitleValidator::default()));

        let err = orch
            .generate_validated_top(&CycleMode::Titles, 1, &PromptContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::PipelineError::Generation(GenerationError::Exhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn unavailable_store_does_not_abort_cycle() {
        let provider = Arc::new(ScriptedProvider::texts([weak_titles()]));
        let orch = orchestrator(
            provider,
            Arc::new(UnavailableStore::new("missing database URL")),
            Arc::new(TitleValidator::default()),
        );
        let outcome = orch
            .generate_validated_top(&CycleMode::Titles, 0, &PromptContext::default())
            .await
            .unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.rejections.len(), 2);
    }

    #[tokio::test]
    async fn hook_validator_can_replace_title_validator() {
        let hooks = batch(vec![
            item("growth", "吉隆坡机场省钱", "交通", "第一次去的人"),
            item("growth", "槟城酒店真相", "避坑", "情侣"),
            item("trust", "周末", "随便", "所有人"),
            item("trust", "日记", "随便", "所有人"),
            item("conversion", "照片", "随便", "所有人"),
            item("conversion", "看看", "随便", "所有人"),
        ]);
        let provider = Arc::new(ScriptedProvider::texts([hooks]));
        let orch = orchestrator(provider, Arc::new(InMemorySkillStore::new()), Arc::new(HookValidator::default()));
        let outcome = orch
            .generate_validated_top(&CycleMode::Titles, 3, &PromptContext::default())
            .await
            .unwrap();
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 1);
    }

    fn region_item(title: &str, region: &str, hint: &str) -> serde_json::Value {
        let mut value = item("trust", title, "避坑清单", "第一次去的上班族");
        value["region"] = json!(region);
        value["location_hint"] = json!(hint);
        value
    }

    fn good_regions() -> String {
        batch(vec![
            region_item("KLIA2转机别走错航站楼", "吉隆坡", "KLIA2"),
            region_item("茨厂街夜市RM20吃饱攻略", "吉隆坡", "茨厂街"),
            region_item("乔治市壁画街避开人潮时间", "槟城", "乔治市"),
            region_item("槟城渡轮RM1.2过海别坐错", "槟城", "槟城渡轮码头"),
            region_item("升旗山缆车排队2小时避坑", "槟城", "升旗山"),
        ])
    }

    fn one_region_only() -> String {
        batch(vec![
            region_item("KLIA2转机别走错航站楼", "吉隆坡", "KLIA2"),
            region_item("茨厂街夜市RM20吃饱攻略", "吉隆坡", "茨厂街"),
            region_item("武吉免登天桥雨天路线", "吉隆坡", "武吉免登"),
            region_item("中央艺术坊RM50手信清单", "吉隆坡", "中央艺术坊"),
            region_item("黑风洞早上8点前到避坑", "吉隆坡", "黑风洞"),
        ])
    }

    #[tokio::test]
    async fn region_batches_are_checked_whole() {
        let regions = ["吉隆坡".to_string(), "槟城".to_string()];
        let provider = Arc::new(ScriptedProvider::texts([one_region_only(), good_regions()]));
        let store = InMemorySkillStore::new();
        let orch = orchestrator(provider, Arc::new(store.clone()), Arc::new(TitleValidator::default()));

        let outcome = orch
            .generate_validated_top(&CycleMode::Regions(regions), 3, &PromptContext::default())
            .await
            .unwrap();
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.ranked.len(), 5);
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].reason, RejectionReason::RegionsNotCovered);
        assert_eq!(outcome.rejections[0].index, None);
        assert_eq!(failures(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn region_fallback_keeps_first_parsed_attempt() {
        let regions = ["吉隆坡".to_string(), "槟城".to_string()];
        let provider = Arc::new(ScriptedProvider::texts([
            "garbage".to_string(),
            one_region_only(),
            one_region_only(),
        ]));
        let orch = orchestrator(provider, Arc::new(InMemorySkillStore::new()), Arc::new(TitleValidator::default()));

        let outcome = orch
            .generate_validated_top(&CycleMode::Regions(regions), 2, &PromptContext::default())
            .await
            .unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.kept_attempt, 2);
        assert_eq!(outcome.rejections.len(), 2);
    }
}
