//! Engine — the operations callers (CLI, bots) use.
//!
//! Owns the orchestrator, the draft registry, the knowledge store and the
//! skill assembler, and wires them together per operation. Nothing here is
//! ambient: every collaborator is passed in at construction.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use wayfarer_config::AppConfig;
use wayfarer_core::{ContentId, Draft, DraftMode, Provider, SkillClass, SkillDocument};
use wayfarer_knowledge::{KnowledgeStore, SkillJournal, StoreRead, SummaryTables};
use wayfarer_screening::{CandidateValidator, ScoringTables, Scorer, MAX_TOTAL, TitleValidator, distinct_regions};

use crate::context::{RECENT_WINS_DOC, SkillContext, SkillContextAssembler};
use crate::draft::{Choice, DraftRegistry, RestoreReport};
use crate::error::{PipelineError, Result};
use crate::learning::{LearnReport, ScriptLearner, parse_learn_command};
use crate::manual_win::{WinOutcome, record_manual_win};
use crate::note::{Note, NoteWriter};
use crate::orchestrator::{CycleMode, GenerationOutcome, GenerationSettings, Orchestrator};
use crate::prompts::PromptContext;

/// A finished cycle plus anything the caller should surface.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub draft: Draft,
    pub warnings: Vec<String>,
}

/// Notes generated for one approval.
#[derive(Debug, Clone)]
pub struct ApprovalReport {
    pub content_id: ContentId,
    pub notes: Vec<Note>,
    /// (title, error) for notes that failed to generate
    pub failed: Vec<(String, String)>,
    pub used_today: u32,
    pub limit: u32,
    pub over_limit: bool,
    /// Quota left before this approval
    pub remaining_before: u32,
}

pub struct Engine {
    store: Arc<KnowledgeStore>,
    orchestrator: Orchestrator,
    notes: NoteWriter,
    learner: ScriptLearner,
    title_validator: TitleValidator,
    assembler: SkillContextAssembler,
    skills_dir: PathBuf,
    summary_window: usize,
    summary_tables: SummaryTables,
    max_retries: usize,
    registry: Mutex<DraftRegistry>,
}

impl Engine {
    pub fn new(config: &AppConfig, provider: Arc<dyn Provider>, store: KnowledgeStore) -> Self {
        let store = Arc::new(store);
        let generation = &config.generation;
        let skills_dir = config.skills_dir();

        let scorer = Scorer::new(
            ScoringTables::default().with_excluded_regions(generation.excluded_regions.iter().cloned()),
        );
        let settings = GenerationSettings {
            model: config.title_model().to_string(),
            temperature: generation.title_temperature,
            top_k: generation.top_k,
            title_batch_size: generation.title_batch_size,
            region_batch_size: generation.region_batch_size,
            ..GenerationSettings::default()
        };
        let orchestrator = Orchestrator::new(
            provider.clone(),
            store.clone(),
            scorer,
            Arc::new(TitleValidator::default()),
            settings,
        );
        let notes = NoteWriter::new(
            provider.clone(),
            config.note_model(),
            generation.note_temperature,
            generation.note_max_tokens,
        );
        let learner = ScriptLearner::new(
            provider,
            store.clone(),
            SkillJournal::new(&skills_dir),
            config.learn_model(),
            generation.learn_temperature,
        );

        Self {
            store,
            orchestrator,
            notes,
            learner,
            title_validator: TitleValidator::default(),
            assembler: SkillContextAssembler::new(config.skills.budget_chars),
            skills_dir,
            summary_window: config.skills.summary_window,
            summary_tables: SummaryTables::default(),
            max_retries: generation.max_retries,
            registry: Mutex::new(DraftRegistry::new(
                generation.max_notes_per_day,
                generation.utc_offset_hours,
            )),
        }
    }

    /// Use a different validator for the top-K of title cycles.
    pub fn with_top_validator(mut self, validator: Arc<dyn CandidateValidator>) -> Self {
        self.orchestrator = self.orchestrator.with_validator(validator);
        self
    }

    pub fn with_summary_tables(mut self, tables: SummaryTables) -> Self {
        self.summary_tables = tables;
        self
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    // ── Skill context ──

    /// Assemble the skill context for the next prompt.
    ///
    /// Storage problems degrade to a context without the recent-wins summary
    /// and a warning.
    pub async fn skill_context(&self) -> Result<StoreRead<SkillContext>> {
        let summary = self
            .store
            .summarize(self.summary_window, &self.summary_tables)
            .await?;
        let recent = SkillDocument {
            name: RECENT_WINS_DOC.to_string(),
            content: summary.value.render(),
            class: SkillClass::Memory,
            priority: usize::MAX,
        };

        let assembler = self.assembler.clone();
        let dir = self.skills_dir.clone();
        let context = tokio::task::spawn_blocking(move || assembler.assemble_dir(&dir, vec![recent]))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Skill context assembly failed, continuing without it");
                SkillContext::default()
            });
        Ok(StoreRead {
            value: context,
            warning: summary.warning,
        })
    }

    // ── Generation ──

    async fn cycle(&self, mode: CycleMode) -> Result<(GenerationOutcome, Vec<String>)> {
        let context = self.skill_context().await?;
        let mut warnings: Vec<String> = context.warning.into_iter().collect();
        let prompt = PromptContext::from_skills(&context.value);

        let outcome = self
            .orchestrator
            .generate_validated_top(&mode, self.max_retries, &prompt)
            .await?;
        if outcome.used_fallback {
            warnings.push(format!(
                "No attempt fully passed validation after {} attempts; showing the best one",
                outcome.attempts
            ));
        }
        warnings.extend(self.store.take_warnings());
        Ok((outcome, warnings))
    }

    /// Generate, validate and register a title draft.
    pub async fn run_generation_cycle(&self) -> Result<CycleReport> {
        let (outcome, warnings) = self.cycle(CycleMode::Titles).await?;
        let draft = self
            .registry
            .lock()
            .await
            .create(outcome, DraftMode::Titles, Utc::now());
        Ok(CycleReport { draft, warnings })
    }

    /// Generate, validate and register a region-anchored draft.
    pub async fn run_region_cycle(&self, regions: [String; 2]) -> Result<CycleReport> {
        if !distinct_regions(&regions) {
            let [first, second] = regions;
            return Err(PipelineError::InvalidRegions(first, second));
        }
        let (outcome, warnings) = self.cycle(CycleMode::Regions(regions.clone())).await?;
        let draft = self
            .registry
            .lock()
            .await
            .create(outcome, DraftMode::Regions { regions }, Utc::now());
        Ok(CycleReport { draft, warnings })
    }

    /// Replace a draft with a freshly generated one under a new id.
    pub async fn regenerate(&self, old: &ContentId) -> Result<CycleReport> {
        let mode = self.registry.lock().await.get(old)?.mode.clone();
        let cycle_mode = match &mode {
            DraftMode::Titles => CycleMode::Titles,
            DraftMode::Regions { regions } => CycleMode::Regions(regions.clone()),
        };
        let (outcome, warnings) = self.cycle(cycle_mode).await?;

        let mut registry = self.registry.lock().await;
        let draft = registry.create(outcome, mode, Utc::now());
        registry.supersede(old, &draft.content_id)?;
        info!(old = %old, new = %draft.content_id, "Draft regenerated");
        Ok(CycleReport { draft, warnings })
    }

    // ── Approval ──

    /// Approve top items and generate their notes within today's quota.
    pub async fn approve(&self, id: &ContentId, choice: Choice) -> Result<ApprovalReport> {
        let approval = self.registry.lock().await.approve(id, choice, Utc::now())?;

        let mut notes = Vec::new();
        let mut failed = Vec::new();
        for item in &approval.selected {
            match self.notes.generate(&item.candidate).await {
                Ok(note) => {
                    self.registry.lock().await.record_note(&approval.day_key);
                    notes.push(note);
                }
                Err(e) => {
                    warn!(content_id = %id, title = %item.candidate.title, error = %e, "Note generation failed");
                    failed.push((item.candidate.title.clone(), e.to_string()));
                }
            }
        }

        let registry = self.registry.lock().await;
        Ok(ApprovalReport {
            content_id: id.clone(),
            notes,
            failed,
            used_today: registry.used(Utc::now()),
            limit: registry.max_per_day(),
            over_limit: approval.over_limit,
            remaining_before: approval.remaining,
        })
    }

    /// (notes used today, daily limit)
    pub async fn quota(&self) -> (u32, u32) {
        let registry = self.registry.lock().await;
        (registry.used(Utc::now()), registry.max_per_day())
    }

    pub async fn draft(&self, id: &ContentId) -> Result<Draft> {
        Ok(self.registry.lock().await.get(id)?.clone())
    }

    pub async fn snapshot_registry(&self) -> Result<String> {
        Ok(self.registry.lock().await.snapshot()?)
    }

    pub async fn restore_registry(&self, json: &str) -> Result<RestoreReport> {
        Ok(self.registry.lock().await.restore(json)?)
    }

    // ── Learning ──

    pub async fn record_manual_win(&self, text: &str) -> Result<WinOutcome> {
        record_manual_win(&self.store, &self.title_validator, text).await
    }

    pub async fn ingest_learned_script(
        &self,
        script: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<LearnReport> {
        self.learner.ingest(script, metadata).await
    }

    /// Parse a `/learn_script` message and ingest it.
    pub async fn learn_from_message(&self, text: &str) -> Result<LearnReport> {
        let (metadata, script) = parse_learn_command(text);
        self.ingest_learned_script(&script, metadata).await
    }

    /// Human-readable audit (`None` when storage is unavailable), with any
    /// corruption recovered while reading it as the warning.
    pub async fn audit(&self) -> Result<StoreRead<Option<String>>> {
        Ok(self.store.audit().await?)
    }
}

/// Operator-facing rendering of a draft's top items.
pub fn render_draft(draft: &Draft) -> String {
    let mut lines = vec![
        format!("📌 Top {} ideas (awaiting approval)", draft.top.len()),
        format!("🆔 content_id: {}", draft.content_id),
    ];
    if let DraftMode::Regions { regions } = &draft.mode {
        lines.push(format!("📍 regions: {} / {}", regions[0], regions[1]));
    }
    lines.push(String::new());

    for (i, item) in draft.top.iter().enumerate() {
        let c = &item.candidate;
        lines.push(format!("{}. {}  ({}/{MAX_TOTAL})", i + 1, c.title.trim(), item.score.total));
        lines.push(format!("• angle: {}", c.angle.trim()));
        lines.push(format!("• audience: {}", c.target_audience.trim()));
        if let Some(hint) = c.location_hint.as_deref().filter(|h| !h.is_empty()) {
            lines.push(format!("• location: {hint}"));
        }
        lines.push(format!("• CTA: {}", c.cta));
        lines.push(String::new());
    }

    if draft.used_fallback {
        lines.push(format!(
            "⚠️ No attempt fully passed validation ({} attempts); kept the best one.",
            draft.attempts
        ));
        let mut shown: Vec<(&str, &str)> = Vec::new();
        for rejection in &draft.rejections {
            let in_top = draft
                .top
                .iter()
                .any(|t| Some(t.index) == rejection.index && t.candidate.title == rejection.title);
            let key = (rejection.title.as_str(), rejection.reason.as_str());
            if in_top && !shown.contains(&key) {
                lines.push(format!("  - {}: {}", key.0, key.1));
                shown.push(key);
            }
        }
    }
    lines.join("\n").trim().to_string()
}
