//! Skill-context assembly — which skill documents go into the next prompt.
//!
//! Documents are loaded in a fixed priority order, split into a rule section
//! (strict placement) and a memory section (advisory placement), and capped
//! by a global character budget:
//!
//! | Class  | Examples                                 | Under budget pressure       |
//! |--------|------------------------------------------|-----------------------------|
//! | Rule   | `style_rules.md`, `hooks.md`, failures   | Never evicted               |
//! | Memory | content-type files, `win_log.md`, recent | Evicted from the end first  |
//!
//! Assembly is deterministic: the same directory contents always give the
//! same context.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use wayfarer_core::{SkillClass, SkillDocument};

/// Name of the synthetic document carrying the recent-wins summary.
pub const RECENT_WINS_DOC: &str = "recent_wins.md";

/// Known documents, loaded first and in this order.
pub const PRIORITY: &[&str] = &[
    "style_rules.md",
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

const RULE_DOCS: &[&str] = &["style_rules.md", "hooks.md", "failure_log.md"];

const MEMORY_DOCS: &[&str] = &[
    "cost_breakdown.md",
    "avoid_pitfalls.md",
    "local_weekend.md",
    "booking_strategy.md",
    "tools.md",
    "misc.md",
    "win_log.md",
    RECENT_WINS_DOC,
];

/// Placement class for a document name. Unknown names are rules.
pub fn classify(name: &str) -> SkillClass {
    if RULE_DOCS.contains(&name) || !MEMORY_DOCS.contains(&name) {
        SkillClass::Rule
    } else {
        SkillClass::Memory
    }
}

fn is_skill_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden
        && path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "md" || ext == "txt")
}

fn read_document(path: &Path, priority: usize) -> Option<SkillDocument> {
    let name = path.file_name()?.to_str()?.to_string();
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => Some(SkillDocument {
            class: classify(&name),
            name,
            content,
            priority,
        }),
        Ok(_) => None,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Skipping unreadable skill document");
            None
        }
    }
}

/// Load every skill document in `dir`: the priority list first, then any
/// other `.md`/`.txt` file in lexical order. A missing directory is empty.
pub fn load_documents(dir: &Path) -> Vec<SkillDocument> {
    let mut extras: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_skill_file(p))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !PRIORITY.contains(&n))
            })
            .collect(),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "No skills directory");
            return Vec::new();
        }
    };
    extras.sort();

    let known = PRIORITY.iter().map(|name| dir.join(name));
    let docs: Vec<SkillDocument> = known
        .chain(extras)
        .enumerate()
        .filter(|(_, path)| path.is_file())
        .filter_map(|(priority, path)| read_document(&path, priority))
        .collect();
    debug!(dir = %dir.display(), count = docs.len(), "Loaded skill documents");
    docs
}

/// Split into (rule, memory) sections, preserving order.
pub fn partition(documents: Vec<SkillDocument>) -> (Vec<SkillDocument>, Vec<SkillDocument>) {
    documents.into_iter().partition(|d| d.class == SkillClass::Rule)
}

/// The documents that made it into the prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SkillContext {
    pub rules: Vec<SkillDocument>,
    pub memory: Vec<SkillDocument>,
    /// Names of evicted documents, in eviction order
    pub evicted: Vec<String>,
    pub total_chars: usize,
    pub budget_chars: usize,
}

impl SkillContext {
    /// Still over budget after every memory document was evicted.
    pub fn over_budget(&self) -> bool {
        self.total_chars > self.budget_chars
    }

    pub fn kept(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().chain(&self.memory).map(|d| d.name.as_str())
    }

    pub fn rules_section(&self) -> String {
        render_section(&self.rules)
    }

    pub fn memory_section(&self) -> String {
        render_section(&self.memory)
    }
}

fn render_section(docs: &[SkillDocument]) -> String {
    docs.iter()
        .map(|d| format!("<{}>\n{}\n</{}>", d.name, d.content.trim(), d.name))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Applies the character budget.
#[derive(Debug, Clone)]
pub struct SkillContextAssembler {
    budget_chars: usize,
}

impl SkillContextAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    pub fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    /// Evict memory documents from the end until under budget, then split.
    pub fn assemble(&self, mut documents: Vec<SkillDocument>) -> SkillContext {
        let mut total: usize = documents.iter().map(SkillDocument::len).sum();
        let mut evicted = Vec::new();

        while total > self.budget_chars {
            let Some(pos) = documents.iter().rposition(|d| !d.is_protected()) else {
                break;
            };
            let doc = documents.remove(pos);
            total -= doc.len();
            debug!(document = %doc.name, chars = doc.len(), "Evicted skill document");
            evicted.push(doc.name);
        }

        if total > self.budget_chars {
            warn!(
                total,
                budget = self.budget_chars,
                "Rule documents alone exceed the skill budget"
            );
        }

        let (rules, memory) = partition(documents);
        SkillContext {
            rules,
            memory,
            evicted,
            total_chars: total,
            budget_chars: self.budget_chars,
        }
    }

    /// Load from `dir`, append any extra documents, and assemble.
    pub fn assemble_dir(&self, dir: &Path, extra: Vec<SkillDocument>) -> SkillContext {
        let mut documents = load_documents(dir);
        documents.extend(extra);
        self.assemble(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, chars: usize) -> SkillDocument {
        SkillDocument {
            name: name.into(),
            content: "x".repeat(chars),
            class: classify(name),
            priority: 0,
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify("hooks.md"), SkillClass::Rule);
        assert_eq!(classify("failure_log.md"), SkillClass::Rule);
        assert_eq!(classify("win_log.md"), SkillClass::Memory);
        assert_eq!(classify(RECENT_WINS_DOC), SkillClass::Memory);
        assert_eq!(classify("my_notes.md"), SkillClass::Rule);
    }

    #[test]
    fn loads_priority_then_lexical() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        for name in ["zeta.md", "win_log.md", "alpha.txt", "hooks.md", "style_rules.md"] {
            std::fs::write(dir.join(name), format!("content of {name}")).unwrap();
        }
        std::fs::write(dir.join("empty.md"), "   \n").unwrap();
        std::fs::write(dir.join("image.png"), "binary").unwrap();
        std::fs::write(dir.join(".hidden.md"), "secret").unwrap();

        let names: Vec<String> = load_documents(dir).into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["style_rules.md", "hooks.md", "win_log.md", "alpha.txt", "zeta.md"]
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        assert!(load_documents(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn under_budget_keeps_everything() {
        let ctx = SkillContextAssembler::new(100).assemble(vec![doc("hooks.md", 10), doc("tools.md", 10)]);
        assert!(ctx.evicted.is_empty());
        assert_eq!(ctx.rules.len(), 1);
        assert_eq!(ctx.memory.len(), 1);
        assert_eq!(ctx.total_chars, 20);
    }

    #[test]
    fn evicts_memory_from_the_end_first() {
        let docs = vec![
            doc("hooks.md", 30),
            doc("cost_breakdown.md", 30),
            doc("tools.md", 30),
            doc("win_log.md", 30),
            doc("failure_log.md", 30),
        ];
        let ctx = SkillContextAssembler::new(100).assemble(docs);
        assert_eq!(ctx.evicted, vec!["win_log.md", "tools.md"]);
        assert_eq!(ctx.total_chars, 90);
        assert!(!ctx.over_budget());
        let kept: Vec<&str> = ctx.kept().collect();
        assert_eq!(kept, vec!["hooks.md", "failure_log.md", "cost_breakdown.md"]);
    }

    #[test]
    fn rule_documents_are_never_evicted() {
        let docs = vec![doc("hooks.md", 80), doc("misc.md", 10), doc("style_rules.md", 80)];
        let ctx = SkillContextAssembler::new(50).assemble(docs);
        assert_eq!(ctx.evicted, vec!["misc.md"]);
        assert_eq!(ctx.rules.len(), 2);
        assert!(ctx.memory.is_empty());
        assert!(ctx.over_budget());
    }

    #[test]
    fn budget_counts_characters() {
        let mut cjk = doc("tools.md", 0);
        cjk.content = "避坑".repeat(10);
        let ctx = SkillContextAssembler::new(20).assemble(vec![cjk]);
        assert!(ctx.evicted.is_empty());
    }

    #[test]
    fn sections_wrap_documents() {
        let ctx = SkillContextAssembler::new(100).assemble(vec![doc("hooks.md", 3)]);
        assert_eq!(ctx.rules_section(), "<hooks.md>\nxxx\n</hooks.md>");
        assert_eq!(ctx.memory_section(), "");
    }
}
