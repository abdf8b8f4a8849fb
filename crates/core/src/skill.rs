//! Skill documents — named text blobs injected into prompts.

use serde::{Deserialize, Serialize};

/// Placement class of a skill document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillClass {
    /// Imperative constraints; never evicted
    Rule,
    /// Illustrative context; evicted first under budget pressure
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDocument {
    /// File name, e.g. `hooks.md`
    pub name: String,
    pub content: String,
    pub class: SkillClass,
    /// Load position; lower loads first
    pub priority: usize,
}

impl SkillDocument {
    /// Length in characters (not bytes), which is what the budget counts.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn is_protected(&self) -> bool {
        self.class == SkillClass::Rule
    }
}
