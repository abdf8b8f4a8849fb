//! Knowledge store for Wayfarer.
//!
//! Persists what the pipeline learns: deduplicated rules, one record per
//! ingested script, and append-only win/failure logs. Backends implement
//! [`wayfarer_core::SkillStore`]; callers go through [`KnowledgeStore`],
//! which turns storage outages into values instead of errors.

pub mod audit;
pub mod facade;
pub mod factory;
pub mod file_store;
pub mod hash;
pub mod in_memory;
pub mod journal;
pub mod noop;
pub mod snapshot;
pub mod summarize;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use audit::{audit_report, AuditData};
pub use facade::{KnowledgeStore, StoreRead, StoreWrite};
pub use factory::open_from_config;
pub use file_store::FileSkillStore;
pub use hash::{excerpt, rule_id, script_hash};
pub use in_memory::InMemorySkillStore;
pub use journal::{JournalEntry, JournalRule, SkillJournal};
pub use noop::UnavailableStore;
pub use summarize::{summarize, SkillSummary, SummaryTables};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSkillStore;
