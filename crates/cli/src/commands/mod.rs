//! Subcommand implementations and the plumbing they share.

pub mod approve;
pub mod audit;
pub mod generate;
pub mod learn;
pub mod onboard;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use wayfarer_config::AppConfig;
use wayfarer_pipeline::Engine;

/// File under `data_dir` holding the draft registry between runs.
pub const REGISTRY_FILE: &str = "drafts.json";

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Fail early, with setup instructions, when no API key is configured.
pub fn require_api_key(config: &AppConfig) -> CommandResult {
    if config.has_api_key() || !config.providers.is_empty() || config.default_provider == "ollama" {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    WAYFARER_API_KEY=sk-...");
    eprintln!("    OPENAI_API_KEY=sk-...");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Build the engine with the configured provider chain and knowledge store,
/// then reload persisted drafts.
pub async fn open_engine(config: &AppConfig) -> Result<Engine, Box<dyn std::error::Error>> {
    let provider = Arc::new(wayfarer_providers::build_from_config(config));
    let store = wayfarer_knowledge::open_from_config(config).await;
    let engine = Engine::new(config, provider, store);
    load_registry(&engine, &registry_path(config)).await;
    Ok(engine)
}

pub fn registry_path(config: &AppConfig) -> PathBuf {
    config.data_dir().join(REGISTRY_FILE)
}

/// Restore drafts from `path`. A missing or unreadable file starts empty.
pub async fn load_registry(engine: &Engine, path: &std::path::Path) {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read draft registry");
            return;
        }
    };
    match engine.restore_registry(&json).await {
        Ok(report) => debug!(
            restored = report.restored,
            conflicts = report.conflicts.len(),
            "Draft registry loaded"
        ),
        Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable draft registry"),
    }
}

/// Write the registry through a temp file so a crash never truncates it.
pub async fn save_registry(engine: &Engine, path: &std::path::Path) -> CommandResult {
    let json = engine.snapshot_registry().await?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Print warnings collected during an operation.
pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("⚠️  {warning}");
    }
}
