//! `wayfarer status` — Show configuration, storage health and quota.

use wayfarer_config::AppConfig;

use super::{CommandResult, load_config, open_engine};

pub async fn run() -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;
    let store = engine.store();
    let (used, limit) = engine.quota().await;
    let g = &config.generation;

    println!("🧭 Wayfarer Status");
    println!("==================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Data dir:     {}", config.data_dir().display());
    println!("  Skills dir:   {}", config.skills_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Models:       title={} note={} learn={}", config.title_model(), config.note_model(), config.learn_model());
    println!("  Batches:      titles={} regions={} top_k={}", g.title_batch_size, g.region_batch_size, g.top_k);
    println!("  Retries:      {}", g.max_retries);
    println!("  Storage:      {} ({})", store.backend(), if store.ping().await { "ok" } else { "unavailable" });
    println!("  Notes today:  {used}/{limit} (UTC{:+})", g.utc_offset_hours);

    // Check config file existence
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `wayfarer onboard` first");
    }
    if !config.has_api_key() {
        println!("  ⚠️  No API key configured");
    }

    Ok(())
}
