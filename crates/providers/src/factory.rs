//! Build the provider chain from configuration.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wayfarer_config::{AppConfig, ProviderConfig};
use wayfarer_core::provider::Provider;

use crate::fallback::FallbackProvider;
use crate::openai_compat::OpenAiCompatProvider;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Build a failover chain: the default provider first, then every name in
/// `fallback_order` that has a `[providers.<name>]` table.
///
/// The default endpoint serves the per-stage models from `[generation]`;
/// a fallback endpoint asks for its own `default_model` when it sets one.
pub fn build_from_config(config: &AppConfig) -> FallbackProvider {
    let mut chain = FallbackProvider::new("wayfarer");

    let default_entry = config.providers.get(&config.default_provider);
    let (provider, timeout) = build_one(config, &config.default_provider, default_entry);
    chain = chain.push(provider, timeout, None);

    for name in &config.fallback_order {
        if name == &config.default_provider {
            continue;
        }
        if let Some(entry) = config.providers.get(name) {
            let (provider, timeout) = build_one(config, name, Some(entry));
            chain = chain.push(provider, timeout, entry.default_model.clone());
        } else {
            debug!(provider = %name, "Skipping fallback provider without config table");
        }
    }

    chain
}

fn build_one(
    config: &AppConfig,
    name: &str,
    entry: Option<&ProviderConfig>,
) -> (Arc<dyn Provider>, Duration) {
    let api_key = entry
        .and_then(|e| e.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();
    let base_url = entry
        .and_then(|e| e.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));
    let timeout = Duration::from_secs(entry.map_or(DEFAULT_TIMEOUT_SECS, |e| e.timeout_secs));

    let provider: Arc<dyn Provider> = if name == "ollama" {
        Arc::new(OpenAiCompatProvider::ollama(Some(&base_url)))
    } else {
        Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key))
    };
    (provider, timeout)
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
