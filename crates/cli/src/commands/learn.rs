//! `wayfarer learn` / `wayfarer win` — feed the knowledge store.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use wayfarer_pipeline::{LearnReport, METADATA_KEYS};

use super::{CommandResult, load_config, open_engine, print_warnings, require_api_key};

/// Help text for `--meta`, listing the accepted keys.
pub fn meta_help() -> String {
    format!("Script metadata as key=value (keys: {})", METADATA_KEYS.join(", "))
}

/// Parse `key=value` pairs; keys are lowercased, blanks are dropped and
/// unknown keys are rejected.
pub fn parse_meta(pairs: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut metadata = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("metadata must be key=value, got '{pair}'"))?;
        let (key, value) = (key.trim().to_lowercase(), value.trim());
        if !key.is_empty() && !METADATA_KEYS.contains(&key.as_str()) {
            return Err(format!(
                "unknown metadata key '{key}' (expected one of: {})",
                METADATA_KEYS.join(", ")
            ));
        }
        if !key.is_empty() && !value.is_empty() {
            metadata.insert(key, value.to_string());
        }
    }
    Ok(metadata)
}

pub async fn run(file: Option<PathBuf>, meta: Vec<String>) -> CommandResult {
    let text = match &file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let metadata = parse_meta(&meta)?;

    let config = load_config()?;
    require_api_key(&config)?;
    let engine = open_engine(&config).await?;

    let report = if text.trim_start().starts_with("/learn_script") {
        let mut report = engine.learn_from_message(&text).await?;
        if !metadata.is_empty() {
            report.warnings.push("--meta ignored: metadata taken from the /learn_script message".into());
        }
        report
    } else {
        engine.ingest_learned_script(&text, metadata).await?
    };
    print_learn_report(&report);
    Ok(())
}

fn print_learn_report(report: &LearnReport) {
    println!("✅ Script learned");
    println!("  Hash:          {}", report.script_hash);
    println!("  Content type:  {}", report.content_type);
    if report.stored {
        println!(
            "  Rules:         {} processed, {} new, {} updated",
            report.rules_processed, report.new_rules, report.updated_rules
        );
        if report.repeat_ingest {
            println!("  (this script was ingested before; its record was refreshed)");
        }
    } else {
        println!("  Rules:         not stored (knowledge store unavailable)");
    }
    for file in &report.files_updated {
        println!("  Updated:       {file}");
    }
    print_warnings(&report.warnings);
}

/// First argument is the hook; the rest is the body.
pub async fn win(args: &[String]) -> CommandResult {
    let Some((hook, body)) = args.split_first() else {
        return Err("Nothing to record: pass the hook and optionally the body".into());
    };
    let text = format!("/win {hook}\n{}", body.join(" "));

    let config = load_config()?;
    let engine = open_engine(&config).await?;
    let outcome = engine.record_manual_win(&text).await?;
    if outcome.accepted {
        println!("🏆 Win recorded ({})", outcome.message);
    } else {
        println!("⚠️  Win not recorded: {}", outcome.message);
    }
    Ok(())
}
