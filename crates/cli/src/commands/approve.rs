//! `wayfarer approve` — generate full notes for approved ideas.

use wayfarer_core::ContentId;
use wayfarer_pipeline::Choice;

use super::{CommandResult, load_config, open_engine, registry_path, require_api_key, save_registry};

pub async fn run(content_id: &str, choice: &str) -> CommandResult {
    let choice = Choice::parse(choice)?;
    let config = load_config()?;
    require_api_key(&config)?;
    let engine = open_engine(&config).await?;

    let result = engine.approve(&ContentId::from(content_id), choice).await;
    // Approval state and quota change even when some notes fail.
    save_registry(&engine, &registry_path(&config)).await?;
    let report = result?;

    if report.over_limit {
        println!(
            "⚠️  Only {} note(s) left today; generating the first {}.\n",
            report.remaining_before,
            report.remaining_before
        );
    }
    for (i, note) in report.notes.iter().enumerate() {
        println!("──────── Note {} · {} ────────", i + 1, note.title);
        println!("{}\n", note.rendered());
    }
    for (title, error) in &report.failed {
        println!("❌ Note for \"{title}\" failed: {error}");
    }
    println!("Today: {}/{} notes used", report.used_today, report.limit);
    Ok(())
}
