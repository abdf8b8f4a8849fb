//! `wayfarer generate` / `wayfarer regenerate` — run an ideation cycle.

use wayfarer_core::ContentId;
use wayfarer_pipeline::{CycleReport, render_draft};

use super::{CommandResult, load_config, open_engine, print_warnings, registry_path, require_api_key, save_registry};

pub async fn run(regions: Vec<String>) -> CommandResult {
    let regions: Option<[String; 2]> = match <[String; 2]>::try_from(regions) {
        Ok(pair) => Some(pair),
        Err(rest) if rest.is_empty() => None,
        Err(rest) => {
            return Err(format!("--region must be given exactly twice (got {})", rest.len()).into());
        }
    };

    let config = load_config()?;
    require_api_key(&config)?;
    let engine = open_engine(&config).await?;

    let report = match regions {
        Some(pair) => engine.run_region_cycle(pair).await?,
        None => engine.run_generation_cycle().await?,
    };
    save_registry(&engine, &registry_path(&config)).await?;
    print_report(&report);
    Ok(())
}

pub async fn regenerate(content_id: &str) -> CommandResult {
    let config = load_config()?;
    require_api_key(&config)?;
    let engine = open_engine(&config).await?;

    let report = engine.regenerate(&ContentId::from(content_id)).await?;
    save_registry(&engine, &registry_path(&config)).await?;
    println!("♻️  Replaced {content_id}\n");
    print_report(&report);
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("{}", render_draft(&report.draft));
    println!();
    print_warnings(&report.warnings);
    println!(
        "\nApprove with: wayfarer approve {} <1|2|both>",
        report.draft.content_id
    );
}
