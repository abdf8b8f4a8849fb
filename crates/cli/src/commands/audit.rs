//! `wayfarer audit` / `wayfarer skills` — inspect what has been learned.

use super::{CommandResult, load_config, open_engine, print_warnings};

pub async fn run() -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;

    let read = engine.audit().await?;
    match read.value {
        Some(report) => println!("{report}"),
        None => println!(
            "⚠️  Knowledge store unavailable ({}); nothing to audit",
            engine.store().backend()
        ),
    }
    print_warnings(&read.warning.into_iter().collect::<Vec<_>>());
    Ok(())
}

pub async fn skills() -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;
    let read = engine.skill_context().await?;
    let context = read.value;

    println!("📚 Skill context ({})", config.skills_dir().display());
    println!("==================");
    println!("  Budget:   {}/{} chars", context.total_chars, context.budget_chars);
    println!("  Rules:");
    for doc in &context.rules {
        println!("    • {} ({} chars)", doc.name, doc.len());
    }
    println!("  Memory:");
    for doc in &context.memory {
        println!("    • {} ({} chars)", doc.name, doc.len());
    }
    if !context.evicted.is_empty() {
        println!("  Evicted:  {}", context.evicted.join(", "));
    }
    if context.over_budget() {
        println!("\n  ⚠️  Rule documents alone exceed the budget");
    }

    println!("\n── Rules ──\n{}", context.rules_section());
    println!("\n── Memory ──\n{}", context.memory_section());
    print_warnings(&read.warning.into_iter().collect::<Vec<_>>());
    Ok(())
}
