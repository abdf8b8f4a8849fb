//! `wayfarer onboard` — First-time setup.

use wayfarer_config::AppConfig;
use wayfarer_knowledge::SkillJournal;

use super::CommandResult;

const STYLE_RULES: &str = concat!(
    "# Style Rules\n\n",
    "- Titles are 10-18 characters and lead with a number, place or pitfall\n",
    "- Name one concrete place per post\n",
    "- Give one budget figure with its currency (RM, SGD, ...)\n",
    "- End with a clear save or follow prompt\n",
);

pub async fn run() -> CommandResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let config = AppConfig::load_from(&config_path).unwrap_or_default();

    println!("🧭 Wayfarer — First-Time Setup");
    println!("==============================\n");

    // Create directories
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let data_dir = config.data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        println!("✅ Created data directory: {}", data_dir.display());
    }

    // Skill files
    let skills_dir = config.skills_dir();
    SkillJournal::new(&skills_dir).ensure_files()?;
    println!("✅ Skill files ready in: {}", skills_dir.display());

    let style_path = skills_dir.join("style_rules.md");
    if !style_path.exists() {
        std::fs::write(&style_path, STYLE_RULES)?;
        println!("✅ Created style_rules.md");
    }

    // Create config file
    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Edit {} to taste", style_path.display());
        println!("   3. Run: wayfarer generate\n");
    }

    println!("🎉 Setup complete!\n");
    Ok(())
}
