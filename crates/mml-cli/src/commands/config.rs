//! Config command implementation.

use anyhow::Result;

use crate::config::Config;

/// Show the effective configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("mml Configuration");
    println!("{:-<40}", "");
    println!("{}", serde_json::to_string_pretty(config)?);

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }
    Ok(())
}

/// Persist the effective configuration.
pub fn save(config: &Config) -> Result<()> {
    config.save()?;
    match Config::config_file_path() {
        Some(path) => println!("Saved configuration to {}", path.display()),
        None => println!("No config directory available; nothing saved"),
    }
    Ok(())
}
