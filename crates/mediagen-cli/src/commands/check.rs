//! Check command

use std::path::Path;

use anyhow::{bail, Context, Result};
use mediagen::config::environment_issues;
use mediagen::{load_config, validate_config};

pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    println!("Config: {}", config_path.display());

    if let Err(e) = validate_config(&config) {
        println!("  ✗ {}", e);
        bail!("Configuration is invalid");
    }
    println!("  ✓ structure");

    let issues = environment_issues(&config);
    if issues.is_empty() {
        println!("  ✓ environment");
        return Ok(());
    }

    for issue in &issues {
        println!("  ✗ {}", issue);
    }
    bail!("{} environment issue(s) found", issues.len())
}
