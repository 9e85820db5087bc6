use colored::Colorize;
use tcflow_config::{ProviderConfig, find_config_file};

pub fn handle(path_only: bool) -> anyhow::Result<()> {
    let source = find_config_file()?;
    if path_only {
        match source {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", "(defaults)".dimmed()),
        }
        return Ok(());
    }

    let config = ProviderConfig::load()?;
    let origin = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());
    eprintln!("{} {}", "Loaded from".blue(), origin.cyan());
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
