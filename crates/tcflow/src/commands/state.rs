use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use tcflow_cloud::StateManager;

pub async fn handle_list(dir: &Path) -> anyhow::Result<()> {
    let state = StateManager::new(dir)
        .load()
        .await
        .context("failed to load state")?;

    if state.resources.is_empty() {
        println!("{}", "No managed resources.".yellow());
        return Ok(());
    }

    let mut keys: Vec<&String> = state.resources.keys().collect();
    keys.sort();
    for key in keys {
        let resource = &state.resources[key];
        println!(
            "{}  {}  {}",
            key.cyan(),
            resource.id,
            resource.updated_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }
    Ok(())
}

pub async fn handle_show(dir: &Path, key: &str) -> anyhow::Result<()> {
    let state = StateManager::new(dir)
        .load()
        .await
        .context("failed to load state")?;
    let resource = state
        .get_resource(key)
        .with_context(|| format!("no resource {} in state", key))?;
    println!("{}", serde_json::to_string_pretty(resource)?);
    Ok(())
}
