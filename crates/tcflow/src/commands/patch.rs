use anyhow::Context;
use std::path::Path;
use tcflow_cloud::patch::{NUMERIC_STRING_SETTINGS, build_partial_update_coerced, parse_document};

fn read_document(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_document(&text).with_context(|| format!("{} is not a usable document", path.display()))
}

pub fn handle(old: &Path, new: &Path, extra_keys: &[String], compact: bool) -> anyhow::Result<()> {
    let old_doc = read_document(old)?;
    let new_doc = read_document(new)?;

    let mut keys: Vec<&str> = NUMERIC_STRING_SETTINGS.to_vec();
    keys.extend(extra_keys.iter().map(String::as_str));

    let update = build_partial_update_coerced(&old_doc, &new_doc, &keys)?;
    tracing::debug!(keys = ?keys, "coerced numeric settings");

    let rendered = if compact {
        serde_json::to_string(&update)?
    } else {
        serde_json::to_string_pretty(&update)?
    };
    println!("{}", rendered);
    Ok(())
}
