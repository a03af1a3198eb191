//! Rendering of installation outputs.

use std::collections::BTreeMap;

/// Render outputs as `key=value` lines, or as a JSON object when `json` is set.
pub fn render(outputs: &BTreeMap<&'static str, String>, json: bool) -> miette::Result<String> {
    if json {
        return serde_json::to_string_pretty(outputs)
            .map_err(|e| miette::miette!("Failed to serialize outputs: {e}"));
    }
    Ok(outputs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n"))
}
