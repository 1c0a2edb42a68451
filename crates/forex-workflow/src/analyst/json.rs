//! Lenient extraction of JSON objects from model output

use forex_core::Result;
use serde::de::DeserializeOwned;

/// The JSON object inside `text`, with markdown fences and surrounding
/// prose removed
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map_or(trimmed, |rest| rest.strip_suffix("```").unwrap_or(rest))
        .trim();

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

/// Decode the JSON object inside `text`
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(extract_json(text))?)
}
