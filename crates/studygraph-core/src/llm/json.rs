//! Pulling JSON objects out of free-form model output
//!
//! Models wrap JSON in fenced blocks or surround it with prose. The
//! strategy is: fenced JSON block first, then the span between the first
//! `{` and the last `}`, then the whole response.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Extract the most likely JSON payload from a response
pub fn extract_json_from_response(response: &str) -> String {
    // Explicit ```json fences
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    // Generic fences, skipping any language tag on the opening line
    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        if let Some(newline) = response[potential_start..].find('\n') {
            let json_start = potential_start + newline + 1;
            if let Some(end) = response[json_start..].find("```") {
                let candidate = response[json_start..json_start + end].trim();
                if candidate.starts_with('{') {
                    return candidate.to_string();
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}'))
        && start < end
    {
        return response[start..=end].to_string();
    }

    response.trim().to_string()
}

/// Parse a model response into `T`, yielding `None` when nothing usable is found
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Option<T> {
    if response.trim().is_empty() {
        return None;
    }

    let json_str = extract_json_from_response(response);
    match serde_json::from_str(&json_str) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Response did not contain parsable JSON");
            None
        }
    }
}

/// First non-blank string under any of `keys`, trimmed.
///
/// Numbers are accepted too, since models print item numbers either way.
pub fn first_str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
