//! Turning the model's free-text reply into an `AnalysisResult`.
//!
//! Models wrap the JSON in prose or code fences and are loose with types
//! (ISO as a number one time, a string the next), so the wire structs
//! accept any JSON value and normalize afterwards.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::state::data::{AnalysisResult, CameraSettings, LocationGuess};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyBody {
    hashtags: Vec<Value>,
    camera_settings: Option<ReplyCamera>,
    location: Option<ReplyLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyCamera {
    shutter_speed: Value,
    iso: Value,
    aperture: Value,
    reasoning: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplyLocation {
    primary_location: Value,
    alternative_locations: Vec<Value>,
}

fn json_block() -> &'static Regex {
    static JSON_BLOCK: OnceLock<Regex> = OnceLock::new();
    JSON_BLOCK.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("JSON block regex is valid"))
}

/// Parse the model's reply text.
///
/// A reply without a JSON object, or with malformed JSON, yields an empty
/// result rather than an error: the call itself succeeded, the model just
/// inferred nothing usable.
pub fn parse_reply(text: &str) -> AnalysisResult {
    let Some(block) = json_block().find(text) else {
        tracing::warn!("No JSON object in analysis reply");
        return AnalysisResult::default();
    };

    match serde_json::from_str::<ReplyBody>(block.as_str()) {
        Ok(body) => normalize(body),
        Err(e) => {
            tracing::warn!("Malformed JSON in analysis reply: {}", e);
            AnalysisResult::default()
        }
    }
}

fn normalize(body: ReplyBody) -> AnalysisResult {
    let hashtags = body
        .hashtags
        .into_iter()
        .filter_map(text_of)
        .map(|tag| tag.trim_start_matches('#').to_string())
        .filter(|tag| !tag.is_empty())
        .collect();

    let camera_settings = body
        .camera_settings
        .map(|camera| CameraSettings {
            shutter_speed: text_of(camera.shutter_speed),
            iso: text_of(camera.iso),
            aperture: text_of(camera.aperture),
            reasoning: text_of(camera.reasoning),
        })
        .filter(|camera| !camera.is_empty());

    let location = body
        .location
        .map(|location| LocationGuess {
            primary_location: text_of(location.primary_location),
            alternative_locations: location
                .alternative_locations
                .into_iter()
                .filter_map(text_of)
                .collect(),
        })
        .filter(|location| location.primary_location.is_some() || !location.alternative_locations.is_empty());

    AnalysisResult {
        hashtags,
        camera_settings,
        location,
        error: None,
    }
}

/// Render a loosely typed JSON value as display text
fn text_of(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fenced_reply() {
        let reply = r##"Here you go:
```json
{
  "hashtags": ["#sunset", "beach", "ocean", "", "summer"],
  "camera_settings": {"shutter_speed": "1/500", "iso": 100, "aperture": "f/8", "reasoning": "bright daylight"},
  "location": {"primary_location": "Busan Haeundae", "alternative_locations": ["Busan Gwangalli"]}
}
```"##;
        let result = parse_reply(reply);

        assert_eq!(result.hashtags, vec!["sunset", "beach", "ocean", "summer"]);
        let camera = result.camera_settings.unwrap();
        assert_eq!(camera.iso.as_deref(), Some("100"));
        assert_eq!(camera.shutter_speed.as_deref(), Some("1/500"));
        let location = result.location.unwrap();
        assert_eq!(location.primary_location.as_deref(), Some("Busan Haeundae"));
        assert_eq!(location.alternative_locations, vec!["Busan Gwangalli"]);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_iso_as_string_is_kept() {
        let result = parse_reply(r#"{"camera_settings": {"iso": "ISO 800"}}"#);
        assert_eq!(result.camera_settings.unwrap().iso.as_deref(), Some("ISO 800"));
    }

    #[test]
    fn test_empty_sections_become_none() {
        let result = parse_reply(r#"{"hashtags": ["city"], "camera_settings": {}, "location": {}}"#);
        assert_eq!(result.hashtags, vec!["city"]);
        assert!(result.camera_settings.is_none());
        assert!(result.location.is_none());
    }

    #[test]
    fn test_no_json_yields_empty_result() {
        let result = parse_reply("I cannot analyze this image.");
        assert_eq!(result, AnalysisResult::default());
    }

    #[test]
    fn test_malformed_json_yields_empty_result() {
        let result = parse_reply(r#"{"hashtags": ["a", }"#);
        assert_eq!(result, AnalysisResult::default());
    }
}
