/// Shared data structures for the analysis pipeline
///
/// These structs flow between the analyzer, the result cache and the UI.
/// They are serialized to JSON in the cache file, so field names are part
/// of the on-disk format.

use serde::{Deserialize, Serialize};

/// Current on-disk format of a cache entry
pub const SCHEMA_VERSION: &str = "1.0";

/// Camera settings inferred from the picture content
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    /// e.g. "1/125"
    pub shutter_speed: Option<String>,
    /// e.g. "400"
    pub iso: Option<String>,
    /// e.g. "f/2.8"
    pub aperture: Option<String>,
    /// Why the model picked these values
    pub reasoning: Option<String>,
}

impl CameraSettings {
    /// True when none of the exposure fields were inferred
    pub fn is_empty(&self) -> bool {
        self.shutter_speed.is_none() && self.iso.is_none() && self.aperture.is_none()
    }
}

/// Location guessed from the picture content
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LocationGuess {
    /// "(city) (place)", e.g. "Paris Eiffel Tower"
    pub primary_location: Option<String>,
    pub alternative_locations: Vec<String>,
}

/// Output of one analysis call
///
/// Every field may be empty. Absence means "not inferred", not failure;
/// only `error` signals that the call itself failed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AnalysisResult {
    pub hashtags: Vec<String>,
    pub camera_settings: Option<CameraSettings>,
    pub location: Option<LocationGuess>,
    pub error: Option<String>,
}

impl AnalysisResult {
    /// A result for a call that failed: no inferred fields, just the message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One persisted cache record, keyed by content fingerprint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub fingerprint: String,
    /// Full path of the image when it was analyzed
    pub source_path: String,
    /// Filename only (e.g., "IMG_0001.jpg")
    pub source_file_name: String,
    pub result: AnalysisResult,
    /// RFC 3339 timestamp; kept as text so unparsable values survive a load
    pub created_at: String,
    pub schema_version: String,
}

/// Where a reported result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Served from the result cache without calling the analyzer
    Cache,
    /// Produced by a fresh analyzer call
    Fresh,
    /// The analyzer call failed; the result carries the error
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_has_no_inferred_fields() {
        let result = AnalysisResult::failed("timeout");
        assert!(result.is_error());
        assert!(result.hashtags.is_empty());
        assert!(result.camera_settings.is_none());
        assert!(result.location.is_none());
    }

    #[test]
    fn test_missing_fields_deserialize_as_empty() {
        let result: AnalysisResult = serde_json::from_str(r#"{"hashtags":["sea"]}"#).unwrap();
        assert_eq!(result.hashtags, vec!["sea".to_string()]);
        assert!(result.camera_settings.is_none());
        assert!(!result.is_error());
    }

    #[test]
    fn test_camera_settings_empty() {
        let mut settings = CameraSettings::default();
        assert!(settings.is_empty());
        settings.reasoning = Some("soft light".into());
        assert!(settings.is_empty());
        settings.iso = Some("200".into());
        assert!(!settings.is_empty());
    }
}
