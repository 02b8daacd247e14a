//! Text shown under the photo.
//!
//! Embedded values always win over AI estimates; hashtags only ever come from
//! the analyzer.

use std::path::Path;
use std::time::Duration;

use crate::media::exif::EmbeddedMetadata;
use crate::state::data::{AnalysisResult, CameraSettings, LocationGuess, ResultSource};
use crate::state::store::StoreStats;

/// Where the current photo is in the analysis pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisStatus {
    Idle,
    /// Waiting out the debounce delay
    Waiting(Duration),
    Analyzing,
    /// No API key configured
    Unavailable,
    /// Camera and location are embedded, nothing to ask for
    NotNeeded,
    Done {
        result: AnalysisResult,
        source: ResultSource,
    },
}

/// The three info lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLines {
    pub hashtags: String,
    pub camera: String,
    pub location: String,
}

pub fn merge_for_display(embedded: Option<&EmbeddedMetadata>, status: &AnalysisStatus) -> InfoLines {
    let embedded_camera = embedded.filter(|meta| meta.has_camera());
    let embedded_location = embedded.filter(|meta| meta.has_location());

    InfoLines {
        hashtags: format!("📌 Hashtags: {}", hashtag_text(status)),
        camera: match embedded_camera {
            Some(meta) => format!("📷 Camera: {}", embedded_camera_text(meta)),
            None => camera_line(status),
        },
        location: match embedded_location.and_then(|meta| meta.gps) {
            Some(gps) => format!("📍 Location: GPS {}", gps),
            None => location_line(status),
        },
    }
}

fn hashtag_text(status: &AnalysisStatus) -> String {
    match status {
        AnalysisStatus::Idle => "-".to_string(),
        AnalysisStatus::Waiting(delay) => {
            format!("analysis starts in {:.1}s", delay.as_secs_f32())
        }
        AnalysisStatus::Analyzing => "analyzing...".to_string(),
        AnalysisStatus::Unavailable => "API key required".to_string(),
        AnalysisStatus::NotNeeded => "not requested, metadata is embedded".to_string(),
        AnalysisStatus::Done { result, .. } => match &result.error {
            Some(error) => format!("error - {}", error),
            None if result.hashtags.is_empty() => "none generated".to_string(),
            None => {
                let tags: Vec<String> = result.hashtags.iter().map(|tag| format!("#{}", tag)).collect();
                format!("{} (AI estimate)", tags.join(" "))
            }
        },
    }
}

fn camera_line(status: &AnalysisStatus) -> String {
    match status {
        AnalysisStatus::Done { result, .. } if result.is_error() => {
            "📷 Camera: analysis failed".to_string()
        }
        AnalysisStatus::Done { result, .. } => match &result.camera_settings {
            Some(camera) => format!("📷 Estimated: {} (AI estimate)", estimated_camera_text(camera)),
            None => "📷 Camera: not estimated".to_string(),
        },
        other => format!("📷 Camera: {}", pending_text(other)),
    }
}

fn location_line(status: &AnalysisStatus) -> String {
    match status {
        AnalysisStatus::Done { result, .. } if result.is_error() => {
            "📍 Location: analysis failed".to_string()
        }
        AnalysisStatus::Done { result, .. } => match result.location.as_ref().and_then(primary_location) {
            Some(place) => format!("📍 Estimated location: {} (AI estimate)", place),
            None => "📍 Location: not estimated".to_string(),
        },
        other => format!("📍 Location: {}", pending_text(other)),
    }
}

fn pending_text(status: &AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Waiting(_) | AnalysisStatus::Analyzing => "analyzing...",
        AnalysisStatus::Unavailable => "API key required",
        _ => "no information",
    }
}

fn primary_location(location: &LocationGuess) -> Option<&str> {
    location.primary_location.as_deref()
}

fn embedded_camera_text(meta: &EmbeddedMetadata) -> String {
    let mut parts = Vec::new();
    if let Some(exposure) = &meta.exposure_time {
        parts.push(format!("Shutter {}", exposure));
    }
    if let Some(iso) = &meta.iso {
        parts.push(format!("ISO {}", iso));
    }
    if let Some(f_number) = &meta.f_number {
        parts.push(format!("Aperture {}", aperture(f_number)));
    }
    parts.join(" | ")
}

fn estimated_camera_text(camera: &CameraSettings) -> String {
    let mut parts = Vec::new();
    if let Some(shutter) = &camera.shutter_speed {
        parts.push(format!("Shutter {}", shutter));
    }
    if let Some(iso) = &camera.iso {
        parts.push(format!("ISO {}", iso));
    }
    if let Some(f_number) = &camera.aperture {
        parts.push(format!("Aperture {}", aperture(f_number)));
    }
    parts.join(" | ")
}

/// "2.8" and "f/2.8" both render as "f/2.8"
fn aperture(value: &str) -> String {
    if value.to_ascii_lowercase().starts_with('f') {
        value.to_string()
    } else {
        format!("f/{}", value)
    }
}

/// Headline rows above the full EXIF tag list
pub fn embedded_summary(meta: &EmbeddedMetadata) -> Vec<String> {
    let mut rows = Vec::new();
    let body = [meta.make.as_deref(), meta.model.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !body.is_empty() {
        rows.push(format!("Body: {}", body));
    }
    if let Some(focal) = &meta.focal_length {
        rows.push(format!("Focal length: {}", focal));
    }
    if let Some(taken) = &meta.taken_at {
        rows.push(format!("Taken: {}", taken));
    }
    rows
}

/// Reasoning and alternative places from a finished analysis
pub fn analysis_details(status: &AnalysisStatus) -> Vec<String> {
    let AnalysisStatus::Done { result, .. } = status else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    if let Some(reasoning) = result
        .camera_settings
        .as_ref()
        .and_then(|camera| camera.reasoning.as_deref())
    {
        rows.push(format!("Why these settings: {}", reasoning));
    }
    if let Some(location) = &result.location {
        if !location.alternative_locations.is_empty() {
            rows.push(format!(
                "Other possible places: {}",
                location.alternative_locations.join(", ")
            ));
        }
    }
    rows
}

/// Status bar text for a finished analysis
pub fn source_label(source: ResultSource) -> &'static str {
    match source {
        ResultSource::Cache => "Loaded cached analysis",
        ResultSource::Fresh => "AI analysis complete",
        ResultSource::Error => "AI analysis failed",
    }
}

/// Body of the cache info panel
pub fn cache_summary(stats: &StoreStats, delay: Duration) -> Vec<String> {
    vec![
        format!("Analysis delay: {:.1}s", delay.as_secs_f32()),
        "Skipping past a photo before the delay runs out never analyzes it".to_string(),
        format!("Cached entries: {}", stats.entry_count),
        format!("Cache file: {}", stats.backing_path.display()),
        format!(
            "Cache file exists: {}",
            if stats.backing_present { "yes" } else { "no" }
        ),
    ]
}

/// "name (3/12)" title for the current photo
pub fn position_label(path: &Path, index: usize, total: usize) -> String {
    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy();
    format!("{} ({}/{})", name, index + 1, total)
}
