/// AI image analysis
///
/// This module handles:
/// - Building the analysis prompt from what the photo is missing (prompt.rs)
/// - Parsing the model's reply into an `AnalysisResult` (response.rs)
/// - Calling the vision API over HTTP (client.rs)

pub mod client;
pub mod prompt;
pub mod response;

use std::path::Path;

use crate::error::AnalysisError;
use crate::state::data::AnalysisResult;

pub use client::OpenAiAnalyzer;

/// What the photo already carries, so the analyzer only infers the rest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisHints {
    pub has_embedded_camera: bool,
    pub has_embedded_location: bool,
}

impl AnalysisHints {
    /// Both camera settings and location are embedded
    pub fn is_complete(&self) -> bool {
        self.has_embedded_camera && self.has_embedded_location
    }
}

/// The external analysis call.
///
/// Implementations block (network I/O) and are always run on a blocking
/// worker, never on the interactive path.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze(&self, path: &Path, hints: AnalysisHints) -> Result<AnalysisResult, AnalysisError>;
}
