/// Viewer presentation helpers
///
/// This module handles:
/// - Merging embedded metadata with analysis results for the info lines
/// - Cache panel and status text

pub mod info;
