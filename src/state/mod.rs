/// State management module
///
/// This module handles everything the viewer needs to remember between
/// navigation events:
/// - Content fingerprints used as cache keys (fingerprint.rs)
/// - The persistent analysis result cache (store.rs)
/// - Shared result data structures (data.rs)
/// - The debounced analysis scheduler (scheduler.rs)

pub mod data;
pub mod fingerprint;
pub mod scheduler;
pub mod store;
