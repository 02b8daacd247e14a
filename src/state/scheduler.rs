//! Debounced, cache-backed analysis scheduling.
//!
//! The scheduler owns a single "current selection". Navigation commands and the
//! two internal events (`DebounceElapsed`, `AnalysisCompleted`) are handled one
//! at a time on the same task, so none of the handlers need locking. Only the
//! analyzer call itself runs elsewhere, on a blocking worker.
//!
//! ```text
//! on_select ─┬─ cache hit ───────────────────> Ready(Cache)
//!            ├─ embedded metadata complete ──> EmbeddedSufficient
//!            └─ cache miss ──> Debouncing ──timer──> Analyzing ──> Ready(Fresh|Error)
//! ```
//!
//! Skipping to another image aborts the armed timer, so images the user flips
//! past never reach the analyzer. A call that is already running is left to
//! finish. If the user comes back to that photo first, the new selection
//! adopts the running call instead of starting another one; otherwise its
//! completion fails the `is_current` guard and is dropped without touching the
//! cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::data::{AnalysisResult, ResultSource};
use super::store::ResultStore;
use crate::analysis::{AnalysisHints, Analyzer};
use crate::media::exif::{EmbeddedMetadata, MetadataSource};

/// Events the scheduler sends itself from timers and analysis workers
#[derive(Debug)]
pub enum SchedulerEvent {
    DebounceElapsed {
        path: PathBuf,
        ticket: u64,
    },
    AnalysisCompleted {
        path: PathBuf,
        ticket: u64,
        forced: bool,
        result: AnalysisResult,
    },
}

/// Commands from the viewer
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    Select(PathBuf),
    ForceAnalyze(PathBuf),
    SetDelay(Duration),
    ClearCache,
    Shutdown,
}

/// Notifications for the viewer
#[derive(Debug, Clone)]
pub enum SchedulerNotice {
    /// A new selection was taken; carries the embedded metadata read for it
    Selected {
        path: PathBuf,
        embedded: Option<EmbeddedMetadata>,
    },
    /// Camera and location are both embedded, no analysis needed
    EmbeddedSufficient { path: PathBuf },
    /// Cache miss; analysis starts after `delay` unless the selection moves on
    Debouncing { path: PathBuf, delay: Duration },
    Analyzing { path: PathBuf, forced: bool },
    /// Cache miss and no analyzer configured
    AnalyzerUnavailable { path: PathBuf },
    Ready {
        path: PathBuf,
        result: AnalysisResult,
        source: ResultSource,
    },
    /// The cache was emptied on request
    CacheCleared,
}

/// The selection the scheduler currently cares about
#[derive(Debug)]
struct ActiveTarget {
    path: PathBuf,
    hints: AnalysisHints,
    /// Bumped on every analysis launch and on every new selection that has
    /// no analysis running for its path
    ticket: u64,
}

/// An analyzer call that has not reported back yet
#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: u64,
    forced: bool,
}

pub struct AnalysisScheduler {
    store: Arc<ResultStore>,
    analyzer: Option<Arc<dyn Analyzer>>,
    metadata: Arc<dyn MetadataSource>,
    delay: Duration,
    active: Option<ActiveTarget>,
    timer: Option<JoinHandle<()>>,
    /// Latest launch per path; a forced launch replaces a delayed one
    in_flight: HashMap<PathBuf, InFlight>,
    next_ticket: u64,
    events_tx: mpsc::UnboundedSender<SchedulerEvent>,
    events_rx: mpsc::UnboundedReceiver<SchedulerEvent>,
    notices: mpsc::UnboundedSender<SchedulerNotice>,
}

impl AnalysisScheduler {
    /// Create a scheduler. Must be used from within a tokio runtime, since
    /// timers and analysis workers are spawned onto it.
    pub fn new(
        store: Arc<ResultStore>,
        analyzer: Option<Arc<dyn Analyzer>>,
        metadata: Arc<dyn MetadataSource>,
        delay: Duration,
        notices: mpsc::UnboundedSender<SchedulerNotice>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        AnalysisScheduler {
            store,
            analyzer,
            metadata,
            delay,
            active: None,
            timer: None,
            in_flight: HashMap::new(),
            next_ticket: 0,
            events_tx,
            events_rx,
            notices,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Change the debounce delay. Applies to timers armed from now on; a timer
    /// already running keeps its original deadline.
    pub fn set_delay(&mut self, delay: Duration) {
        tracing::info!("Analysis delay changed to {:.1}s", delay.as_secs_f32());
        self.delay = delay;
    }

    /// Path of the current selection, if any
    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|target| target.path.as_path())
    }

    /// Handle the user selecting `path`
    pub fn on_select(&mut self, path: PathBuf) {
        self.cancel_timer();

        // Embedded completeness is decided once, from this single read
        let embedded = self.metadata.read(&path);
        let hints = hints_for(embedded.as_ref());

        // Coming back to a photo whose analysis is still running takes over
        // that call, so its result is accepted when it lands
        let running = self.in_flight.get(&path).copied();
        let ticket = match running {
            Some(call) => call.ticket,
            None => self.bump_ticket(),
        };
        self.active = Some(ActiveTarget {
            path: path.clone(),
            hints,
            ticket,
        });

        self.notify(SchedulerNotice::Selected {
            path: path.clone(),
            embedded,
        });

        // A cached result is shown even when embedded metadata alone would
        // suffice; the display merge decides which fields win
        if let Some(result) = self.store.lookup(&path) {
            self.notify(SchedulerNotice::Ready {
                path,
                result,
                source: ResultSource::Cache,
            });
            return;
        }

        if let Some(call) = running {
            tracing::debug!("Analysis of {} already running", display_name(&path));
            self.notify(SchedulerNotice::Analyzing {
                path,
                forced: call.forced,
            });
            return;
        }

        if hints.is_complete() {
            tracing::debug!("Embedded metadata complete for {}", path.display());
            self.notify(SchedulerNotice::EmbeddedSufficient { path });
            return;
        }

        if self.analyzer.is_none() {
            self.notify(SchedulerNotice::AnalyzerUnavailable { path });
            return;
        }

        self.arm_timer(path.clone(), ticket);
        tracing::info!(
            "Analysis of {} scheduled in {:.1}s",
            display_name(&path),
            self.delay.as_secs_f32()
        );
        self.notify(SchedulerNotice::Debouncing {
            path,
            delay: self.delay,
        });
    }

    /// Analyze `path` right now, ignoring the cache and the debounce delay.
    ///
    /// The result overwrites any cached entry. A debounced analysis of the
    /// same path that is still running is superseded.
    pub fn force_analyze(&mut self, path: PathBuf) {
        self.cancel_timer();

        let hints = match &self.active {
            Some(target) if target.path == path => target.hints,
            _ => {
                // Forcing something other than the current selection makes
                // it the current selection
                hints_for(self.metadata.read(&path).as_ref())
            }
        };

        let ticket = self.bump_ticket();
        self.active = Some(ActiveTarget {
            path: path.clone(),
            hints,
            ticket,
        });

        if self.analyzer.is_none() {
            self.notify(SchedulerNotice::AnalyzerUnavailable { path });
            return;
        }

        tracing::info!("Manual analysis of {}", display_name(&path));
        self.launch_analysis(path, ticket, hints, true);
    }

    /// Apply one internal event
    pub fn handle_event(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::DebounceElapsed { path, ticket } => {
                self.timer = None;
                if !self.is_current(&path, ticket) {
                    tracing::debug!("Stale timer for {} ignored", display_name(&path));
                    return;
                }

                let Some(hints) = self.active.as_ref().map(|target| target.hints) else {
                    return;
                };
                let ticket = self.bump_ticket();
                if let Some(target) = self.active.as_mut() {
                    target.ticket = ticket;
                }
                tracing::info!("Delayed analysis started: {}", display_name(&path));
                self.launch_analysis(path, ticket, hints, false);
            }
            SchedulerEvent::AnalysisCompleted {
                path,
                ticket,
                forced,
                result,
            } => {
                if self.in_flight.get(&path).is_some_and(|call| call.ticket == ticket) {
                    self.in_flight.remove(&path);
                }

                if !self.is_current(&path, ticket) {
                    tracing::debug!(
                        "Discarding stale {} result for {}",
                        if forced { "manual" } else { "delayed" },
                        display_name(&path)
                    );
                    return;
                }

                let source = if result.is_error() {
                    ResultSource::Error
                } else {
                    ResultSource::Fresh
                };

                if let Err(e) = self.store.put(&path, result.clone()) {
                    tracing::warn!("Could not cache result for {}: {}", path.display(), e);
                }

                self.notify(SchedulerNotice::Ready {
                    path,
                    result,
                    source,
                });
            }
        }
    }

    /// Wait for the next internal event.
    ///
    /// Never returns `None` in practice: the scheduler holds its own sender.
    pub async fn next_event(&mut self) -> Option<SchedulerEvent> {
        self.events_rx.recv().await
    }

    /// Wait for one internal event and apply it
    #[cfg(test)]
    pub async fn step(&mut self) {
        if let Some(event) = self.next_event().await {
            self.handle_event(event);
        }
    }

    /// Drive the scheduler from a command channel until shutdown
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SchedulerCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(SchedulerCommand::Select(path)) => self.on_select(path),
                        Some(SchedulerCommand::ForceAnalyze(path)) => self.force_analyze(path),
                        Some(SchedulerCommand::SetDelay(delay)) => self.set_delay(delay),
                        Some(SchedulerCommand::ClearCache) => {
                            if let Err(e) = self.store.clear() {
                                tracing::error!("Failed to clear cache: {}", e);
                            }
                            self.notify(SchedulerNotice::CacheCleared);
                        }
                        Some(SchedulerCommand::Shutdown) | None => break,
                    }
                }
                Some(event) = self.next_event() => self.handle_event(event),
            }
        }

        self.cancel_timer();
        if let Err(e) = self.store.flush() {
            tracing::error!("Cache flush on shutdown failed: {}", e);
        }
        tracing::info!("Analysis scheduler stopped");
    }

    /// The one relevance check applied at every asynchronous re-entry point
    fn is_current(&self, path: &Path, ticket: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|target| target.path == path && target.ticket == ticket)
    }

    fn bump_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn arm_timer(&mut self, path: PathBuf, ticket: u64) {
        debug_assert!(self.timer.is_none(), "timer armed twice");
        let delay = self.delay;
        let tx = self.events_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SchedulerEvent::DebounceElapsed { path, ticket });
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            tracing::debug!("Analysis timer cancelled");
        }
    }

    fn launch_analysis(&mut self, path: PathBuf, ticket: u64, hints: AnalysisHints, forced: bool) {
        let Some(analyzer) = self.analyzer.clone() else {
            return;
        };

        self.notify(SchedulerNotice::Analyzing {
            path: path.clone(),
            forced,
        });
        self.in_flight.insert(path.clone(), InFlight { ticket, forced });

        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let worker_path = path.clone();
            let outcome =
                tokio::task::spawn_blocking(move || analyzer.analyze(&worker_path, hints)).await;

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    tracing::error!("Analysis of {} failed: {}", path.display(), e);
                    AnalysisResult::failed(e.to_string())
                }
                Err(join_error) => {
                    tracing::error!("Analysis worker for {} died: {}", path.display(), join_error);
                    AnalysisResult::failed(format!("analysis worker failed: {join_error}"))
                }
            };

            let _ = tx.send(SchedulerEvent::AnalysisCompleted {
                path,
                ticket,
                forced,
                result,
            });
        });
    }

    fn notify(&self, notice: SchedulerNotice) {
        // The viewer going away just means nobody is listening anymore
        let _ = self.notices.send(notice);
    }
}

impl Drop for AnalysisScheduler {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

fn hints_for(embedded: Option<&EmbeddedMetadata>) -> AnalysisHints {
    AnalysisHints {
        has_embedded_camera: embedded.is_some_and(EmbeddedMetadata::has_camera),
        has_embedded_location: embedded.is_some_and(EmbeddedMetadata::has_location),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
