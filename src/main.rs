use iced::futures::{SinkExt, Stream};
use iced::keyboard::{self, key};
use iced::widget::{
    button, column, container, horizontal_space, image, pick_list, row, scrollable, text, Column,
};
use iced::{window, Alignment, ContentFit, Element, Length, Subscription, Task, Theme};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

// Declare the application modules
mod analysis;
mod config;
mod error;
mod logging;
mod media;
mod state;
mod ui;

use analysis::{Analyzer, OpenAiAnalyzer};
use config::{DelayPreset, Settings};
use media::exif::{EmbeddedMetadata, ExifReader};
use media::preview::{load_preview_async, PreviewImage};
use media::scan::{list_images, IMAGE_EXTENSIONS};
use state::scheduler::{AnalysisScheduler, SchedulerCommand, SchedulerNotice};
use state::store::{ResultStore, StoreStats};
use ui::info::{
    analysis_details, cache_summary, embedded_summary, merge_for_display, position_label,
    source_label, AnalysisStatus,
};

/// Used when the platform has no cache directory
const FALLBACK_CACHE_FILE: &str = "ai_analysis_cache.json";

/// Connection from the viewer to the scheduler worker
#[derive(Debug, Clone)]
struct SchedulerHandle {
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    store: Arc<ResultStore>,
}

impl SchedulerHandle {
    fn send(&self, command: SchedulerCommand) {
        if self.commands.send(command).is_err() {
            tracing::error!("Analysis scheduler is not running");
        }
    }
}

/// Output of the scheduler subscription
#[derive(Debug, Clone)]
enum WorkerEvent {
    /// The store and scheduler are up
    Ready(SchedulerHandle),
    Notice(SchedulerNotice),
}

/// Images of one folder plus the one to show first
#[derive(Debug, Clone)]
struct FolderListing {
    images: Vec<PathBuf>,
    selected: Option<PathBuf>,
}

/// Main application state
struct PhotoLens {
    settings: Settings,
    /// Set once the scheduler worker reports in
    handle: Option<SchedulerHandle>,
    images: Vec<PathBuf>,
    current: Option<usize>,
    preview: Option<image::Handle>,
    preview_error: Option<String>,
    embedded: Option<EmbeddedMetadata>,
    analysis: AnalysisStatus,
    delay: DelayPreset,
    show_cache_info: bool,
    cache_stats: Option<StoreStats>,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    OpenFolder,
    OpenImage,
    FolderScanned(Result<FolderListing, String>),
    Next,
    Prev,
    First,
    Last,
    PreviewLoaded(PathBuf, Result<PreviewImage, String>),
    DelayChosen(DelayPreset),
    /// Analyze the current photo now, ignoring the cache
    Reanalyze,
    ClearCache,
    ToggleCacheInfo,
    Worker(WorkerEvent),
    CloseRequested(window::Id),
}

impl PhotoLens {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let delay = settings.delay();
        tracing::info!("🎨 Photo Lens started, analysis delay {}", delay);

        (
            PhotoLens {
                settings,
                handle: None,
                images: Vec::new(),
                current: None,
                preview: None,
                preview_error: None,
                embedded: None,
                analysis: AnalysisStatus::Idle,
                delay,
                show_cache_info: false,
                cache_stats: None,
                status: "Open a folder or an image to start.".to_string(),
            },
            Task::none(),
        )
    }

    fn title(&self) -> String {
        match self.current_path() {
            Some(path) => format!(
                "Photo Lens - {}",
                position_label(path, self.current.unwrap_or_default(), self.images.len())
            ),
            None => "Photo Lens".to_string(),
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenFolder => {
                let Some(folder) = FileDialog::new().set_title("Select Photo Folder").pick_folder() else {
                    return Task::none();
                };
                self.status = format!("Scanning {}...", folder.display());
                Task::perform(scan_folder(folder, None), Message::FolderScanned)
            }
            Message::OpenImage => {
                let Some(file) = FileDialog::new()
                    .set_title("Select Photo")
                    .add_filter("Images", &IMAGE_EXTENSIONS)
                    .pick_file()
                else {
                    return Task::none();
                };
                let Some(folder) = file.parent().map(PathBuf::from) else {
                    return Task::none();
                };
                self.status = format!("Scanning {}...", folder.display());
                Task::perform(scan_folder(folder, Some(file)), Message::FolderScanned)
            }
            Message::FolderScanned(Ok(listing)) => {
                self.images = listing.images;
                if self.images.is_empty() {
                    self.current = None;
                    self.preview = None;
                    self.embedded = None;
                    self.analysis = AnalysisStatus::Idle;
                    self.status = "No images in this folder.".to_string();
                    return Task::none();
                }
                let index = listing
                    .selected
                    .and_then(|selected| self.images.iter().position(|path| *path == selected))
                    .unwrap_or(0);
                self.select(index)
            }
            Message::FolderScanned(Err(e)) => {
                tracing::error!("Folder scan failed: {}", e);
                self.status = format!("❌ Cannot read folder: {}", e);
                Task::none()
            }
            Message::Next => match self.current {
                Some(index) if index + 1 < self.images.len() => self.select(index + 1),
                _ => Task::none(),
            },
            Message::Prev => match self.current {
                Some(index) if index > 0 => self.select(index - 1),
                _ => Task::none(),
            },
            Message::First => match self.current {
                Some(index) if index != 0 => self.select(0),
                _ => Task::none(),
            },
            Message::Last => match self.current {
                Some(index) if index + 1 != self.images.len() => self.select(self.images.len() - 1),
                _ => Task::none(),
            },
            Message::PreviewLoaded(path, result) => {
                if self.current_path() != Some(&path) {
                    return Task::none();
                }
                match result {
                    Ok(preview) => {
                        self.preview = Some(image::Handle::from_rgba(
                            preview.width,
                            preview.height,
                            preview.pixels,
                        ));
                    }
                    Err(e) => {
                        tracing::warn!("⚠️  Cannot display {}: {}", path.display(), e);
                        self.preview_error = Some(e);
                    }
                }
                Task::none()
            }
            Message::DelayChosen(delay) => {
                self.delay = delay;
                if let Some(handle) = &self.handle {
                    handle.send(SchedulerCommand::SetDelay(delay.duration()));
                }
                self.settings.analysis_delay_secs = delay.secs();
                if let Err(e) = self.settings.save() {
                    tracing::warn!("⚠️  Could not save settings: {}", e);
                }
                self.status = format!("Analysis delay set to {}", delay);
                Task::none()
            }
            Message::Reanalyze => {
                if let (Some(handle), Some(path)) = (&self.handle, self.current_path()) {
                    handle.send(SchedulerCommand::ForceAnalyze(path.clone()));
                }
                Task::none()
            }
            Message::ClearCache => {
                let confirmed = MessageDialog::new()
                    .set_title("Clear Cache")
                    .set_description("Delete all cached analysis results?")
                    .set_buttons(MessageButtons::YesNo)
                    .show();
                if matches!(confirmed, MessageDialogResult::Yes) {
                    if let Some(handle) = &self.handle {
                        handle.send(SchedulerCommand::ClearCache);
                    }
                }
                Task::none()
            }
            Message::ToggleCacheInfo => {
                self.show_cache_info = !self.show_cache_info;
                self.refresh_stats();
                Task::none()
            }
            Message::Worker(WorkerEvent::Ready(handle)) => {
                if let Some(path) = self.current_path() {
                    handle.send(SchedulerCommand::Select(path.clone()));
                }
                self.handle = Some(handle);
                self.refresh_stats();
                Task::none()
            }
            Message::Worker(WorkerEvent::Notice(notice)) => {
                self.on_notice(notice);
                Task::none()
            }
            Message::CloseRequested(id) => {
                if let Some(handle) = &self.handle {
                    handle.send(SchedulerCommand::Shutdown);
                    if let Err(e) = handle.store.flush() {
                        tracing::error!("Cache flush on exit failed: {}", e);
                    }
                }
                window::close(id)
            }
        }
    }

    /// Show the image at `index` and hand it to the scheduler
    fn select(&mut self, index: usize) -> Task<Message> {
        let path = self.images[index].clone();
        self.current = Some(index);
        self.preview = None;
        self.preview_error = None;
        self.embedded = None;
        self.analysis = AnalysisStatus::Idle;
        self.status = position_label(&path, index, self.images.len());

        if let Some(handle) = &self.handle {
            handle.send(SchedulerCommand::Select(path.clone()));
        }

        Task::perform(
            load_preview_async(path.clone(), self.settings.preview_max_edge),
            move |result| Message::PreviewLoaded(path.clone(), result),
        )
    }

    fn on_notice(&mut self, notice: SchedulerNotice) {
        match notice {
            SchedulerNotice::CacheCleared => {
                self.status = "🗑  Cache cleared".to_string();
                self.refresh_stats();
            }
            SchedulerNotice::Selected { path, embedded } if self.is_current(&path) => {
                self.embedded = embedded;
            }
            SchedulerNotice::EmbeddedSufficient { path } if self.is_current(&path) => {
                self.analysis = AnalysisStatus::NotNeeded;
            }
            SchedulerNotice::Debouncing { path, delay } if self.is_current(&path) => {
                self.analysis = AnalysisStatus::Waiting(delay);
            }
            SchedulerNotice::Analyzing { path, forced } if self.is_current(&path) => {
                self.analysis = AnalysisStatus::Analyzing;
                self.status = if forced {
                    "Re-analyzing...".to_string()
                } else {
                    "Analyzing...".to_string()
                };
            }
            SchedulerNotice::AnalyzerUnavailable { path } if self.is_current(&path) => {
                self.analysis = AnalysisStatus::Unavailable;
            }
            SchedulerNotice::Ready {
                path,
                result,
                source,
            } if self.is_current(&path) => {
                self.status = source_label(source).to_string();
                self.analysis = AnalysisStatus::Done { result, source };
                self.refresh_stats();
            }
            stale => tracing::debug!("Ignoring notice for another photo: {:?}", stale),
        }
    }

    fn current_path(&self) -> Option<&PathBuf> {
        self.current.and_then(|index| self.images.get(index))
    }

    fn is_current(&self, path: &Path) -> bool {
        self.current_path().map(PathBuf::as_path) == Some(path)
    }

    fn refresh_stats(&mut self) {
        if self.show_cache_info {
            self.cache_stats = self.handle.as_ref().map(|handle| handle.store.stats());
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let has_prev = self.current.is_some_and(|index| index > 0);
        let has_next = self.current.is_some_and(|index| index + 1 < self.images.len());
        let can_analyze = self.handle.is_some() && self.current.is_some();

        let toolbar = row![
            button("Open Folder").on_press(Message::OpenFolder),
            button("Open Image").on_press(Message::OpenImage),
            button("◀ Prev").on_press_maybe(has_prev.then_some(Message::Prev)),
            button("Next ▶").on_press_maybe(has_next.then_some(Message::Next)),
            horizontal_space(),
            text("Analysis delay:"),
            pick_list(DelayPreset::ALL, Some(self.delay), Message::DelayChosen),
            button("Re-analyze").on_press_maybe(can_analyze.then_some(Message::Reanalyze)),
            button("Cache Info").on_press(Message::ToggleCacheInfo),
            button("Clear Cache").on_press_maybe(self.handle.is_some().then_some(Message::ClearCache)),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let photo: Element<Message> = match (&self.preview, &self.preview_error) {
            (Some(handle), _) => image(handle.clone())
                .content_fit(ContentFit::Contain)
                .width(Length::Fill)
                .height(Length::Fill)
                .into(),
            (None, Some(e)) => text(format!("⚠️  Cannot display image: {}", e)).into(),
            (None, None) if self.current.is_some() => text("Loading...").into(),
            _ => text("No photo selected").size(20).into(),
        };

        let lines = merge_for_display(self.embedded.as_ref(), &self.analysis);
        let info = column![
            text(lines.hashtags).size(16),
            text(lines.camera).size(16),
            text(lines.location).size(16),
        ]
        .spacing(6);

        let main_panel = column![
            container(photo)
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x(Length::Fill)
                .center_y(Length::Fill),
            info,
        ]
        .spacing(12)
        .width(Length::Fill);

        let mut side_panel = column![text("EXIF").size(18), scrollable(self.exif_rows()).height(Length::Fill)]
            .spacing(10)
            .width(320);

        if self.show_cache_info {
            let summary: Column<Message> = match &self.cache_stats {
                Some(stats) => cache_summary(stats, self.delay.duration())
                    .into_iter()
                    .fold(column![text("💰 Cache").size(18)].spacing(4), |col, line| {
                        col.push(text(line).size(13))
                    }),
                None => column![text("Cache not ready").size(13)],
            };
            side_panel = side_panel.push(summary);
        }

        let content = column![
            toolbar,
            row![main_panel, side_panel].spacing(20).height(Length::Fill),
            text(&self.status).size(14),
        ]
        .spacing(12)
        .padding(16);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn exif_rows(&self) -> Column<Message> {
        let details = analysis_details(&self.analysis)
            .into_iter()
            .fold(column![].spacing(4), |col, line| col.push(text(line).size(13)));

        let exif = match &self.embedded {
            Some(meta) if !meta.tags.is_empty() => embedded_summary(meta)
                .into_iter()
                .chain(meta.tags.iter().map(|(name, value)| format!("{}: {}", name, value)))
                .fold(column![].spacing(4), |col, line| col.push(text(line).size(13))),
            _ => column![text("No EXIF data").size(13)],
        };

        column![details, exif].spacing(12)
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            Subscription::run_with_id("analysis-scheduler", scheduler_worker(self.settings.clone()))
                .map(Message::Worker),
            keyboard::on_key_press(handle_key),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    dotenv::dotenv().ok();
    if let Err(e) = logging::init() {
        eprintln!("⚠️  Logging to file disabled: {}", e);
    }

    iced::application(PhotoLens::title, PhotoLens::update, PhotoLens::view)
        .subscription(PhotoLens::subscription)
        .theme(PhotoLens::theme)
        .exit_on_close_request(false)
        .centered()
        .run_with(PhotoLens::new)
}

fn handle_key(key: keyboard::Key, _modifiers: keyboard::Modifiers) -> Option<Message> {
    match key {
        keyboard::Key::Named(key::Named::ArrowRight) => Some(Message::Next),
        keyboard::Key::Named(key::Named::ArrowLeft) => Some(Message::Prev),
        keyboard::Key::Named(key::Named::Home) => Some(Message::First),
        keyboard::Key::Named(key::Named::End) => Some(Message::Last),
        _ => None,
    }
}

/// List a folder on the blocking pool
async fn scan_folder(folder: PathBuf, selected: Option<PathBuf>) -> Result<FolderListing, String> {
    let images = tokio::task::spawn_blocking(move || list_images(&folder))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| e.to_string())?;
    Ok(FolderListing { images, selected })
}

/// Builds the store and scheduler, reports the handle, then forwards notices
fn scheduler_worker(settings: Settings) -> impl Stream<Item = WorkerEvent> {
    iced::stream::channel(64, move |mut output| async move {
        let cache_path = settings
            .cache_path
            .clone()
            .or_else(ResultStore::default_location)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_FILE));
        let store = Arc::new(ResultStore::open(cache_path));
        tracing::info!("Analysis cache at {}", store.path().display());

        if let Some(days) = settings.evict_after_days {
            store.evict_older_than(days);
        }

        let analyzer = match OpenAiAnalyzer::new(config::api_key(), settings.client_config()) {
            Ok(analyzer) => Some(Arc::new(analyzer) as Arc<dyn Analyzer>),
            Err(e) => {
                tracing::warn!("⚠️  AI analysis disabled: {}", e);
                None
            }
        };

        let (notices_tx, mut notices) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let scheduler = AnalysisScheduler::new(
            store.clone(),
            analyzer,
            Arc::new(ExifReader),
            settings.delay().duration(),
            notices_tx,
        );
        tokio::spawn(scheduler.run(commands_rx));

        if output
            .send(WorkerEvent::Ready(SchedulerHandle { commands, store }))
            .await
            .is_err()
        {
            return;
        }

        while let Some(notice) = notices.recv().await {
            if output.send(WorkerEvent::Notice(notice)).await.is_err() {
                break;
            }
        }
    })
}
