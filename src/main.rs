use iced::widget::{button, column, container, row, scrollable, text, text_input, Column};
use iced::{Alignment, ContentFit, Element, Length, Task, Theme};
use rfd::FileDialog;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use filter_studio::blob::BlobRegistry;
use filter_studio::config::AppConfig;
use filter_studio::state::data::{ImageRecord, WorkingImage};
use filter_studio::state::gallery::GalleryListing;
use filter_studio::state::library::Library;
use filter_studio::state::session::StagingSession;
use filter_studio::transform::{ImageEngine, TransformPipeline};

type ImageHandle = iced::widget::image::Handle;
type ImageWidget = iced::widget::Image<ImageHandle>;

const THUMBNAIL_SIZE: f32 = 160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Editor,
    Gallery,
}

/// Main application state
struct FilterStudio {
    session: StagingSession,
    config: AppConfig,
    page: Page,
    /// Rendered working image
    preview: Option<ImageHandle>,
    /// Gallery records with their display references
    gallery: GalleryListing,
    /// Decoded once per gallery refresh, keyed by record ID
    thumbnails: HashMap<i64, ImageHandle>,
    save_name: String,
    /// Record waiting for delete confirmation
    pending_delete: Option<i64>,
    /// An operation on the working image is in flight
    busy: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    ShowPage(Page),
    Upload,
    Loaded(Result<WorkingImage, String>),
    /// Index into the configured filter catalog
    ApplyFilter(usize),
    FilterApplied(Result<WorkingImage, String>),
    SaveNameChanged(String),
    Save,
    Saved(Result<i64, String>),
    Download,
    Downloaded(Result<(usize, PathBuf), String>),
    RefreshGallery,
    GalleryLoaded(Result<Vec<ImageRecord>, String>),
    EditRecord(i64),
    ExportRecord(i64),
    Exported(Result<(usize, PathBuf), String>),
    DeleteRecord(i64),
    ConfirmDelete,
    CancelDelete,
    Deleted(Result<i64, String>),
}

impl FilterStudio {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = AppConfig::load().unwrap_or_else(|e| {
            log::error!("{}; falling back to default configuration", e);
            AppConfig::default()
        });

        // The editor is useless without its gallery, so give up early
        let library = match &config.gallery.database_path {
            Some(path) => Library::open(path),
            None => Library::open_default(),
        }
        .expect("Failed to open gallery database. Check permissions and disk space.");

        let image_count = library.count().unwrap_or(0);
        log::info!("🎨 Filter Studio initialized with {} gallery images", image_count);

        let registry = BlobRegistry::new();
        let pipeline = TransformPipeline::new(Arc::new(ImageEngine::new()), registry.clone())
            .with_timeout(config.transform.timeout());
        let session = StagingSession::new(library, registry.clone(), pipeline);

        let app = FilterStudio {
            session,
            config,
            page: Page::Editor,
            preview: None,
            gallery: GalleryListing::new(registry),
            thumbnails: HashMap::new(),
            save_name: String::new(),
            pending_delete: None,
            busy: false,
            status: format!("Ready. {} images in gallery.", image_count),
        };

        (app, Task::done(Message::RefreshGallery))
    }

    fn show_working(&mut self, working: &WorkingImage) {
        self.preview = Some(ImageHandle::from_bytes(working.source.clone()));
    }

    fn refresh_gallery(&self) -> Task<Message> {
        let session = self.session.clone();
        let order = self.config.gallery.default_order;
        Task::perform(
            async move { session.list_gallery(order).await.map_err(|e| e.to_string()) },
            Message::GalleryLoaded,
        )
    }

    fn report(&mut self, context: &str, error: String) {
        log::error!("{}: {}", context, error);
        self.status = format!("{}: {}", context, error);
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ShowPage(page) => {
                self.page = page;
                self.pending_delete = None;
                if page == Page::Gallery {
                    return self.refresh_gallery();
                }
                Task::none()
            }
            Message::Upload => {
                let file = FileDialog::new()
                    .set_title("Choose an image")
                    .add_filter("Images", &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff"])
                    .add_filter("All files", &["*"])
                    .pick_file();

                let Some(path) = file else {
                    return Task::none();
                };

                self.busy = true;
                self.status = format!("Loading {}...", path.display());
                let session = self.session.clone();
                Task::perform(
                    async move { session.load_from_upload(path).await.map_err(|e| e.to_string()) },
                    Message::Loaded,
                )
            }
            Message::Loaded(result) => {
                self.busy = false;
                match result {
                    Ok(working) => {
                        self.show_working(&working);
                        self.page = Page::Editor;
                        self.status = "Image loaded.".to_string();
                    }
                    Err(e) => self.report("Could not load image", e),
                }
                Task::none()
            }
            Message::ApplyFilter(index) => {
                let Some(filter) = self.config.filters.get(index).copied() else {
                    return Task::none();
                };

                self.busy = true;
                self.status = format!("Applying {}...", filter.label());
                let session = self.session.clone();
                Task::perform(
                    async move { session.run_filter(&filter).await.map_err(|e| e.to_string()) },
                    Message::FilterApplied,
                )
            }
            Message::FilterApplied(result) => {
                self.busy = false;
                match result {
                    Ok(working) => {
                        self.show_working(&working);
                        self.status = "Filter applied.".to_string();
                    }
                    Err(e) => self.report("Filter failed", e),
                }
                Task::none()
            }
            Message::SaveNameChanged(name) => {
                self.save_name = name;
                Task::none()
            }
            Message::Save => {
                let name = Some(self.save_name.trim().to_string()).filter(|n| !n.is_empty());

                self.busy = true;
                let session = self.session.clone();
                Task::perform(
                    async move { session.save_to_gallery(name).await.map_err(|e| e.to_string()) },
                    Message::Saved,
                )
            }
            Message::Saved(result) => {
                self.busy = false;
                match result {
                    Ok(id) => {
                        self.save_name.clear();
                        self.status = format!("✅ Saved to gallery (#{}).", id);
                        return self.refresh_gallery();
                    }
                    Err(e) => self.report("Could not save image", e),
                }
                Task::none()
            }
            Message::Download => {
                let file = FileDialog::new()
                    .set_title("Save image as")
                    .set_file_name(self.config.download.default_filename.as_str())
                    .save_file();

                let Some(path) = file else {
                    return Task::none();
                };

                self.busy = true;
                let session = self.session.clone();
                Task::perform(
                    async move {
                        session
                            .download_current(&path)
                            .await
                            .map(|written| (written, path))
                            .map_err(|e| e.to_string())
                    },
                    Message::Downloaded,
                )
            }
            Message::Downloaded(result) => {
                self.busy = false;
                match result {
                    Ok((written, path)) => {
                        self.status = format!("Wrote {} bytes to {}.", written, path.display());
                    }
                    Err(e) => self.report("Download failed", e),
                }
                Task::none()
            }
            Message::RefreshGallery => self.refresh_gallery(),
            Message::GalleryLoaded(result) => {
                match result {
                    Ok(records) => {
                        self.gallery.replace(records);
                        self.thumbnails = self
                            .gallery
                            .entries()
                            .iter()
                            .filter_map(|entry| {
                                let bytes = self.gallery.display_bytes(entry)?;
                                Some((entry.record.id, ImageHandle::from_bytes(bytes)))
                            })
                            .collect();
                        log::debug!(
                            "Gallery refreshed: {} images, {} live references",
                            self.gallery.len(),
                            self.session.registry().live_count()
                        );
                    }
                    Err(e) => self.report("Could not load gallery", e),
                }
                Task::none()
            }
            Message::EditRecord(id) => {
                let Some(record) = self.gallery.get(id).map(|entry| entry.record.clone()) else {
                    return Task::none();
                };

                match self.session.load_from_gallery(&record) {
                    Ok(working) => {
                        self.show_working(&working);
                        self.page = Page::Editor;
                        self.status = format!("Editing \"{}\".", record.name);
                    }
                    Err(e) => self.report("Could not open image", e.to_string()),
                }
                Task::none()
            }
            Message::ExportRecord(id) => {
                let Some(entry) = self.gallery.get(id) else {
                    return Task::none();
                };
                let suggested = entry
                    .record
                    .download_name(&self.config.download.gallery_filename);

                let file = FileDialog::new()
                    .set_title("Save image as")
                    .set_file_name(suggested.as_str())
                    .save_file();

                let Some(path) = file else {
                    return Task::none();
                };

                let session = self.session.clone();
                Task::perform(
                    async move {
                        session
                            .export_record(id, &path)
                            .await
                            .map(|written| (written, path))
                            .map_err(|e| e.to_string())
                    },
                    Message::Exported,
                )
            }
            Message::Exported(result) => {
                match result {
                    Ok((written, path)) => {
                        self.status = format!("Wrote {} bytes to {}.", written, path.display());
                    }
                    Err(e) => self.report("Download failed", e),
                }
                Task::none()
            }
            Message::DeleteRecord(id) => {
                self.pending_delete = Some(id);
                Task::none()
            }
            Message::CancelDelete => {
                self.pending_delete = None;
                Task::none()
            }
            Message::ConfirmDelete => {
                let Some(id) = self.pending_delete.take() else {
                    return Task::none();
                };

                let session = self.session.clone();
                Task::perform(
                    async move {
                        session
                            .delete_from_gallery(id)
                            .await
                            .map(|()| id)
                            .map_err(|e| e.to_string())
                    },
                    Message::Deleted,
                )
            }
            Message::Deleted(result) => {
                match result {
                    Ok(id) => self.status = format!("Deleted image #{}.", id),
                    Err(e) => self.report("Could not delete image", e),
                }
                // Refresh either way: a failed delete may mean the listing is stale
                self.refresh_gallery()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let nav = row![
            button("Editor")
                .on_press_maybe((self.page != Page::Editor).then_some(Message::ShowPage(Page::Editor)))
                .padding(8),
            button(text(format!("Gallery ({})", self.gallery.len())))
                .on_press_maybe((self.page != Page::Gallery).then_some(Message::ShowPage(Page::Gallery)))
                .padding(8),
        ]
        .spacing(10);

        let page = match self.page {
            Page::Editor => self.editor_view(),
            Page::Gallery => self.gallery_view(),
        };

        let content: Column<Message> = column![
            text("Filter Studio").size(36),
            nav,
            page,
            text(&self.status).size(16),
        ]
        .spacing(20)
        .padding(30);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn editor_view(&self) -> Element<Message> {
        let has_image = self.preview.is_some();
        let idle = !self.busy;

        let canvas: Element<Message> = match &self.preview {
            Some(handle) => ImageWidget::new(handle.clone())
                .content_fit(ContentFit::Contain)
                .width(Length::Fill)
                .height(Length::Fill)
                .into(),
            None => text("Upload an image to start editing").size(20).into(),
        };

        let preview = container(canvas)
            .width(Length::FillPortion(3))
            .height(Length::Fixed(480.0))
            .center_x(Length::FillPortion(3))
            .center_y(Length::Fixed(480.0));

        let filters = self
            .config
            .filters
            .iter()
            .enumerate()
            .fold(
                column![text("Filters to apply").size(20)].spacing(10),
                |col, (index, filter)| {
                    col.push(
                        button(text(filter.label()))
                            .on_press_maybe((has_image && idle).then_some(Message::ApplyFilter(index)))
                            .width(Length::Fill)
                            .padding(10),
                    )
                },
            )
            .width(Length::FillPortion(1));

        let actions = row![
            button("Upload")
                .on_press_maybe(idle.then_some(Message::Upload))
                .padding(10),
            text_input("Image name (optional)", &self.save_name)
                .on_input(Message::SaveNameChanged)
                .padding(10)
                .width(Length::Fixed(260.0)),
            button("Save to gallery")
                .on_press_maybe((has_image && idle).then_some(Message::Save))
                .padding(10),
            button("Download")
                .on_press_maybe((has_image && idle).then_some(Message::Download))
                .padding(10),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        column![row![preview, filters].spacing(20), actions]
            .spacing(20)
            .into()
    }

    fn gallery_view(&self) -> Element<Message> {
        if self.gallery.is_empty() {
            return text("No saved images yet.").size(20).into();
        }

        let cards: Vec<Element<Message>> = self
            .gallery
            .entries()
            .iter()
            .map(|entry| {
                let record = &entry.record;
                let thumbnail: Element<Message> = match self.thumbnails.get(&record.id) {
                    Some(handle) => ImageWidget::new(handle.clone())
                        .content_fit(ContentFit::Cover)
                        .width(Length::Fixed(THUMBNAIL_SIZE))
                        .height(Length::Fixed(THUMBNAIL_SIZE))
                        .into(),
                    None => text("?").into(),
                };

                let controls: Element<Message> = if self.pending_delete == Some(record.id) {
                    row![
                        text("Delete?"),
                        button("Yes").on_press(Message::ConfirmDelete),
                        button("No").on_press(Message::CancelDelete),
                    ]
                    .spacing(6)
                    .align_y(Alignment::Center)
                    .into()
                } else {
                    row![
                        button("Edit").on_press_maybe((!self.busy).then_some(Message::EditRecord(record.id))),
                        button("Download").on_press(Message::ExportRecord(record.id)),
                        button("Delete").on_press(Message::DeleteRecord(record.id)),
                    ]
                    .spacing(6)
                    .into()
                };

                column![
                    thumbnail,
                    text(record.name.clone()).size(14),
                    text(record.date.format("%Y-%m-%d %H:%M").to_string()).size(12),
                    controls,
                ]
                .spacing(6)
                .width(Length::Fixed(THUMBNAIL_SIZE + 80.0))
                .into()
            })
            .collect();

        let grid = iced_aw::Wrap::with_elements(cards)
            .spacing(16.0)
            .line_spacing(16.0);

        scrollable(grid).height(Length::Fill).into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Compact terminal logger: `[HH:MM:SS LEVEL file:line] message`.
/// `RUST_LOG` overrides the default `info` level.
fn init_logger() {
    use std::io::Write;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wgpu_core", log::LevelFilter::Warn)
        .filter_module("wgpu_hal", log::LevelFilter::Warn)
        .filter_module("naga", log::LevelFilter::Warn)
        .filter_module("cosmic_text", log::LevelFilter::Warn)
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "[{} {style}{}{style:#} {}:{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record
                    .file()
                    .unwrap_or("None")
                    .split('/')
                    .next_back()
                    .unwrap_or("None"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

fn main() -> iced::Result {
    init_logger();

    iced::application("Filter Studio", FilterStudio::update, FilterStudio::view)
        .theme(FilterStudio::theme)
        .centered()
        .run_with(FilterStudio::new)
}
