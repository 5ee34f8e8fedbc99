use std::path::PathBuf;

use iced::widget::{button, column, container, image, row, scrollable, text};
use iced::{Alignment, Element, Length, Task, Theme};
use rfd::FileDialog;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use filter_viewer::gpu::{GpuTarget, RenderTarget, SoftwareTarget};
use filter_viewer::image_io;
use filter_viewer::render::PassPipeline;
use filter_viewer::state::data::SourceImage;
use filter_viewer::state::filter::{FilterKind, FilterSelector, ParamUpdate};
use filter_viewer::state::settings::{RenderBackend, ViewerSettings};

mod ui;

type Backend = Box<dyn RenderTarget + Send>;

/// Main application state
struct FilterViewer {
    /// Renders the active filter over the loaded image
    pipeline: PassPipeline<Backend>,
    /// Which filter is on, and every filter's parameters
    selector: FilterSelector,
    settings: ViewerSettings,
    /// Last rendered frame, ready for display
    preview: Option<image::Handle>,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// User clicked "Open Image"
    OpenImage,
    /// Background decode finished
    ImageLoaded(Result<SourceImage, String>),
    /// User clicked "Save Image"
    SaveImage,
    /// Background encode finished
    ImageSaved(Result<PathBuf, String>),
    /// A filter's enable checkbox changed
    ToggleFilter(FilterKind, bool),
    /// User clicked "Show Original"; turn every filter off
    ShowOriginal,
    /// A slider or picker of the active filter changed
    Parameter(ParamUpdate),
    /// A slider was released; write the session to disk
    PersistSettings,
}

impl FilterViewer {
    fn new(settings: ViewerSettings, target: Backend) -> (Self, Task<Message>) {
        let backend = target.describe();
        let viewer = FilterViewer {
            pipeline: PassPipeline::new(target),
            selector: settings.session.clone(),
            settings,
            preview: None,
            status: format!("Ready ({backend}). Open an image to start."),
        };
        (viewer, Task::none())
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenImage => {
                let mut dialog = FileDialog::new()
                    .set_title("Open Image")
                    .add_filter("Images", image_io::OPEN_EXTENSIONS);
                if let Some(dir) = &self.settings.last_directory {
                    dialog = dialog.set_directory(dir);
                }

                if let Some(path) = dialog.pick_file() {
                    self.status = format!("Loading {}...", path.display());
                    self.remember_directory(&path);
                    return Task::perform(image_io::load_image_async(path), Message::ImageLoaded);
                }
                Task::none()
            }
            Message::ImageLoaded(Ok(image)) => {
                match self.pipeline.load_image(&image) {
                    Ok(_) => {
                        self.status = format!("Loaded {}x{} image.", image.width(), image.height());
                        self.refresh();
                    }
                    Err(e) => {
                        self.preview = None;
                        self.status = format!("Could not upload image: {e}");
                    }
                }
                Task::none()
            }
            Message::ImageLoaded(Err(e)) => {
                self.status = format!("Could not open image: {e}");
                Task::none()
            }
            Message::SaveImage => {
                let frame = match self.pipeline.save_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        self.status = format!("Nothing to save: {e}");
                        return Task::none();
                    }
                };

                let mut dialog = FileDialog::new()
                    .set_title("Save Image")
                    .add_filter("Images", image_io::SAVE_EXTENSIONS)
                    .set_file_name(image_io::default_save_name());
                if let Some(dir) = &self.settings.last_directory {
                    dialog = dialog.set_directory(dir);
                }

                if let Some(path) = dialog.save_file() {
                    self.status = format!("Saving {}...", path.display());
                    self.remember_directory(&path);
                    return Task::perform(image_io::save_frame_async(path, frame), Message::ImageSaved);
                }
                Task::none()
            }
            Message::ImageSaved(result) => {
                self.status = match result {
                    Ok(path) => format!("Saved {}", path.display()),
                    Err(e) => format!("Could not save image: {e}"),
                };
                Task::none()
            }
            Message::ToggleFilter(kind, enabled) => {
                self.selector.toggle(kind, enabled);
                self.persist();
                self.refresh();
                Task::none()
            }
            Message::ShowOriginal => {
                self.selector.clear();
                self.persist();
                self.refresh();
                Task::none()
            }
            Message::Parameter(update) => {
                if let Err(e) = self.selector.update_parameter(update) {
                    warn!(error = %e, "parameter ignored");
                    self.status = e.to_string();
                }
                self.refresh();
                Task::none()
            }
            Message::PersistSettings => {
                self.persist();
                Task::none()
            }
        }
    }

    /// Re-render the current image with the current filter
    fn refresh(&mut self) {
        if !self.pipeline.has_image() {
            return;
        }
        match self.pipeline.render_selector(&self.selector) {
            Ok(frame) => {
                self.preview = Some(image::Handle::from_rgba(frame.width, frame.height, frame.pixels));
            }
            Err(e) => {
                self.status = format!("Render failed: {e}");
            }
        }
    }

    fn remember_directory(&mut self, path: &std::path::Path) {
        self.settings.last_directory = path.parent().map(|p| p.to_path_buf());
        self.persist();
    }

    fn persist(&mut self) {
        self.settings.session = self.selector.clone();
        if let Err(e) = self.settings.save() {
            warn!(error = %e, "failed to save settings");
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let actions = row![
            button("Open Image").on_press(Message::OpenImage).padding(10),
            button("Save Image").on_press(Message::SaveImage).padding(10),
            button("Show Original").on_press(Message::ShowOriginal).padding(10),
        ]
        .spacing(10);

        let controls = column![actions, ui::panel::filter_panel(&self.selector)]
            .spacing(20)
            .padding(20)
            .width(Length::Fixed(320.0));

        let preview: Element<Message> = match &self.preview {
            Some(handle) => scrollable(image(handle.clone())).into(),
            None => container(text("No image loaded").size(20))
                .center_x(Length::Fill)
                .center_y(Length::Fill)
                .into(),
        };

        let content = column![
            row![scrollable(controls), container(preview).width(Length::Fill).height(Length::Fill)]
                .spacing(10)
                .height(Length::Fill),
            text(&self.status).size(14),
        ]
        .spacing(10)
        .padding(10)
        .align_x(Alignment::Start);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Pick the rendering backend, falling back to software without a GPU
fn create_target(backend: RenderBackend) -> Backend {
    match backend {
        RenderBackend::Software => Box::new(SoftwareTarget::new()),
        RenderBackend::Gpu => match pollster::block_on(GpuTarget::new()) {
            Ok(target) => Box::new(target),
            Err(e) => {
                warn!(error = %e, "GPU unavailable, using the software renderer");
                Box::new(SoftwareTarget::new())
            }
        },
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let settings = ViewerSettings::load_or_default();
    let target = create_target(settings.backend);
    info!(backend = %target.describe(), "filter viewer starting");

    iced::application("Filter Viewer", FilterViewer::update, FilterViewer::view)
        .theme(FilterViewer::theme)
        .centered()
        .run_with(move || FilterViewer::new(settings, target))
}
