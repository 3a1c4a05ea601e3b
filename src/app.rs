use crate::backend::Backend;
use crate::config::Config;
use crate::dispatch::{Completion, Dispatcher};
use crate::error::Result;
use crate::overlay::{FogOverlay, ImageCanvas};
use crate::points::Corner;
use crate::session::{Event, Session};
use eframe::egui;
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const SELECTION_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 120, 255);

/// Largest texture side uploaded for the display copy.
const MAX_TEXTURE_SIDE: u32 = 2048;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

enum Action {
    Open,
    OpenPath(PathBuf),
    ResetCorners,
    Submit,
    SaveProcessed,
}

pub struct CornerCropApp {
    session: Session<ImageCanvas, FogOverlay>,
    dispatcher: Dispatcher,
    endpoint: String,
    texture: Option<egui::TextureHandle>,
    /// `bytes://` URI the current processed image is registered under
    processed_uri: Option<String>,
    pending_open: Option<PathBuf>,
}

impl CornerCropApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: Config,
        backend: Arc<dyn Backend>,
        initial_image: Option<PathBuf>,
    ) -> Result<Self> {
        egui_extras::install_image_loaders(&cc.egui_ctx);
        let endpoint = config.backend_url.clone();
        let fog = FogOverlay::new(config.fog_color);
        let session = Session::builder(config)
            .surface(ImageCanvas::default())
            .overlay(fog)
            .build()?;
        Ok(Self {
            session,
            dispatcher: Dispatcher::new(backend),
            endpoint,
            texture: None,
            processed_uri: None,
            pending_open: initial_image,
        })
    }

    fn open_image(&mut self, ctx: &egui::Context, path: PathBuf) {
        self.texture = None;
        self.session.handle(Event::LoadStarted { path: path.clone() });
        let ctx = ctx.clone();
        self.dispatcher
            .load(self.session.generation(), path, MAX_TEXTURE_SIDE, move || {
                ctx.request_repaint()
            });
    }

    fn complete(&mut self, ctx: &egui::Context, done: Completion) {
        match done {
            Completion::Loaded {
                generation,
                result: Ok(image),
            } => {
                if self.session.is_current(generation) {
                    self.texture = Some(upload_texture(ctx, &image.pixels));
                }
                self.session.handle(Event::ImageLoaded {
                    generation,
                    image,
                    viewport: ctx.screen_rect().size(),
                    now: Instant::now(),
                });
            }
            Completion::Loaded {
                generation,
                result: Err(error),
            } => {
                self.session
                    .handle(Event::ImageLoadFailed { generation, error });
            }
            Completion::Processed { generation, result } => {
                self.session
                    .handle(Event::SubmitFinished { generation, result });
            }
        }
    }

    fn submit(&mut self, ctx: &egui::Context) {
        if let Some(submission) = self.session.handle(Event::SubmitRequested) {
            let ctx = ctx.clone();
            self.dispatcher
                .dispatch(submission.generation, submission.payload, move || {
                    ctx.request_repaint()
                });
        }
    }

    fn save_processed(&self) {
        let Some(processed) = self.session.processed() else {
            return;
        };
        let stem = self
            .session
            .file()
            .and_then(|f| f.path.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("image")
            .to_string();
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(format!("{stem}_processed.{}", processed.extension()))
            .save_file()
        else {
            return;
        };
        match std::fs::write(&path, &processed.bytes) {
            Ok(()) => log::info!("Saved processed image to {}", path.display()),
            Err(e) => log::error!("Could not save {}: {e}", path.display()),
        }
    }

    fn apply(&mut self, ctx: &egui::Context, action: Action) {
        match action {
            Action::Open => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_file()
                {
                    self.open_image(ctx, path);
                }
            }
            Action::OpenPath(path) => self.open_image(ctx, path),
            Action::ResetCorners => {
                self.session.handle(Event::ResetCorners);
            }
            Action::Submit => self.submit(ctx),
            Action::SaveProcessed => self.save_processed(),
        }
    }

    /// Keep the image loader in step with the session's processed result.
    fn sync_processed(&mut self, ctx: &egui::Context) {
        let revision = self.session.processed_revision();
        let Some(processed) = self.session.processed() else {
            if let Some(old) = self.processed_uri.take() {
                ctx.forget_image(&old);
            }
            return;
        };
        let uri = format!("bytes://processed-{revision}.{}", processed.extension());
        if self.processed_uri.as_deref() == Some(uri.as_str()) {
            return;
        }
        if let Some(old) = self.processed_uri.take() {
            ctx.forget_image(&old);
        }
        ctx.include_bytes(uri.clone(), processed.bytes.clone());
        self.processed_uri = Some(uri);
    }

    fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let Some(rect) = self.session.surface_mut().layout(ui) else {
            ui.centered_and_justified(|ui| {
                ui.label("Open an image (Ctrl+O) or drop one here.");
            });
            return;
        };
        let image_rect = self
            .session
            .metrics()
            .map(|m| egui::Rect::from_min_size(rect.min, m.display))
            .unwrap_or(rect);
        let offset = image_rect.min.to_vec2();

        // Drags first so everything below paints the updated points
        let mut hovered = None;
        for corner in Corner::ALL {
            let Some(marker) = self.session.points().marker_rect(corner) else {
                continue;
            };
            let response = ui
                .interact(
                    marker.translate(offset),
                    ui.id().with(("corner", corner.index())),
                    egui::Sense::drag(),
                )
                .on_hover_cursor(egui::CursorIcon::Grab);
            if response.dragged() {
                let delta = response.drag_delta();
                if delta != egui::Vec2::ZERO {
                    self.session.handle(Event::DragMoved {
                        corner,
                        dx: delta.x,
                        dy: delta.y,
                    });
                }
            }
            if response.dragged() || response.hovered() {
                hovered = Some(corner);
            }
        }

        let painter = ui.painter_at(image_rect);
        painter.rect_filled(image_rect, 0.0, egui::Color32::from_gray(40));
        if let Some(tex) = &self.texture {
            painter.image(
                tex.id(),
                image_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        if self.session.metrics().is_none() {
            return;
        }
        self.session
            .overlay_mut()
            .paint(ui.ctx(), &painter, image_rect);

        if let Some(centers) = self.session.points().centers() {
            let outline = centers.iter().map(|c| *c + offset).collect();
            painter.add(egui::Shape::closed_line(
                outline,
                egui::Stroke::new(1.5, SELECTION_COLOR),
            ));
        }
        for corner in Corner::ALL {
            let Some(marker) = self.session.points().marker_rect(corner) else {
                continue;
            };
            let marker = marker.translate(offset);
            let alpha = if hovered == Some(corner) { 200 } else { 110 };
            painter.rect_filled(
                marker,
                2.0,
                egui::Color32::from_rgba_unmultiplied(0, 120, 255, alpha),
            );
            painter.rect_stroke(
                marker,
                2.0,
                egui::Stroke::new(1.5, egui::Color32::WHITE),
                egui::StrokeKind::Inside,
            );
        }
    }
}

fn upload_texture(ctx: &egui::Context, pixels: &RgbaImage) -> egui::TextureHandle {
    let size = [pixels.width() as usize, pixels.height() as usize];
    let color_image =
        egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_flat_samples().as_slice());
    ctx.load_texture("image", color_image, egui::TextureOptions::LINEAR)
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for CornerCropApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Some(done) = self.dispatcher.try_recv() {
            self.complete(ctx, done);
        }
        if let Some(path) = self.pending_open.take() {
            self.open_image(ctx, path);
        }
        self.sync_processed(ctx);

        let mut actions = Vec::new();

        // Keyboard shortcuts and dropped files
        ctx.input(|i| {
            if i.modifiers.command && i.key_pressed(egui::Key::O) {
                actions.push(Action::Open);
            }
            if i.modifiers.command && i.key_pressed(egui::Key::Enter) {
                actions.push(Action::Submit);
            }
            if i.modifiers.command && i.key_pressed(egui::Key::S) {
                actions.push(Action::SaveProcessed);
            }
            if i.modifiers.command && i.key_pressed(egui::Key::R) {
                actions.push(Action::ResetCorners);
            }
            if let Some(path) = i.raw.dropped_files.iter().find_map(|f| f.path.clone()) {
                actions.push(Action::OpenPath(path));
            }
        });

        // Top toolbar
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open…").clicked() {
                    actions.push(Action::Open);
                }
                ui.separator();
                let ready = self.session.metrics().is_some();
                if ui
                    .add_enabled(ready, egui::Button::new("Reset corners"))
                    .clicked()
                {
                    actions.push(Action::ResetCorners);
                }
                let in_flight = self.session.in_flight();
                let label = if in_flight { "Processing…" } else { "Submit" };
                if ui
                    .add_enabled(!in_flight, egui::Button::new(label))
                    .clicked()
                {
                    actions.push(Action::Submit);
                }
                ui.separator();
                if ui
                    .add_enabled(
                        self.session.processed().is_some(),
                        egui::Button::new("Save result…"),
                    )
                    .clicked()
                {
                    actions.push(Action::SaveProcessed);
                }
                if let Some(m) = self.session.metrics() {
                    ui.separator();
                    ui.label(format!(
                        "{}×{} shown at {:.0}×{:.0}",
                        m.native[0], m.native[1], m.display.x, m.display.y
                    ));
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(&self.endpoint);
                });
            });
        });

        // Status line
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            let status = self.session.status();
            let text = egui::RichText::new(status.to_string());
            if status.is_error() {
                ui.label(text.color(ui.visuals().error_fg_color));
            } else {
                ui.label(text);
            }
        });

        for action in actions {
            self.apply(ctx, action);
        }

        // Processed result
        if let Some(uri) = self.processed_uri.clone() {
            egui::SidePanel::right("processed")
                .resizable(true)
                .default_width(360.0)
                .show(ctx, |ui| {
                    ui.heading("Result");
                    if let Some(p) = self.session.processed() {
                        ui.label(format!("{}×{}", p.size[0], p.size[1]));
                    }
                    egui::ScrollArea::both().show(ui, |ui| {
                        ui.add(egui::Image::new(uri.as_str()).shrink_to_fit());
                    });
                });
        }

        // Canvas
        egui::CentralPanel::default().show(ctx, |ui| self.draw_canvas(ui));

        self.session.handle(Event::FrameLaidOut {
            now: Instant::now(),
        });
        if self.session.settle_deadline().is_some() {
            ctx.request_repaint();
        }
    }
}
