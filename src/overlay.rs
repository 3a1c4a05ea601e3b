//! egui implementations of the image and overlay surfaces.

use crate::mask::MaskPath;
use crate::surface::{OverlaySurface, Surface};
use egui::{Rect, Vec2};

/// Box the display copy of the image is allocated in.
///
/// The requested size is applied on the next frame; what egui actually hands
/// out (snapped to whole points and limited by the space left in the panel)
/// becomes the measurement.
#[derive(Debug, Default)]
pub struct ImageCanvas {
    requested: Option<Vec2>,
    measured: Option<Vec2>,
    pass: u64,
}

impl ImageCanvas {
    /// Allocate the image box in `ui` and record the measurement.
    pub fn layout(&mut self, ui: &mut egui::Ui) -> Option<Rect> {
        let requested = self.requested?;
        let size = requested.min(ui.available_size()).round().max(Vec2::ZERO);
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        self.measured = Some(rect.size());
        self.pass += 1;
        Some(rect)
    }

    pub fn requested(&self) -> Option<Vec2> {
        self.requested
    }
}

impl Surface for ImageCanvas {
    fn request_size(&mut self, size: Vec2) {
        self.requested = Some(size);
        self.measured = None;
    }

    fn measured_size(&self) -> Option<Vec2> {
        self.measured
    }

    fn layout_pass(&self) -> u64 {
        self.pass
    }

    fn clear(&mut self) {
        self.requested = None;
        self.measured = None;
    }
}

/// Fog texture over everything outside the selection.
///
/// The mask is rasterized lazily, at most once per frame, when it changed.
pub struct FogOverlay {
    color: [u8; 4],
    frame: Option<Vec2>,
    mask: MaskPath,
    dirty: bool,
    texture: Option<egui::TextureHandle>,
}

impl FogOverlay {
    pub fn new(color: [u8; 4]) -> Self {
        Self {
            color,
            frame: None,
            mask: MaskPath::default(),
            dirty: false,
            texture: None,
        }
    }

    fn rebuild(&mut self, ctx: &egui::Context) {
        self.dirty = false;
        let pixmap = self.frame.and_then(|frame| {
            let size = [frame.x.round() as u32, frame.y.round() as u32];
            self.mask.rasterize(size, self.color)
        });
        let Some(pixmap) = pixmap else {
            self.texture = None;
            return;
        };
        let image = egui::ColorImage::from_rgba_premultiplied(
            [pixmap.width() as usize, pixmap.height() as usize],
            pixmap.data(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("fog", image, egui::TextureOptions::LINEAR))
            }
        }
    }

    /// Draw the fog over `rect`, the on-screen image box.
    pub fn paint(&mut self, ctx: &egui::Context, painter: &egui::Painter, rect: Rect) {
        if self.dirty {
            self.rebuild(ctx);
        }
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                rect,
                Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
    }
}

impl OverlaySurface for FogOverlay {
    fn set_frame(&mut self, size: Option<Vec2>) {
        self.frame = size;
        self.dirty = true;
    }

    fn set_mask(&mut self, mask: &MaskPath) {
        self.mask = mask.clone();
        self.dirty = true;
    }
}
