//! Native vs. display pixel space.

use crate::config::DisplayBounds;
use egui::Vec2;

/// Largest box the display copy may occupy for the given viewport.
pub fn display_limit(viewport: Vec2, bounds: &DisplayBounds) -> Vec2 {
    egui::vec2(
        (viewport.x * bounds.viewport_width_fraction).min(bounds.max_width),
        (viewport.y * bounds.viewport_height_fraction).min(bounds.max_height),
    )
}

/// Size to request for the display copy of a `native`-sized image.
///
/// Aspect-preserving, downscale only: an image that already fits is shown at
/// its native size.
pub fn fit_display_size(native: [u32; 2], viewport: Vec2, bounds: &DisplayBounds) -> Vec2 {
    let limit = display_limit(viewport, bounds);
    let (w, h) = (native[0] as f32, native[1] as f32);
    if w > limit.x || h > limit.y {
        let scale = (limit.x / w).min(limit.y / h);
        egui::vec2(w * scale, h * scale)
    } else {
        egui::vec2(w, h)
    }
}

/// native ÷ display, per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub w: f64,
    pub h: f64,
}

impl ScaleFactors {
    /// `None` unless both factors come out positive and finite.
    pub fn new(native: [u32; 2], display: Vec2) -> Option<Self> {
        let w = f64::from(native[0]) / f64::from(display.x);
        let h = f64::from(native[1]) / f64::from(display.y);
        let valid = |s: f64| s.is_finite() && s > 0.0;
        (valid(w) && valid(h)).then_some(Self { w, h })
    }
}

/// Geometry of the current image once it has been laid out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageMetrics {
    pub native: [u32; 2],
    pub display: Vec2,
    pub scale: ScaleFactors,
}

impl ImageMetrics {
    pub fn new(native: [u32; 2], display: Vec2) -> Option<Self> {
        let scale = ScaleFactors::new(native, display)?;
        Some(Self {
            native,
            display,
            scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn bounds(max_width: f32, max_height: f32) -> DisplayBounds {
        DisplayBounds {
            max_width,
            max_height,
            ..DisplayBounds::default()
        }
    }

    #[test]
    fn test_default_limit_uses_viewport_fractions() {
        let limit = display_limit(egui::vec2(1000.0, 600.0), &DisplayBounds::default());
        assert_eq!(limit, egui::vec2(800.0, 480.0));

        let limit = display_limit(egui::vec2(500.0, 2000.0), &DisplayBounds::default());
        assert_eq!(limit, egui::vec2(450.0, 700.0));
    }

    #[test]
    fn test_large_image_keeps_aspect_within_bounds() {
        let viewport = egui::vec2(1920.0, 1080.0);
        for native in [[1600, 1200], [4000, 300], [300, 4000], [801, 701], [3000, 3000]] {
            let limit = display_limit(viewport, &DisplayBounds::default());
            let size = fit_display_size(native, viewport, &DisplayBounds::default());
            let native_ratio = native[0] as f32 / native[1] as f32;
            assert!(
                (size.x / size.y - native_ratio).abs() < EPS * native_ratio,
                "{native:?} -> {size:?}"
            );
            assert!(size.x <= limit.x + EPS && size.y <= limit.y + EPS);
        }
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let size = fit_display_size(
            [640, 480],
            egui::vec2(1920.0, 1080.0),
            &DisplayBounds::default(),
        );
        assert_eq!(size, egui::vec2(640.0, 480.0));
    }

    #[test]
    fn test_fit_1600x1200_into_900x700() {
        let size = fit_display_size(
            [1600, 1200],
            egui::vec2(10_000.0, 10_000.0),
            &bounds(900.0, 700.0),
        );
        assert!((size.x - 900.0).abs() < EPS);
        assert!((size.y - 675.0).abs() < EPS);
    }

    #[test]
    fn test_scale_factors_reject_zero_display() {
        assert!(ScaleFactors::new([100, 100], egui::vec2(0.0, 50.0)).is_none());
        assert!(ScaleFactors::new([0, 100], egui::vec2(50.0, 50.0)).is_none());

        let scale = ScaleFactors::new([1600, 1200], egui::vec2(900.0, 675.0)).unwrap();
        assert!((scale.w - 1600.0 / 900.0).abs() < 1e-12);
        assert!((scale.h - 1200.0 / 675.0).abs() < 1e-12);
    }
}
