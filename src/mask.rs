//! Fog drawn over everything outside the selected quadrilateral.

use egui::{Pos2, Vec2};
use std::fmt::Write as _;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

/// One polyline of the mask path.
#[derive(Clone, Debug, PartialEq)]
pub struct SubPath {
    pub vertices: Vec<Pos2>,
    pub closed: bool,
}

/// Outer display rectangle with the selection as an even-odd hole.
///
/// Empty until the display size and all four points are known.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaskPath {
    subpaths: Vec<SubPath>,
}

impl MaskPath {
    pub fn build(display: Option<Vec2>, centers: Option<&[Pos2]>) -> Self {
        let (Some(size), Some(centers)) = (display, centers) else {
            return Self::default();
        };
        if size.x <= 0.0 || size.y <= 0.0 || centers.len() < 4 {
            return Self::default();
        }
        let outer = SubPath {
            vertices: vec![
                egui::pos2(0.0, 0.0),
                egui::pos2(size.x, 0.0),
                egui::pos2(size.x, size.y),
                egui::pos2(0.0, size.y),
            ],
            closed: true,
        };
        let hole = SubPath {
            vertices: centers[..4].to_vec(),
            closed: true,
        };
        Self {
            subpaths: vec![outer, hole],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.is_empty()
    }

    pub fn subpaths(&self) -> &[SubPath] {
        &self.subpaths
    }

    pub fn outer(&self) -> Option<&SubPath> {
        self.subpaths.first()
    }

    pub fn hole(&self) -> Option<&SubPath> {
        self.subpaths.get(1)
    }

    /// SVG path data, e.g. `M0,0 H900 V675 H0 Z M8,8 L892,8 L892,667 L8,667 Z`.
    pub fn to_path_data(&self) -> String {
        let (Some(outer), Some(hole)) = (self.outer(), self.hole()) else {
            return String::new();
        };
        let size = outer.vertices[2];
        let mut d = format!("M0,0 H{} V{} H0 Z ", size.x, size.y);
        for (i, p) in hole.vertices.iter().enumerate() {
            let cmd = if i == 0 { 'M' } else { 'L' };
            let _ = write!(d, "{cmd}{},{} ", p.x, p.y);
        }
        d.push('Z');
        d
    }

    /// Fill the mask into a `size`-sized pixmap with the even-odd rule.
    ///
    /// Returns `None` for an empty mask or a degenerate size.
    pub fn rasterize(&self, size: [u32; 2], color: [u8; 4]) -> Option<Pixmap> {
        if self.is_empty() {
            return None;
        }
        let mut pb = PathBuilder::new();
        for sub in &self.subpaths {
            let (first, rest) = sub.vertices.split_first()?;
            pb.move_to(first.x, first.y);
            for p in rest {
                pb.line_to(p.x, p.y);
            }
            if sub.closed {
                pb.close();
            }
        }
        let path = pb.finish()?;

        let mut pixmap = Pixmap::new(size[0], size[1])?;
        let mut paint = Paint::default();
        paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
        Some(pixmap)
    }
}
