//! The four corner markers and their drag state.
//!
//! Positions are kept the way a dragged marker reports them: a fixed base
//! placement plus the accumulated drag offset. The logical point is the centre
//! of the marker square.

use egui::{Pos2, Rect, Vec2};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// Evaluation order, also the winding order of the selection outline.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CornerPoint {
    pub base: Pos2,
    pub offset: Vec2,
}

impl CornerPoint {
    /// Top-left of the marker square.
    pub fn origin(&self) -> Pos2 {
        self.base + self.offset
    }
}

/// Corner markers in display space.
#[derive(Clone, Debug)]
pub struct PointStore {
    marker_size: f32,
    /// Rectangle the markers are restricted to, set on initialization
    container: Option<Vec2>,
    points: [CornerPoint; 4],
}

impl PointStore {
    pub fn new(marker_size: f32) -> Self {
        Self {
            marker_size,
            container: None,
            points: [CornerPoint::default(); 4],
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.container.is_some()
    }

    /// Place the markers in the corners of a `display`-sized container, fully
    /// inside it, with no drag offset. A side shorter than one marker pins
    /// the markers to 0 on that axis.
    pub fn initialize(&mut self, display: Vec2) {
        let m = self.marker_size;
        let right = (display.x - m).max(0.0);
        let bottom = (display.y - m).max(0.0);
        self.points = [
            egui::pos2(0.0, 0.0),
            egui::pos2(right, 0.0),
            egui::pos2(right, bottom),
            egui::pos2(0.0, bottom),
        ]
        .map(|base| CornerPoint {
            base,
            offset: Vec2::ZERO,
        });
        self.container = Some(display);
        log::debug!("Corners initialized for {}x{}", display.x, display.y);
    }

    /// Forget all points, e.g. when a new image replaces the current one.
    pub fn clear(&mut self) {
        self.container = None;
        self.points = [CornerPoint::default(); 4];
    }

    pub fn point(&self, corner: Corner) -> Option<&CornerPoint> {
        self.container?;
        Some(&self.points[corner.index()])
    }

    /// Accumulate one pointer-move sample into a marker's offset.
    ///
    /// The marker square is restricted to the container after every sample.
    /// Returns `false` when there is nothing to drag yet.
    pub fn apply_drag(&mut self, corner: Corner, delta: Vec2) -> bool {
        let Some(container) = self.container else {
            return false;
        };
        let max = egui::pos2(
            (container.x - self.marker_size).max(0.0),
            (container.y - self.marker_size).max(0.0),
        );
        let point = &mut self.points[corner.index()];
        let wanted = point.origin() + delta;
        let clamped = wanted.clamp(Pos2::ZERO, max);
        point.offset = clamped - point.base;
        true
    }

    /// Centre of one marker, the logical selection vertex.
    pub fn center(&self, corner: Corner) -> Option<Pos2> {
        let half = self.marker_size / 2.0;
        self.point(corner)
            .map(|p| p.origin() + egui::vec2(half, half))
    }

    pub fn centers(&self) -> Option<[Pos2; 4]> {
        self.container?;
        let half = egui::vec2(self.marker_size / 2.0, self.marker_size / 2.0);
        Some(self.points.map(|p| p.origin() + half))
    }

    /// `[x1, y1, .., x4, y4]` in TL, TR, BR, BL order.
    pub fn display_coords(&self) -> Option<[f32; 8]> {
        let centers = self.centers()?;
        let mut out = [0.0; 8];
        for (i, c) in centers.iter().enumerate() {
            out[i * 2] = c.x;
            out[i * 2 + 1] = c.y;
        }
        Some(out)
    }

    /// Marker square in display space.
    pub fn marker_rect(&self, corner: Corner) -> Option<Rect> {
        self.point(corner).map(|p| {
            Rect::from_min_size(p.origin(), egui::vec2(self.marker_size, self.marker_size))
        })
    }
}
