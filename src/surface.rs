//! What the session needs from the things it draws on.

use crate::mask::MaskPath;
use egui::Vec2;
use std::time::{Duration, Instant};

/// The box the display copy of the image is laid out in.
///
/// A requested size only shows up in `measured_size` after the next layout
/// pass has run.
pub trait Surface {
    fn request_size(&mut self, size: Vec2);

    /// Size measured by the most recent layout pass, if any.
    fn measured_size(&self) -> Option<Vec2>;

    /// Counter bumped by every completed layout pass.
    fn layout_pass(&self) -> u64;

    /// Drop any requested size and measurement.
    fn clear(&mut self);
}

/// The layer the fog mask is drawn on.
pub trait OverlaySurface {
    /// Coordinate frame of the overlay, matching the measured image size.
    fn set_frame(&mut self, size: Option<Vec2>);

    fn set_mask(&mut self, mask: &MaskPath);
}

/// One-shot wait for the first layout pass after a size request.
///
/// Settles once a pass newer than the one seen at arming time has run, or
/// when the upper bound elapses, whichever comes first. Layout hosts give no
/// stronger ordering guarantee than this.
#[derive(Clone, Copy, Debug)]
pub struct LayoutSettle {
    armed_at_pass: u64,
    deadline: Instant,
}

impl LayoutSettle {
    pub fn arm(current_pass: u64, now: Instant, bound: Duration) -> Self {
        Self {
            armed_at_pass: current_pass,
            deadline: now + bound,
        }
    }

    pub fn is_settled(&self, current_pass: u64, now: Instant) -> bool {
        current_pass > self.armed_at_pass || now >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
