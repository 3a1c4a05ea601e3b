//! What gets sent to the processing service.

use crate::error::ValidationError;
use crate::geometry::ImageMetrics;
use crate::loader::ImageFile;
use crate::transform::to_native_space;

#[derive(Clone, Debug)]
pub struct SubmissionPayload {
    pub image_file: ImageFile,
    /// Native-space `[TLx, TLy, TRx, TRy, BRx, BRy, BLx, BLy]`
    pub points: [f64; 8],
    pub original_width: u32,
    pub original_height: u32,
}

impl SubmissionPayload {
    /// Check the submit preconditions in order and build the payload.
    pub fn build(
        file: Option<&ImageFile>,
        display_points: Option<[f32; 8]>,
        metrics: Option<&ImageMetrics>,
    ) -> Result<Self, ValidationError> {
        let file = file.ok_or(ValidationError::NoFile)?;
        let display_points = display_points.ok_or(ValidationError::PointsNotReady)?;
        let metrics = metrics.ok_or(ValidationError::ScaleUndefined)?;

        Ok(Self {
            image_file: file.clone(),
            points: to_native_space(&display_points, metrics.scale),
            original_width: metrics.native[0],
            original_height: metrics.native[1],
        })
    }

    /// The `points` form field.
    pub fn points_json(&self) -> String {
        serde_json::Value::from(self.points.to_vec()).to_string()
    }
}
