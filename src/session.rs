//! State of the current image session and the single-threaded event handler
//! that drives it.
//!
//! Every state change goes through [`Session::handle`], one event at a time,
//! in the order the UI produced them. A new image (or a failed load) resets
//! the whole session.

use crate::backend::ProcessedImage;
use crate::config::Config;
use crate::error::{Error, Result, ValidationError};
use crate::geometry::{fit_display_size, ImageMetrics};
use crate::loader::{ImageFile, LoadedImage};
use crate::mask::MaskPath;
use crate::points::{Corner, PointStore};
use crate::submit::SubmissionPayload;
use crate::surface::{LayoutSettle, OverlaySurface, Surface};
use egui::Vec2;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// The status line.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Idle,
    Loading,
    Ready,
    Processing,
    Processed,
    Failed(String),
}

impl Status {
    pub fn is_error(&self) -> bool {
        matches!(self, Status::Failed(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => f.write_str("Open an image to begin."),
            Status::Loading => f.write_str("Loading image..."),
            Status::Ready => f.write_str("Image loaded. Adjust points."),
            Status::Processing => f.write_str("Processing..."),
            Status::Processed => f.write_str("Image processed successfully!"),
            Status::Failed(message) => f.write_str(message),
        }
    }
}

pub enum Event {
    /// A file was picked; reading and decoding happen elsewhere.
    LoadStarted {
        path: PathBuf,
    },
    ImageLoaded {
        generation: u64,
        image: LoadedImage,
        viewport: Vec2,
        now: Instant,
    },
    ImageLoadFailed {
        generation: u64,
        error: Error,
    },
    /// A frame finished layout; drives the post-resize measurement.
    FrameLaidOut {
        now: Instant,
    },
    DragMoved {
        corner: Corner,
        dx: f32,
        dy: f32,
    },
    ResetCorners,
    SubmitRequested,
    SubmitFinished {
        generation: u64,
        result: Result<ProcessedImage>,
    },
}

/// A validated request, to be handed to the backend.
#[derive(Debug)]
pub struct Submission {
    pub generation: u64,
    pub payload: SubmissionPayload,
}

pub struct SessionBuilder<S, O> {
    config: Config,
    surface: Option<S>,
    overlay: Option<O>,
}

impl<S: Surface, O: OverlaySurface> SessionBuilder<S, O> {
    pub fn surface(mut self, surface: S) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn overlay(mut self, overlay: O) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn build(self) -> Result<Session<S, O>> {
        let surface = self
            .surface
            .ok_or_else(|| Error::configuration("image surface is not attached"))?;
        let overlay = self
            .overlay
            .ok_or_else(|| Error::configuration("overlay surface is not attached"))?;
        let marker_size = self.config.marker_size;
        if !(marker_size.is_finite() && marker_size > 0.0) {
            return Err(Error::configuration(format!(
                "corner marker size must be positive, got {marker_size}"
            )));
        }
        Ok(Session {
            points: PointStore::new(marker_size),
            config: self.config,
            surface,
            overlay,
            file: None,
            native: None,
            metrics: None,
            mask: MaskPath::default(),
            settle: None,
            status: Status::Idle,
            processed: None,
            processed_revision: 0,
            in_flight: false,
            generation: 0,
        })
    }
}

pub struct Session<S, O> {
    config: Config,
    surface: S,
    overlay: O,

    file: Option<ImageFile>,
    native: Option<[u32; 2]>,
    metrics: Option<ImageMetrics>,
    points: PointStore,
    mask: MaskPath,
    settle: Option<LayoutSettle>,

    status: Status,
    processed: Option<ProcessedImage>,
    /// Bumped for every accepted result, never reset
    processed_revision: u64,
    in_flight: bool,
    /// Bumped on every reset; completions from older generations are stale
    generation: u64,
}

impl<S: Surface, O: OverlaySurface> Session<S, O> {
    pub fn builder(config: Config) -> SessionBuilder<S, O> {
        SessionBuilder {
            config,
            surface: None,
            overlay: None,
        }
    }

    /// Apply one event. Returns a submission when the event asks for one and
    /// the preconditions hold.
    pub fn handle(&mut self, event: Event) -> Option<Submission> {
        match event {
            Event::LoadStarted { path } => {
                log::info!("Loading {}", path.display());
                self.reset();
                self.status = Status::Loading;
            }
            Event::ImageLoaded {
                generation,
                image,
                viewport,
                now,
            } => {
                if self.is_current(generation) {
                    self.begin_layout(image, viewport, now);
                } else {
                    log::info!("Discarding stale image {}", image.file.file_name());
                }
            }
            Event::ImageLoadFailed { generation, error } => {
                if self.is_current(generation) {
                    log::error!("{:?}: {error}", error.kind());
                    self.reset();
                    self.status = Status::Failed(error.status_text());
                } else {
                    log::info!("Discarding stale load failure: {error}");
                }
            }
            Event::FrameLaidOut { now } => self.poll_layout(now),
            Event::DragMoved { corner, dx, dy } => {
                if self.points.apply_drag(corner, egui::vec2(dx, dy)) {
                    self.update_mask();
                } else {
                    log::debug!("Ignoring drag of {corner:?}, no points yet");
                }
            }
            Event::ResetCorners => {
                if let Some(metrics) = self.metrics {
                    self.points.initialize(metrics.display);
                    self.update_mask();
                }
            }
            Event::SubmitRequested => match self.submit() {
                Ok(submission) => return Some(submission),
                Err(ValidationError::SubmissionInFlight) => {
                    log::warn!("Submit ignored, a request is already in progress");
                }
                Err(err) => {
                    log::warn!("Submit rejected: {err}");
                    self.status = Status::Failed(Error::from(err).status_text());
                }
            },
            Event::SubmitFinished { generation, result } => self.finish_submit(generation, result),
        }
        None
    }

    /// Clear everything derived from the current image.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.file = None;
        self.native = None;
        self.metrics = None;
        self.settle = None;
        self.points.clear();
        self.surface.clear();
        self.overlay.set_frame(None);
        self.processed = None;
        self.in_flight = false;
        self.update_mask();
    }

    fn begin_layout(&mut self, image: LoadedImage, viewport: Vec2, now: Instant) {
        self.reset();
        let target = fit_display_size(image.native, viewport, &self.config.display);
        log::info!(
            "Laying out {} ({}x{}) at {:.1}x{:.1}",
            image.file.file_name(),
            image.native[0],
            image.native[1],
            target.x,
            target.y
        );
        self.file = Some(image.file);
        self.native = Some(image.native);
        self.surface.request_size(target);
        self.settle = Some(LayoutSettle::arm(
            self.surface.layout_pass(),
            now,
            self.config.settle_timeout(),
        ));
        self.status = Status::Loading;
    }

    fn poll_layout(&mut self, now: Instant) {
        let Some(settle) = self.settle else {
            return;
        };
        if !settle.is_settled(self.surface.layout_pass(), now) {
            return;
        }
        self.settle = None;
        if let Err(err) = self.finish_layout() {
            log::error!("{:?}: {err}", err.kind());
            self.status = Status::Failed(err.status_text());
        }
    }

    fn finish_layout(&mut self) -> Result<()> {
        let measured = self.surface.measured_size().unwrap_or(Vec2::ZERO);
        let layout_error = Error::Layout {
            width: measured.x,
            height: measured.y,
        };
        // Also rejects zero: markers must fit inside the image on both axes
        let m = self.config.marker_size;
        if measured.x < m || measured.y < m {
            return Err(layout_error);
        }
        let native = self.native.ok_or(layout_error)?;
        let metrics = ImageMetrics::new(native, measured).ok_or(Error::Layout {
            width: measured.x,
            height: measured.y,
        })?;
        log::info!(
            "Displayed at {}x{}, scale {:.4} x {:.4}",
            measured.x,
            measured.y,
            metrics.scale.w,
            metrics.scale.h
        );
        self.metrics = Some(metrics);
        self.overlay.set_frame(Some(measured));
        self.points.initialize(measured);
        self.update_mask();
        self.status = Status::Ready;
        Ok(())
    }

    fn submit(&mut self) -> std::result::Result<Submission, ValidationError> {
        if self.in_flight {
            return Err(ValidationError::SubmissionInFlight);
        }
        let payload = SubmissionPayload::build(
            self.file.as_ref(),
            self.points.display_coords(),
            self.metrics.as_ref(),
        )?;
        self.in_flight = true;
        self.status = Status::Processing;
        Ok(Submission {
            generation: self.generation,
            payload,
        })
    }

    fn finish_submit(&mut self, generation: u64, result: Result<ProcessedImage>) {
        if !self.is_current(generation) {
            log::info!(
                "Discarding result for image session {generation}, current is {}",
                self.generation
            );
            return;
        }
        self.in_flight = false;
        match result {
            Ok(processed) => {
                log::info!(
                    "Received processed image {}x{}",
                    processed.size[0],
                    processed.size[1]
                );
                self.processed = Some(processed);
                self.processed_revision += 1;
                self.status = Status::Processed;
            }
            Err(err) => {
                log::error!("Processing failed, {:?}: {err}", err.kind());
                self.status = Status::Failed(err.status_text());
            }
        }
    }

    fn update_mask(&mut self) {
        let centers = self.points.centers();
        self.mask = MaskPath::build(
            self.metrics.map(|m| m.display),
            centers.as_ref().map(|c| &c[..]),
        );
        log::trace!("Mask path: {}", self.mask.to_path_data());
        self.overlay.set_mask(&self.mask);
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn metrics(&self) -> Option<&ImageMetrics> {
        self.metrics.as_ref()
    }

    pub fn points(&self) -> &PointStore {
        &self.points
    }

    pub fn mask(&self) -> &MaskPath {
        &self.mask
    }

    pub fn file(&self) -> Option<&ImageFile> {
        self.file.as_ref()
    }

    pub fn processed(&self) -> Option<&ProcessedImage> {
        self.processed.as_ref()
    }

    pub fn processed_revision(&self) -> u64 {
        self.processed_revision
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether work tagged with `generation` still belongs to this session.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Deadline of a pending layout settlement, if one is armed.
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle.map(|s| s.deadline())
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayBounds;
    use crate::error::ErrorKind;
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Default)]
    struct MockSurface {
        requested: Option<Vec2>,
        measured: Option<Vec2>,
        pass: u64,
    }

    impl MockSurface {
        /// Simulate a layout pass that renders `size`.
        fn lay_out(&mut self, size: Vec2) {
            self.measured = Some(size);
            self.pass += 1;
        }
    }

    impl Surface for MockSurface {
        fn request_size(&mut self, size: Vec2) {
            self.requested = Some(size);
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

    #[derive(Default)]
    struct MockOverlay {
        frame: Option<Vec2>,
        mask: MaskPath,
        updates: usize,
    }

    impl OverlaySurface for MockOverlay {
        fn set_frame(&mut self, size: Option<Vec2>) {
            self.frame = size;
        }

        fn set_mask(&mut self, mask: &MaskPath) {
            self.mask = mask.clone();
            self.updates += 1;
        }
    }

    const M: f32 = 16.0;

    fn config() -> Config {
        Config::default()
            .with_marker_size(M)
            .with_display_bounds(DisplayBounds {
                max_width: 900.0,
                max_height: 700.0,
                ..DisplayBounds::default()
            })
    }

    fn session() -> Session<MockSurface, MockOverlay> {
        Session::builder(config())
            .surface(MockSurface::default())
            .overlay(MockOverlay::default())
            .build()
            .unwrap()
    }

    fn image(width: u32, height: u32) -> LoadedImage {
        LoadedImage {
            file: ImageFile {
                path: PathBuf::from("receipt.jpg"),
                bytes: vec![0xff, 0xd8, 0xff].into(),
            },
            native: [width, height],
            pixels: image::RgbaImage::new(1, 1),
        }
    }

    const VIEWPORT: Vec2 = Vec2::new(10_000.0, 10_000.0);

    /// Pick a file and deliver its decoded image for the current generation.
    fn start(s: &mut Session<MockSurface, MockOverlay>, image: LoadedImage, now: Instant) {
        s.handle(Event::LoadStarted {
            path: image.file.path.clone(),
        });
        let generation = s.generation();
        s.handle(Event::ImageLoaded {
            generation,
            image,
            viewport: VIEWPORT,
            now,
        });
    }

    /// Load an image and let the mock surface render exactly what was requested.
    fn loaded(width: u32, height: u32) -> Session<MockSurface, MockOverlay> {
        let mut s = session();
        let now = Instant::now();
        start(&mut s, image(width, height), now);
        let requested = s.surface().requested.unwrap();
        s.surface_mut().lay_out(requested);
        s.handle(Event::FrameLaidOut { now });
        s
    }

    #[test]
    fn test_builder_requires_surfaces() {
        let err = Session::<MockSurface, MockOverlay>::builder(config())
            .overlay(MockOverlay::default())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Session::<MockSurface, MockOverlay>::builder(config())
            .surface(MockSurface::default())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Session::<MockSurface, MockOverlay>::builder(config().with_marker_size(0.0))
            .surface(MockSurface::default())
            .overlay(MockOverlay::default())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_waits_for_layout_before_arming_points() {
        let mut s = session();
        let now = Instant::now();
        start(&mut s, image(1600, 1200), now);
        assert_eq!(*s.status(), Status::Loading);
        assert!(s.settle_deadline().is_some());

        // Same pass, before the bound: nothing measured yet
        s.handle(Event::FrameLaidOut { now });
        assert!(s.metrics().is_none());
        assert!(!s.points().is_initialized());
        assert!(s.mask().is_empty());

        s.surface_mut().lay_out(egui::vec2(900.0, 675.0));
        s.handle(Event::FrameLaidOut { now });
        assert_eq!(*s.status(), Status::Ready);
        assert!(s.settle_deadline().is_none());
        assert_eq!(s.overlay().frame, Some(egui::vec2(900.0, 675.0)));
        assert!(!s.overlay().mask.is_empty());
    }

    #[test]
    fn test_scale_uses_measured_not_requested_size() {
        let mut s = session();
        let now = Instant::now();
        start(&mut s, image(1000, 1000), now);
        let requested = s.surface().requested.unwrap();
        assert!((requested.x - 700.0).abs() < 1e-3 && (requested.y - 700.0).abs() < 1e-3);
        s.surface_mut().lay_out(egui::vec2(698.0, 700.0));
        s.handle(Event::FrameLaidOut { now });

        let metrics = s.metrics().unwrap();
        assert_eq!(metrics.display, egui::vec2(698.0, 700.0));
        assert!((metrics.scale.w - 1000.0 / 698.0).abs() < 1e-12);
        assert!((metrics.scale.h - 1000.0 / 700.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_measurement_is_layout_error() {
        let mut s = session();
        let now = Instant::now();
        start(&mut s, image(400, 300), now);
        s.surface_mut().lay_out(egui::vec2(0.0, 300.0));
        s.handle(Event::FrameLaidOut { now });

        assert!(s.status().is_error());
        assert!(s.status().to_string().contains("failed to render"));
        assert!(s.metrics().is_none());
        assert!(!s.points().is_initialized());

        assert!(s.handle(Event::SubmitRequested).is_none());
        assert_eq!(
            s.status().to_string(),
            ValidationError::PointsNotReady.to_string()
        );
    }

    #[test]
    fn test_layout_smaller_than_marker_is_layout_error() {
        let mut s = session();
        let now = Instant::now();
        start(&mut s, image(10, 10), now);
        s.surface_mut().lay_out(egui::vec2(10.0, 10.0));
        s.handle(Event::FrameLaidOut { now });

        assert_eq!(
            s.status().to_string(),
            "Error: Image failed to render with correct dimensions (10x10)."
        );
        assert!(s.metrics().is_none());
        assert!(!s.points().is_initialized());
        assert!(s.mask().is_empty());
    }

    #[test]
    fn test_settle_bound_without_layout_pass() {
        let mut s = session();
        let now = Instant::now();
        start(&mut s, image(400, 300), now);
        s.handle(Event::FrameLaidOut {
            now: now + Duration::from_millis(10),
        });
        assert_eq!(*s.status(), Status::Loading);

        s.handle(Event::FrameLaidOut {
            now: now + Duration::from_millis(50),
        });
        assert!(s.status().is_error());
        assert!(s.settle_deadline().is_none());
    }

    #[test]
    fn test_load_failure_clears_previous_image() {
        let mut s = loaded(400, 300);
        assert!(s.metrics().is_some());

        s.handle(Event::LoadStarted {
            path: PathBuf::from("blank.png"),
        });
        assert_eq!(*s.status(), Status::Loading);
        assert!(s.metrics().is_none());
        let generation = s.generation();
        s.handle(Event::ImageLoadFailed {
            generation,
            error: Error::InvalidImage {
                width: 0,
                height: 0,
            },
        });
        assert!(s.status().to_string().starts_with("Error: Image data is invalid"));
        assert!(s.file().is_none());
        assert!(s.metrics().is_none());
        assert!(s.mask().is_empty());
        assert_eq!(s.overlay().frame, None);
        assert!(s.overlay().mask.is_empty());
        assert!(s.surface().requested.is_none());
    }

    #[test]
    fn test_drag_updates_mask_every_sample() {
        let mut s = loaded(400, 300);
        let before = s.overlay().updates;
        for _ in 0..5 {
            s.handle(Event::DragMoved {
                corner: Corner::BottomRight,
                dx: -3.0,
                dy: -2.0,
            });
        }
        assert_eq!(s.overlay().updates, before + 5);
        let hole = s.mask().hole().unwrap();
        assert_eq!(
            hole.vertices[Corner::BottomRight.index()],
            egui::pos2(400.0 - M / 2.0 - 15.0, 300.0 - M / 2.0 - 10.0)
        );
    }

    #[test]
    fn test_reset_corners_restores_defaults() {
        let mut s = loaded(400, 300);
        s.handle(Event::DragMoved {
            corner: Corner::TopLeft,
            dx: 50.0,
            dy: 50.0,
        });
        s.handle(Event::ResetCorners);
        assert_eq!(
            s.points().center(Corner::TopLeft),
            Some(egui::pos2(M / 2.0, M / 2.0))
        );
    }

    #[test]
    fn test_submit_without_file_issues_nothing() {
        let mut s = session();
        assert!(s.handle(Event::SubmitRequested).is_none());
        assert_eq!(s.status().to_string(), "Please upload an image first.");
        assert!(!s.in_flight());
    }

    #[test]
    fn test_submit_before_layout_issues_nothing() {
        let mut s = session();
        start(&mut s, image(400, 300), Instant::now());
        assert!(s.handle(Event::SubmitRequested).is_none());
        assert_eq!(
            s.status().to_string(),
            "Points not initialized correctly or image not fully loaded."
        );
    }

    #[test]
    fn test_end_to_end_1600x1200() {
        let mut s = loaded(1600, 1200);
        let metrics = *s.metrics().unwrap();
        assert!((metrics.display.x - 900.0).abs() < 1e-3);
        assert!((metrics.display.y - 675.0).abs() < 1e-3);

        let bases: Vec<_> = Corner::ALL
            .iter()
            .map(|&c| s.points().point(c).unwrap().base)
            .collect();
        assert_eq!(
            bases,
            vec![
                egui::pos2(0.0, 0.0),
                egui::pos2(900.0 - M, 0.0),
                egui::pos2(900.0 - M, 675.0 - M),
                egui::pos2(0.0, 675.0 - M),
            ]
        );

        s.handle(Event::DragMoved {
            corner: Corner::TopLeft,
            dx: 10.0,
            dy: 5.0,
        });
        let submission = s.handle(Event::SubmitRequested).unwrap();
        assert_eq!(*s.status(), Status::Processing);
        assert_eq!(submission.generation, s.generation());

        let payload = submission.payload;
        let sw = 1600.0 / f64::from(metrics.display.x);
        let sh = 1200.0 / f64::from(metrics.display.y);
        let half = f64::from(M / 2.0);
        assert!((payload.points[0] - (10.0 + half) * sw).abs() < 1e-6);
        assert!((payload.points[1] - (5.0 + half) * sh).abs() < 1e-6);
        assert!((payload.points[0] - half * sw - 17.78).abs() < 0.01);
        assert!((payload.points[1] - half * sh - 8.89).abs() < 0.01);
        assert_eq!(payload.original_width, 1600);
        assert_eq!(payload.original_height, 1200);
    }

    #[test]
    fn test_second_submit_while_in_flight_is_ignored() {
        let mut s = loaded(400, 300);
        let first = s.handle(Event::SubmitRequested).unwrap();
        assert!(s.in_flight());
        assert!(s.handle(Event::SubmitRequested).is_none());
        assert_eq!(*s.status(), Status::Processing);

        s.handle(Event::SubmitFinished {
            generation: first.generation,
            result: Err(Error::HttpStatus(500)),
        });
        assert!(!s.in_flight());
        assert_eq!(s.status().to_string(), "Error: HTTP error! status: 500");
        assert!(s.handle(Event::SubmitRequested).is_some());
    }

    #[test]
    fn test_successful_result_is_kept() {
        let mut s = loaded(400, 300);
        let sub = s.handle(Event::SubmitRequested).unwrap();
        let processed = ProcessedImage {
            bytes: Vec::new(),
            size: [10, 14],
        };
        s.handle(Event::SubmitFinished {
            generation: sub.generation,
            result: Ok(processed),
        });
        assert_eq!(*s.status(), Status::Processed);
        assert_eq!(s.processed().unwrap().size, [10, 14]);
        assert_eq!(s.processed_revision(), 1);
    }

    #[test]
    fn test_result_for_replaced_image_is_discarded() {
        let mut s = loaded(400, 300);
        let sub = s.handle(Event::SubmitRequested).unwrap();

        start(&mut s, image(800, 600), Instant::now());
        s.handle(Event::SubmitFinished {
            generation: sub.generation,
            result: Err(Error::HttpStatus(500)),
        });
        assert_eq!(*s.status(), Status::Loading);
        assert!(!s.in_flight());
    }

    #[test]
    fn test_load_for_superseded_pick_is_discarded() {
        let mut s = session();
        s.handle(Event::LoadStarted {
            path: PathBuf::from("first.jpg"),
        });
        let first = s.generation();
        s.handle(Event::LoadStarted {
            path: PathBuf::from("second.jpg"),
        });
        assert!(!s.is_current(first));

        s.handle(Event::ImageLoaded {
            generation: first,
            image: image(400, 300),
            viewport: VIEWPORT,
            now: Instant::now(),
        });
        assert!(s.file().is_none());
        assert!(s.surface().requested.is_none());
        assert!(s.settle_deadline().is_none());

        s.handle(Event::ImageLoadFailed {
            generation: first,
            error: Error::InvalidImage {
                width: 0,
                height: 0,
            },
        });
        assert_eq!(*s.status(), Status::Loading);
    }
}
