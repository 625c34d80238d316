// THEORY:
// The `viewfinder` module is the top-level API for the capture screen. It owns one
// camera session and composes the building blocks in `core_modules` into a single
// controller with an explicit lifecycle:
//
//   Idle -> Acquiring -> Streaming -> Committed (a photo was taken)
//                    |           \-> Interrupted (the stream paused, ended or was
//                    |                taken by another controller)
//                    \-> Error (every camera failed)
//   any state -> Stopped (the screen was left)
//
// `start` from Error, Interrupted or Stopped opens a fresh session.
//
// While streaming, two independent loops run as tokio tasks, both woken by the
// display `RefreshBus` rather than a timer:
// - the **sampler** reads the newest frame, classifies it and publishes the
//   reading on a `watch` channel;
// - the **overlay** redraws the guide on the host's surface using the latest
//   reading.
// Both loops end on their own when the frame source stops being live, and both
// are aborted whenever the session is torn down (`stop`, `capture`, `Drop`).
//
// The shutter is gated on the latest reading. Pressing it while the reading is not
// `Good` is answered with `Shutter::Disabled` and changes nothing.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core_modules::device::{CameraDevice, ExclusiveCamera, FacingMode, Lease, SharedSource, attempt_message};
use crate::core_modules::encode::{CAPTURE_JPEG_QUALITY, EncodedImage, encode_frame};
use crate::core_modules::guide::{GUIDE_CAPTION, GuideConfig};
use crate::core_modules::pixel::pixel::Brightness;
use crate::core_modules::quality::{
    DEFAULT_BRIGHTNESS_THRESHOLD, DEFAULT_SAMPLE_SIZE, QualityMonitor, QualityReading, QualityState,
};
use crate::core_modules::refresh::{Refresh, RefreshBus, RefreshReceiver};
use crate::core_modules::surface::Surface;
use crate::error::ViewfinderError;

/// Shown while the fallback chain has not started yet.
pub const CONNECTING_MESSAGE: &str = "Connecting camera…";
/// Shown in the terminal error state.
pub const CAMERA_ERROR_MESSAGE: &str = "Unable to start the camera. Please check camera permissions and try again.";

/// Configuration for the Viewfinder, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewfinderConfig {
    /// Preferred stream resolution for the rear and front attempts.
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Side of the centered square sampled for brightness.
    pub sample_size: u32,
    pub brightness_threshold: Brightness,
    /// JPEG quality of the captured photo.
    pub jpeg_quality: u8,
    pub guide: GuideConfig,
}

impl Default for ViewfinderConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1920,
            ideal_height: 1080,
            sample_size: DEFAULT_SAMPLE_SIZE,
            brightness_threshold: DEFAULT_BRIGHTNESS_THRESHOLD,
            jpeg_quality: CAPTURE_JPEG_QUALITY,
            guide: GuideConfig::default(),
        }
    }
}

impl ViewfinderConfig {
    /// Loads a config from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Lifecycle of one viewfinder session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewfinderState {
    Idle,
    Acquiring,
    Streaming { facing: FacingMode },
    /// The stream stopped being live underneath the session. Both loops have
    /// ended and no reading is published.
    Interrupted { facing: FacingMode },
    /// Every camera failed. Terminal until `start` is called again.
    Error { message: String },
    /// A photo was captured and the camera released.
    Committed,
    Stopped,
}

impl ViewfinderState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ViewfinderState::Streaming { .. })
    }
}

/// The answer to a shutter press.
#[derive(Debug, Clone, PartialEq)]
pub enum Shutter {
    /// The shutter is disabled. Nothing happened.
    Disabled(QualityState),
    /// Exactly one photo was taken. The camera has been released.
    Captured(EncodedImage),
}

/// A surface the overlay loop draws the guide on.
pub type SharedSurface = Arc<Mutex<Box<dyn Surface + Send>>>;

/// The capture-screen controller. Construct one per screen, `start` it, and drop
/// it (or `stop` it) when the screen goes away.
pub struct Viewfinder<D: CameraDevice + 'static> {
    camera: ExclusiveCamera<D>,
    config: ViewfinderConfig,
    refresh: RefreshBus,
    overlay: Option<SharedSurface>,
    state: ViewfinderState,
    status_tx: watch::Sender<String>,
    quality_tx: watch::Sender<QualityReading>,
    lease: Option<Lease>,
    loops: Vec<JoinHandle<()>>,
}

impl<D: CameraDevice + 'static> Viewfinder<D> {
    pub fn new(camera: ExclusiveCamera<D>, refresh: RefreshBus, config: ViewfinderConfig) -> Self {
        let (status_tx, _) = watch::channel(String::new());
        let (quality_tx, _) = watch::channel(QualityReading::default());
        Self {
            camera,
            config,
            refresh,
            overlay: None,
            state: ViewfinderState::Idle,
            status_tx,
            quality_tx,
            lease: None,
            loops: Vec::new(),
        }
    }

    /// Draws the capture guide on `surface` while streaming.
    pub fn with_overlay<S: Surface + Send + 'static>(mut self, surface: S) -> Self {
        self.overlay = Some(Arc::new(Mutex::new(Box::new(surface))));
        self
    }

    pub fn config(&self) -> &ViewfinderConfig {
        &self.config
    }

    pub fn state(&self) -> ViewfinderState {
        match &self.state {
            ViewfinderState::Streaming { facing } if !self.source_live() => ViewfinderState::Interrupted { facing: *facing },
            state => state.clone(),
        }
    }

    /// True while streaming from a source that is still live.
    pub fn is_live(&self) -> bool {
        self.state.is_streaming() && self.source_live()
    }

    fn source_live(&self) -> bool {
        self.lease
            .as_ref()
            .is_some_and(|lease| lease.source.lock().state().is_live())
    }

    /// The status line: connection progress, the error text, or empty.
    pub fn status_message(&self) -> String {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<String> {
        self.status_tx.subscribe()
    }

    /// The latest quality reading.
    pub fn quality(&self) -> QualityReading {
        *self.quality_tx.borrow()
    }

    pub fn subscribe_quality(&self) -> watch::Receiver<QualityReading> {
        self.quality_tx.subscribe()
    }

    /// Inline guidance for the current reading, if live and it needs any.
    pub fn guidance(&self) -> Option<(&'static str, &'static str)> {
        if !self.is_live() {
            return None;
        }
        self.quality().state.guidance()
    }

    /// Caption shown above the guide while the feed is live.
    pub fn caption(&self) -> Option<&'static str> {
        self.is_live().then_some(GUIDE_CAPTION)
    }

    /// True only while streaming from a live source with a `Good` reading.
    pub fn shutter_enabled(&self) -> bool {
        self.quality().state.is_good() && self.is_live()
    }

    /// Acquires a camera and starts the sampling and overlay loops.
    ///
    /// Calling `start` while live does nothing. Calling it from the error state
    /// is the user's explicit retry; after an interruption it reopens the camera.
    pub async fn start(&mut self) -> Result<(), ViewfinderError> {
        if self.is_live() {
            return Ok(());
        }
        self.teardown();
        self.state = ViewfinderState::Acquiring;
        self.status_tx.send_replace(CONNECTING_MESSAGE.to_string());
        self.quality_tx.send_replace(QualityReading::default());

        let status_tx = self.status_tx.clone();
        let acquired = self
            .camera
            .acquire(self.config.ideal_width, self.config.ideal_height, move |facing| {
                status_tx.send_replace(attempt_message(facing).to_string());
            })
            .await;

        let lease = match acquired {
            Ok(lease) => lease,
            Err(err) => {
                self.state = ViewfinderState::Error {
                    message: CAMERA_ERROR_MESSAGE.to_string(),
                };
                self.status_tx.send_replace(CAMERA_ERROR_MESSAGE.to_string());
                return Err(err);
            }
        };

        log::debug!("viewfinder streaming from {} camera", lease.facing);
        self.state = ViewfinderState::Streaming { facing: lease.facing };
        self.status_tx.send_replace(String::new());
        self.spawn_loops(&lease);
        self.lease = Some(lease);
        Ok(())
    }

    fn spawn_loops(&mut self, lease: &Lease) {
        let monitor = QualityMonitor::new(self.config.sample_size, self.config.brightness_threshold);
        self.loops.push(tokio::spawn(sample_quality(
            Arc::clone(&lease.source),
            self.refresh.subscribe(),
            monitor,
            self.quality_tx.clone(),
        )));

        if let Some(surface) = &self.overlay {
            self.loops.push(tokio::spawn(draw_guide(
                Arc::clone(&lease.source),
                self.refresh.subscribe(),
                self.quality_tx.subscribe(),
                Arc::clone(surface),
                self.config.guide.clone(),
            )));
        }
    }

    /// Presses the shutter.
    pub fn capture(&mut self) -> Result<Shutter, ViewfinderError> {
        let quality = self.quality();
        if !self.shutter_enabled() {
            log::debug!("shutter pressed while disabled ({:?})", quality.state);
            return Ok(Shutter::Disabled(quality.state));
        }
        let lease = self.lease.as_ref().ok_or(ViewfinderError::NotStreaming)?;
        let frame = lease.source.lock().current_frame().ok_or(ViewfinderError::NoFrame)?;
        let image = encode_frame(&frame, self.config.jpeg_quality)?;

        self.teardown();
        self.state = ViewfinderState::Committed;
        log::debug!("captured {}x{} frame ({} bytes)", image.width, image.height, image.bytes.len());
        Ok(Shutter::Captured(image))
    }

    /// Ends the session and releases the camera.
    pub fn stop(&mut self) {
        self.teardown();
        if !matches!(self.state, ViewfinderState::Committed) {
            self.state = ViewfinderState::Stopped;
        }
    }

    /// Number of loops that have not finished yet.
    pub fn running_loops(&self) -> usize {
        self.loops.iter().filter(|task| !task.is_finished()).count()
    }

    fn teardown(&mut self) {
        for task in self.loops.drain(..) {
            task.abort();
        }
        if let Some(lease) = self.lease.take() {
            self.camera.release(&lease);
        }
        self.quality_tx.send_replace(QualityReading::default());
    }
}

impl<D: CameraDevice + 'static> Drop for Viewfinder<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn sample_quality(
    source: SharedSource,
    mut refresh: RefreshReceiver,
    mut monitor: QualityMonitor,
    quality_tx: watch::Sender<QualityReading>,
) {
    while let Refresh::Frame(_) = refresh.next().await {
        let frame = {
            let mut source = source.lock();
            if !source.state().is_live() {
                break;
            }
            source.current_frame()
        };
        if let Some(frame) = frame {
            quality_tx.send_replace(monitor.observe(&frame));
        }
    }
    quality_tx.send_replace(QualityReading::default());
    log::debug!("quality sampling stopped");
}

async fn draw_guide(
    source: SharedSource,
    mut refresh: RefreshReceiver,
    quality_rx: watch::Receiver<QualityReading>,
    surface: SharedSurface,
    guide: GuideConfig,
) {
    while let Refresh::Frame(_) = refresh.next().await {
        let (width, height) = {
            let source = source.lock();
            if !source.state().is_live() {
                break;
            }
            source.dimensions()
        };
        let quality = quality_rx.borrow().state;
        let mut surface = surface.lock();
        for op in guide.overlay_ops(width, height, quality) {
            surface.apply(&op);
        }
    }
    log::debug!("guide overlay stopped");
}
