// THEORY:
// The `device` module is the seam between the viewfinder and the platform camera.
// The platform is modeled by two traits:
// - `CameraDevice`: answers one acquisition request at a time, either with a live
//   `FrameSource` or with a `DeviceError`.
// - `FrameSource`: the live stream. It hands out the most recent frame, reports
//   whether it is still live, and can be stopped.
//
// On top of those traits sit the two rules the viewfinder depends on:
// 1.  **Fallback order**: rear at the preferred resolution, then front at the same
//     resolution, then any camera unconstrained. Attempts are strictly sequential
//     and the first success ends the chain (`acquire_with_fallback`).
// 2.  **Exclusive ownership**: `ExclusiveCamera` hands out at most one live lease.
//     Granting a new lease stops the previous holder's stream, so two controllers
//     can never read from the camera at the same time.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::core_modules::pixel::pixel::CHANNELS;
use crate::error::{DeviceError, ViewfinderError};

/// Camera facing preference, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacingMode {
    Rear,
    Front,
    Any,
}

/// The fixed order in which facing modes are attempted.
pub const ACQUISITION_ORDER: [FacingMode; 3] = [FacingMode::Rear, FacingMode::Front, FacingMode::Any];

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FacingMode::Rear => "rear",
            FacingMode::Front => "front",
            FacingMode::Any => "any",
        };
        f.write_str(name)
    }
}

/// A single RGBA video frame. The pixel data is shared, so cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA rows.
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(width, height, data)
    }

    pub fn from_rgba_image(image: &image::RgbaImage) -> Self {
        Self::new(image.width(), image.height(), image.as_raw().as_slice())
    }

    /// Copies the frame into an owned image. `None` when the buffer is short.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
    }
}

/// Resolution request passed to the platform camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    /// Preferred (ideal, not exact) resolution. `None` leaves it to the device.
    pub ideal_resolution: Option<(u32, u32)>,
}

impl StreamConstraints {
    /// Constraints for one step of the fallback order. `Any` is unconstrained.
    pub fn for_mode(facing: FacingMode, ideal_width: u32, ideal_height: u32) -> Self {
        let ideal_resolution = match facing {
            FacingMode::Any => None,
            FacingMode::Rear | FacingMode::Front => Some((ideal_width, ideal_height)),
        };
        Self {
            facing,
            ideal_resolution,
        }
    }
}

/// Playback state of a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Live,
    Paused,
    Ended,
}

impl SourceState {
    pub fn is_live(self) -> bool {
        matches!(self, SourceState::Live)
    }
}

/// A live stream of frames owned by exactly one viewfinder session.
pub trait FrameSource: Send {
    /// Dimensions of the frames this source produces.
    fn dimensions(&self) -> (u32, u32);

    fn state(&self) -> SourceState;

    /// The most recent frame, if the device has produced one.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Stops the stream and releases the hardware. Idempotent.
    fn stop(&mut self);
}

/// The platform camera API.
pub trait CameraDevice: Send + Sync {
    /// A single blocking-style acquisition request.
    fn open(
        &self,
        constraints: StreamConstraints,
    ) -> BoxFuture<'_, Result<Box<dyn FrameSource>, DeviceError>>;
}

/// A frame source that can be stopped from outside its owner.
pub type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// The outcome of a successful fallback chain.
pub struct Acquired {
    pub facing: FacingMode,
    pub source: Box<dyn FrameSource>,
}

/// User-facing status shown while `facing` is being tried.
pub fn attempt_message(facing: FacingMode) -> &'static str {
    match facing {
        FacingMode::Rear => "Trying rear camera…",
        FacingMode::Front => "Trying front camera…",
        FacingMode::Any => "Trying any available camera…",
    }
}

/// Tries each facing mode in `ACQUISITION_ORDER` until one succeeds.
/// `on_attempt` is called before each request.
pub async fn acquire_with_fallback<D, F>(
    device: &D,
    ideal_width: u32,
    ideal_height: u32,
    mut on_attempt: F,
) -> Result<Acquired, ViewfinderError>
where
    D: CameraDevice + ?Sized,
    F: FnMut(FacingMode),
{
    let mut attempts = Vec::with_capacity(ACQUISITION_ORDER.len());
    for facing in ACQUISITION_ORDER {
        on_attempt(facing);
        let constraints = StreamConstraints::for_mode(facing, ideal_width, ideal_height);
        match device.open(constraints).await {
            Ok(source) => {
                log::debug!("camera acquired ({facing})");
                return Ok(Acquired { facing, source });
            }
            Err(err) => {
                log::warn!("camera attempt ({facing}) failed: {err}");
                attempts.push((facing, err));
            }
        }
    }
    log::error!("no camera available after {} attempts", attempts.len());
    Err(ViewfinderError::DeviceUnavailable { attempts })
}

/// Proof of current ownership of the camera stream.
pub struct Lease {
    id: u64,
    pub facing: FacingMode,
    pub source: SharedSource,
}

impl Lease {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct Holder {
    id: u64,
    source: SharedSource,
}

/// A camera device shared by several controllers, of which at most one may
/// hold the stream at a time.
pub struct ExclusiveCamera<D: CameraDevice> {
    device: Arc<D>,
    holder: Arc<Mutex<Option<Holder>>>,
    next_id: Arc<AtomicU64>,
}

impl<D: CameraDevice> Clone for ExclusiveCamera<D> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            holder: Arc::clone(&self.holder),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<D: CameraDevice> ExclusiveCamera<D> {
    pub fn new(device: D) -> Self {
        Self::from_arc(Arc::new(device))
    }

    pub fn from_arc(device: Arc<D>) -> Self {
        Self {
            device,
            holder: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Stops whichever lease holds the stream, then runs the fallback chain.
    /// The previous stream is always stopped before the first request, so at
    /// most one stream is live at any moment.
    pub async fn acquire<F>(&self, ideal_width: u32, ideal_height: u32, on_attempt: F) -> Result<Lease, ViewfinderError>
    where
        F: FnMut(FacingMode),
    {
        let previous = self.holder.lock().take();
        if let Some(previous) = previous {
            log::debug!("lease {} preempted", previous.id);
            previous.source.lock().stop();
        }

        let Acquired { facing, source } =
            acquire_with_fallback(self.device.as_ref(), ideal_width, ideal_height, on_attempt).await?;
        let source: SharedSource = Arc::new(Mutex::new(source));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Another acquire may have finished while this one was waiting on the device.
        let displaced = self.holder.lock().replace(Holder {
            id,
            source: Arc::clone(&source),
        });
        if let Some(displaced) = displaced {
            log::debug!("lease {} preempted by lease {id}", displaced.id);
            displaced.source.lock().stop();
        }

        Ok(Lease { id, facing, source })
    }

    /// Stops the lease's stream and clears it as holder if it still is one.
    pub fn release(&self, lease: &Lease) {
        lease.source.lock().stop();
        let mut holder = self.holder.lock();
        if holder.as_ref().is_some_and(|h| h.id == lease.id) {
            *holder = None;
        }
    }

    /// Id of the lease currently holding the stream.
    pub fn holder_id(&self) -> Option<u64> {
        self.holder.lock().as_ref().map(|h| h.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::playback::PlaybackCamera;

    fn bright() -> Frame {
        Frame::solid(320, 240, [200, 200, 200, 255])
    }

    #[tokio::test]
    async fn rear_success_short_circuits() {
        let camera = PlaybackCamera::new(vec![bright()]);
        let acquired = acquire_with_fallback(&camera, 1920, 1080, |_| {}).await.unwrap();
        assert_eq!(acquired.facing, FacingMode::Rear);
        assert_eq!(camera.attempts(), vec![FacingMode::Rear]);
    }

    #[tokio::test]
    async fn falls_back_in_fixed_order() {
        let camera = PlaybackCamera::new(vec![bright()])
            .failing(FacingMode::Rear, DeviceError::NotFound)
            .failing(FacingMode::Front, DeviceError::NotFound);
        let mut announced = Vec::new();
        let acquired = acquire_with_fallback(&camera, 1920, 1080, |facing| announced.push(attempt_message(facing)))
            .await
            .unwrap();
        assert_eq!(acquired.facing, FacingMode::Any);
        assert_eq!(announced, vec!["Trying rear camera…", "Trying front camera…", "Trying any available camera…"]);
        assert_eq!(camera.attempts(), ACQUISITION_ORDER.to_vec());
        assert_eq!(camera.requests()[2].ideal_resolution, None);
        assert_eq!(camera.requests()[1].ideal_resolution, Some((1920, 1080)));
    }

    #[tokio::test]
    async fn exhausting_every_mode_is_device_unavailable() {
        let camera = PlaybackCamera::new(vec![bright()])
            .failing(FacingMode::Rear, DeviceError::PermissionDenied)
            .failing(FacingMode::Front, DeviceError::PermissionDenied)
            .failing(FacingMode::Any, DeviceError::PermissionDenied);
        let err = acquire_with_fallback(&camera, 1920, 1080, |_| {}).await.err().unwrap();
        match err {
            ViewfinderError::DeviceUnavailable { attempts } => {
                let modes: Vec<_> = attempts.iter().map(|(m, _)| *m).collect();
                assert_eq!(modes, ACQUISITION_ORDER.to_vec());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn new_lease_stops_previous_holder() {
        let camera = ExclusiveCamera::new(PlaybackCamera::new(vec![bright()]));
        let first = camera.acquire(1920, 1080, |_| {}).await.unwrap();
        assert!(first.source.lock().state().is_live());

        let second = camera.acquire(1920, 1080, |_| {}).await.unwrap();
        assert_eq!(first.source.lock().state(), SourceState::Ended);
        assert!(second.source.lock().state().is_live());
        assert_eq!(camera.holder_id(), Some(second.id()));

        // Releasing a stale lease must not evict the current holder.
        camera.release(&first);
        assert_eq!(camera.holder_id(), Some(second.id()));

        camera.release(&second);
        assert_eq!(camera.holder_id(), None);
        assert_eq!(second.source.lock().state(), SourceState::Ended);
    }

    /// A device that tracks how many of its streams are live at once.
    #[derive(Default)]
    struct CountingCamera {
        live: Arc<AtomicU64>,
        peak: Arc<AtomicU64>,
    }

    struct CountingSource {
        live: Arc<AtomicU64>,
        stopped: bool,
    }

    impl CameraDevice for CountingCamera {
        fn open(&self, _constraints: StreamConstraints) -> BoxFuture<'_, Result<Box<dyn FrameSource>, DeviceError>> {
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let source: Box<dyn FrameSource> = Box::new(CountingSource {
                live: Arc::clone(&self.live),
                stopped: false,
            });
            Box::pin(futures::future::ready(Ok(source)))
        }
    }

    impl FrameSource for CountingSource {
        fn dimensions(&self) -> (u32, u32) {
            (320, 240)
        }

        fn state(&self) -> SourceState {
            if self.stopped { SourceState::Ended } else { SourceState::Live }
        }

        fn current_frame(&mut self) -> Option<Frame> {
            (!self.stopped).then(bright)
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn previous_stream_stops_before_the_next_opens() {
        let camera = ExclusiveCamera::new(CountingCamera::default());
        let first = camera.acquire(1920, 1080, |_| {}).await.unwrap();
        let second = camera.acquire(1920, 1080, |_| {}).await.unwrap();
        let third = camera.acquire(1920, 1080, |_| {}).await.unwrap();

        assert_eq!(camera.device().peak.load(Ordering::SeqCst), 1);
        assert_eq!(camera.device().live.load(Ordering::SeqCst), 1);
        assert!(!first.source.lock().state().is_live());
        assert!(!second.source.lock().state().is_live());
        assert_eq!(camera.holder_id(), Some(third.id()));
    }

    #[tokio::test]
    async fn failed_acquire_still_releases_the_previous_holder() {
        let device = PlaybackCamera::new(vec![bright()]);
        let camera = ExclusiveCamera::new(device);
        let first = camera.acquire(1920, 1080, |_| {}).await.unwrap();

        let failing = ExclusiveCamera {
            device: Arc::new(
                PlaybackCamera::new(vec![bright()])
                    .failing(FacingMode::Rear, DeviceError::NotFound)
                    .failing(FacingMode::Front, DeviceError::NotFound)
                    .failing(FacingMode::Any, DeviceError::NotFound),
            ),
            holder: Arc::clone(&camera.holder),
            next_id: Arc::clone(&camera.next_id),
        };
        assert!(failing.acquire(1920, 1080, |_| {}).await.is_err());
        assert_eq!(first.source.lock().state(), SourceState::Ended);
        assert_eq!(camera.holder_id(), None);
    }

    #[test]
    fn any_mode_is_unconstrained() {
        assert_eq!(StreamConstraints::for_mode(FacingMode::Any, 1920, 1080).ideal_resolution, None);
        assert_eq!(
            StreamConstraints::for_mode(FacingMode::Rear, 1920, 1080).ideal_resolution,
            Some((1920, 1080))
        );
    }
}
