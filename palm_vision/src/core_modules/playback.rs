// THEORY:
// `PlaybackCamera` is a `CameraDevice` that serves recorded still frames instead of
// live sensor data. Hosts without a camera (the capture tester, CI) use it to push a
// photo through the exact same acquisition, sampling and capture path a phone uses.
//
// Each read of `current_frame` pulls the next frame of the playlist and the final
// frame is held forever, the way a paused video keeps showing its last picture. A
// single-frame playlist therefore behaves like a perfectly steady camera.
//
// Failures can be scripted per facing mode, and every request is recorded so the
// fallback order can be checked after the fact.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use parking_lot::Mutex;

use crate::core_modules::device::{CameraDevice, FacingMode, Frame, FrameSource, SourceState, StreamConstraints};
use crate::error::DeviceError;

#[derive(Default)]
struct PlaybackLog {
    requests: Vec<StreamConstraints>,
    streams: Vec<Arc<Mutex<SourceState>>>,
}

/// A camera that plays back a fixed list of frames.
pub struct PlaybackCamera {
    frames: Arc<[Frame]>,
    failures: HashMap<FacingMode, DeviceError>,
    log: Mutex<PlaybackLog>,
}

impl PlaybackCamera {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            failures: HashMap::new(),
            log: Mutex::new(PlaybackLog::default()),
        }
    }

    /// Makes every request for `facing` fail with `error`.
    pub fn failing(mut self, facing: FacingMode, error: DeviceError) -> Self {
        self.failures.insert(facing, error);
        self
    }

    /// Facing modes requested so far, in order.
    pub fn attempts(&self) -> Vec<FacingMode> {
        self.log.lock().requests.iter().map(|c| c.facing).collect()
    }

    /// Full constraints of every request so far, in order.
    pub fn requests(&self) -> Vec<StreamConstraints> {
        self.log.lock().requests.clone()
    }

    /// Number of streams successfully opened.
    pub fn streams_opened(&self) -> usize {
        self.log.lock().streams.len()
    }

    /// State of the most recently opened stream.
    pub fn latest_stream_state(&self) -> Option<SourceState> {
        self.log.lock().streams.last().map(|s| *s.lock())
    }

    /// Pauses the most recently opened stream, as a backgrounded video element would.
    pub fn pause_latest(&self) {
        self.set_latest(SourceState::Paused);
    }

    /// Ends the most recently opened stream, as an unplugged camera would.
    pub fn end_latest(&self) {
        self.set_latest(SourceState::Ended);
    }

    fn set_latest(&self, state: SourceState) {
        if let Some(stream) = self.log.lock().streams.last() {
            *stream.lock() = state;
        }
    }
}

impl CameraDevice for PlaybackCamera {
    fn open(
        &self,
        constraints: StreamConstraints,
    ) -> BoxFuture<'_, Result<Box<dyn FrameSource>, DeviceError>> {
        let mut log = self.log.lock();
        log.requests.push(constraints);

        if let Some(error) = self.failures.get(&constraints.facing) {
            return Box::pin(future::ready(Err(error.clone())));
        }

        let state = Arc::new(Mutex::new(SourceState::Live));
        log.streams.push(Arc::clone(&state));
        let source: Box<dyn FrameSource> = Box::new(PlaybackSource {
            frames: Arc::clone(&self.frames),
            cursor: 0,
            state,
        });
        Box::pin(future::ready(Ok(source)))
    }
}

struct PlaybackSource {
    frames: Arc<[Frame]>,
    cursor: usize,
    state: Arc<Mutex<SourceState>>,
}

impl FrameSource for PlaybackSource {
    fn dimensions(&self) -> (u32, u32) {
        self.frames.first().map(|f| (f.width, f.height)).unwrap_or((0, 0))
    }

    fn state(&self) -> SourceState {
        *self.state.lock()
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if *self.state.lock() == SourceState::Ended {
            return None;
        }
        let frame = self.frames.get(self.cursor).cloned();
        if self.cursor + 1 < self.frames.len() {
            self.cursor += 1;
        }
        frame
    }

    fn stop(&mut self) {
        *self.state.lock() = SourceState::Ended;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(value: u8) -> Frame {
        Frame::solid(8, 8, [value, value, value, 255])
    }

    #[tokio::test]
    async fn plays_frames_then_holds_last() {
        let camera = PlaybackCamera::new(vec![gray(1), gray(2)]);
        let mut source = camera
            .open(StreamConstraints::for_mode(FacingMode::Rear, 1920, 1080))
            .await
            .unwrap();
        assert_eq!(source.current_frame(), Some(gray(1)));
        assert_eq!(source.current_frame(), Some(gray(2)));
        assert_eq!(source.current_frame(), Some(gray(2)));
        assert_eq!(source.dimensions(), (8, 8));
    }

    #[tokio::test]
    async fn stopped_source_yields_nothing() {
        let camera = PlaybackCamera::new(vec![gray(9)]);
        let mut source = camera
            .open(StreamConstraints::for_mode(FacingMode::Any, 0, 0))
            .await
            .unwrap();
        source.stop();
        assert_eq!(source.state(), SourceState::Ended);
        assert_eq!(source.current_frame(), None);
        assert_eq!(camera.latest_stream_state(), Some(SourceState::Ended));
    }

    #[tokio::test]
    async fn scripted_failure_is_recorded() {
        let camera = PlaybackCamera::new(vec![gray(9)]).failing(FacingMode::Front, DeviceError::NotFound);
        let result = camera
            .open(StreamConstraints::for_mode(FacingMode::Front, 1920, 1080))
            .await;
        assert!(matches!(result, Err(DeviceError::NotFound)));
        assert_eq!(camera.attempts(), vec![FacingMode::Front]);
        assert_eq!(camera.streams_opened(), 0);
    }
}
