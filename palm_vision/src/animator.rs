// THEORY:
// The `animator` module is the top-level API for presenting a reading. It takes the
// captured photo and the lines returned by the analysis collaborator and plays the
// drawing animation onto a host surface: backdrop first, then each line revealed
// segment by segment with a glow, each labeled once it is complete.
//
// All ordering and timing decisions live in `AnimationSequence`; this module only
// validates the input, drives the sequence on a tokio task, and reports progress
// (which line is active, and when everything is done) through an event channel.
// Dropping the returned `Animation` cancels the task, so no timer outlives the
// result view that owns it.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use serde::{Deserialize, Deserializer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core_modules::encode::EncodedImage;
use crate::core_modules::palm_line::PalmLine;
use crate::core_modules::sequence::{AnimationSequence, AnimationStep};
use crate::core_modules::surface::Surface;
use crate::error::AnimatorError;

/// What to do with malformed lines from the analysis collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Refuse the whole reading on the first malformed line.
    Strict,
    /// Skip malformed lines and draw the rest.
    Lenient,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ValidationPolicy::Strict
        } else {
            ValidationPolicy::Lenient
        }
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Line animator tunables. Delays are given in milliseconds in JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Pause between drawing the backdrop and the first line.
    #[serde(deserialize_with = "millis")]
    pub start_delay: Duration,
    /// Pause after each segment.
    #[serde(deserialize_with = "millis")]
    pub segment_delay: Duration,
    /// Pause after each line's label.
    #[serde(deserialize_with = "millis")]
    pub label_delay: Duration,
    pub stroke_width: f32,
    pub glow_blur: f32,
    /// Opacity of the dark layer over the backdrop.
    pub backdrop_dim: f32,
    pub label_font_px: f32,
    /// Label position relative to the line's first point.
    pub label_offset: (f32, f32),
    pub validation: ValidationPolicy,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(500),
            segment_delay: Duration::from_millis(80),
            label_delay: Duration::from_millis(300),
            stroke_width: 4.0,
            glow_blur: 15.0,
            backdrop_dim: 0.2,
            label_font_px: 12.0,
            label_offset: (8.0, -8.0),
            validation: ValidationPolicy::default(),
        }
    }
}

impl AnimatorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Progress reported while an animation plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimatorEvent {
    LineStarted {
        index: usize,
        identifier: String,
        display_name: String,
    },
    /// All lines are drawn. Sent exactly once, after the last label pause.
    Completed,
}

/// Builds and plays line animations.
#[derive(Debug, Clone, Default)]
pub struct LineAnimator {
    config: AnimatorConfig,
}

impl LineAnimator {
    pub fn new(config: AnimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    /// Validates `lines` and lays out the full step sequence for a container of
    /// `width` x `height` pixels.
    pub fn prepare(
        &self,
        backdrop: Arc<RgbaImage>,
        lines: &[PalmLine],
        width: u32,
        height: u32,
    ) -> Result<AnimationSequence, AnimatorError> {
        if width == 0 || height == 0 {
            return Err(AnimatorError::ZeroSizedSurface);
        }

        let sequence = AnimationSequence::new(&self.config, backdrop, lines, width, height);
        if let Some(first) = sequence.rejected().first() {
            match self.config.validation {
                ValidationPolicy::Strict => return Err(first.clone().into()),
                ValidationPolicy::Lenient => {
                    for rejected in sequence.rejected() {
                        log::warn!("skipping malformed line from analysis: {rejected}");
                    }
                }
            }
        }
        Ok(sequence)
    }

    /// Starts the animation on `surface`, sized to the surface.
    pub fn spawn<S>(&self, surface: S, backdrop: Arc<RgbaImage>, lines: &[PalmLine]) -> Result<Animation<S>, AnimatorError>
    where
        S: Surface + Send + 'static,
    {
        let (width, height) = surface.size();
        let sequence = self.prepare(backdrop, lines, width, height)?;
        Ok(Animation::spawn(sequence, surface))
    }

    /// Decodes the captured image and starts the animation on `surface`.
    pub fn spawn_encoded<S>(&self, surface: S, image: &EncodedImage, lines: &[PalmLine]) -> Result<Animation<S>, AnimatorError>
    where
        S: Surface + Send + 'static,
    {
        let backdrop = Arc::new(image.decode_rgba()?);
        self.spawn(surface, backdrop, lines)
    }
}

/// Plays `sequence` onto `surface`, pausing on the tokio clock.
pub async fn play<S: Surface>(sequence: AnimationSequence, surface: &mut S, events: &mpsc::UnboundedSender<AnimatorEvent>) {
    for step in sequence {
        match step {
            AnimationStep::Draw(op) => surface.apply(&op),
            AnimationStep::Wait(delay) => tokio::time::sleep(delay).await,
            AnimationStep::LineStarted {
                index,
                identifier,
                display_name,
            } => {
                log::debug!("drawing line {index} ({identifier})");
                let _ = events.send(AnimatorEvent::LineStarted {
                    index,
                    identifier,
                    display_name,
                });
            }
            AnimationStep::Completed => {
                let _ = events.send(AnimatorEvent::Completed);
            }
        }
    }
}

/// Applies every draw step at once, skipping the pauses and announcements.
pub fn render_immediately<S: Surface>(sequence: AnimationSequence, surface: &mut S) {
    for step in sequence {
        if let AnimationStep::Draw(op) = step {
            surface.apply(&op);
        }
    }
}

/// A running line animation. Dropping it cancels the animation.
pub struct Animation<S> {
    events: mpsc::UnboundedReceiver<AnimatorEvent>,
    task: Option<JoinHandle<S>>,
    active_line: Option<String>,
    completed: bool,
}

impl<S: Surface + Send + 'static> Animation<S> {
    fn spawn(sequence: AnimationSequence, mut surface: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            play(sequence, &mut surface, &tx).await;
            surface
        });
        Self {
            events: rx,
            task: Some(task),
            active_line: None,
            completed: false,
        }
    }
}

impl<S> Animation<S> {
    /// Waits for the next progress event. `None` once the animation is over.
    pub async fn next_event(&mut self) -> Option<AnimatorEvent> {
        let event = self.events.recv().await?;
        match &event {
            AnimatorEvent::LineStarted { display_name, .. } => self.active_line = Some(display_name.clone()),
            AnimatorEvent::Completed => {
                self.active_line = None;
                self.completed = true;
            }
        }
        Some(event)
    }

    /// Display name of the line being drawn, if any.
    pub fn active_line(&self) -> Option<&str> {
        self.active_line.as_deref()
    }

    /// The in-progress caption, e.g. "Life line analyzing…".
    pub fn caption(&self) -> Option<String> {
        self.active_line.as_ref().map(|name| format!("{name} analyzing…"))
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Stops drawing immediately.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Waits for the animation to finish and returns the surface.
    pub async fn finish(mut self) -> Result<S, AnimatorError> {
        let task = self.task.take().ok_or(AnimatorError::Cancelled)?;
        task.await.map_err(|_| AnimatorError::Cancelled)
    }
}

impl<S> Drop for Animation<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}
