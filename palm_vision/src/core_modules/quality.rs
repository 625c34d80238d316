// THEORY:
// The `quality` module decides whether the current frame is good enough to capture.
// It sits on top of `SampleRegion`: the region turns a frame into a brightness
// number, and this module turns that number into a `QualityState`.
//
// Key principles:
// 1.  **Single threshold**: Brightness below the threshold is `LowBrightness`,
//     everything else is `Good`. The boundary value itself is `Good`.
// 2.  **Advisory only**: A bad reading never raises an error. It disables the
//     shutter and surfaces guidance text; the user recovers by moving.
// 3.  **Reserved states**: `Checking` is the state before the first sample and
//     `Blur` is part of the vocabulary but is never produced by any classifier.
// 4.  **Latest wins**: The monitor only remembers the most recent reading. There
//     is no smoothing or history, so one bright frame is enough to open the gate.

use crate::core_modules::device::Frame;
use crate::core_modules::pixel::pixel::Brightness;
use crate::core_modules::sample_region::sample_region::SampleRegion;

/// Default side of the centered square sampled from every frame.
pub const DEFAULT_SAMPLE_SIZE: u32 = 200;
/// Mean channel brightness below which a frame is too dark to capture.
pub const DEFAULT_BRIGHTNESS_THRESHOLD: Brightness = 50.0;

/// Suitability of the current frame for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityState {
    /// No frame has been sampled yet.
    #[default]
    Checking,
    /// Bright enough to capture.
    Good,
    /// The center of the frame is too dark.
    LowBrightness,
    /// Reserved. No blur detection is performed.
    Blur,
}

impl QualityState {
    pub fn is_good(self) -> bool {
        matches!(self, QualityState::Good)
    }

    /// Headline and hint shown over the viewfinder, if this state needs guidance.
    pub fn guidance(self) -> Option<(&'static str, &'static str)> {
        match self {
            QualityState::LowBrightness => Some(("Not enough light", "Move somewhere brighter")),
            QualityState::Blur => Some(("Hold still", "Keep your hand steady")),
            QualityState::Checking | QualityState::Good => None,
        }
    }
}

/// Classifies a brightness sample against a threshold.
pub fn classify_with(brightness: Brightness, threshold: Brightness) -> QualityState {
    // NaN compares false, so an unreadable sample is never Good.
    if brightness >= threshold {
        QualityState::Good
    } else {
        QualityState::LowBrightness
    }
}

/// Classifies a brightness sample against the default threshold of 50.
pub fn classify(brightness: Brightness) -> QualityState {
    classify_with(brightness, DEFAULT_BRIGHTNESS_THRESHOLD)
}

/// One quality observation: the state plus the brightness that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QualityReading {
    pub state: QualityState,
    /// Mean brightness (0-255) of the latest center crop.
    pub brightness: Brightness,
}

impl QualityReading {
    /// Brightness as shown to the user, rounded to the nearest integer.
    pub fn display_brightness(&self) -> u8 {
        self.brightness.round().clamp(0.0, 255.0) as u8
    }

    /// Short status chip text: ready, or the current brightness.
    pub fn indicator_text(&self) -> String {
        if self.state.is_good() {
            "Ready to capture".to_string()
        } else {
            format!("Brightness: {}", self.display_brightness())
        }
    }
}

/// Stateful sampler that turns frames into quality readings.
#[derive(Debug, Clone)]
pub struct QualityMonitor {
    sample_size: u32,
    threshold: Brightness,
    current: QualityReading,
}

impl QualityMonitor {
    pub fn new(sample_size: u32, threshold: Brightness) -> Self {
        Self {
            sample_size,
            threshold,
            current: QualityReading::default(),
        }
    }

    pub fn current(&self) -> QualityReading {
        self.current
    }

    /// Samples one brightness value, updates the current reading and returns it.
    pub fn observe_brightness(&mut self, brightness: Brightness) -> QualityReading {
        let state = classify_with(brightness, self.threshold);
        if state != self.current.state {
            log::debug!(
                "quality {:?} -> {:?} (brightness {:.1})",
                self.current.state,
                state,
                brightness
            );
        }
        self.current = QualityReading { state, brightness };
        self.current
    }

    /// Samples the centered crop of `frame` and updates the current reading.
    pub fn observe(&mut self, frame: &Frame) -> QualityReading {
        let region = SampleRegion::centered(frame.width, frame.height, self.sample_size);
        let brightness = region.mean_brightness(&frame.data, frame.width);
        self.observe_brightness(brightness)
    }
}

impl Default for QualityMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE, DEFAULT_BRIGHTNESS_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn threshold_boundary_is_good() {
        assert_eq!(classify(49.999), QualityState::LowBrightness);
        assert_eq!(classify(50.0), QualityState::Good);
        assert_eq!(classify(0.0), QualityState::LowBrightness);
        assert_eq!(classify(255.0), QualityState::Good);
    }

    #[test]
    fn brightness_sequence_transitions() {
        let mut monitor = QualityMonitor::default();
        let mut states = vec![monitor.current().state];
        for b in [30.0, 30.0, 60.0] {
            states.push(monitor.observe_brightness(b).state);
        }
        assert_eq!(
            states,
            vec![
                QualityState::Checking,
                QualityState::LowBrightness,
                QualityState::LowBrightness,
                QualityState::Good,
            ]
        );
    }

    #[test]
    fn observe_samples_center_of_frame() {
        let frame = Frame::solid(640, 480, [70, 70, 70, 255]);
        let mut monitor = QualityMonitor::default();
        let reading = monitor.observe(&frame);
        assert_eq!(reading.state, QualityState::Good);
        assert_eq!(reading.brightness, 70.0);

        let dark = Frame::solid(640, 480, [10, 20, 30, 255]);
        assert_eq!(monitor.observe(&dark).state, QualityState::LowBrightness);
    }

    #[test]
    fn indicator_and_guidance_text() {
        let low = QualityReading { state: QualityState::LowBrightness, brightness: 31.6 };
        assert_eq!(low.indicator_text(), "Brightness: 32");
        assert!(low.state.guidance().is_some());

        let good = QualityReading { state: QualityState::Good, brightness: 120.0 };
        assert_eq!(good.indicator_text(), "Ready to capture");
        assert!(good.state.guidance().is_none());
    }

    #[test]
    fn unreadable_brightness_is_low() {
        assert_eq!(classify(f64::NAN), QualityState::LowBrightness);
        let mut monitor = QualityMonitor::default();
        assert_eq!(monitor.observe_brightness(f64::NAN).state, QualityState::LowBrightness);
    }

    proptest! {
        #[test]
        fn classify_matches_threshold(b in 0.0f64..=255.0) {
            let expected = if b < 50.0 { QualityState::LowBrightness } else { QualityState::Good };
            prop_assert_eq!(classify(b), expected);
        }

        #[test]
        fn classifier_never_reports_blur_or_checking(b in any::<f64>()) {
            let state = classify(b);
            prop_assert!(matches!(state, QualityState::Good | QualityState::LowBrightness));
        }
    }
}
