// THEORY:
// This file is the main entry point for the `palm_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (a mobile shell, a web host, or
// the `capture_tester` binary).
//
// Two high-level interfaces are exported:
// - `Viewfinder` (with `ViewfinderConfig`, `Shutter`, ...) for the capture screen.
// - `LineAnimator` (with `AnimatorConfig`, `Animation`, ...) for the result screen.
// The building blocks they are assembled from live in `core_modules` and stay
// public for hosts that need to plug in their own camera or drawing surface.

pub mod animator;
pub mod core_modules;
pub mod error;
pub mod viewfinder;

pub use crate::animator::{Animation, AnimatorConfig, AnimatorEvent, LineAnimator, ValidationPolicy};
pub use crate::core_modules::device::{CameraDevice, ExclusiveCamera, FacingMode, Frame, FrameSource};
pub use crate::core_modules::palm_line::{NormalizedPoint, PalmLine};
pub use crate::core_modules::quality::{QualityReading, QualityState, classify};
pub use crate::core_modules::reading::{AnalysisClient, AnalysisRequest, ReadingResult};
pub use crate::core_modules::refresh::RefreshBus;
pub use crate::core_modules::surface::{DrawOp, PixmapSurface, RecordingSurface, Surface};
pub use crate::error::{AnalysisError, AnimatorError, DeviceError, InvalidLineData, ViewfinderError};
pub use crate::viewfinder::{Shutter, Viewfinder, ViewfinderConfig, ViewfinderState};
