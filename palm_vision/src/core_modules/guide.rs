// THEORY:
// The guide overlay tells the user where to put their palm. It is drawn as a mask:
// a translucent dark layer covers the whole frame and a rounded rectangle is punched
// out of it, so the camera feed shows through clearly only inside the guide. A
// dashed outline traces the hole, lime and thicker once the frame quality is good.
//
// This module only computes geometry and emits draw operations. The per-frame loop
// that calls it lives in the viewfinder.

use serde::Deserialize;

use crate::core_modules::quality::QualityState;
use crate::core_modules::surface::{Color, DrawOp, Rect, StrokeStyle};

/// Outline color once quality is good.
pub const GOOD_OUTLINE: Color = Color::rgba(182, 230, 58, 230);
/// Outline color while checking or when quality is poor.
pub const IDLE_OUTLINE: Color = Color::rgba(255, 255, 255, 204);

/// Caption shown above the guide.
pub const GUIDE_CAPTION: &str = "Fit your palm inside the guide";

/// Guide overlay tunables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// Guide width as a fraction of the frame width.
    pub width_ratio: f32,
    /// Guide height as a fraction of the frame height.
    pub height_ratio: f32,
    pub corner_radius: f32,
    /// Opacity of the dark mask around the guide.
    pub mask_alpha: f32,
    /// On/off dash lengths of the outline.
    pub dash: [f32; 2],
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            width_ratio: 0.65,
            height_ratio: 0.55,
            corner_radius: 40.0,
            mask_alpha: 0.4,
            dash: [20.0, 20.0],
        }
    }
}

impl GuideConfig {
    /// The guide rectangle, centered in a `width` x `height` frame.
    pub fn guide_rect(&self, width: u32, height: u32) -> Rect {
        let (w, h) = (width as f32, height as f32);
        let guide_w = w * self.width_ratio;
        let guide_h = h * self.height_ratio;
        Rect::new((w - guide_w) / 2.0, (h - guide_h) / 2.0, guide_w, guide_h)
    }

    /// Outline style for the current quality.
    pub fn outline(&self, quality: QualityState) -> StrokeStyle {
        let (color, width) = if quality.is_good() {
            (GOOD_OUTLINE, 3.0)
        } else {
            (IDLE_OUTLINE, 2.0)
        };
        StrokeStyle {
            color,
            width,
            dash: Some(self.dash),
            round: false,
        }
    }

    /// One full redraw of the overlay for a `width` x `height` frame.
    pub fn overlay_ops(&self, width: u32, height: u32, quality: QualityState) -> Vec<DrawOp> {
        let guide = self.guide_rect(width, height);
        vec![
            DrawOp::Clear,
            DrawOp::FillRect {
                rect: Rect::new(0.0, 0.0, width as f32, height as f32),
                color: Color::BLACK.with_alpha(self.mask_alpha),
            },
            DrawOp::PunchRoundedRect {
                rect: guide,
                radius: self.corner_radius,
            },
            DrawOp::StrokeRoundedRect {
                rect: guide,
                radius: self.corner_radius,
                stroke: self.outline(quality),
            },
        ]
    }
}
