// THEORY:
// The `surface` module defines the presentation boundary. Nothing in this crate
// draws pixels directly; the guide overlay and the line animator both emit
// `DrawOp`s against a `Surface`. That keeps their output observable (a
// `RecordingSurface` simply keeps the list) and lets the host choose the backend.
//
// `PixmapSurface` is the built-in raster backend, using tiny-skia. It supports
// everything the ops describe except glyph shaping: text is marked with a pill in
// the text color, sized from the character count.

use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use tiny_skia::{
    BlendMode, ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, Stroke, StrokeDash, Transform,
};

/// Cubic bezier control distance for a quarter circle.
const BEZIER_K: f32 = 0.552_284_8;

/// An 8-bit straight-alpha color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Color with a 0.0-1.0 alpha, as written in CSS `rgba()`.
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        let (body, has_alpha) = if let Some(rest) = text.strip_prefix("rgba(") {
            (rest.strip_suffix(')')?, true)
        } else if let Some(rest) = text.strip_prefix("rgb(") {
            (rest.strip_suffix(')')?, false)
        } else {
            return None;
        };

        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        let expected = if has_alpha { 4 } else { 3 };
        if parts.len() != expected {
            return None;
        }
        let channel = |s: &str| s.parse::<u8>().ok();
        let color = Color::rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
        if has_alpha {
            let alpha = parts[3].parse::<f32>().ok()?;
            Some(color.with_alpha(alpha))
        } else {
            Some(color)
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let nibble = |i: usize| byte(&hex[i..i + 1]).map(|v| v * 17);
                Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Some(Color::rgb(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)),
            8 => Some(Color::rgba(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => None,
        }
    }
}

/// A point in surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Stroke parameters for outlines and segments.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f32,
    /// On/off dash lengths. `None` draws a solid line.
    pub dash: Option<[f32; 2]>,
    /// Round caps and joins.
    pub round: bool,
}

/// A soft colored halo drawn beneath a stroke or text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub color: Color,
    pub blur: f32,
}

/// A single drawing instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Clears the whole surface to transparent.
    Clear,
    /// Draws an image scaled into `dest`.
    DrawImage { image: Arc<RgbaImage>, dest: Rect },
    FillRect { rect: Rect, color: Color },
    /// Erases a rounded rectangle, leaving it transparent ("destination-out").
    PunchRoundedRect { rect: Rect, radius: f32 },
    StrokeRoundedRect { rect: Rect, radius: f32, stroke: StrokeStyle },
    /// Strokes one straight segment, with an optional glow beneath it.
    StrokeSegment {
        from: Point,
        to: Point,
        stroke: StrokeStyle,
        glow: Option<Glow>,
    },
    /// Draws a text label with its baseline-left corner at `anchor`.
    FillText {
        text: String,
        anchor: Point,
        color: Color,
        font_px: f32,
        shadow: Option<Glow>,
    },
}

/// A presentation surface that accepts draw operations.
pub trait Surface {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    fn apply(&mut self, op: &DrawOp);
}

/// A surface that only records what was drawn. Clones share the same record.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Arc<Mutex<Vec<DrawOp>>>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A snapshot of every operation applied so far.
    pub fn ops(&self) -> Vec<DrawOp> {
        self.ops.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.ops.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.lock().is_empty()
    }

    /// Removes and returns the recorded operations.
    pub fn take(&self) -> Vec<DrawOp> {
        std::mem::take(&mut *self.ops.lock())
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn apply(&mut self, op: &DrawOp) {
        self.ops.lock().push(op.clone());
    }
}

/// Builds a rounded rectangle path using cubic bezier corners.
pub fn rounded_rect_path(rect: Rect, radius: f32) -> Option<Path> {
    let r = radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0);
    let (left, top) = (rect.x, rect.y);
    let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
    let k = r * BEZIER_K;

    let mut pb = PathBuilder::new();
    pb.move_to(left + r, top);
    pb.line_to(right - r, top);
    pb.cubic_to(right - r + k, top, right, top + r - k, right, top + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(left + r, bottom);
    pb.cubic_to(left + r - k, bottom, left, bottom - r + k, left, bottom - r);
    pb.line_to(left, top + r);
    pb.cubic_to(left, top + r - k, left + r - k, top, left + r, top);
    pb.close();
    pb.finish()
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn stroke_for(style: &StrokeStyle) -> Stroke {
    let (line_cap, line_join) = if style.round {
        (LineCap::Round, LineJoin::Round)
    } else {
        (LineCap::Butt, LineJoin::Miter)
    };
    Stroke {
        width: style.width,
        line_cap,
        line_join,
        dash: style.dash.and_then(|[on, off]| StrokeDash::new(vec![on, off], 0.0)),
        ..Default::default()
    }
}

/// A raster surface backed by a tiny-skia pixmap. Clones draw on the same pixels.
#[derive(Clone)]
pub struct PixmapSurface {
    pixmap: Arc<Mutex<Pixmap>>,
}

impl PixmapSurface {
    /// `None` when either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Pixmap::new(width, height).map(|pixmap| Self {
            pixmap: Arc::new(Mutex::new(pixmap)),
        })
    }

    /// Copies the surface out as a straight-alpha image.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let pixmap = self.pixmap.lock();
        let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
        for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
            let c = src.demultiply();
            *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }
}

fn image_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

fn stroke_segment(pixmap: &mut Pixmap, from: Point, to: Point, stroke: &StrokeStyle, glow: Option<Glow>) {
    let mut pb = PathBuilder::new();
    pb.move_to(from.x, from.y);
    pb.line_to(to.x, to.y);
    let Some(path) = pb.finish() else {
        return;
    };

    // Glow first, as a wider translucent stroke underneath.
    if let Some(glow) = glow {
        let halo = StrokeStyle {
            color: glow.color.with_alpha(0.35 * glow.color.a as f32 / 255.0),
            width: stroke.width + glow.blur,
            dash: None,
            round: true,
        };
        pixmap.stroke_path(&path, &paint_for(halo.color), &stroke_for(&halo), Transform::identity(), None);
    }
    pixmap.stroke_path(&path, &paint_for(stroke.color), &stroke_for(stroke), Transform::identity(), None);
}

fn fill_text_marker(pixmap: &mut Pixmap, text: &str, anchor: Point, color: Color, font_px: f32, shadow: Option<Glow>) {
    let width = text.chars().count() as f32 * font_px * 0.6;
    let rect = Rect::new(anchor.x, anchor.y - font_px, width, font_px);
    if let Some(shadow) = shadow {
        let offset = Rect::new(rect.x + 1.0, rect.y + 1.0, rect.width, rect.height);
        if let Some(path) = rounded_rect_path(offset, font_px / 2.0) {
            pixmap.fill_path(&path, &paint_for(shadow.color), FillRule::Winding, Transform::identity(), None);
        }
    }
    if let Some(path) = rounded_rect_path(rect, font_px / 2.0) {
        pixmap.fill_path(&path, &paint_for(color), FillRule::Winding, Transform::identity(), None);
    }
}

impl Surface for PixmapSurface {
    fn size(&self) -> (u32, u32) {
        let pixmap = self.pixmap.lock();
        (pixmap.width(), pixmap.height())
    }

    fn apply(&mut self, op: &DrawOp) {
        let mut pixmap = self.pixmap.lock();
        match op {
            DrawOp::Clear => pixmap.fill(tiny_skia::Color::TRANSPARENT),
            DrawOp::DrawImage { image, dest } => {
                let Some(source) = image_to_pixmap(image) else {
                    return;
                };
                let sx = dest.width / source.width() as f32;
                let sy = dest.height / source.height() as f32;
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..Default::default()
                };
                let transform = Transform::from_scale(sx, sy).post_translate(dest.x, dest.y);
                pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
            }
            DrawOp::FillRect { rect, color } => {
                if let Some(r) = tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) {
                    pixmap.fill_rect(r, &paint_for(*color), Transform::identity(), None);
                }
            }
            DrawOp::PunchRoundedRect { rect, radius } => {
                if let Some(path) = rounded_rect_path(*rect, *radius) {
                    let mut paint = paint_for(Color::BLACK);
                    paint.blend_mode = BlendMode::DestinationOut;
                    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                }
            }
            DrawOp::StrokeRoundedRect { rect, radius, stroke } => {
                if let Some(path) = rounded_rect_path(*rect, *radius) {
                    pixmap.stroke_path(&path, &paint_for(stroke.color), &stroke_for(stroke), Transform::identity(), None);
                }
            }
            DrawOp::StrokeSegment { from, to, stroke, glow } => stroke_segment(&mut pixmap, *from, *to, stroke, *glow),
            DrawOp::FillText {
                text,
                anchor,
                color,
                font_px,
                shadow,
            } => fill_text_marker(&mut pixmap, text, *anchor, *color, *font_px, *shadow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_css_colors() {
        assert_eq!(Color::parse("#FF6B6B"), Some(Color::rgb(0xFF, 0x6B, 0x6B)));
        assert_eq!(Color::parse("#4ecdc4"), Some(Color::rgb(0x4E, 0xCD, 0xC4)));
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#00000080"), Some(Color::rgba(0, 0, 0, 0x80)));
        assert_eq!(Color::parse("rgba(182, 230, 58, 0.9)"), Some(Color::rgba(182, 230, 58, 230)));
        assert_eq!(Color::parse("rgb(1,2,3)"), Some(Color::rgb(1, 2, 3)));
        assert_eq!(Color::parse("tomato"), None);
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("rgba(1, 2, 3)"), None);
    }

    #[test]
    fn recording_surface_clones_share_log() {
        let surface = RecordingSurface::new(10, 10);
        let mut writer = surface.clone();
        writer.apply(&DrawOp::Clear);
        assert_eq!(surface.ops(), vec![DrawOp::Clear]);
        assert_eq!(surface.take().len(), 1);
        assert!(surface.is_empty());
    }

    #[test]
    fn pixmap_clones_share_pixels() {
        let surface = PixmapSurface::new(4, 4).unwrap();
        let mut writer = surface.clone();
        writer.apply(&DrawOp::FillRect {
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            color: Color::WHITE,
        });
        assert_eq!(surface.to_rgba_image().get_pixel(2, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn punch_clears_inside_only() {
        let mut surface = PixmapSurface::new(100, 100).unwrap();
        surface.apply(&DrawOp::FillRect {
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            color: Color::BLACK,
        });
        surface.apply(&DrawOp::PunchRoundedRect {
            rect: Rect::new(20.0, 20.0, 60.0, 60.0),
            radius: 10.0,
        });
        let image = surface.to_rgba_image();
        assert_eq!(image.get_pixel(50, 50).0[3], 0);
        assert_eq!(image.get_pixel(5, 5).0[3], 255);
    }

    #[test]
    fn draw_image_scales_to_destination() {
        let source = Arc::new(RgbaImage::from_pixel(2, 2, image::Rgba([200, 10, 10, 255])));
        let mut surface = PixmapSurface::new(40, 20).unwrap();
        surface.apply(&DrawOp::DrawImage {
            image: source,
            dest: Rect::new(0.0, 0.0, 40.0, 20.0),
        });
        let [r, g, b, a] = surface.to_rgba_image().get_pixel(20, 10).0;
        assert!(r.abs_diff(200) <= 2 && g.abs_diff(10) <= 2 && b.abs_diff(10) <= 2);
        assert_eq!(a, 255);
    }

    #[test]
    fn segment_paints_its_color() {
        let mut surface = PixmapSurface::new(50, 50).unwrap();
        surface.apply(&DrawOp::StrokeSegment {
            from: Point::new(5.0, 25.0),
            to: Point::new(45.0, 25.0),
            stroke: StrokeStyle {
                color: Color::rgb(0, 255, 0),
                width: 4.0,
                dash: None,
                round: true,
            },
            glow: Some(Glow {
                color: Color::rgb(0, 255, 0),
                blur: 15.0,
            }),
        });
        let pixel = surface.to_rgba_image().get_pixel(25, 25).0;
        assert_eq!(pixel, [0, 255, 0, 255]);
    }

    #[test]
    fn zero_sized_pixmap_is_rejected() {
        assert!(PixmapSurface::new(0, 10).is_none());
    }
}
