// THEORY:
// The `AnimationSequence` is the line animator's whole behavior written down as a
// plain iterator. Each call to `next` yields exactly one step: a draw operation, a
// pause, or an announcement. Whoever drives it (a tokio task, a test, a renderer
// that skips the pauses) sees the same steps in the same order, which is what
// makes the animation deterministic.
//
// Two cursors walk the data:
// - `line_index` moves through the lines in the order supplied, never interleaving.
// - `point_index` moves through the current line's path in array order.
//
// Per line the steps are: announce the line, then for every segment draw it and
// pause briefly, then draw the label at the first point and pause longer. After
// the last line a single `Completed` step is yielded and the iterator is exhausted.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

use crate::animator::AnimatorConfig;
use crate::core_modules::palm_line::{PalmLine, partition_lines};
use crate::core_modules::surface::{Color, DrawOp, Glow, Point, Rect, StrokeStyle};
use crate::error::InvalidLineData;

/// One step of the line animation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationStep {
    Draw(DrawOp),
    Wait(Duration),
    /// The line at `index` is now being drawn.
    LineStarted {
        index: usize,
        identifier: String,
        display_name: String,
    },
    /// Every line has been drawn. Yielded exactly once, last.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Backdrop,
    Dim,
    StartDelay,
    LineStart,
    Segment,
    SegmentDelay,
    LabelDelay,
    Finished,
}

/// The full, ordered list of steps for one reading, produced lazily.
#[derive(Debug, Clone)]
pub struct AnimationSequence {
    config: AnimatorConfig,
    backdrop: Arc<RgbaImage>,
    lines: Vec<PalmLine>,
    colors: Vec<Color>,
    rejected: Vec<InvalidLineData>,
    width: u32,
    height: u32,
    phase: Phase,
    line_index: usize,
    point_index: usize,
}

impl AnimationSequence {
    /// Lays out the steps for `lines`. Malformed lines are left out and kept in
    /// `rejected`; the rest keep their order.
    pub fn new(config: &AnimatorConfig, backdrop: Arc<RgbaImage>, lines: &[PalmLine], width: u32, height: u32) -> Self {
        let validated = partition_lines(lines);
        let lines = validated.lines;
        let colors = lines
            .iter()
            .map(|line| {
                Color::parse(&line.color).unwrap_or_else(|| {
                    log::warn!("line `{}` has unparseable color `{}`, using white", line.identifier, line.color);
                    Color::WHITE
                })
            })
            .collect();
        Self {
            config: config.clone(),
            backdrop,
            lines,
            colors,
            rejected: validated.rejected,
            width,
            height,
            phase: Phase::Backdrop,
            line_index: 0,
            point_index: 0,
        }
    }

    /// Lines that will be drawn, in drawing order.
    pub fn lines(&self) -> &[PalmLine] {
        &self.lines
    }

    /// Lines that were skipped during validation.
    pub fn rejected(&self) -> &[InvalidLineData] {
        &self.rejected
    }

    /// Current (line, point) cursor.
    pub fn cursor(&self) -> (usize, usize) {
        (self.line_index, self.point_index)
    }

    /// Total time spent in pauses over the whole animation.
    pub fn total_duration(&self) -> Duration {
        let segments: u32 = self.lines.iter().map(|l| l.segment_count() as u32).sum();
        self.config.start_delay + self.config.segment_delay * segments + self.config.label_delay * self.lines.len() as u32
    }

    fn segment_op(&self, line_index: usize, point_index: usize) -> DrawOp {
        let line = &self.lines[line_index];
        let color = self.colors[line_index];
        DrawOp::StrokeSegment {
            from: line.path[point_index].to_canvas(self.width, self.height),
            to: line.path[point_index + 1].to_canvas(self.width, self.height),
            stroke: StrokeStyle {
                color,
                width: self.config.stroke_width,
                dash: None,
                round: true,
            },
            glow: Some(Glow {
                color,
                blur: self.config.glow_blur,
            }),
        }
    }

    fn label_op(&self, line_index: usize) -> DrawOp {
        let line = &self.lines[line_index];
        let first = line.path[0].to_canvas(self.width, self.height);
        let (dx, dy) = self.config.label_offset;
        DrawOp::FillText {
            text: line.display_name.clone(),
            anchor: Point::new(first.x + dx, first.y + dy),
            color: self.colors[line_index],
            font_px: self.config.label_font_px,
            shadow: Some(Glow {
                color: Color::BLACK.with_alpha(0.5),
                blur: 4.0,
            }),
        }
    }
}

impl Iterator for AnimationSequence {
    type Item = AnimationStep;

    fn next(&mut self) -> Option<AnimationStep> {
        let container = Rect::new(0.0, 0.0, self.width as f32, self.height as f32);
        match self.phase {
            Phase::Backdrop => {
                self.phase = Phase::Dim;
                Some(AnimationStep::Draw(DrawOp::DrawImage {
                    image: Arc::clone(&self.backdrop),
                    dest: container,
                }))
            }
            Phase::Dim => {
                self.phase = Phase::StartDelay;
                Some(AnimationStep::Draw(DrawOp::FillRect {
                    rect: container,
                    color: Color::BLACK.with_alpha(self.config.backdrop_dim),
                }))
            }
            Phase::StartDelay => {
                self.phase = Phase::LineStart;
                Some(AnimationStep::Wait(self.config.start_delay))
            }
            Phase::LineStart => {
                let Some(line) = self.lines.get(self.line_index) else {
                    self.phase = Phase::Finished;
                    return Some(AnimationStep::Completed);
                };
                self.phase = Phase::Segment;
                Some(AnimationStep::LineStarted {
                    index: self.line_index,
                    identifier: line.identifier.clone(),
                    display_name: line.display_name.clone(),
                })
            }
            Phase::Segment => {
                let last_point = self.lines[self.line_index].path.len().saturating_sub(1);
                if self.point_index < last_point {
                    let op = self.segment_op(self.line_index, self.point_index);
                    self.point_index += 1;
                    self.phase = Phase::SegmentDelay;
                    Some(AnimationStep::Draw(op))
                } else {
                    self.phase = Phase::LabelDelay;
                    Some(AnimationStep::Draw(self.label_op(self.line_index)))
                }
            }
            Phase::SegmentDelay => {
                self.phase = Phase::Segment;
                Some(AnimationStep::Wait(self.config.segment_delay))
            }
            Phase::LabelDelay => {
                self.line_index += 1;
                self.point_index = 0;
                self.phase = Phase::LineStart;
                Some(AnimationStep::Wait(self.config.label_delay))
            }
            Phase::Finished => None,
        }
    }
}
