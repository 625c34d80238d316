// THEORY:
// A `PalmLine` is one interpreted feature returned by the analysis collaborator: a
// named, colored polyline over the captured photo. Coordinates are normalized so the
// same line can be drawn over a container of any size.
//
// The collaborator is a language model, so its output is validated before anything
// is drawn. Validation never reorders lines: valid lines keep their relative order
// and the first occurrence of an identifier wins over later duplicates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core_modules::surface::Point;
use crate::error::InvalidLineData;

/// A point whose components are expected to lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// Scales into a `width` x `height` container: (x·W, y·H).
    pub fn to_canvas(&self, width: u32, height: u32) -> Point {
        Point::new((self.x * width as f64) as f32, (self.y * height as f64) as f32)
    }
}

impl From<[f64; 2]> for NormalizedPoint {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<NormalizedPoint> for [f64; 2] {
    fn from(point: NormalizedPoint) -> Self {
        [point.x, point.y]
    }
}

/// One palm line as returned by the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalmLine {
    /// Stable key, e.g. `lifeLine`.
    #[serde(rename = "name")]
    pub identifier: String,
    /// Localized label.
    #[serde(rename = "koreanName", alias = "displayName")]
    pub display_name: String,
    /// CSS color used for both the stroke and the label.
    pub color: String,
    #[serde(rename = "coordinates")]
    pub path: Vec<NormalizedPoint>,
    /// Advisory 0-100 score. Not used for drawing.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub meaning: String,
}

impl PalmLine {
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        color: impl Into<String>,
        path: Vec<NormalizedPoint>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            color: color.into(),
            path,
            score: 0.0,
            meaning: String::new(),
        }
    }

    /// Number of segments the animator draws for this line.
    pub fn segment_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Checks the line on its own (point count and coordinate range).
    pub fn validate(&self) -> Result<(), InvalidLineData> {
        if self.path.len() < 2 {
            return Err(InvalidLineData::TooFewPoints {
                identifier: self.identifier.clone(),
                count: self.path.len(),
            });
        }
        if let Some(index) = self.path.iter().position(|p| !p.is_normalized()) {
            return Err(InvalidLineData::CoordinateOutOfRange {
                identifier: self.identifier.clone(),
                index,
            });
        }
        Ok(())
    }
}

/// Lines that passed validation, plus the reasons the rest were rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedLines {
    pub lines: Vec<PalmLine>,
    pub rejected: Vec<InvalidLineData>,
}

/// Splits `lines` into valid lines (original order kept) and rejections.
pub fn partition_lines(lines: &[PalmLine]) -> ValidatedLines {
    let mut seen = HashSet::with_capacity(lines.len());
    let mut result = ValidatedLines::default();
    for line in lines {
        if !seen.insert(line.identifier.as_str()) {
            result
                .rejected
                .push(InvalidLineData::DuplicateIdentifier(line.identifier.clone()));
            continue;
        }
        match line.validate() {
            Ok(()) => result.lines.push(line.clone()),
            Err(err) => result.rejected.push(err),
        }
    }
    result
}
