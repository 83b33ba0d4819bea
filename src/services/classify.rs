//! Coarse orientation buckets derived from stream geometry.

use crate::services::media::Geometry;
use std::fmt;

const WIDE_RATIO: f64 = 16.0 / 9.0;
const TALL_RATIO: f64 = 9.0 / 16.0;
/// Absolute slack around each target ratio; covers encodes like 608x1080.
const TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Wide,
    Tall,
    Other,
}

impl Orientation {
    /// Classify a width/height ratio. Both tolerance bounds are inclusive.
    pub fn from_ratio(ratio: f64) -> Self {
        if within(ratio, WIDE_RATIO) {
            Orientation::Wide
        } else if within(ratio, TALL_RATIO) {
            Orientation::Tall
        } else {
            Orientation::Other
        }
    }

    /// Key namespace segment for objects of this orientation.
    pub fn prefix(self) -> &'static str {
        match self {
            Orientation::Wide => "wide",
            Orientation::Tall => "tall",
            Orientation::Other => "other",
        }
    }
}

impl From<Geometry> for Orientation {
    fn from(geometry: Geometry) -> Self {
        Orientation::from_ratio(geometry.ratio())
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

fn within(ratio: f64, target: f64) -> bool {
    ratio >= target - TOLERANCE && ratio <= target + TOLERANCE
}
