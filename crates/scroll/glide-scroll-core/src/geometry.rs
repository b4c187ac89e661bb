//! Plain geometry shared by the observer, tracks and the drag interpreter.

use serde::{Deserialize, Serialize};

/// Document-space rectangle (scroll offset already added to `top`).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    Horizontal,
    Vertical,
}

impl Axis {
    /// Split a 2D delta into (primary, perpendicular) components.
    #[inline]
    pub fn split(self, dx: f32, dy: f32) -> (f32, f32) {
        match self {
            Axis::Horizontal => (dx, dy),
            Axis::Vertical => (dy, dx),
        }
    }
}

/// Euclidean modulo into `[0, m)`. Returns 0 for a non-positive or
/// non-finite modulus so an unmeasured track never divides by zero.
#[inline]
pub fn wrap(value: f32, m: f32) -> f32 {
    if !(m.is_finite() && m > 0.0) || !value.is_finite() {
        return 0.0;
    }
    let r = value.rem_euclid(m);
    // rem_euclid can round up to exactly m for tiny negative inputs.
    if r >= m {
        0.0
    } else {
        r
    }
}
