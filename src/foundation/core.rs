pub use kurbo::{BezPath, Point};

/// Viewport rectangle in framebuffer coordinates with a top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Viewport {
    /// Viewport at `(x, y)` of the given size.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `[x, y, width, height]` as floats.
    pub fn to_array(self) -> [f32; 4] {
        [
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        ]
    }
}

/// Integer window-space rectangle with exclusive `x1`/`y1` edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct WindowRect {
    /// Left edge, inclusive.
    pub x0: i32,
    /// Top edge, inclusive.
    pub y0: i32,
    /// Right edge, exclusive.
    pub x1: i32,
    /// Bottom edge, exclusive.
    pub y1: i32,
}

impl WindowRect {
    /// The neutral element of [`WindowRect::intersect`].
    pub const UNBOUNDED: Self = Self {
        x0: 0,
        y0: 0,
        x1: i32::MAX,
        y1: i32::MAX,
    };

    /// Clips everything away.
    pub const EMPTY: Self = Self {
        x0: 0,
        y0: 0,
        x1: 0,
        y1: 0,
    };

    /// Rectangle at `(x, y)` of the given size, saturating at the far edges.
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(width),
            y1: y.saturating_add(height),
        }
    }

    /// Overlap of two rectangles, possibly empty.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    /// Whether no pixel is inside.
    pub fn is_empty(self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Whether this is [`WindowRect::UNBOUNDED`].
    pub fn is_unbounded(self) -> bool {
        self == Self::UNBOUNDED
    }

    /// Horizontal extent, saturating.
    pub fn width(self) -> i32 {
        self.x1.saturating_sub(self.x0)
    }

    /// Vertical extent, saturating.
    pub fn height(self) -> i32 {
        self.y1.saturating_sub(self.y0)
    }
}

/// Straight (non premultiplied) RGBA color with float channels in `0..=1`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Opaque white, the default source color.
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);

    /// Color from float channels.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Color from 8-bit channels.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        let f = |v: u8| f32::from(v) / 255.0;
        Self::rgba(f(r), f(g), f(b), f(a))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
