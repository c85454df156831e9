//! Affine transform math shared by the extractors.
//!
//! Matrices use the PDF/OOXML 6-tuple layout `(a, b, c, d, e, f)`:
//!
//! ```text
//! | a  c  e |
//! | b  d  f |
//! | 0  0  1 |
//! ```
//!
//! Points are row vectors, so `p' = p × M` and "apply A, then B" is `A × B`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Row-vector product `self × other`: `self` is applied first.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Matrix {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    /// Length of the transformed unit y-vector; the effective vertical scale.
    pub fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Nest a child coordinate system inside a parent one: the child's transform
/// runs first, then the parent's.
pub fn compose(outer: &Matrix, inner: &Matrix) -> Matrix {
    inner.then(outer)
}

pub fn apply_to_point(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m.a * x + m.c * y + m.e, m.b * x + m.d * y + m.f)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Axis-aligned bounds of the unit square `[0,1]×[0,1]` mapped through `m`.
pub fn unit_square_bounds(m: &Matrix) -> Rect {
    let corners = [
        apply_to_point(m, 0.0, 0.0),
        apply_to_point(m, 1.0, 0.0),
        apply_to_point(m, 0.0, 1.0),
        apply_to_point(m, 1.0, 1.0),
    ];
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Express `rect` as percentages of the canvas. No clamping.
pub fn to_percentage(rect: &Rect, canvas_width: f64, canvas_height: f64) -> Rect {
    Rect {
        x: rect.x / canvas_width * 100.0,
        y: rect.y / canvas_height * 100.0,
        width: rect.width / canvas_width * 100.0,
        height: rect.height / canvas_height * 100.0,
    }
}

/// Area-overlap test. The shared area must reach `threshold_a` of A's area
/// and `threshold_b` of B's area.
pub fn intersects(rect_a: &Rect, rect_b: &Rect, threshold_a: f64, threshold_b: f64) -> bool {
    let area_a = rect_a.area();
    let area_b = rect_b.area();
    if area_a <= 0.0 || area_b <= 0.0 {
        return false;
    }
    let overlap_w = rect_a.right().min(rect_b.right()) - rect_a.x.max(rect_b.x);
    let overlap_h = rect_a.bottom().min(rect_b.bottom()) - rect_a.y.max(rect_b.y);
    if overlap_w <= 0.0 || overlap_h <= 0.0 {
        return false;
    }
    let overlap = overlap_w * overlap_h;
    overlap / area_a >= threshold_a && overlap / area_b >= threshold_b
}

/// Background test: strictly more than `fraction` of both canvas width and
/// canvas height.
pub fn covers_canvas(rect: &Rect, canvas_width: f64, canvas_height: f64, fraction: f64) -> bool {
    if canvas_width <= 0.0 || canvas_height <= 0.0 {
        return false;
    }
    rect.width / canvas_width > fraction && rect.height / canvas_height > fraction
}
