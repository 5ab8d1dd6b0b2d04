use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (other - self).length()
    }
}

impl std::ops::Sub for &Point {
    type Output = Vector;

    fn sub(self, rhs: &Point) -> Vector {
        Vector {
            dx: self.x - rhs.x,
            dy: self.y - rhs.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub dx: f32,
    pub dy: f32,
}

impl Vector {
    pub const ZERO: Vector = Vector { dx: 0.0, dy: 0.0 };

    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    pub fn length(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }

    pub fn scale(&self, factor: f32) -> Vector {
        Vector {
            dx: self.dx * factor,
            dy: self.dy * factor,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }
}

impl std::ops::AddAssign for Vector {
    fn add_assign(&mut self, rhs: Vector) {
        self.dx += rhs.dx;
        self.dy += rhs.dy;
    }
}

/// Axis-aligned rectangle in canvas pixels, `x2 >= x1` and `y2 >= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn from_center(center: Point, w: f32, h: f32) -> Self {
        Self {
            x1: center.x - w * 0.5,
            y1: center.y - h * 0.5,
            x2: center.x + w * 0.5,
            y2: center.y + h * 0.5,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.x1 + self.x2) * 0.5,
            y: (self.y1 + self.y2) * 0.5,
        }
    }

    pub fn translate(&self, by: Vector) -> Rect {
        Rect {
            x1: self.x1 + by.dx,
            y1: self.y1 + by.dy,
            x2: self.x2 + by.dx,
            y2: self.y2 + by.dy,
        }
    }

    pub fn expand(&self, margin: f32) -> Rect {
        Rect {
            x1: self.x1 - margin,
            y1: self.y1 - margin,
            x2: self.x2 + margin,
            y2: self.y2 + margin,
        }
    }

    /// Strict intersection; touching edges do not count. Empty rects never intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x1 < other.x2 && self.x2 > other.x1 && self.y1 < other.y2 && self.y2 > other.y1
    }

    /// Overlap extent on each axis, or `None` when the rects do not intersect.
    pub fn overlap(&self, other: &Rect) -> Option<(f32, f32)> {
        if !self.intersects(other) {
            return None;
        }
        let ox = self.x2.min(other.x2) - self.x1.max(other.x1);
        let oy = self.y2.min(other.y2) - self.y1.max(other.y1);
        Some((ox, oy))
    }

    pub fn intersection_area(&self, other: &Rect) -> f32 {
        self.overlap(other).map(|(ox, oy)| ox * oy).unwrap_or(0.0)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// Pixel extent of the image being annotated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Canvas {
    pub fn new(width: u32, height: u32, margin: f32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            margin,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn diagonal(&self) -> f32 {
        (self.width * self.width + self.height * self.height).sqrt()
    }

    /// Area a final bbox must stay inside.
    pub fn safe_area(&self) -> Rect {
        let margin = self
            .margin
            .min(self.width * 0.5)
            .min(self.height * 0.5)
            .max(0.0);
        Rect {
            x1: margin,
            y1: margin,
            x2: self.width - margin,
            y2: self.height - margin,
        }
    }

    pub fn overflows(&self, rect: &Rect) -> bool {
        !rect.is_empty() && !self.safe_area().contains(rect)
    }

    /// Area of `rect` lying outside the safe area.
    pub fn outside_area(&self, rect: &Rect) -> f32 {
        if rect.is_empty() {
            return 0.0;
        }
        (rect.area() - self.safe_area().intersection_area(rect)).max(0.0)
    }

    /// Shift `rect` back inside the safe area; rects larger than it stay
    /// centred on the offending axis.
    pub fn clamp(&self, rect: &Rect) -> Vector {
        let safe = self.safe_area();
        Vector::new(
            clamp_axis(rect.x1, rect.x2, safe.x1, safe.x2),
            clamp_axis(rect.y1, rect.y2, safe.y1, safe.y2),
        )
    }
}

fn clamp_axis(lo: f32, hi: f32, min: f32, max: f32) -> f32 {
    let size = hi - lo;
    if size >= max - min {
        return (min + max) * 0.5 - (lo + hi) * 0.5;
    }
    if lo < min {
        min - lo
    } else if hi > max {
        max - hi
    } else {
        0.0
    }
}
