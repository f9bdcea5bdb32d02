//! Points, bounding boxes and three-point arcs in board millimetres (y grows downwards).

use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, TAU};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Rotate around the origin by a KiCad angle (degrees, counter-clockwise on screen).
    pub fn rotated(self, degrees: f64) -> Point {
        if degrees == 0.0 {
            return self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        Point::new(self.x * cos + self.y * sin, -self.x * sin + self.y * cos)
    }

    pub fn offset(self, by: Point) -> Point {
        Point::new(self.x + by.x, self.y + by.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn from_point(p: Point) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box containing every point, `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::from_point(first);
        for p in iter {
            bbox.include(p);
        }
        Some(bbox)
    }

    pub fn include(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(mut self, other: BoundingBox) -> Self {
        self.include(other.min);
        self.include(other.max);
        self
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn inflated(self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }
}

/// Fold a sequence of optional boxes into one.
pub fn union_all<I: IntoIterator<Item = BoundingBox>>(boxes: I) -> Option<BoundingBox> {
    boxes.into_iter().reduce(BoundingBox::union)
}

/// Circle arc through start, mid and end points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeometry {
    pub center: Point,
    pub radius: f64,
    /// Angle of the start point, radians, measured in board coordinates.
    pub start_angle: f64,
    /// Signed sweep from start to end that passes through mid.
    pub sweep: f64,
}

impl ArcGeometry {
    /// `None` when the three points are collinear.
    pub fn through(start: Point, mid: Point, end: Point) -> Option<Self> {
        let (ax, ay) = (start.x, start.y);
        let (bx, by) = (mid.x, mid.y);
        let (cx, cy) = (end.x, end.y);

        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < 1e-12 {
            return None;
        }

        let a2 = ax * ax + ay * ay;
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let center = Point::new(
            (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d,
            (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d,
        );

        let angle = |p: Point| (p.y - center.y).atan2(p.x - center.x);
        let start_angle = angle(start);
        let to_mid = (angle(mid) - start_angle).rem_euclid(TAU);
        let to_end = (angle(end) - start_angle).rem_euclid(TAU);

        let sweep = if to_mid <= to_end {
            to_end
        } else {
            to_end - TAU
        };

        Some(Self {
            center,
            radius: center.distance(start),
            start_angle,
            sweep,
        })
    }

    pub fn point_at(&self, angle: f64) -> Point {
        Point::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }

    /// Whether `angle` lies on the swept part of the circle.
    pub fn contains_angle(&self, angle: f64) -> bool {
        let delta = (angle - self.start_angle).rem_euclid(TAU);
        if self.sweep >= 0.0 {
            delta <= self.sweep
        } else {
            delta == 0.0 || delta >= TAU + self.sweep
        }
    }

    pub fn bounding_box(&self, start: Point, end: Point) -> BoundingBox {
        let mut bbox = BoundingBox::from_point(start);
        bbox.include(end);
        for quadrant in 0..4 {
            let angle = quadrant as f64 * FRAC_PI_2;
            if self.contains_angle(angle) {
                bbox.include(self.point_at(angle));
            }
        }
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn bounding_box_from_points() {
        let bbox = BoundingBox::from_points([
            Point::new(1.0, 5.0),
            Point::new(-2.0, 3.0),
            Point::new(4.0, -1.0),
        ])
        .unwrap();
        assert_eq!(bbox.min, Point::new(-2.0, -1.0));
        assert_eq!(bbox.max, Point::new(4.0, 5.0));
        assert_eq!(bbox.width(), 6.0);
        assert_eq!(bbox.center(), Point::new(1.0, 2.0));
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn half_circle_arc_reaches_its_apex() {
        // Upper half (negative y) of a circle of radius 10 around the origin.
        let arc = ArcGeometry::through(
            Point::new(-10.0, 0.0),
            Point::new(0.0, -10.0),
            Point::new(10.0, 0.0),
        )
        .unwrap();
        assert!(close(arc.center.x, 0.0) && close(arc.center.y, 0.0));
        assert!(close(arc.radius, 10.0));

        let bbox = arc.bounding_box(Point::new(-10.0, 0.0), Point::new(10.0, 0.0));
        assert!(close(bbox.min.y, -10.0));
        assert!(close(bbox.max.y, 0.0));
    }

    #[test]
    fn collinear_points_have_no_arc() {
        assert!(
            ArcGeometry::through(
                Point::new(0.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(2.0, 2.0)
            )
            .is_none()
        );
    }

    #[test]
    fn rotation_is_counter_clockwise_on_screen() {
        // +x rotated 90 degrees points up the screen, which is -y.
        let p = Point::new(1.0, 0.0).rotated(90.0);
        assert!(close(p.x, 0.0));
        assert!(close(p.y, -1.0));
    }
}
