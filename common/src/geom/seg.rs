use super::point::{IPoint, Point};
use super::rect::Rect;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seg {
    pub a: IPoint,
    pub b: IPoint,
}

impl Seg {
    pub const fn new(a: IPoint, b: IPoint) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f64 {
        self.a.distance(self.b)
    }

    pub fn direction(&self) -> IPoint {
        self.b - self.a
    }

    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }

    pub fn reversed(&self) -> Seg {
        Seg::new(self.b, self.a)
    }

    pub fn bbox(&self) -> Rect {
        Rect::from_points(self.a, self.b)
    }

    pub fn center(&self) -> IPoint {
        IPoint::new((self.a.x + self.b.x) / 2, (self.a.y + self.b.y) / 2)
    }

    /// >0 when `p` lies left of a->b, <0 right, 0 collinear.
    pub fn side(&self, p: IPoint) -> i32 {
        let c = self.direction().cross(p - self.a);
        c.signum() as i32
    }

    /// Parameter of the projection of `p`, clamped to the segment.
    fn project(&self, p: IPoint) -> f64 {
        let d = self.direction();
        let l2 = d.squared_length();
        if l2 == 0 {
            return 0.0;
        }
        ((p - self.a).dot(d) as f64 / l2 as f64).clamp(0.0, 1.0)
    }

    pub fn nearest_point(&self, p: IPoint) -> IPoint {
        let t = self.project(p);
        self.point_at(t)
    }

    pub fn point_at(&self, t: f64) -> IPoint {
        let d = self.direction().to_f64();
        Point::new(self.a.x as f64 + d.x * t, self.a.y as f64 + d.y * t).round()
    }

    pub fn distance_to_point(&self, p: IPoint) -> f64 {
        let t = self.project(p);
        let d = self.direction().to_f64();
        let q = Point::new(self.a.x as f64 + d.x * t, self.a.y as f64 + d.y * t);
        (Point::new(p.x as f64 - q.x, p.y as f64 - q.y)).length()
    }

    pub fn contains(&self, p: IPoint) -> bool {
        self.distance_to_point(p) <= 1.0
    }

    pub fn distance(&self, other: &Seg) -> f64 {
        if self.intersects(other) {
            return 0.0;
        }
        self.distance_to_point(other.a)
            .min(self.distance_to_point(other.b))
            .min(other.distance_to_point(self.a))
            .min(other.distance_to_point(self.b))
    }

    pub fn intersects(&self, other: &Seg) -> bool {
        let d1 = orientation(other.a, other.b, self.a);
        let d2 = orientation(other.a, other.b, self.b);
        let d3 = orientation(self.a, self.b, other.a);
        let d4 = orientation(self.a, self.b, other.b);

        if d1 != d2 && d3 != d4 && d1 != 0 && d2 != 0 && d3 != 0 && d4 != 0 {
            return true;
        }

        (d1 == 0 && on_segment(self.a, other))
            || (d2 == 0 && on_segment(self.b, other))
            || (d3 == 0 && on_segment(other.a, self))
            || (d4 == 0 && on_segment(other.b, self))
    }

    /// Intersection of the two segments as (parameter along `self`, point).
    /// Collinear overlaps report the first shared endpoint.
    pub fn intersect(&self, other: &Seg) -> Option<(f64, IPoint)> {
        let r = self.direction();
        let s = other.direction();
        let denom = r.cross(s);
        let qp = other.a - self.a;

        if denom == 0 {
            if qp.cross(r) != 0 {
                return None;
            }
            let mut best: Option<(f64, IPoint)> = None;
            for p in [other.a, other.b, self.a, self.b] {
                if on_segment(p, self) && on_segment(p, other) {
                    let t = self.project(p);
                    if best.is_none_or(|(bt, _)| t < bt) {
                        best = Some((t, p));
                    }
                }
            }
            return best;
        }

        let t = qp.cross(s) as f64 / denom as f64;
        let u = qp.cross(r) as f64 / denom as f64;
        if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
            return None;
        }
        Some((t, self.point_at(t)))
    }

    /// Intersection of the infinite lines through both segments.
    pub fn line_intersection(&self, other: &Seg) -> Option<IPoint> {
        let r = self.direction();
        let s = other.direction();
        let denom = r.cross(s);
        if denom == 0 {
            return None;
        }
        let t = (other.a - self.a).cross(s) as f64 / denom as f64;
        Some(self.point_at(t))
    }

    pub fn is_collinear(&self, other: &Seg) -> bool {
        let d = self.direction();
        d.cross(other.a - self.a) == 0 && d.cross(other.b - self.a) == 0
    }

    /// Segment moved sideways by `offset` (positive = left of a->b).
    pub fn offset(&self, offset: i64) -> Seg {
        let n = self.direction().perpendicular().resize(offset);
        Seg::new(self.a + n, self.b + n)
    }
}

fn orientation(p: IPoint, q: IPoint, r: IPoint) -> i32 {
    (q - p).cross(r - p).signum() as i32
}

fn on_segment(p: IPoint, s: &Seg) -> bool {
    p.x >= s.a.x.min(s.b.x)
        && p.x <= s.a.x.max(s.b.x)
        && p.y >= s.a.y.min(s.b.y)
        && p.y <= s.a.y.max(s.b.y)
}
