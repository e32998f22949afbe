use super::line_chain::LineChain;
use super::point::IPoint;
use super::rect::Rect;
use super::seg::Seg;

/// Copper outline. Every variant is a "core" (point, segment, polyline or
/// convex area) swept by a radius, which keeps clearance math uniform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Circle { center: IPoint, radius: i64 },
    /// Capsule around a segment.
    Segment { seg: Seg, width: i64 },
    /// Closed convex polygon.
    Convex(LineChain),
    /// Open polyline of constant width.
    Chain { chain: LineChain, width: i64 },
}

struct Core<'a> {
    segs: Vec<Seg>,
    area: Option<&'a LineChain>,
    radius: i64,
}

impl Shape {
    pub fn rect(min: IPoint, max: IPoint) -> Shape {
        Shape::Convex(LineChain::closed(vec![
            min,
            IPoint::new(max.x, min.y),
            max,
            IPoint::new(min.x, max.y),
        ]))
    }

    fn core(&self) -> Core<'_> {
        match self {
            Shape::Circle { center, radius } => Core {
                segs: vec![Seg::new(*center, *center)],
                area: None,
                radius: *radius,
            },
            Shape::Segment { seg, width } => Core {
                segs: vec![*seg],
                area: None,
                radius: width / 2,
            },
            Shape::Convex(poly) => Core {
                segs: poly.segments().collect(),
                area: Some(poly),
                radius: 0,
            },
            Shape::Chain { chain, width } => Core {
                segs: if chain.point_count() == 1 {
                    vec![Seg::new(chain.point(0), chain.point(0))]
                } else {
                    chain.segments().collect()
                },
                area: None,
                radius: width / 2,
            },
        }
    }

    /// Vertices of the core together with the sweep radius; used to build hulls.
    pub fn hull_cores(&self) -> (Vec<IPoint>, i64) {
        match self {
            Shape::Circle { center, radius } => (vec![*center], *radius),
            Shape::Segment { seg, width } => (vec![seg.a, seg.b], width / 2),
            Shape::Convex(poly) => (poly.points().to_vec(), 0),
            Shape::Chain { chain, width } => (chain.points().to_vec(), width / 2),
        }
    }

    pub fn bbox(&self) -> Rect {
        match self {
            Shape::Circle { center, radius } => Rect::new(*center, *center).inflate(*radius),
            Shape::Segment { seg, width } => seg.bbox().inflate(width / 2 + 1),
            Shape::Convex(poly) => poly.bbox(),
            Shape::Chain { chain, width } => chain.bbox().inflate(width / 2 + 1),
        }
    }

    pub fn centre(&self) -> IPoint {
        match self {
            Shape::Circle { center, .. } => *center,
            Shape::Segment { seg, .. } => seg.center(),
            Shape::Convex(poly) => poly.bbox().center(),
            Shape::Chain { chain, .. } => chain.bbox().center(),
        }
    }

    /// Signed edge-to-edge gap; negative when the outlines overlap.
    pub fn gap(&self, other: &Shape) -> f64 {
        let a = self.core();
        let b = other.core();
        core_distance(&a, &b) - a.radius as f64 - b.radius as f64
    }

    pub fn distance(&self, other: &Shape) -> f64 {
        self.gap(other).max(0.0)
    }

    /// True when the outlines are closer than `clearance`.
    pub fn collide(&self, other: &Shape, clearance: i64) -> bool {
        if !self.bbox().inflate(clearance).overlaps(&other.bbox()) {
            return false;
        }
        self.gap(other) < clearance as f64
    }

    pub fn contains_point(&self, p: IPoint) -> bool {
        let dot = Shape::Circle {
            center: p,
            radius: 0,
        };
        self.gap(&dot) <= 0.0
    }
}

fn core_distance(a: &Core, b: &Core) -> f64 {
    if let Some(area) = a.area {
        if b.segs.iter().any(|s| area.point_inside(s.a) || area.point_inside(s.b)) {
            return 0.0;
        }
    }
    if let Some(area) = b.area {
        if a.segs.iter().any(|s| area.point_inside(s.a) || area.point_inside(s.b)) {
            return 0.0;
        }
    }
    let mut best = f64::INFINITY;
    for sa in &a.segs {
        for sb in &b.segs {
            best = best.min(sa.distance(sb));
            if best == 0.0 {
                return 0.0;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i64, y: i64) -> IPoint {
        IPoint::new(x, y)
    }

    #[test]
    fn capsule_gap() {
        let a = Shape::Segment {
            seg: Seg::new(p(0, 0), p(10_000, 0)),
            width: 200,
        };
        let b = Shape::Segment {
            seg: Seg::new(p(0, 600), p(10_000, 600)),
            width: 200,
        };
        assert_eq!(a.gap(&b), 400.0);
        assert!(a.collide(&b, 450));
        assert!(!a.collide(&b, 400));
    }

    #[test]
    fn circle_inside_polygon_overlaps() {
        let pad = Shape::rect(p(-500, -500), p(500, 500));
        let via = Shape::Circle {
            center: p(0, 0),
            radius: 100,
        };
        assert!(pad.gap(&via) < 0.0);
        assert!(pad.contains_point(p(499, 0)));
        assert!(!pad.contains_point(p(600, 0)));
    }
}
