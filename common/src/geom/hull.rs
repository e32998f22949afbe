use super::line_chain::LineChain;
use super::point::IPoint;
use super::shape::Shape;
use std::f64::consts::PI;

/// Convex hull, counter-clockwise, without collinear vertices.
pub fn convex_hull(points: &[IPoint]) -> Vec<IPoint> {
    let mut pts: Vec<IPoint> = points.to_vec();
    pts.sort_by(|a, b| a.x.cmp(&b.x).then(a.y.cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<IPoint> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2
            && (lower[lower.len() - 1] - lower[lower.len() - 2]).cross(p - lower[lower.len() - 1])
                <= 0
        {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<IPoint> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2
            && (upper[upper.len() - 1] - upper[upper.len() - 2]).cross(p - upper[upper.len() - 1])
                <= 0
        {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Octagon whose edges are tangent to the circle of radius `apothem`
/// around `center`; `angle` rotates it so one edge faces that direction.
pub fn octagon(center: IPoint, apothem: i64, angle: f64) -> [IPoint; 8] {
    let r = (apothem as f64 / (PI / 8.0).cos()).ceil() + 1.0;
    let mut out = [center; 8];
    for (k, v) in out.iter_mut().enumerate() {
        let a = angle + PI / 8.0 + k as f64 * PI / 4.0;
        *v = IPoint::new(
            center.x + (r * a.cos()).round() as i64,
            center.y + (r * a.sin()).round() as i64,
        );
    }
    out
}

/// Closed convex hull around `shape` whose boundary keeps at least
/// `clearance` from the copper outline.
pub fn octagonal_hull(shape: &Shape, clearance: i64) -> LineChain {
    let (cores, radius) = shape.hull_cores();
    let apothem = radius + clearance;
    let angle = match shape {
        Shape::Segment { seg, .. } if !seg.is_degenerate() => {
            let d = seg.direction();
            (d.y as f64).atan2(d.x as f64)
        }
        _ => 0.0,
    };
    let mut pts = Vec::with_capacity(cores.len() * 8);
    for c in cores {
        pts.extend_from_slice(&octagon(c, apothem, angle));
    }
    LineChain::closed(convex_hull(&pts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::seg::Seg;

    #[test]
    fn hull_drops_interior_points() {
        let pts = [
            IPoint::new(0, 0),
            IPoint::new(10, 0),
            IPoint::new(5, 5),
            IPoint::new(10, 10),
            IPoint::new(0, 10),
        ];
        assert_eq!(convex_hull(&pts).len(), 4);
    }

    #[test]
    fn segment_hull_keeps_clearance() {
        let shape = Shape::Segment {
            seg: Seg::new(IPoint::new(0, 0), IPoint::new(10_000, 0)),
            width: 200,
        };
        let hull = octagonal_hull(&shape, 250);
        for p in hull.points() {
            let gap = shape.gap(&Shape::Circle {
                center: *p,
                radius: 0,
            });
            assert!(gap >= 250.0, "vertex {:?} too close: {}", p, gap);
        }
        assert!(hull.point_inside(IPoint::new(5_000, 300)));
        assert!(!hull.point_inside(IPoint::new(5_000, 400)));
    }
}
