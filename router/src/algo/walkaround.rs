use crate::item::{KindMask, Line};
use crate::node::Node;
use pns_common::geom::{IPoint, LineChain};
use pns_common::util::config::TieBreak;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkDir {
    Clockwise,
    CounterClockwise,
}

/// Replaces the part of `path` inside `hull` by a detour along the hull
/// boundary. Fails when either end of the path lies inside the hull or the
/// path does not pass through it.
pub fn walk_hull(path: &LineChain, hull: &LineChain, dir: WalkDir) -> Option<LineChain> {
    let (first, last) = (path.first()?, path.last()?);
    if hull.point_inside(first) || hull.point_inside(last) {
        return None;
    }
    let hits = path.intersect(hull);
    if hits.len() < 2 {
        return None;
    }
    let (entry, exit) = (hits[0], hits[hits.len() - 1]);
    let n = hull.point_count();

    let mut out = LineChain::new();
    for i in 0..=entry.our_index {
        out.append(path.point(i));
    }
    out.append(entry.p);
    match dir {
        WalkDir::CounterClockwise => {
            let count = (exit.their_index + n - entry.their_index) % n;
            for k in 1..=count {
                out.append(hull.point((entry.their_index + k) % n));
            }
        }
        WalkDir::Clockwise => {
            let count = (entry.their_index + n - exit.their_index) % n;
            for k in 0..count {
                out.append(hull.point((entry.their_index + n - k) % n));
            }
        }
    }
    out.append(exit.p);
    for i in exit.our_index + 1..path.point_count() {
        out.append(path.point(i));
    }
    out.simplify();
    Some(out)
}

/// Detour around `hull`, picking the side according to `tie`.
pub fn walkaround_path(path: &LineChain, hull: &LineChain, tie: TieBreak) -> Option<LineChain> {
    let cw = walk_hull(path, hull, WalkDir::Clockwise);
    let ccw = walk_hull(path, hull, WalkDir::CounterClockwise);
    match tie {
        TieBreak::Clockwise => cw.or(ccw),
        TieBreak::CounterClockwise => ccw.or(cw),
        TieBreak::Shortest => match (cw, ccw) {
            (Some(a), Some(b)) => Some(if b.length() < a.length() { b } else { a }),
            (a, b) => a.or(b),
        },
    }
}

/// Smallest translation along a hull edge normal that moves every vertex of
/// `path` outside the convex `hull`.
pub fn translate_out(path: &LineChain, hull: &LineChain) -> Option<IPoint> {
    if hull.point_count() < 3 || path.is_empty() {
        return None;
    }
    let mut best: Option<(f64, (f64, f64))> = None;
    for edge in hull.segments() {
        let d = edge.direction();
        let len = d.length();
        if len == 0.0 {
            continue;
        }
        // hull is counter-clockwise, so the outward normal points right
        let n = (d.y as f64 / len, -(d.x as f64) / len);
        let depth = path
            .points()
            .iter()
            .map(|&p| {
                let v = p - edge.a;
                v.x as f64 * n.0 + v.y as f64 * n.1
            })
            .fold(f64::INFINITY, f64::min);
        let shift = (-depth).max(0.0);
        if best.is_none_or(|(s, _)| shift < s) {
            best = Some((shift, n));
        }
    }
    let (shift, n) = best?;
    let shift = shift.ceil() + 2.0;
    Some(IPoint::new(
        (n.0 * shift).round() as i64,
        (n.1 * shift).round() as i64,
    ))
}

#[derive(Clone, Debug, PartialEq)]
pub enum WalkStatus {
    /// The path is free of obstacles.
    Done,
    /// The path was cut short in front of an obstacle it cannot pass.
    Stuck,
}

/// Bends a head line around the obstacles in a node.
pub struct Walkaround<'a> {
    node: &'a Node,
    iterations: usize,
    tie: TieBreak,
    mask: KindMask,
}

impl<'a> Walkaround<'a> {
    pub fn new(node: &'a Node, iterations: usize, tie: TieBreak, mask: KindMask) -> Self {
        Self {
            node,
            iterations,
            tie,
            mask,
        }
    }

    pub fn route(&self, head: &Line) -> (Line, WalkStatus) {
        let mut line = head.clone();
        for _ in 0..self.iterations {
            let Some((obstacle, _)) = self.node.nearest_obstacle(&line, self.mask) else {
                return (line, WalkStatus::Done);
            };
            let mut progressed = false;
            for hull in obstacle.item.hulls(obstacle.clearance, line.width) {
                if let Some(path) = walkaround_path(line.chain(), &hull, self.tie) {
                    line.set_chain(path);
                    progressed = true;
                } else if line.chain().intersect(&hull).first().is_some()
                    || line.end().is_some_and(|p| hull.point_inside(p))
                {
                    self.cut_before(&mut line, &hull);
                    return (line, WalkStatus::Stuck);
                }
            }
            if !progressed {
                break;
            }
        }
        let status = if self.node.nearest_obstacle(&line, self.mask).is_some() {
            log::trace!("walkaround gave up after {} iterations", self.iterations);
            WalkStatus::Stuck
        } else {
            WalkStatus::Done
        };
        (line, status)
    }

    fn cut_before(&self, line: &mut Line, hull: &LineChain) {
        let chain = line.chain().clone();
        let mut cut = LineChain::new();
        match chain.intersect(hull).first() {
            Some(hit) => {
                for i in 0..=hit.our_index {
                    cut.append(chain.point(i));
                }
                cut.append(hit.p);
            }
            None => {
                if let Some(p) = chain.first() {
                    cut.append(p);
                }
            }
        }
        line.set_chain(cut);
        line.set_via(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pns_common::geom::Shape;
    use pns_common::geom::hull::octagonal_hull;

    fn obstacle_hull() -> LineChain {
        octagonal_hull(
            &Shape::Circle {
                center: IPoint::new(5_000, 0),
                radius: 500,
            },
            500,
        )
    }

    fn straight() -> LineChain {
        LineChain::from_points([IPoint::new(0, 0), IPoint::new(10_000, 0)])
    }

    #[test]
    fn detour_stays_outside_hull() {
        let hull = obstacle_hull();
        for dir in [WalkDir::Clockwise, WalkDir::CounterClockwise] {
            let path = walk_hull(&straight(), &hull, dir).unwrap();
            assert_eq!(path.first(), Some(IPoint::new(0, 0)));
            assert_eq!(path.last(), Some(IPoint::new(10_000, 0)));
            for p in path.points() {
                assert!(!hull.point_inside(*p));
            }
            let mid = path.points()[path.point_count() / 2];
            match dir {
                WalkDir::CounterClockwise => assert!(mid.y < 0),
                WalkDir::Clockwise => assert!(mid.y > 0),
            }
        }
    }

    #[test]
    fn tie_break_selects_side() {
        let hull = obstacle_hull();
        let cw = walkaround_path(&straight(), &hull, TieBreak::Clockwise).unwrap();
        let ccw = walkaround_path(&straight(), &hull, TieBreak::CounterClockwise).unwrap();
        assert_ne!(cw, ccw);
        let shortest = walkaround_path(&straight(), &hull, TieBreak::Shortest).unwrap();
        assert!(shortest.length() <= cw.length().min(ccw.length()) + 1e-6);
    }

    #[test]
    fn path_ending_inside_cannot_walk() {
        let path = LineChain::from_points([IPoint::new(0, 0), IPoint::new(5_000, 0)]);
        assert!(walk_hull(&path, &obstacle_hull(), WalkDir::Clockwise).is_none());
    }

    #[test]
    fn translation_clears_hull() {
        let hull = obstacle_hull();
        let path = LineChain::from_points([IPoint::new(4_800, 300), IPoint::new(5_200, 300)]);
        let v = translate_out(&path, &hull).unwrap();
        let moved = path.translate(v);
        for p in moved.points() {
            assert!(!hull.point_inside(*p));
        }
        assert!(v.y > 0);
    }
}
