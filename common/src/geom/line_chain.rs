use super::point::IPoint;
use super::rect::Rect;
use super::seg::Seg;
use serde::{Deserialize, Serialize};

/// Polyline, optionally closed. Closed chains are used for hulls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChain {
    points: Vec<IPoint>,
    #[serde(default)]
    closed: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct Intersection {
    /// Segment index on the chain the query was made on.
    pub our_index: usize,
    /// Segment index on the other chain.
    pub their_index: usize,
    /// Parameter along our segment.
    pub t: f64,
    pub p: IPoint,
}

impl LineChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points<I: IntoIterator<Item = IPoint>>(points: I) -> Self {
        let mut chain = Self::new();
        for p in points {
            chain.append(p);
        }
        chain
    }

    pub fn closed(points: Vec<IPoint>) -> Self {
        let mut chain = Self::from_points(points);
        chain.closed = true;
        chain
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn points(&self) -> &[IPoint] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, i: usize) -> IPoint {
        self.points[i]
    }

    pub fn first(&self) -> Option<IPoint> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<IPoint> {
        self.points.last().copied()
    }

    pub fn segment_count(&self) -> usize {
        match self.points.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }

    pub fn segment(&self, i: usize) -> Seg {
        let n = self.points.len();
        Seg::new(self.points[i], self.points[(i + 1) % n])
    }

    pub fn segments(&self) -> impl Iterator<Item = Seg> + '_ {
        (0..self.segment_count()).map(|i| self.segment(i))
    }

    /// Appends a vertex, dropping exact repeats of the last one.
    pub fn append(&mut self, p: IPoint) {
        if self.points.last() != Some(&p) {
            self.points.push(p);
        }
    }

    pub fn append_chain(&mut self, other: &LineChain) {
        for &p in &other.points {
            self.append(p);
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn reverse(&self) -> LineChain {
        let mut r = self.clone();
        r.points.reverse();
        r
    }

    pub fn translate(&self, v: IPoint) -> LineChain {
        let mut r = self.clone();
        for p in &mut r.points {
            *p = *p + v;
        }
        r
    }

    pub fn set_point(&mut self, i: usize, p: IPoint) {
        self.points[i] = p;
    }

    pub fn insert(&mut self, i: usize, p: IPoint) {
        self.points.insert(i, p);
    }

    /// Keeps vertices `0..=index`.
    pub fn truncate(&mut self, index: usize) {
        self.points.truncate(index + 1);
    }

    /// Sub-chain between vertex indices `start..=end`.
    pub fn slice(&self, start: usize, end: usize) -> LineChain {
        LineChain::from_points(self.points[start..=end].iter().copied())
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|s| s.length()).sum()
    }

    pub fn bbox(&self) -> Rect {
        Rect::bounding(self.points.iter().copied()).unwrap_or_default()
    }

    pub fn find(&self, p: IPoint) -> Option<usize> {
        self.points.iter().position(|&q| q == p)
    }

    /// Index of the segment passing through `p`, if any.
    pub fn find_segment(&self, p: IPoint) -> Option<usize> {
        (0..self.segment_count()).find(|&i| self.segment(i).contains(p))
    }

    /// Inserts `p` as a vertex if it lies on the chain; returns its index.
    pub fn split(&mut self, p: IPoint) -> Option<usize> {
        if let Some(i) = self.find(p) {
            return Some(i);
        }
        let seg_idx = self.find_segment(p)?;
        self.points.insert(seg_idx + 1, p);
        Some(seg_idx + 1)
    }

    pub fn nearest_segment(&self, p: IPoint) -> Option<usize> {
        (0..self.segment_count()).min_by(|&i, &j| {
            self.segment(i)
                .distance_to_point(p)
                .total_cmp(&self.segment(j).distance_to_point(p))
        })
    }

    /// Length along the chain from its first vertex to `p` (which must lie on it).
    pub fn path_length(&self, p: IPoint) -> f64 {
        let mut acc = 0.0;
        for s in self.segments() {
            if s.contains(p) {
                return acc + s.a.distance(p);
            }
            acc += s.length();
        }
        acc
    }

    /// Removes repeated vertices and merges collinear runs.
    pub fn simplify(&mut self) {
        let mut out: Vec<IPoint> = Vec::with_capacity(self.points.len());
        for &p in &self.points {
            if out.last() == Some(&p) {
                continue;
            }
            while out.len() >= 2 {
                let a = out[out.len() - 2];
                let b = out[out.len() - 1];
                let d1 = b - a;
                let d2 = p - b;
                if d1.cross(d2) == 0 && d1.dot(d2) >= 0 {
                    out.pop();
                } else {
                    break;
                }
            }
            out.push(p);
        }
        self.points = out;
    }

    pub fn intersect(&self, other: &LineChain) -> Vec<Intersection> {
        let mut hits = Vec::new();
        for i in 0..self.segment_count() {
            let s = self.segment(i);
            for j in 0..other.segment_count() {
                if let Some((t, p)) = s.intersect(&other.segment(j)) {
                    hits.push(Intersection {
                        our_index: i,
                        their_index: j,
                        t,
                        p,
                    });
                }
            }
        }
        hits.sort_by(|a, b| a.our_index.cmp(&b.our_index).then(a.t.total_cmp(&b.t)));
        hits
    }

    /// Strict interior test; the chain is treated as a closed polygon of any winding.
    pub fn point_inside(&self, p: IPoint) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let n = self.points.len();
        let mut inside = false;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            if Seg::new(a, b).contains(p) {
                return false;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x as f64 + (p.y - a.y) as f64 * (b.x - a.x) as f64 / (b.y - a.y) as f64;
                if (p.x as f64) < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    pub fn distance_to_point(&self, p: IPoint) -> f64 {
        self.segments()
            .map(|s| s.distance_to_point(p))
            .fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i64, y: i64) -> IPoint {
        IPoint::new(x, y)
    }

    #[test]
    fn simplify_merges_collinear() {
        let mut c = LineChain::from_points([p(0, 0), p(10, 0), p(20, 0), p(20, 0), p(20, 10)]);
        c.simplify();
        assert_eq!(c.points(), &[p(0, 0), p(20, 0), p(20, 10)]);
    }

    #[test]
    fn split_inserts_vertex() {
        let mut c = LineChain::from_points([p(0, 0), p(100, 0)]);
        assert_eq!(c.split(p(40, 0)), Some(1));
        assert_eq!(c.point_count(), 3);
        assert_eq!(c.split(p(40, 30)), None);
    }

    #[test]
    fn point_inside_square() {
        let sq = LineChain::closed(vec![p(0, 0), p(10, 0), p(10, 10), p(0, 10)]);
        assert!(sq.point_inside(p(5, 5)));
        assert!(!sq.point_inside(p(10, 5)));
        assert!(!sq.point_inside(p(15, 5)));
        assert_eq!(sq.segment_count(), 4);
    }
}
