use super::point::IPoint;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub min: IPoint,
    pub max: IPoint,
}

impl Rect {
    pub fn new(min: IPoint, max: IPoint) -> Self {
        Self { min, max }
    }

    pub fn from_points(a: IPoint, b: IPoint) -> Self {
        Self::new(
            IPoint::new(a.x.min(b.x), a.y.min(b.y)),
            IPoint::new(a.x.max(b.x), a.y.max(b.y)),
        )
    }

    pub fn bounding<I: IntoIterator<Item = IPoint>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Rect::new(first, first), |r, p| r.merge_point(p)))
    }

    pub fn width(&self) -> i64 {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> i64 {
        self.max.y - self.min.y
    }
    pub fn center(&self) -> IPoint {
        IPoint::new(
            self.min.x + self.width() / 2,
            self.min.y + self.height() / 2,
        )
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains(&self, p: IPoint) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn inflate(&self, d: i64) -> Rect {
        Rect::new(
            IPoint::new(self.min.x - d, self.min.y - d),
            IPoint::new(self.max.x + d, self.max.y + d),
        )
    }

    pub fn merge(&self, other: &Rect) -> Rect {
        Rect::new(
            IPoint::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            IPoint::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }

    pub fn merge_point(&self, p: IPoint) -> Rect {
        self.merge(&Rect::new(p, p))
    }
}
