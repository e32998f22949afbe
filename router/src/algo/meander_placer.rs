use crate::algo::{FixOutcome, PlacementAlgo, TuningStatus};
use crate::error::Failure;
use crate::item::{Item, Line, kind};
use crate::node::Node;
use crate::topology::Topology;
use pns_common::db::indices::NetId;
use pns_common::geom::{IPoint, LineChain, Seg};
use pns_common::util::config::TuningConfig;
use std::rc::Rc;

/// Lengthens an existing trace with rectangular meanders placed on the
/// segment nearest to the cursor.
pub struct MeanderPlacer {
    tuning: TuningConfig,
    base: Line,
    clearance: i64,
    trial: Option<Node>,
    status: TuningStatus,
    tuned: Option<Line>,
}

impl MeanderPlacer {
    pub fn start(world: &Rc<Node>, item: Option<&Item>, tuning: &TuningConfig) -> Result<Self, Failure> {
        let Some(item @ Item::Segment(_)) = item else {
            return Err(Failure::NotTunable);
        };
        let id = world.find_matching(item).ok_or(Failure::NotTunable)?;
        let base = Topology::new(world)
            .assemble_line(id)
            .ok_or(Failure::NotTunable)?;
        let clearance = world.net_clearance(base.net);
        let status = classify(base.length(), tuning);
        log::debug!(
            "meander: tuning {:.0} nm line towards {} nm",
            base.length(),
            tuning.target_length
        );
        Ok(Self {
            tuning: tuning.clone(),
            base,
            clearance,
            trial: None,
            status,
            tuned: None,
        })
    }

    pub fn tuned_line(&self) -> Option<&Line> {
        self.tuned.as_ref()
    }

    fn spacing(&self) -> i64 {
        self.tuning.spacing.max(self.base.width + self.clearance)
    }

    /// Base line with meanders on segment `idx`, bulging towards `side`.
    fn meandered(&self, idx: usize, amplitude_cap: i64, side: i64) -> Result<LineChain, Failure> {
        let chain = self.base.chain();
        let seg = chain.segment(idx);
        let spacing = self.spacing();
        let len = seg.length() as i64;
        let slots = (len - 2 * spacing) / (2 * spacing);
        if slots < 1 {
            return Err(Failure::NoMeanderRoom);
        }

        let needed = self.tuning.target_length as f64 - self.base.length();
        let per_meander_max = 2.0 * amplitude_cap as f64;
        let count = ((needed / per_meander_max).ceil() as i64).clamp(1, slots);
        let amplitude = ((needed / (2.0 * count as f64)).round() as i64)
            .clamp(self.tuning.min_amplitude, amplitude_cap);

        let dir = seg.direction();
        let along = |d: i64| dir.resize(d);
        let normal = dir.perpendicular().resize(amplitude * side);

        let mut out = LineChain::new();
        for i in 0..=idx {
            out.append(chain.point(i));
        }
        let margin = (len - count * 2 * spacing) / 2;
        for k in 0..count {
            let base = seg.a + along(margin + k * 2 * spacing);
            out.append(base);
            out.append(base + normal);
            out.append(base + along(spacing) + normal);
            out.append(base + along(spacing));
        }
        for i in idx + 1..chain.point_count() {
            out.append(chain.point(i));
        }
        Ok(out)
    }
}

fn classify(length: f64, tuning: &TuningConfig) -> TuningStatus {
    let target = tuning.target_length as f64;
    let tol = tuning.tolerance as f64;
    if length < target - tol {
        TuningStatus::TooShort
    } else if length > target + tol {
        TuningStatus::TooLong
    } else {
        TuningStatus::Tuned
    }
}

impl PlacementAlgo for MeanderPlacer {
    fn move_to(&mut self, world: &Rc<Node>, p: IPoint, _item: Option<&Item>) -> Result<(), Failure> {
        if self.base.length() >= (self.tuning.target_length - self.tuning.tolerance) as f64 {
            self.status = classify(self.base.length(), &self.tuning);
            self.trial = Some(Node::branch(world));
            self.tuned = None;
            return Ok(());
        }

        let chain = self.base.chain();
        let idx = chain.nearest_segment(p).ok_or(Failure::NotTunable)?;
        let seg: Seg = chain.segment(idx);
        let distance = seg.distance_to_point(p).round() as i64;
        let cap = distance.clamp(self.tuning.min_amplitude, self.tuning.max_amplitude);
        let side = if seg.side(p) >= 0 { 1 } else { -1 };

        let mut tuned = Line::new(
            self.meandered(idx, cap, side)?,
            self.base.width,
            self.base.layer,
            self.base.net,
        );

        let mut trial = Node::branch(world);
        trial.replace_line(&self.base, &mut tuned);
        let collides = tuned
            .segments()
            .into_iter()
            .any(|s| !trial.query_colliding(&Item::Segment(s), kind::ANY).is_empty());
        if collides {
            return Err(Failure::MeanderCollides);
        }

        self.status = classify(tuned.length(), &self.tuning);
        log::trace!("meander: length {:.0}, {:?}", tuned.length(), self.status);
        self.tuned = Some(tuned);
        self.trial = Some(trial);
        Ok(())
    }

    fn fix_route(&mut self, world: &Rc<Node>, p: IPoint, item: Option<&Item>) -> Result<FixOutcome, Failure> {
        if self.trial.is_none() {
            self.move_to(world, p, item)?;
        }
        if self.trial.is_none() {
            return Err(Failure::NothingToFix);
        }
        Ok(FixOutcome::Finished)
    }

    fn trial(&self) -> Option<&Node> {
        self.trial.as_ref()
    }

    fn take_trial(&mut self) -> Option<Node> {
        self.trial.take()
    }

    fn restore_trial(&mut self, trial: Node) {
        self.trial = Some(trial);
    }

    fn current_nets(&self) -> Vec<NetId> {
        self.base.net.into_iter().collect()
    }

    fn current_layer(&self) -> u8 {
        self.base.layer
    }

    fn tuning_status(&self) -> Option<TuningStatus> {
        Some(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Segment;

    const MM: i64 = 1_000_000;

    fn world() -> (Rc<Node>, Item) {
        let mut n = Node::new();
        let seg = Item::Segment(Segment::new(
            Seg::new(IPoint::new(0, 0), IPoint::new(15 * MM, 0)),
            200_000,
            0,
            Some(NetId(4)),
        ));
        n.add(seg.clone());
        (Rc::new(n), seg)
    }

    #[test]
    fn meanders_reach_target_length() {
        let (w, seg) = world();
        let tuning = TuningConfig {
            target_length: 18 * MM,
            ..TuningConfig::default()
        };
        let mut placer = MeanderPlacer::start(&w, Some(&seg), &tuning).unwrap();
        assert_eq!(placer.tuning_status(), Some(TuningStatus::TooShort));
        placer.move_to(&w, IPoint::new(7 * MM, 900_000), None).unwrap();
        let tuned = placer.tuned_line().unwrap();
        assert!((tuned.length() - 18.0 * MM as f64).abs() <= tuning.tolerance as f64);
        assert_eq!(placer.tuning_status(), Some(TuningStatus::Tuned));
        assert_eq!(placer.fix_route(&w, IPoint::new(7 * MM, 900_000), None), Ok(FixOutcome::Finished));
    }

    #[test]
    fn colliding_meanders_are_rejected() {
        let (w, seg) = world();
        let mut n = (*w).clone();
        n.add(Item::Segment(Segment::new(
            Seg::new(IPoint::new(0, 600_000), IPoint::new(15 * MM, 600_000)),
            200_000,
            0,
            Some(NetId(5)),
        )));
        let w = Rc::new(n);
        let tuning = TuningConfig {
            target_length: 18 * MM,
            ..TuningConfig::default()
        };
        let mut placer = MeanderPlacer::start(&w, Some(&seg), &tuning).unwrap();
        let res = placer.move_to(&w, IPoint::new(7 * MM, 900_000), None);
        assert_eq!(res, Err(Failure::MeanderCollides));
        assert!(placer.trial().is_none());
    }

    #[test]
    fn long_line_reports_too_long() {
        let (w, seg) = world();
        let tuning = TuningConfig {
            target_length: 10 * MM,
            ..TuningConfig::default()
        };
        let placer = MeanderPlacer::start(&w, Some(&seg), &tuning).unwrap();
        assert_eq!(placer.tuning_status(), Some(TuningStatus::TooLong));
    }
}
