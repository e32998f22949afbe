use crate::item::{HULL_MARGIN, Item, kind};
use crate::rules::{DEFAULT_CLEARANCE, RuleResolver, match_dp_suffix};
use pns_common::db::board::Board;
use pns_common::db::indices::{BoardItemRef, NetId, PadId};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug)]
struct NetEntry {
    clearance: i64,
    coupled: Option<NetId>,
    polarity: i32,
    dp_gap: i64,
}

/// Rule resolver backed by a snapshot of the board's net classes and pad
/// overrides. Rebuilt on every world sync.
#[derive(Debug, Default)]
pub struct BoardRuleResolver {
    nets: Vec<NetEntry>,
    pads: HashMap<PadId, i64>,
    net_names: HashMap<String, NetId>,
}

impl BoardRuleResolver {
    pub fn new(board: &Board) -> Self {
        let net_names = board.net_names();
        let nets = board
            .nets
            .iter()
            .enumerate()
            .map(|(i, info)| {
                let class = board.net_class(Some(NetId::new(i)));
                let (coupled, polarity) = match match_dp_suffix(&info.name) {
                    Some((_, polarity, complement)) => (net_names.get(&complement).copied(), polarity),
                    None => (None, 0),
                };
                log::trace!(
                    "net {} ({}): class {} clearance {}",
                    i,
                    info.name,
                    class.name,
                    class.clearance
                );
                NetEntry {
                    clearance: class.clearance,
                    coupled,
                    polarity,
                    dp_gap: class.diff_pair_gap,
                }
            })
            .collect();

        let mut pads = HashMap::new();
        for fp in &board.footprints {
            for pad in &fp.pads {
                if pad.local_clearance > 0 {
                    pads.insert(pad.id, pad.local_clearance);
                } else if fp.local_clearance > 0 {
                    pads.insert(pad.id, fp.local_clearance);
                }
            }
        }

        Self {
            nets,
            pads,
            net_names,
        }
    }

    fn entry(&self, net: Option<NetId>) -> Option<&NetEntry> {
        net.and_then(|n| self.nets.get(n.index()))
    }

    fn pad_clearance(&self, item: &Item) -> Option<i64> {
        match item.parent() {
            Some(BoardItemRef::Pad(id)) => self.pads.get(&id).copied(),
            _ => None,
        }
    }
}

impl RuleResolver for BoardRuleResolver {
    fn clearance(&self, a: &Item, b: &Item) -> i64 {
        let mut cl_a = self.net_clearance(a.net());
        let mut cl_b = self.net_clearance(b.net());

        let lines_only = a.of_kind(kind::SEGMENT | kind::LINE) && b.of_kind(kind::SEGMENT | kind::LINE);
        if lines_only {
            if let (Some(ea), Some(eb)) = (self.entry(a.net()), self.entry(b.net())) {
                if ea.coupled.is_some() && ea.coupled == b.net() {
                    cl_a = ea.dp_gap.max(eb.dp_gap) - 2 * HULL_MARGIN;
                    cl_b = cl_a;
                }
            }
        }

        if let Some(c) = self.pad_clearance(a) {
            cl_a = c;
        }
        if let Some(c) = self.pad_clearance(b) {
            cl_b = c;
        }
        cl_a.max(cl_b)
    }

    fn net_clearance(&self, net: Option<NetId>) -> i64 {
        self.entry(net).map_or(DEFAULT_CLEARANCE, |e| e.clearance)
    }

    fn dp_coupled_net(&self, net: NetId) -> Option<NetId> {
        self.entry(Some(net)).and_then(|e| e.coupled)
    }

    fn dp_net_polarity(&self, net: NetId) -> i32 {
        self.entry(Some(net)).map_or(0, |e| e.polarity)
    }

    fn dp_net_pair(&self, item: &Item) -> Option<(NetId, NetId)> {
        let net = item.net()?;
        let e = self.entry(Some(net))?;
        let coupled = e.coupled?;
        match e.polarity {
            1 => Some((net, coupled)),
            -1 => Some((coupled, net)),
            _ => None,
        }
    }
}

impl BoardRuleResolver {
    pub fn find_net(&self, name: &str) -> Option<NetId> {
        self.net_names.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Segment, Solid};
    use pns_common::db::board::{Footprint, NetClass, Pad, PadAttribute, PadShape};
    use pns_common::geom::{IPoint, LayerRange, Seg, Shape};

    fn board() -> Board {
        let mut b = Board::new(2);
        b.add_net_class(NetClass {
            name: "Fast".into(),
            clearance: 300_000,
            diff_pair_gap: 180_000,
            ..NetClass::default()
        });
        b.add_net("GND", "Default");
        b.add_net("CLK_P", "Fast");
        b.add_net("CLK_N", "Fast");
        b.footprints.push(Footprint {
            reference: "U1".into(),
            local_clearance: 0,
            pads: vec![Pad {
                id: PadId(7),
                name: "1".into(),
                position: IPoint::new(0, 0),
                size: IPoint::new(1_000_000, 1_000_000),
                shape: PadShape::Rect,
                attribute: PadAttribute::Smd,
                layers: vec![0],
                net: None,
                orientation: 0.0,
                offset: IPoint::new(0, 0),
                local_clearance: 500_000,
                delta: IPoint::new(0, 0),
                roundrect_ratio: 0.25,
            }],
        });
        b
    }

    fn track(net: u32) -> Item {
        Item::Segment(Segment::new(
            Seg::new(IPoint::new(0, 0), IPoint::new(1_000, 0)),
            100_000,
            0,
            Some(NetId(net)),
        ))
    }

    #[test]
    fn clearance_is_symmetric_and_takes_the_larger_class() {
        let r = BoardRuleResolver::new(&board());
        let gnd = track(0);
        let clk = track(1);
        assert_eq!(r.clearance(&gnd, &clk), 300_000);
        assert_eq!(r.clearance(&clk, &gnd), 300_000);
    }

    #[test]
    fn coupled_tracks_use_the_pair_gap() {
        let r = BoardRuleResolver::new(&board());
        assert_eq!(r.clearance(&track(1), &track(2)), 180_000 - 2 * HULL_MARGIN);
        assert_eq!(r.dp_net_pair(&track(2)), Some((NetId(1), NetId(2))));
        assert_eq!(r.dp_coupled_net(NetId(1)), Some(NetId(2)));
        assert_eq!(r.dp_coupled_net(NetId(2)), Some(NetId(1)));
        assert_eq!(r.dp_net_polarity(NetId(1)), 1);
        assert_eq!(r.dp_net_polarity(NetId(2)), -1);
        assert_eq!(r.dp_coupled_net(NetId(0)), None);
    }

    #[test]
    fn pad_override_and_netless_default() {
        let r = BoardRuleResolver::new(&board());
        let mut pad = Solid::new(IPoint::new(0, 0), LayerRange::single(0), None, Some(Shape::Circle {
            center: IPoint::new(0, 0),
            radius: 10,
        }));
        pad.parent = Some(BoardItemRef::Pad(PadId(7)));
        assert_eq!(r.clearance(&Item::Solid(pad), &track(1)), 500_000);
        assert_eq!(r.net_clearance(None), DEFAULT_CLEARANCE);
        assert_eq!(r.find_net("CLK_N"), Some(NetId(2)));
    }
}
