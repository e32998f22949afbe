use crate::iface::resolver::BoardRuleResolver;
use crate::iface::{PreviewColor, RouterIface};
use crate::item::{Item, Segment, Solid, Via};
use crate::node::Node;
use crate::rules::DEFAULT_CLEARANCE;
use crate::sizes::NetSizes;
use pns_common::db::board::{self, Board, Pad, PadAttribute, PadShape};
use pns_common::db::commit::{BoardCommit, BoardError, StagedItem};
use pns_common::db::indices::{BoardItemRef, NetId, TrackId, ViaId};
use pns_common::geom::hull::convex_hull;
use pns_common::geom::{IPoint, LayerRange, LineChain, Seg, Shape};
use pns_common::util::profiler::ScopedTimer;
use pns_common::util::visualization::Overlay;
use std::collections::HashSet;
use std::rc::Rc;

/// One item pushed to the preview layer.
#[derive(Clone, Debug)]
pub struct PreviewRecord {
    pub shape: Shape,
    pub layers: LayerRange,
    pub net: Option<NetId>,
    pub color: PreviewColor,
    pub clearance: i64,
}

/// Router host backed by an in-memory [`Board`].
#[derive(Debug, Default)]
pub struct BoardIface {
    board: Option<Board>,
    staged: BoardCommit,
    preview: Vec<PreviewRecord>,
    hidden: HashSet<BoardItemRef>,
}

impl BoardIface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(board: Board) -> Self {
        let mut iface = Self::new();
        iface.set_board(board);
        iface
    }

    pub fn set_board(&mut self, board: Board) {
        log::debug!(
            "board attached: {} copper layers, {} nets",
            board.copper_layers,
            board.net_count()
        );
        self.board = Some(board);
        self.staged = BoardCommit::new();
        self.erase_view();
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn board_mut(&mut self) -> Option<&mut Board> {
        self.board.as_mut()
    }

    pub fn take_board(&mut self) -> Option<Board> {
        self.board.take()
    }

    pub fn preview(&self) -> &[PreviewRecord] {
        &self.preview
    }

    pub fn is_hidden(&self, handle: BoardItemRef) -> bool {
        self.hidden.contains(&handle)
    }

    /// Preview records in the form the snapshot renderer draws.
    pub fn overlays(&self) -> Vec<Overlay> {
        self.preview
            .iter()
            .map(|r| Overlay {
                shape: r.shape.clone(),
                color: match r.color {
                    PreviewColor::Normal => [240, 240, 240],
                    PreviewColor::Violation => [255, 40, 40],
                },
            })
            .collect()
    }
}

/// Copper outline of a pad centred on `c`, or `None` for shapes the router
/// cannot represent.
fn pad_shape(pad: &Pad, c: IPoint) -> Option<Shape> {
    let rot = |p: IPoint| (c + p).rotate(c, pad.orientation);
    let convex = |pts: Vec<IPoint>| Shape::Convex(LineChain::closed(convex_hull(&pts)));
    let (w, h) = (pad.size.x, pad.size.y);

    match pad.shape {
        PadShape::Circle => Some(Shape::Circle {
            center: c,
            radius: w / 2,
        }),
        PadShape::Oval if w == h => Some(Shape::Circle {
            center: c,
            radius: w / 2,
        }),
        PadShape::Oval => {
            let delta = if w > h {
                IPoint::new((w - h) / 2, 0)
            } else {
                IPoint::new(0, (h - w) / 2)
            };
            Some(Shape::Segment {
                seg: Seg::new(rot(-delta), rot(delta)),
                width: w.min(h),
            })
        }
        PadShape::Rect => Some(convex(
            [(-1, -1), (1, -1), (1, 1), (-1, 1)]
                .iter()
                .map(|&(sx, sy)| rot(IPoint::new(sx * w / 2, sy * h / 2)))
                .collect(),
        )),
        PadShape::Trapezoid => {
            let (dx, dy) = (pad.delta.x / 2, pad.delta.y / 2);
            Some(convex(
                [
                    IPoint::new(-w / 2 - dy, h / 2 + dx),
                    IPoint::new(w / 2 + dy, h / 2 - dx),
                    IPoint::new(w / 2 - dy, -h / 2 + dx),
                    IPoint::new(-w / 2 + dy, -h / 2 - dx),
                ]
                .into_iter()
                .map(rot)
                .collect(),
            ))
        }
        PadShape::RoundRect => {
            let r = (w.min(h) as f64 * pad.roundrect_ratio.clamp(0.0, 0.5)) as i64;
            let (hx, hy) = (w / 2 - r, h / 2 - r);
            let mut pts = Vec::with_capacity(32);
            for (i, (cx, cy)) in [(hx, hy), (-hx, hy), (-hx, -hy), (hx, -hy)].into_iter().enumerate() {
                for step in 0..=8 {
                    let a = (i as f64 * 90.0 + step as f64 * 11.25).to_radians();
                    let p = IPoint::new(
                        cx + (r as f64 * a.cos()).round() as i64,
                        cy + (r as f64 * a.sin()).round() as i64,
                    );
                    pts.push(rot(p));
                }
            }
            Some(convex(pts))
        }
        PadShape::Custom => None,
    }
}

/// Converts a host pad into a solid. Pads without copper are skipped.
fn sync_pad(pad: &Pad, copper_layers: u8) -> Option<Solid> {
    let first = pad.layers.iter().copied().filter(|&l| l < copper_layers).min()?;
    let layers = match pad.attribute {
        PadAttribute::Standard | PadAttribute::HoleNotPlated => {
            LayerRange::new(0, copper_layers.saturating_sub(1))
        }
        PadAttribute::Smd | PadAttribute::Conn => LayerRange::single(first),
    };

    let offset = pad.offset.rotate(IPoint::new(0, 0), pad.orientation);
    let centre = pad.position + offset;
    let Some(shape) = pad_shape(pad, centre) else {
        log::warn!(
            "pad {:?} ({}): unsupported {:?} shape, skipped",
            pad.id,
            pad.name,
            pad.shape
        );
        return None;
    };

    let mut solid = Solid::new(pad.position, layers, pad.net, Some(shape));
    solid.parent = Some(BoardItemRef::Pad(pad.id));
    Some(solid)
}

fn sync_track(track: &board::Track) -> Segment {
    let mut seg = Segment::new(Seg::new(track.start, track.end), track.width, track.layer, track.net);
    seg.parent = Some(BoardItemRef::Track(track.id));
    seg.locked = track.locked;
    seg
}

fn sync_via(via: &board::Via) -> Via {
    let mut v = Via::new(
        via.position,
        LayerRange::new(via.top, via.bottom),
        via.diameter,
        via.drill,
        via.net,
    );
    v.via_type = via.via_type;
    v.parent = Some(BoardItemRef::Via(via.id));
    v.locked = via.locked;
    v
}

impl RouterIface for BoardIface {
    fn sync_world(&mut self, world: &mut Node) -> Result<(), BoardError> {
        let Some(board) = self.board.as_ref() else {
            log::warn!("no board attached, aborting sync");
            return Err(BoardError::NoBoard);
        };
        let _timer = ScopedTimer::new("world sync");

        let mut pads = 0;
        for (_, pad) in board.pads() {
            if let Some(solid) = sync_pad(pad, board.copper_layers) {
                world.add(Item::Solid(solid));
                pads += 1;
            }
        }
        for track in &board.tracks {
            world.add(Item::Segment(sync_track(track)));
        }
        for via in &board.vias {
            world.add(Item::Via(sync_via(via)));
        }

        world.set_rules(Rc::new(BoardRuleResolver::new(board)));
        world.set_max_clearance(4 * board.biggest_clearance().max(DEFAULT_CLEARANCE));
        log::info!(
            "synced {} pads, {} tracks, {} vias",
            pads,
            board.tracks.len(),
            board.vias.len()
        );
        Ok(())
    }

    fn add_item(&mut self, item: &Item) -> Option<BoardItemRef> {
        let board = self.board.as_mut()?;
        match item {
            Item::Segment(s) => {
                let id = TrackId(board.allocate_id());
                self.staged.add(StagedItem::Track(board::Track {
                    id,
                    start: s.seg.a,
                    end: s.seg.b,
                    width: s.width,
                    layer: s.layer,
                    net: s.net,
                    locked: false,
                }));
                Some(BoardItemRef::Track(id))
            }
            Item::Via(v) => {
                let id = ViaId(board.allocate_id());
                self.staged.add(StagedItem::Via(board::Via {
                    id,
                    position: v.pos,
                    diameter: v.diameter,
                    drill: v.drill,
                    top: v.layers.start(),
                    bottom: v.layers.end(),
                    net: v.net,
                    via_type: v.via_type,
                    locked: false,
                }));
                Some(BoardItemRef::Via(id))
            }
            Item::Solid(_) | Item::Line(_) => None,
        }
    }

    fn remove_item(&mut self, item: &Item) {
        if let Some(handle) = item.parent() {
            self.staged.remove(handle);
        }
    }

    fn commit(&mut self) -> Result<(), BoardError> {
        self.erase_view();
        let staged = std::mem::take(&mut self.staged);
        let board = self.board.as_mut().ok_or(BoardError::NoBoard)?;
        match staged.push(board, "routed track") {
            Ok(_) => Ok(()),
            Err(e) => {
                log::warn!("commit rejected: {}", e);
                Err(e)
            }
        }
    }

    fn display_item(&mut self, item: &Item, color: PreviewColor, clearance: i64) {
        let mut push = |shape: Shape| {
            self.preview.push(PreviewRecord {
                shape,
                layers: item.layers(),
                net: item.net(),
                color,
                clearance,
            })
        };
        if let Some(shape) = item.shape() {
            push(shape);
        }
        if let Item::Line(line) = item {
            if let Some(via) = line.via() {
                push(via.shape());
            }
        }
    }

    fn hide_item(&mut self, item: &Item) {
        if let Some(handle) = item.parent() {
            self.hidden.insert(handle);
        }
    }

    fn erase_view(&mut self) {
        self.preview.clear();
        self.hidden.clear();
    }

    fn layer_count(&self) -> u8 {
        self.board.as_ref().map_or(0, |b| b.copper_layers)
    }

    fn net_sizes(&self, net: Option<NetId>) -> Option<NetSizes> {
        let class = self.board.as_ref()?.net_class(net);
        Some(NetSizes {
            clearance: class.clearance,
            track_width: class.track_width,
            via_diameter: class.via_diameter,
            via_drill: class.via_drill,
            diff_pair_width: class.diff_pair_width,
            diff_pair_gap: class.diff_pair_gap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pns_common::db::board::{Footprint, NetClass};
    use crate::item::kind;
    use pns_common::db::indices::PadId;

    fn pad(id: u32, shape: PadShape, attribute: PadAttribute, layers: Vec<u8>) -> Pad {
        Pad {
            id: PadId(id),
            name: id.to_string(),
            position: IPoint::new(1_000_000, 0),
            size: IPoint::new(2_000_000, 1_000_000),
            shape,
            attribute,
            layers,
            net: None,
            orientation: 0.0,
            offset: IPoint::new(0, 0),
            local_clearance: 0,
            delta: IPoint::new(0, 0),
            roundrect_ratio: 0.25,
        }
    }

    #[test]
    fn smd_pads_live_on_their_first_copper_layer() {
        let solid = sync_pad(&pad(1, PadShape::Rect, PadAttribute::Smd, vec![1]), 4).unwrap();
        assert_eq!(solid.layers, LayerRange::single(1));
        assert_eq!(solid.parent, Some(BoardItemRef::Pad(PadId(1))));

        let th = sync_pad(&pad(2, PadShape::Circle, PadAttribute::Standard, vec![0, 3]), 4).unwrap();
        assert_eq!(th.layers, LayerRange::new(0, 3));
    }

    #[test]
    fn non_copper_and_custom_pads_are_skipped() {
        assert!(sync_pad(&pad(1, PadShape::Rect, PadAttribute::HoleNotPlated, vec![]), 2).is_none());
        assert!(sync_pad(&pad(2, PadShape::Custom, PadAttribute::Smd, vec![0]), 2).is_none());
    }

    #[test]
    fn rotated_oval_becomes_a_vertical_capsule() {
        let mut p = pad(1, PadShape::Oval, PadAttribute::Smd, vec![0]);
        p.orientation = 90.0;
        let shape = sync_pad(&p, 2).unwrap().shape.unwrap();
        let Shape::Segment { seg, width } = shape else {
            panic!("expected a capsule, got {:?}", shape);
        };
        assert_eq!(width, 1_000_000);
        assert_eq!(seg.a.x, 1_000_000);
        assert_eq!((seg.b.y - seg.a.y).abs(), 1_000_000);
    }

    #[test]
    fn round_rect_stays_inside_its_box() {
        let solid = sync_pad(&pad(1, PadShape::RoundRect, PadAttribute::Smd, vec![0]), 2).unwrap();
        let bbox = solid.shape.unwrap().bbox();
        assert_eq!(bbox.min, IPoint::new(0, -500_000));
        assert_eq!(bbox.max, IPoint::new(2_000_000, 500_000));
    }

    #[test]
    fn sync_installs_rules_and_max_clearance() {
        let mut board = Board::new(2);
        board.add_net_class(NetClass {
            name: "Hv".into(),
            clearance: 1_000_000,
            ..NetClass::default()
        });
        let hv = board.add_net("HV", "Hv");
        board.footprints.push(Footprint {
            reference: "J1".into(),
            local_clearance: 0,
            pads: vec![pad(3, PadShape::Rect, PadAttribute::Smd, vec![0])],
        });
        board.add_track(board::Track {
            id: TrackId(9),
            start: IPoint::new(0, 5_000_000),
            end: IPoint::new(5_000_000, 5_000_000),
            width: 250_000,
            layer: 0,
            net: Some(hv),
            locked: true,
        });

        let mut iface = BoardIface::with_board(board);
        let mut world = Node::new();
        iface.sync_world(&mut world).unwrap();

        assert_eq!(world.item_count(), 2);
        assert_eq!(world.max_clearance(), 4_000_000);
        assert_eq!(world.net_clearance(Some(hv)), 1_000_000);
        let id = world.find_by_parent(BoardItemRef::Track(TrackId(9))).unwrap();
        assert!(world.item(id).unwrap().is_locked());
    }

    #[test]
    fn pad_override_larger_than_class_bound_is_queried() {
        let mut board = Board::new(2);
        let a = board.add_net("A", "Default");
        let b = board.add_net("B", "Default");
        let mut p = pad(4, PadShape::Circle, PadAttribute::Smd, vec![0]);
        p.position = IPoint::new(0, 0);
        p.size = IPoint::new(1_000_000, 1_000_000);
        p.net = Some(a);
        p.local_clearance = 2_000_000;
        board.footprints.push(Footprint {
            reference: "U1".into(),
            local_clearance: 0,
            pads: vec![p],
        });
        // 1.4mm between the pad edge and the track edge
        board.add_track(board::Track {
            id: TrackId(1),
            start: IPoint::new(-5_000_000, 2_025_000),
            end: IPoint::new(5_000_000, 2_025_000),
            width: 250_000,
            layer: 0,
            net: Some(b),
            locked: false,
        });

        let mut iface = BoardIface::with_board(board);
        let mut world = Node::new();
        iface.sync_world(&mut world).unwrap();
        assert_eq!(world.max_clearance(), 8_000_000);

        let id = world.find_by_parent(BoardItemRef::Track(TrackId(1))).unwrap();
        let track = world.item(id).unwrap().clone();
        let hits = world.query_colliding(&track, kind::SOLID);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].clearance, 2_000_000);
        assert_eq!(hits[0].item.parent(), Some(BoardItemRef::Pad(PadId(4))));
    }

    #[test]
    fn sync_without_board_fails() {
        let mut iface = BoardIface::new();
        assert_eq!(iface.sync_world(&mut Node::new()), Err(BoardError::NoBoard));
    }

    #[test]
    fn staged_items_land_on_commit() {
        let mut iface = BoardIface::with_board(Board::new(2));
        let seg = Item::Segment(Segment::new(
            Seg::new(IPoint::new(0, 0), IPoint::new(1_000, 0)),
            100,
            0,
            None,
        ));
        let handle = iface.add_item(&seg).unwrap();
        iface.display_item(&seg, PreviewColor::Normal, 0);
        assert!(iface.board().unwrap().tracks.is_empty());
        iface.commit().unwrap();
        assert!(iface.board().unwrap().contains(handle));
        assert!(iface.preview().is_empty());
    }
}
