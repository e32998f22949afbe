use crate::db::indices::*;
use crate::geom::coord::from_mm;
use crate::geom::point::IPoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadShape {
    Circle,
    Oval,
    Rect,
    Trapezoid,
    RoundRect,
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadAttribute {
    Standard,
    Smd,
    Conn,
    HoleNotPlated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViaType {
    #[default]
    Through,
    Micro,
    BlindBuried,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetClass {
    pub name: String,
    pub clearance: i64,
    pub track_width: i64,
    pub via_diameter: i64,
    pub via_drill: i64,
    #[serde(default = "default_dp_width")]
    pub diff_pair_width: i64,
    #[serde(default = "default_dp_gap")]
    pub diff_pair_gap: i64,
}

impl Default for NetClass {
    fn default() -> Self {
        Self {
            name: DEFAULT_NET_CLASS.to_string(),
            clearance: from_mm(0.2),
            track_width: from_mm(0.25),
            via_diameter: from_mm(0.8),
            via_drill: from_mm(0.4),
            diff_pair_width: default_dp_width(),
            diff_pair_gap: default_dp_gap(),
        }
    }
}

pub const DEFAULT_NET_CLASS: &str = "Default";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetInfo {
    pub name: String,
    #[serde(default = "default_class_name")]
    pub class: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pad {
    pub id: PadId,
    pub name: String,
    pub position: IPoint,
    /// Width and height before rotation.
    pub size: IPoint,
    pub shape: PadShape,
    pub attribute: PadAttribute,
    /// Copper layers the pad exists on.
    #[serde(default)]
    pub layers: Vec<u8>,
    #[serde(default)]
    pub net: Option<NetId>,
    /// Degrees, counter-clockwise.
    #[serde(default)]
    pub orientation: f64,
    #[serde(default)]
    pub offset: IPoint,
    #[serde(default)]
    pub local_clearance: i64,
    /// Trapezoid deformation (x: top/bottom width delta, y: left/right).
    #[serde(default)]
    pub delta: IPoint,
    #[serde(default = "default_roundrect_ratio")]
    pub roundrect_ratio: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Footprint {
    pub reference: String,
    #[serde(default)]
    pub local_clearance: i64,
    pub pads: Vec<Pad>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub start: IPoint,
    pub end: IPoint,
    pub width: i64,
    pub layer: u8,
    #[serde(default)]
    pub net: Option<NetId>,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Via {
    pub id: ViaId,
    pub position: IPoint,
    pub diameter: i64,
    pub drill: i64,
    pub top: u8,
    pub bottom: u8,
    #[serde(default)]
    pub net: Option<NetId>,
    #[serde(default)]
    pub via_type: ViaType,
    #[serde(default)]
    pub locked: bool,
}

/// Host board: the authoritative copper database the router syncs from and
/// commits into.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Board {
    #[serde(default = "default_copper_layers")]
    pub copper_layers: u8,
    #[serde(default)]
    pub net_classes: Vec<NetClass>,
    #[serde(default)]
    pub nets: Vec<NetInfo>,
    #[serde(default)]
    pub footprints: Vec<Footprint>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub vias: Vec<Via>,
    #[serde(skip)]
    next_id: u32,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(default_copper_layers())
    }
}

impl Board {
    pub fn new(copper_layers: u8) -> Self {
        Self {
            copper_layers,
            net_classes: vec![NetClass::default()],
            nets: Vec::new(),
            footprints: Vec::new(),
            tracks: Vec::new(),
            vias: Vec::new(),
            next_id: 0,
        }
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn add_net(&mut self, name: &str, class: &str) -> NetId {
        if let Some(id) = self.find_net(name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.nets.push(NetInfo {
            name: name.to_string(),
            class: class.to_string(),
        });
        id
    }

    pub fn add_net_class(&mut self, class: NetClass) {
        self.net_classes.retain(|c| c.name != class.name);
        self.net_classes.push(class);
    }

    pub fn find_net(&self, name: &str) -> Option<NetId> {
        self.nets
            .iter()
            .position(|n| n.name == name)
            .map(NetId::new)
    }

    pub fn net_name(&self, net: NetId) -> Option<&str> {
        self.nets.get(net.index()).map(|n| n.name.as_str())
    }

    /// Net class of `net`, falling back to the default class.
    pub fn net_class(&self, net: Option<NetId>) -> NetClass {
        let name = net
            .and_then(|n| self.nets.get(n.index()))
            .map(|n| n.class.as_str())
            .unwrap_or(DEFAULT_NET_CLASS);
        self.net_classes
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.net_classes.iter().find(|c| c.name == DEFAULT_NET_CLASS))
            .cloned()
            .unwrap_or_default()
    }

    /// Largest clearance any rule can ask for: net classes plus pad and
    /// footprint local overrides.
    pub fn biggest_clearance(&self) -> i64 {
        let classes = self
            .net_classes
            .iter()
            .map(|c| c.clearance)
            .max()
            .unwrap_or_else(|| NetClass::default().clearance);
        self.pads()
            .map(|(fp, pad)| pad.local_clearance.max(fp.local_clearance))
            .fold(classes, i64::max)
    }

    pub fn pads(&self) -> impl Iterator<Item = (&Footprint, &Pad)> {
        self.footprints
            .iter()
            .flat_map(|fp| fp.pads.iter().map(move |pad| (fp, pad)))
    }

    pub fn pad(&self, id: PadId) -> Option<&Pad> {
        self.pads().map(|(_, p)| p).find(|p| p.id == id)
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn via(&self, id: ViaId) -> Option<&Via> {
        self.vias.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, item: BoardItemRef) -> bool {
        match item {
            BoardItemRef::Pad(id) => self.pad(id).is_some(),
            BoardItemRef::Track(id) => self.track(id).is_some(),
            BoardItemRef::Via(id) => self.via(id).is_some(),
        }
    }

    /// Fresh id shared by tracks and vias so handles never alias.
    pub fn allocate_id(&mut self) -> u32 {
        let used = self
            .tracks
            .iter()
            .map(|t| t.id.0)
            .chain(self.vias.iter().map(|v| v.id.0))
            .max()
            .map_or(0, |m| m + 1);
        let id = self.next_id.max(used);
        self.next_id = id + 1;
        id
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn add_via(&mut self, via: Via) {
        self.vias.push(via);
    }

    pub fn remove(&mut self, item: BoardItemRef) -> bool {
        let before = self.tracks.len() + self.vias.len();
        match item {
            BoardItemRef::Track(id) => self.tracks.retain(|t| t.id != id),
            BoardItemRef::Via(id) => self.vias.retain(|v| v.id != id),
            BoardItemRef::Pad(_) => return false,
        }
        before != self.tracks.len() + self.vias.len()
    }

    pub fn net_names(&self) -> HashMap<String, NetId> {
        self.nets
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), NetId::new(i)))
            .collect()
    }
}

fn default_copper_layers() -> u8 {
    2
}

fn default_class_name() -> String {
    DEFAULT_NET_CLASS.to_string()
}

fn default_dp_width() -> i64 {
    from_mm(0.2)
}

fn default_dp_gap() -> i64 {
    from_mm(0.25)
}

fn default_roundrect_ratio() -> f64 {
    0.25
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_tracks_and_vias() {
        let mut board = Board::new(2);
        let a = board.allocate_id();
        board.add_track(Track {
            id: TrackId(a),
            start: IPoint::new(0, 0),
            end: IPoint::new(10, 0),
            width: 1,
            layer: 0,
            net: None,
            locked: false,
        });
        let b = board.allocate_id();
        assert_ne!(a, b);
        assert!(board.remove(BoardItemRef::Track(TrackId(a))));
        assert!(!board.remove(BoardItemRef::Track(TrackId(a))));
    }

    #[test]
    fn local_overrides_raise_the_biggest_clearance() {
        let mut board = Board::new(2);
        assert_eq!(board.biggest_clearance(), from_mm(0.2));
        board.footprints.push(Footprint {
            reference: "U1".into(),
            local_clearance: from_mm(0.5),
            pads: vec![Pad {
                id: PadId(0),
                name: "1".into(),
                position: IPoint::new(0, 0),
                size: IPoint::new(1_000, 1_000),
                shape: PadShape::Circle,
                attribute: PadAttribute::Smd,
                layers: vec![0],
                net: None,
                orientation: 0.0,
                offset: IPoint::new(0, 0),
                local_clearance: from_mm(2.0),
                delta: IPoint::new(0, 0),
                roundrect_ratio: 0.25,
            }],
        });
        assert_eq!(board.biggest_clearance(), from_mm(2.0));
    }

    #[test]
    fn unknown_class_falls_back_to_default() {
        let mut board = Board::new(2);
        let gnd = board.add_net("GND", "Power");
        assert_eq!(board.net_class(Some(gnd)).name, DEFAULT_NET_CLASS);
        assert_eq!(board.add_net("GND", "Power"), gnd);
    }
}
