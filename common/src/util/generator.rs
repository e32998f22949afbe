use crate::db::board::{Board, Footprint, NetClass, Pad, PadAttribute, PadShape, Track};
use crate::db::indices::{PadId, TrackId};
use crate::geom::coord::from_mm;
use crate::geom::point::IPoint;
use rand::Rng;

/// Random benchmark board: two-pad footprints joined by partially routed
/// tracks, plus one differential pair.
pub fn generate_random_board(num_footprints: usize, num_nets: usize, size_mm: f64) -> Board {
    let mut rng = rand::thread_rng();
    let mut board = Board::new(2);
    board.add_net_class(NetClass {
        name: "HighSpeed".to_string(),
        clearance: from_mm(0.15),
        track_width: from_mm(0.2),
        ..NetClass::default()
    });

    let nets = num_nets.max(1);
    for i in 0..nets {
        board.add_net(&format!("N{}", i), "Default");
    }
    let dp_p = board.add_net("USB_P", "HighSpeed");
    let dp_n = board.add_net("USB_N", "HighSpeed");

    let extent = from_mm(size_mm);
    let pad_size = IPoint::new(from_mm(1.2), from_mm(0.8));

    log::info!(
        "Generating board: {} footprints, {} nets, {:.1}mm square",
        num_footprints,
        nets,
        size_mm
    );

    let mut pad_id = 0u32;
    for i in 0..num_footprints {
        let origin = IPoint::new(
            rng.gen_range(0..extent.max(1)),
            rng.gen_range(0..extent.max(1)),
        );
        let net = board.find_net(&format!("N{}", rng.gen_range(0..nets)));
        let mut pads = Vec::with_capacity(2);
        for k in 0..2 {
            pads.push(Pad {
                id: PadId(pad_id),
                name: format!("{}", k + 1),
                position: origin + IPoint::new(k as i64 * from_mm(2.54), 0),
                size: pad_size,
                shape: if k == 0 { PadShape::Rect } else { PadShape::Oval },
                attribute: PadAttribute::Smd,
                layers: vec![0],
                net,
                orientation: 0.0,
                offset: IPoint::default(),
                local_clearance: 0,
                delta: IPoint::default(),
                roundrect_ratio: 0.25,
            });
            pad_id += 1;
        }

        if rng.gen_bool(0.5) {
            let start = origin + IPoint::new(from_mm(2.54), 0);
            let len = rng.gen_range(from_mm(1.0)..from_mm(6.0));
            let id = board.allocate_id();
            board.add_track(Track {
                id: TrackId(id),
                start,
                end: start + IPoint::new(len, 0),
                width: from_mm(0.25),
                layer: 0,
                net,
                locked: false,
            });
        }

        board.footprints.push(Footprint {
            reference: format!("R{}", i + 1),
            local_clearance: 0,
            pads,
        });
    }

    let dp_origin = IPoint::new(0, extent + from_mm(2.0));
    let mut dp_pads = Vec::new();
    for (k, net) in [dp_p, dp_n].into_iter().enumerate() {
        dp_pads.push(Pad {
            id: PadId(pad_id),
            name: format!("{}", k + 1),
            position: dp_origin + IPoint::new(0, k as i64 * from_mm(0.5)),
            size: IPoint::new(from_mm(0.3), from_mm(0.3)),
            shape: PadShape::Circle,
            attribute: PadAttribute::Smd,
            layers: vec![0],
            net: Some(net),
            orientation: 0.0,
            offset: IPoint::default(),
            local_clearance: 0,
            delta: IPoint::default(),
            roundrect_ratio: 0.25,
        });
        pad_id += 1;
    }
    board.footprints.push(Footprint {
        reference: "J1".to_string(),
        local_clearance: 0,
        pads: dp_pads,
    });

    board
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_board_is_consistent() {
        let board = generate_random_board(10, 4, 30.0);
        assert_eq!(board.footprints.len(), 11);
        assert!(board.find_net("USB_P").is_some());
        for track in &board.tracks {
            let net = track.net.expect("generated tracks carry a net");
            assert!(net.index() < board.net_count());
        }
    }
}
