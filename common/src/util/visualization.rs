use crate::db::board::{Board, PadShape};
use crate::geom::point::IPoint;
use crate::geom::rect::Rect;
use crate::geom::shape::Shape;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as ImagePoint;
use std::path::Path;

/// Extra geometry drawn on top of the board, e.g. router preview items.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub shape: Shape,
    pub color: [u8; 3],
}

const LAYER_COLORS: [Rgba<u8>; 4] = [
    Rgba([200, 52, 52, 200]),
    Rgba([60, 110, 230, 200]),
    Rgba([220, 200, 40, 200]),
    Rgba([60, 200, 120, 200]),
];

struct Canvas {
    img: RgbaImage,
    area: Rect,
    scale: f64,
}

impl Canvas {
    fn map(&self, p: IPoint) -> (f32, f32) {
        (
            ((p.x - self.area.min.x) as f64 * self.scale) as f32,
            (self.img.height() as f64 - (p.y - self.area.min.y) as f64 * self.scale) as f32,
        )
    }

    fn circle(&mut self, c: IPoint, r: i64, color: Rgba<u8>) {
        let (x, y) = self.map(c);
        let r = ((r as f64 * self.scale) as i32).max(1);
        draw_filled_circle_mut(&mut self.img, (x as i32, y as i32), r, color);
    }

    fn polygon(&mut self, pts: &[IPoint], color: Rgba<u8>) {
        let mut mapped: Vec<ImagePoint<i32>> = pts
            .iter()
            .map(|&p| {
                let (x, y) = self.map(p);
                ImagePoint::new(x as i32, y as i32)
            })
            .collect();
        mapped.dedup();
        while mapped.len() > 1 && mapped.first() == mapped.last() {
            mapped.pop();
        }
        if mapped.len() >= 3 {
            draw_polygon_mut(&mut self.img, &mapped, color);
        }
    }

    fn thick_line(&mut self, a: IPoint, b: IPoint, width: i64, color: Rgba<u8>) {
        let half = width / 2;
        if a != b && (width as f64 * self.scale) >= 2.0 {
            let n = (b - a).perpendicular().resize(half);
            self.polygon(&[a + n, b + n, b - n, a - n], color);
            self.circle(a, half, color);
            self.circle(b, half, color);
        } else {
            let (pa, pb) = (self.map(a), self.map(b));
            draw_line_segment_mut(&mut self.img, pa, pb, color);
        }
    }

    fn shape(&mut self, shape: &Shape, color: Rgba<u8>) {
        match shape {
            Shape::Circle { center, radius } => self.circle(*center, *radius, color),
            Shape::Segment { seg, width } => self.thick_line(seg.a, seg.b, *width, color),
            Shape::Convex(poly) => self.polygon(poly.points(), color),
            Shape::Chain { chain, width } => {
                for s in chain.segments() {
                    self.thick_line(s.a, s.b, *width, color);
                }
            }
        }
    }
}

fn board_area(board: &Board, overlays: &[Overlay]) -> Option<Rect> {
    let pads = board.pads().flat_map(|(_, p)| {
        let r = p.size.x.max(p.size.y);
        [p.position - IPoint::new(r, r), p.position + IPoint::new(r, r)]
    });
    let tracks = board.tracks.iter().flat_map(|t| [t.start, t.end]);
    let vias = board.vias.iter().map(|v| v.position);
    let extra = overlays.iter().flat_map(|o| {
        let b = o.shape.bbox();
        [b.min, b.max]
    });
    Rect::bounding(pads.chain(tracks).chain(vias).chain(extra))
}

/// Renders copper (pads, tracks, vias) and overlays to a PNG file.
pub fn draw_board(
    board: &Board,
    overlays: &[Overlay],
    filename: &str,
    width: u32,
    height: u32,
) -> image::ImageResult<()> {
    let img = RgbaImage::from_pixel(width, height, Rgba([15, 15, 20, 255]));

    let Some(bounds) = board_area(board, overlays) else {
        return img.save(Path::new(filename));
    };
    let area = bounds.inflate(bounds.width().max(bounds.height()) / 20 + 1);
    let scale = (width as f64 / area.width().max(1) as f64)
        .min(height as f64 / area.height().max(1) as f64);

    let mut canvas = Canvas { img, area, scale };

    let mut tracks: Vec<_> = board.tracks.iter().collect();
    tracks.sort_by_key(|t| std::cmp::Reverse(t.layer));
    for t in tracks {
        let color = LAYER_COLORS[(t.layer as usize).min(LAYER_COLORS.len() - 1)];
        canvas.thick_line(t.start, t.end, t.width, color);
    }

    let pad_color = Rgba([190, 150, 60, 230]);
    for (_, pad) in board.pads() {
        if pad.shape == PadShape::Circle {
            canvas.circle(pad.position, pad.size.x / 2, pad_color);
            continue;
        }
        let h = IPoint::new(pad.size.x / 2, pad.size.y / 2);
        let corners = [
            IPoint::new(-h.x, -h.y),
            IPoint::new(h.x, -h.y),
            IPoint::new(h.x, h.y),
            IPoint::new(-h.x, h.y),
        ]
        .map(|c| (pad.position + c).rotate(pad.position, pad.orientation));
        canvas.polygon(&corners, pad_color);
    }

    for via in &board.vias {
        canvas.circle(via.position, via.diameter / 2, Rgba([200, 200, 200, 255]));
        canvas.circle(via.position, via.drill / 2, Rgba([15, 15, 20, 255]));
    }

    for o in overlays {
        let [r, g, b] = o.color;
        canvas.shape(&o.shape, Rgba([r, g, b, 255]));
    }

    canvas.img.save(Path::new(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::seg::Seg;

    #[test]
    fn renders_board_with_overlay() {
        let board = crate::util::generator::generate_random_board(5, 3, 20.0);
        let overlays = [Overlay {
            shape: Shape::Segment {
                seg: Seg::new(IPoint::new(0, 0), IPoint::new(5_000_000, 0)),
                width: 1,
            },
            color: [255, 40, 40],
        }];
        let path = std::env::temp_dir().join(format!("pns-render-{}.png", std::process::id()));
        let filename = path.to_string_lossy().into_owned();

        draw_board(&board, &overlays, &filename, 200, 120).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();
        assert_eq!((img.width(), img.height()), (200, 120));
    }
}
