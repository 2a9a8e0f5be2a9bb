//! Boxes, polygons and sampling helpers shared by the placers.
//!
//! Boxes live in canvas-pixel space (y grows downward). Polygons handed to
//! the area placer live in the chart's domain space, whose horizontal axis may
//! be cyclic (right ascension in degrees wraps at 360).

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Contains, Coord, LineString, MultiPolygon, Point,
    Polygon, Rect, Translate,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Box whose every coordinate is NaN. Never open, never indexed.
    pub const INVALID: BoundingBox = BoundingBox {
        xmin: f64::NAN,
        ymin: f64::NAN,
        xmax: f64::NAN,
        ymax: f64::NAN,
    };

    /// Builds a box from two corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
        }
    }

    pub fn from_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Square box of half-size `radius` around `center`.
    pub fn around(center: Coord<f64>, radius: f64) -> Self {
        Self::new(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        )
    }

    /// Box spanning a line segment; degenerate for axis-parallel segments.
    pub fn from_segment(a: Coord<f64>, b: Coord<f64>) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: (self.xmin + self.xmax) * 0.5,
            y: (self.ymin + self.ymax) * 0.5,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }

    /// True when the interiors overlap. Boxes that only share an edge do not
    /// intersect; a zero-width box (a vertical segment) strictly inside
    /// another does.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    pub fn inflate(&self, pad: f64) -> Self {
        if pad <= 0.0 {
            return *self;
        }
        Self {
            xmin: self.xmin - pad,
            ymin: self.ymin - pad,
            xmax: self.xmax + pad,
            ymax: self.ymax + pad,
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            xmin: self.xmin + dx,
            ymin: self.ymin + dy,
            xmax: self.xmax + dx,
            ymax: self.ymax + dy,
        }
    }

    pub fn approx_eq(&self, other: &BoundingBox, eps: f64) -> bool {
        (self.xmin - other.xmin).abs() <= eps
            && (self.ymin - other.ymin).abs() <= eps
            && (self.xmax - other.xmax).abs() <= eps
            && (self.ymax - other.ymax).abs() <= eps
    }
}

pub fn coord_is_finite(c: Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

/// A polygon is usable for geometric operations when it has at least three
/// distinct finite vertices and a non-zero area.
pub fn polygon_is_valid(polygon: &Polygon<f64>) -> bool {
    let ring = polygon.exterior();
    if ring.0.len() < 3 || !ring.coords().all(|c| coord_is_finite(*c)) {
        return false;
    }
    polygon.unsigned_area() > f64::EPSILON
}

/// Picks a uniformly random point inside `polygon` by rejection sampling
/// inside its bounding rectangle. Gives up after `max_iterations` draws.
pub fn random_point_in_polygon<R: Rng + ?Sized>(
    polygon: &Polygon<f64>,
    rng: &mut R,
    max_iterations: usize,
) -> Option<Coord<f64>> {
    let rect: Rect<f64> = polygon.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    if !(coord_is_finite(min) && coord_is_finite(max)) {
        return None;
    }
    for _ in 0..max_iterations {
        let point = Coord {
            x: sample_range(rng, min.x, max.x),
            y: sample_range(rng, min.y, max.y),
        };
        if polygon.contains(&Point::from(point)) {
            return Some(point);
        }
    }
    None
}

/// Picks a random point inside `polygon` lying `distance` away from
/// `origin`, trying random bearings up to `max_iterations` times.
pub fn random_point_in_polygon_at_distance<R: Rng + ?Sized>(
    polygon: &Polygon<f64>,
    origin: Coord<f64>,
    distance: f64,
    rng: &mut R,
    max_iterations: usize,
) -> Option<Coord<f64>> {
    if !coord_is_finite(origin) || !distance.is_finite() {
        return None;
    }
    if distance <= 0.0 {
        return polygon.contains(&Point::from(origin)).then_some(origin);
    }
    for _ in 0..max_iterations {
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        let point = Coord {
            x: origin.x + distance * angle.cos(),
            y: origin.y + distance * angle.sin(),
        };
        if polygon.contains(&Point::from(point)) {
            return Some(point);
        }
    }
    None
}

fn sample_range<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

/// Returns true when some edge of the exterior ring, the closing edge
/// included, jumps by more than half the period. Edges are read the short
/// way round, so such a jump means the ring crosses the seam.
pub fn straddles_boundary(polygon: &Polygon<f64>, period: f64) -> bool {
    let half = period * 0.5;
    polygon
        .exterior()
        .lines()
        .any(|line| (line.end.x - line.start.x).abs() > half)
}

/// Rewrites a polygon that crosses the seam so that it is contiguous in an
/// extended range. Each vertex is shifted by whole periods so that no edge
/// jumps by more than half a period:
/// `[(350,10),(10,10),(10,-10),(350,-10)]` becomes `[(350,10),(370,10),...]`.
///
/// A ring whose walk ends a full period away from where it started encircles
/// a pole. It is closed along the pole's parallel, a quarter period from the
/// equator on the side of the ring. If the rewrite does not give a usable
/// polygon the input is returned unchanged.
pub fn unwrap_polygon(polygon: &Polygon<f64>, period: f64) -> Polygon<f64> {
    if !(period > 0.0) || !straddles_boundary(polygon, period) {
        return polygon.clone();
    }
    let (mut ring, net) = unwrap_ring(polygon.exterior(), period);
    if net.abs() > period * 0.5 {
        ring = close_around_pole(ring, net, period);
    }
    let anchor = mean_x(&ring);
    let interiors = polygon
        .interiors()
        .iter()
        .map(|hole| {
            let (coords, _) = unwrap_ring(hole, period);
            let x = mean_x(&coords);
            let shift = unwrap_x_near(x, anchor, period) - x;
            coords
                .into_iter()
                .map(|c| Coord { x: c.x + shift, y: c.y })
                .collect::<LineString<f64>>()
        })
        .collect();
    let unwrapped = Polygon::new(LineString::from(ring), interiors);
    if polygon_is_valid(&unwrapped) {
        unwrapped
    } else {
        log::debug!("seam unwrap left a degenerate ring; keeping the region as given");
        polygon.clone()
    }
}

/// Walks an open copy of `ring`, carrying a whole-period shift across every
/// edge that jumps by more than half a period. Returns the shifted vertices
/// and the net shift picked up on the way back to the first vertex.
fn unwrap_ring(ring: &LineString<f64>, period: f64) -> (Vec<Coord<f64>>, f64) {
    let coords = &ring.0;
    let open = match coords.split_last() {
        Some((last, rest)) if ring.is_closed() && !rest.is_empty() && *last == rest[0] => rest,
        _ => coords.as_slice(),
    };
    let mut shift = 0.0;
    let mut out = Vec::with_capacity(open.len() + 3);
    let mut prev: Option<f64> = None;
    for c in open {
        if let Some(p) = prev {
            shift += period_jump(c.x - p, period);
        }
        prev = Some(c.x);
        push_vertex(&mut out, Coord { x: c.x + shift, y: c.y });
    }
    if let (Some(first), Some(last)) = (open.first(), open.last()) {
        shift += period_jump(first.x - last.x, period);
    }
    (out, shift)
}

fn close_around_pole(mut ring: Vec<Coord<f64>>, net: f64, period: f64) -> Vec<Coord<f64>> {
    let Some(&first) = ring.first() else {
        return ring;
    };
    let mean_y = ring.iter().map(|c| c.y).sum::<f64>() / ring.len() as f64;
    let pole = if mean_y >= 0.0 { period * 0.25 } else { -period * 0.25 };
    let end = first.x + net;
    push_vertex(&mut ring, Coord { x: end, y: first.y });
    push_vertex(&mut ring, Coord { x: end, y: pole });
    push_vertex(&mut ring, Coord { x: first.x, y: pole });
    ring
}

/// Appends a vertex, skipping repeats and folding back zero-width spurs.
fn push_vertex(ring: &mut Vec<Coord<f64>>, c: Coord<f64>) {
    if ring.last() == Some(&c) {
        return;
    }
    if ring.len() >= 2 && ring[ring.len() - 2] == c {
        ring.pop();
        return;
    }
    ring.push(c);
}

fn period_jump(dx: f64, period: f64) -> f64 {
    if dx.abs() > period * 0.5 {
        -period * (dx / period).round()
    } else {
        0.0
    }
}

fn mean_x(coords: &[Coord<f64>]) -> f64 {
    if coords.is_empty() {
        return 0.0;
    }
    coords.iter().map(|c| c.x).sum::<f64>() / coords.len() as f64
}

/// Shifts `x` by whole periods so it lands within half a period of `near`.
pub fn unwrap_x_near(x: f64, near: f64, period: f64) -> f64 {
    if !(period > 0.0) {
        return x;
    }
    x - period * ((x - near) / period).round()
}

/// Joins polygon pieces that were cut at the seam back into one contiguous
/// polygon. Each piece is first moved to the period nearest the first
/// piece, then everything is unioned; the largest resulting part wins.
pub fn merge_across_boundary(pieces: &[Polygon<f64>], period: f64) -> Option<Polygon<f64>> {
    let mut valid = pieces
        .iter()
        .map(|p| unwrap_polygon(p, period))
        .filter(polygon_is_valid);
    let first = valid.next()?;
    let reference = first.centroid()?.x();
    let mut merged = MultiPolygon::new(vec![first]);
    for piece in valid {
        let Some(center) = piece.centroid() else {
            continue;
        };
        let shift = unwrap_x_near(center.x(), reference, period) - center.x();
        let moved = piece.translate(shift, 0.0);
        merged = merged.union(&MultiPolygon::new(vec![moved]));
    }
    largest_polygon(merged)
}

/// Union of the polygon with its copies one period to either side, so that
/// an intersection against an unwrapped polygon sees the whole extent.
pub fn extend_across_boundary(polygon: &Polygon<f64>, period: f64) -> MultiPolygon<f64> {
    let base = MultiPolygon::new(vec![polygon.clone()]);
    let left = MultiPolygon::new(vec![polygon.translate(-period, 0.0)]);
    let right = MultiPolygon::new(vec![polygon.translate(period, 0.0)]);
    base.union(&left).union(&right)
}

/// Cuts an unwrapped polygon into pieces that each lie within `[0, period)`.
pub fn split_at_boundary(polygon: &Polygon<f64>, period: f64) -> MultiPolygon<f64> {
    let Some(rect) = polygon.bounding_rect() else {
        return MultiPolygon::new(Vec::new());
    };
    let (ymin, ymax) = (rect.min().y - 1.0, rect.max().y + 1.0);
    let first = (rect.min().x / period).floor() as i64;
    let last = (rect.max().x / period).floor() as i64;
    let mut pieces = Vec::new();
    for k in first..=last {
        let offset = k as f64 * period;
        let strip = Rect::new(
            Coord { x: offset, y: ymin },
            Coord {
                x: offset + period,
                y: ymax,
            },
        )
        .to_polygon();
        let cut = polygon.intersection(&strip);
        for piece in cut {
            if piece.unsigned_area() > f64::EPSILON {
                pieces.push(piece.translate(-offset, 0.0));
            }
        }
    }
    MultiPolygon::new(pieces)
}

/// Largest polygon of a multipolygon by area.
pub fn largest_polygon(multi: MultiPolygon<f64>) -> Option<Polygon<f64>> {
    multi
        .into_iter()
        .filter(|p| p.unsigned_area() > f64::EPSILON)
        .max_by(|a, b| {
            a.unsigned_area()
                .partial_cmp(&b.unsigned_area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn boxes_sharing_an_edge_do_not_intersect() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&BoundingBox::new(9.0, 9.0, 12.0, 12.0)));
    }

    #[test]
    fn vertical_segment_inside_box_intersects() {
        let line = BoundingBox::from_segment(Coord { x: 5.0, y: -5.0 }, Coord { x: 5.0, y: 15.0 });
        let label = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(label.intersects(&line));
    }

    #[test]
    fn new_orders_corners() {
        let b = BoundingBox::new(10.0, 8.0, 2.0, 4.0);
        assert_eq!(b, BoundingBox::new(2.0, 4.0, 10.0, 8.0));
        assert!(b.xmin <= b.xmax && b.ymin <= b.ymax);
    }

    #[test]
    fn invalid_box_is_not_finite() {
        assert!(!BoundingBox::INVALID.is_finite());
        assert!(!BoundingBox::new(0.0, f64::INFINITY, 1.0, 1.0).is_finite());
    }

    #[test]
    fn random_point_lands_inside_polygon() {
        let poly = square(0.0, 0.0, 10.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let p = random_point_in_polygon(&poly, &mut rng, 50).expect("point");
            assert!(poly.contains(&Point::from(p)));
        }
    }

    #[test]
    fn random_point_at_distance_respects_distance() {
        let poly = square(-50.0, -50.0, 100.0);
        let origin = Coord { x: 0.0, y: 0.0 };
        let mut rng = StdRng::seed_from_u64(3);
        let p = random_point_in_polygon_at_distance(&poly, origin, 12.0, &mut rng, 10).expect("point");
        let d = ((p.x - origin.x).powi(2) + (p.y - origin.y).powi(2)).sqrt();
        assert!((d - 12.0).abs() < 1e-9);
    }

    #[test]
    fn random_point_at_distance_gives_up_outside() {
        let poly = square(0.0, 0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let origin = Coord { x: 0.5, y: 0.5 };
        assert!(random_point_in_polygon_at_distance(&poly, origin, 50.0, &mut rng, 10).is_none());
    }

    #[test]
    fn zero_distance_returns_origin_when_inside() {
        let poly = square(0.0, 0.0, 4.0);
        let mut rng = StdRng::seed_from_u64(1);
        let origin = Coord { x: 2.0, y: 2.0 };
        assert_eq!(
            random_point_in_polygon_at_distance(&poly, origin, 0.0, &mut rng, 1),
            Some(origin)
        );
    }

    #[test]
    fn unwrap_polygon_makes_seam_polygon_contiguous() {
        let poly = polygon![
            (x: 350.0, y: 10.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: -10.0),
            (x: 350.0, y: -10.0),
        ];
        assert!(straddles_boundary(&poly, 360.0));
        let unwrapped = unwrap_polygon(&poly, 360.0);
        let rect = unwrapped.bounding_rect().expect("rect");
        assert_eq!(rect.min().x, 350.0);
        assert_eq!(rect.max().x, 370.0);
        let center = unwrapped.centroid().expect("centroid");
        assert!((center.x() - 360.0).abs() < 1e-9);
        assert!(center.y().abs() < 1e-9);
        assert!((unwrapped.unsigned_area() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn unwrap_leaves_ordinary_polygon_alone() {
        let poly = square(100.0, 0.0, 20.0);
        assert_eq!(unwrap_polygon(&poly, 360.0), poly);
    }

    #[test]
    fn polar_cap_with_pole_edge_keeps_its_area() {
        let octans = polygon![
            (x: 0.0, y: -82.5),
            (x: 90.0, y: -82.5),
            (x: 180.0, y: -82.5),
            (x: 270.0, y: -82.5),
            (x: 360.0, y: -82.5),
            (x: 360.0, y: -90.0),
            (x: 0.0, y: -90.0),
        ];
        let unwrapped = unwrap_polygon(&octans, 360.0);
        assert!((unwrapped.unsigned_area() - 2700.0).abs() < 1e-9);
        let rect = unwrapped.bounding_rect().expect("rect");
        assert_eq!((rect.min().x, rect.max().x), (0.0, 360.0));
        let center = unwrapped.centroid().expect("centroid");
        assert!(unwrapped.contains(&center));
        // Unwrapping again changes nothing.
        assert_eq!(unwrap_polygon(&unwrapped, 360.0), unwrapped);
    }

    #[test]
    fn bare_ring_around_pole_is_closed_at_the_pole() {
        let ring = polygon![
            (x: 0.0, y: 80.0),
            (x: 90.0, y: 80.0),
            (x: 180.0, y: 80.0),
            (x: 270.0, y: 80.0),
        ];
        let cap = unwrap_polygon(&ring, 360.0);
        assert!((cap.unsigned_area() - 3600.0).abs() < 1e-9);
        let rect = cap.bounding_rect().expect("rect");
        assert_eq!((rect.min().y, rect.max().y), (80.0, 90.0));
    }

    #[test]
    fn wide_region_with_short_edges_is_not_a_seam_crossing() {
        let wide = polygon![
            (x: 10.0, y: 0.0),
            (x: 100.0, y: 0.0),
            (x: 200.0, y: 0.0),
            (x: 300.0, y: 0.0),
            (x: 300.0, y: 10.0),
            (x: 200.0, y: 10.0),
            (x: 100.0, y: 10.0),
            (x: 10.0, y: 10.0),
        ];
        assert!(!straddles_boundary(&wide, 360.0));
        assert_eq!(unwrap_polygon(&wide, 360.0), wide);
    }

    #[test]
    fn merge_joins_pieces_cut_at_seam() {
        let left = polygon![
            (x: 350.0, y: -5.0),
            (x: 360.0, y: -5.0),
            (x: 360.0, y: 5.0),
            (x: 350.0, y: 5.0),
        ];
        let right = polygon![
            (x: 0.0, y: -5.0),
            (x: 10.0, y: -5.0),
            (x: 10.0, y: 5.0),
            (x: 0.0, y: 5.0),
        ];
        let merged = merge_across_boundary(&[left, right], 360.0).expect("merged");
        assert!((merged.unsigned_area() - 200.0).abs() < 1e-6);
        let rect = merged.bounding_rect().expect("rect");
        assert!((rect.min().x - 350.0).abs() < 1e-9);
        assert!((rect.max().x - 370.0).abs() < 1e-9);
    }

    #[test]
    fn split_cuts_unwrapped_polygon_back_into_range() {
        let poly = square(350.0, -10.0, 20.0);
        let pieces = split_at_boundary(&poly, 360.0);
        assert_eq!(pieces.0.len(), 2);
        let total: f64 = pieces.iter().map(|p| p.unsigned_area()).sum();
        assert!((total - 400.0).abs() < 1e-6);
        for piece in pieces.iter() {
            let rect = piece.bounding_rect().expect("rect");
            assert!(rect.min().x >= -1e-9 && rect.max().x <= 360.0 + 1e-9);
        }
    }

    #[test]
    fn extended_extent_covers_unwrapped_range() {
        let extent = square(0.0, -90.0, 360.0);
        let extended = extend_across_boundary(&extent, 360.0);
        assert!(extended.contains(&Point::new(365.0, 0.0)));
        assert!(extended.contains(&Point::new(-5.0, 0.0)));
    }

    #[test]
    fn polygon_validity_rejects_degenerate_input() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        assert!(!polygon_is_valid(&flat));
        let nan = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 2.0, y: 2.0)];
        assert!(!polygon_is_valid(&nan));
        assert!(polygon_is_valid(&square(0.0, 0.0, 1.0)));
    }

    #[test]
    fn unwrap_x_near_picks_closest_period() {
        assert_eq!(unwrap_x_near(5.0, 355.0, 360.0), 365.0);
        assert_eq!(unwrap_x_near(355.0, 5.0, 360.0), -5.0);
        assert_eq!(unwrap_x_near(100.0, 120.0, 360.0), 100.0);
    }
}
