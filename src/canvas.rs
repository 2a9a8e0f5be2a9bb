use crate::geometry::BoundingBox;
use geo::{Coord, Polygon, Rect};

/// Visible drawing area of a chart.
pub trait CanvasExtent {
    /// True when the whole box lies inside the visible canvas.
    fn contains(&self, bbox: &BoundingBox) -> bool;

    /// Visible region in the same coordinates as area-label regions.
    fn clip_polygon(&self) -> Polygon<f64>;
}

/// A `width` x `height` pixel canvas with origin at the top-left corner.
///
/// The clip polygon defaults to the canvas rectangle itself, which is right
/// when regions are given in canvas pixels. Charts that place area labels in
/// sky coordinates set the visible sky region with [`CanvasRect::with_clip`].
#[derive(Debug, Clone)]
pub struct CanvasRect {
    pub width: f64,
    pub height: f64,
    /// Inset from the canvas edge that still counts as clipped.
    pub margin: f64,
    clip: Polygon<f64>,
}

impl CanvasRect {
    pub fn new(width: f64, height: f64) -> Self {
        let clip = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: width, y: height }).to_polygon();
        Self {
            width,
            height,
            margin: 0.0,
            clip,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin.max(0.0);
        self
    }

    pub fn with_clip(mut self, clip: Polygon<f64>) -> Self {
        self.clip = clip;
        self
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.margin,
            self.margin,
            self.width - self.margin,
            self.height - self.margin,
        )
    }
}

impl CanvasExtent for CanvasRect {
    fn contains(&self, bbox: &BoundingBox) -> bool {
        bbox.is_finite() && self.bounds().contains_box(bbox)
    }

    fn clip_polygon(&self) -> Polygon<f64> {
        self.clip.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    #[test]
    fn box_inside_canvas_is_contained() {
        let canvas = CanvasRect::new(200.0, 100.0);
        assert!(canvas.contains(&BoundingBox::new(10.0, 10.0, 50.0, 30.0)));
        assert!(canvas.contains(&BoundingBox::new(0.0, 0.0, 200.0, 100.0)));
    }

    #[test]
    fn overhanging_box_is_clipped() {
        let canvas = CanvasRect::new(200.0, 100.0);
        assert!(!canvas.contains(&BoundingBox::new(190.0, 10.0, 210.0, 30.0)));
        assert!(!canvas.contains(&BoundingBox::new(-1.0, 10.0, 20.0, 30.0)));
    }

    #[test]
    fn margin_shrinks_usable_area() {
        let canvas = CanvasRect::new(200.0, 100.0).with_margin(5.0);
        assert!(!canvas.contains(&BoundingBox::new(2.0, 10.0, 20.0, 30.0)));
        assert!(canvas.contains(&BoundingBox::new(5.0, 10.0, 20.0, 30.0)));
    }

    #[test]
    fn non_finite_box_is_never_contained() {
        let canvas = CanvasRect::new(200.0, 100.0);
        assert!(!canvas.contains(&BoundingBox::INVALID));
    }

    #[test]
    fn default_clip_is_canvas_rectangle() {
        let canvas = CanvasRect::new(200.0, 100.0);
        assert!((canvas.clip_polygon().unsigned_area() - 20_000.0).abs() < 1e-9);
    }
}
