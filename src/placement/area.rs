use super::{LabelRequest, PlacementSession, Target, placement_rng};
use crate::canvas::CanvasExtent;
use crate::geometry::{
    BoundingBox, coord_is_finite, extend_across_boundary, largest_polygon, polygon_is_valid,
    random_point_in_polygon_at_distance, unwrap_polygon, unwrap_x_near,
};
use crate::policy::AnchorPoint;
use crate::projection::ProjectionProvider;
use crate::render::{Renderer, anchored_box};
use geo::{Area, BooleanOps, Buffer, Centroid, Contains, Coord, InteriorPoint, MultiPolygon, Point, Polygon};

/// Region an area label searches, with the point the search spirals out from.
#[derive(Debug, Clone)]
pub(crate) struct SearchRegion {
    pub polygon: Polygon<f64>,
    pub origin: Coord<f64>,
}

impl<R: Renderer, E: CanvasExtent, P: ProjectionProvider> PlacementSession<R, E, P> {
    /// Places a label inside a domain-space region.
    ///
    /// The region is unwrapped across the seam, clipped to the visible extent
    /// and shrunk by the edge margin. Candidates are then sampled at growing
    /// distances from the origin and centred on their projection. A point
    /// target on the request serves as the preferred origin.
    pub fn place_area_label(
        &mut self,
        request: &LabelRequest<'_>,
        region: &Polygon<f64>,
    ) -> Option<BoundingBox> {
        let hint = match &request.target {
            Target::Point(at) => Some(*at),
            Target::Region { origin, .. } => *origin,
        };
        let Some(search) = self.prepare_region(region, hint) else {
            return self.drop_label(&request.text, "region is degenerate");
        };

        let policy = request.policy;
        let style = &request.style;
        let mut rng = placement_rng(policy.seed());
        let mut size: Option<(f64, f64)> = None;
        let mut last_center: Option<Coord<f64>> = None;

        if search.polygon.contains(&Point::from(search.origin)) {
            for step in 0..policy.area_steps() {
                let distance = step as f64 * policy.distance_step();
                let Some(point) = random_point_in_polygon_at_distance(
                    &search.polygon,
                    search.origin,
                    distance,
                    &mut rng,
                    policy.sampling_retries(),
                ) else {
                    continue;
                };
                let center = self.projection.project(point);
                if !coord_is_finite(center) {
                    continue;
                }
                last_center = Some(center);

                match size {
                    Some((width, height)) => {
                        let bbox = anchored_box(center, AnchorPoint::Center, (0.0, 0.0), width, height);
                        if self.is_open(&bbox, policy) {
                            let proposal = self.renderer.propose(
                                center,
                                AnchorPoint::Center,
                                (0.0, 0.0),
                                style,
                                &request.text,
                            );
                            let bbox = self.renderer.commit(proposal);
                            return Some(self.accept(bbox, false));
                        }
                    }
                    None => {
                        let proposal = self.renderer.propose(
                            center,
                            AnchorPoint::Center,
                            (0.0, 0.0),
                            style,
                            &request.text,
                        );
                        let measured = proposal.bbox();
                        if measured.is_finite() {
                            size = Some((measured.width(), measured.height()));
                        }
                        if self.is_open(&measured, policy) {
                            let bbox = self.renderer.commit(proposal);
                            return Some(self.accept(bbox, false));
                        }
                        self.renderer.rollback(proposal);
                    }
                }
                log::trace!("area label {:?} rejected at distance {distance}", request.text);
            }
        } else {
            log::trace!("area label {:?}: origin lies outside its region", request.text);
        }

        let Some(center) = last_center.filter(|_| policy.plot_on_fail()) else {
            return self.drop_label(&request.text, "no open position in region");
        };
        let proposal = self
            .renderer
            .propose(center, AnchorPoint::Center, (0.0, 0.0), style, &request.text);
        if !proposal.bbox().is_finite() {
            self.renderer.rollback(proposal);
            return self.drop_label(&request.text, "label cannot be drawn");
        }
        let bbox = self.renderer.commit(proposal);
        log::trace!("forced area label {:?}", request.text);
        Some(self.accept(bbox, true))
    }

    /// Normalizes a region and picks the search origin.
    ///
    /// Each geometric step that yields nothing usable falls back to its input,
    /// so only a region that is degenerate to begin with is rejected.
    pub(crate) fn prepare_region(
        &self,
        region: &Polygon<f64>,
        hint: Option<Coord<f64>>,
    ) -> Option<SearchRegion> {
        if !polygon_is_valid(region) {
            log::debug!("skipping degenerate region with {} vertices", region.exterior().0.len());
            return None;
        }
        let period = self.config.wrap_period.filter(|p| *p > 0.0);
        let unwrapped = match period {
            Some(period) => unwrap_polygon(region, period),
            None => region.clone(),
        };

        let clip = self.extent.clip_polygon();
        let clipped = if polygon_is_valid(&clip) {
            let extent = match period {
                Some(period) => extend_across_boundary(&clip, period),
                None => MultiPolygon::new(vec![clip]),
            };
            let subject = MultiPolygon::new(vec![unwrapped.clone()]);
            largest_polygon(subject.intersection(&extent)).filter(polygon_is_valid)
        } else {
            None
        };
        let clipped = clipped.unwrap_or_else(|| {
            log::debug!("region does not intersect the visible extent; using it unclipped");
            unwrapped
        });

        let margin = self.config.edge_margin;
        let buffered = if margin > 0.0 {
            largest_polygon(clipped.buffer(-margin))
                .filter(polygon_is_valid)
                .unwrap_or_else(|| {
                    log::debug!("edge margin {margin} consumes the region; using it unbuffered");
                    clipped.clone()
                })
        } else {
            clipped.clone()
        };

        let retained = buffered.unsigned_area() >= self.config.min_area_retention * clipped.unsigned_area();
        let hint = hint.filter(|h| coord_is_finite(*h)).map(|h| match (period, buffered.centroid()) {
            (Some(period), Some(center)) => Coord {
                x: unwrap_x_near(h.x, center.x(), period),
                y: h.y,
            },
            _ => h,
        });
        let origin = match hint {
            Some(h) if retained && buffered.contains(&Point::from(h)) => h,
            _ => default_origin(&buffered)?,
        };

        Some(SearchRegion {
            polygon: buffered,
            origin,
        })
    }
}

/// Centroid of the region, or an interior point when the centroid falls
/// outside (crescents, rings).
fn default_origin(polygon: &Polygon<f64>) -> Option<Coord<f64>> {
    let centroid = polygon.centroid()?;
    if polygon.contains(&centroid) {
        return Some(centroid.0);
    }
    polygon.interior_point().map(|p| p.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasRect;
    use crate::index::Category;
    use crate::placement::PlacementConfig;
    use crate::policy::CollisionPolicy;
    use crate::render::SvgCanvas;
    use crate::theme::LabelStyle;
    use geo::polygon;

    fn session() -> PlacementSession<SvgCanvas, CanvasRect> {
        PlacementSession::new(SvgCanvas::new(400.0, 300.0), CanvasRect::new(400.0, 300.0))
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
    }

    fn seeded(seed: u64) -> CollisionPolicy {
        CollisionPolicy::builder()
            .seed(Some(seed))
            .max_distance(60.0)
            .distance_step(1.0)
            .build()
            .expect("policy")
    }

    #[test]
    fn label_lands_on_region_centroid_when_free() {
        let mut session = session();
        let policy = seeded(1);
        let region = rect(100.0, 100.0, 300.0, 200.0);
        let request = LabelRequest::region("Orion", region.clone(), None, LabelStyle::default(), &policy);
        let bbox = session.place_area_label(&request, &region).expect("placed");
        let center = bbox.center();
        assert!((center.x - 200.0).abs() < 1e-6 && (center.y - 150.0).abs() < 1e-6);
        assert_eq!(session.index().len(Category::Label), 1);
    }

    #[test]
    fn blocked_centroid_moves_outward() {
        let mut session = session();
        session.register_marker(BoundingBox::new(195.0, 145.0, 205.0, 155.0));
        let policy = seeded(4);
        let region = rect(60.0, 60.0, 340.0, 240.0);
        let request = LabelRequest::region("Taurus", region.clone(), None, LabelStyle::default(), &policy);
        let bbox = session.place_area_label(&request, &region).expect("placed");
        assert!(!bbox.intersects(&BoundingBox::new(195.0, 145.0, 205.0, 155.0)));
        assert_eq!(session.renderer().text_count(), 1);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let run = || {
            let mut session = session();
            session.register_marker(BoundingBox::new(180.0, 140.0, 220.0, 160.0));
            let policy = seeded(42);
            let region = rect(60.0, 60.0, 340.0, 240.0);
            let request = LabelRequest::region("Gemini", region.clone(), None, LabelStyle::default(), &policy);
            session.place_area_label(&request, &region)
        };
        let a = run().expect("first run");
        let b = run().expect("second run");
        assert_eq!(a, b);
    }

    #[test]
    fn caller_origin_is_used_when_region_survives_buffering() {
        let mut session = session();
        let policy = seeded(2);
        let region = rect(50.0, 50.0, 350.0, 250.0);
        let origin = Coord { x: 120.0, y: 100.0 };
        let request =
            LabelRequest::region("Cygnus", region.clone(), Some(origin), LabelStyle::default(), &policy);
        let bbox = session.place_area_label(&request, &region).expect("placed");
        assert!((bbox.center().x - 120.0).abs() < 1e-6 && (bbox.center().y - 100.0).abs() < 1e-6);
    }

    #[test]
    fn heavy_buffering_discards_caller_origin() {
        let session = session().with_config(PlacementConfig {
            edge_margin: 20.0,
            ..PlacementConfig::default()
        });
        let region = rect(50.0, 50.0, 150.0, 150.0);
        let search = session
            .prepare_region(&region, Some(Coord { x: 80.0, y: 80.0 }))
            .expect("region");
        assert!((search.origin.x - 100.0).abs() < 1e-6 && (search.origin.y - 100.0).abs() < 1e-6);
    }

    #[test]
    fn centroid_outside_polygon_uses_interior_point() {
        let session = session().with_config(PlacementConfig {
            edge_margin: 0.0,
            ..PlacementConfig::default()
        });
        // A U shape whose centroid sits in the notch.
        let region = polygon![
            (x: 100.0, y: 100.0),
            (x: 300.0, y: 100.0),
            (x: 300.0, y: 200.0),
            (x: 260.0, y: 200.0),
            (x: 260.0, y: 120.0),
            (x: 140.0, y: 120.0),
            (x: 140.0, y: 200.0),
            (x: 100.0, y: 200.0),
        ];
        let centroid = region.centroid().expect("centroid");
        assert!(!region.contains(&centroid));
        let search = session.prepare_region(&region, None).expect("region");
        assert!(search.polygon.contains(&Point::from(search.origin)));
    }

    #[test]
    fn polar_cap_keeps_an_interior_origin() {
        let session = session().with_config(PlacementConfig {
            wrap_period: Some(360.0),
            ..PlacementConfig::default()
        });
        let octans = polygon![
            (x: 0.0, y: -82.5),
            (x: 90.0, y: -82.5),
            (x: 180.0, y: -82.5),
            (x: 270.0, y: -82.5),
            (x: 360.0, y: -82.5),
            (x: 360.0, y: -90.0),
            (x: 0.0, y: -90.0),
        ];
        let search = session.prepare_region(&octans, None).expect("region");
        assert!(search.polygon.unsigned_area() > 2000.0);
        assert!(search.polygon.contains(&Point::from(search.origin)));
        assert!((search.origin.x - 180.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_region_is_dropped() {
        let mut session = session();
        let policy = seeded(1);
        let flat = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 20.0, y: 0.0)];
        let request = LabelRequest::region("Flat", flat.clone(), None, LabelStyle::default(), &policy);
        assert!(session.place_area_label(&request, &flat).is_none());
        assert_eq!(session.stats().dropped, 1);
        assert_eq!(session.renderer().text_count(), 0);
    }

    #[test]
    fn full_region_drops_or_forces() {
        let region = rect(100.0, 100.0, 300.0, 200.0);
        let mut session = session();
        session.register_marker(BoundingBox::new(0.0, 0.0, 400.0, 300.0));
        let policy = seeded(5);
        let request = LabelRequest::region("Leo", region.clone(), None, LabelStyle::default(), &policy);
        assert!(session.place_area_label(&request, &region).is_none());
        assert_eq!(session.renderer().text_count(), 0);

        let forced = policy.to_builder().plot_on_fail(true).build().expect("policy");
        let request = LabelRequest::region("Leo", region.clone(), None, LabelStyle::default(), &forced);
        let bbox = session.place_area_label(&request, &region).expect("forced");
        assert!(region.contains(&Point::from(bbox.center())));
        assert_eq!(session.renderer().text_count(), 1);
        assert_eq!(session.stats().forced, 1);
    }

    #[test]
    fn region_off_canvas_falls_back_to_unclipped() {
        let session = session();
        let region = rect(500.0, 500.0, 600.0, 600.0);
        let search = session.prepare_region(&region, None).expect("region");
        assert!((search.origin.x - 550.0).abs() < 1e-6);
    }
}
