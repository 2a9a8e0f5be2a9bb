//! Greedy label placement against per-chart spatial indexes.
//!
//! A [`PlacementSession`] lives for one chart render. Callers first seed it
//! with the boxes of everything already drawn (markers, stars, constellation
//! line segments), then submit labels one at a time in priority order: each
//! accepted label claims its box, so earlier labels win contested space.

mod area;
mod point;

use crate::canvas::CanvasExtent;
use crate::geometry::BoundingBox;
use crate::index::{Category, SpatialIndexManager};
use crate::policy::CollisionPolicy;
use crate::projection::{IdentityProjection, ProjectionProvider};
use crate::render::Renderer;
use crate::theme::LabelStyle;
use geo::{Coord, Polygon};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub use point::{Candidate, point_candidates};

/// Where a label wants to go.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Canvas-pixel point the label is pinned to.
    Point(Coord<f64>),
    /// Region in domain coordinates, with an optional preferred center.
    Region {
        polygon: Polygon<f64>,
        origin: Option<Coord<f64>>,
    },
}

#[derive(Debug, Clone)]
pub struct LabelRequest<'a> {
    pub text: String,
    pub target: Target,
    pub style: LabelStyle,
    pub policy: &'a CollisionPolicy,
}

impl<'a> LabelRequest<'a> {
    pub fn point(
        text: impl Into<String>,
        at: Coord<f64>,
        style: LabelStyle,
        policy: &'a CollisionPolicy,
    ) -> Self {
        Self {
            text: text.into(),
            target: Target::Point(at),
            style,
            policy,
        }
    }

    pub fn region(
        text: impl Into<String>,
        polygon: Polygon<f64>,
        origin: Option<Coord<f64>>,
        style: LabelStyle,
        policy: &'a CollisionPolicy,
    ) -> Self {
        Self {
            text: text.into(),
            target: Target::Region { polygon, origin },
            style,
            policy,
        }
    }
}

/// Session-wide geometry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Period of the domain's horizontal axis (360 for right ascension), or
    /// `None` when it does not wrap.
    pub wrap_period: Option<f64>,
    /// Inward buffer applied to area-label regions, in domain units.
    pub edge_margin: f64,
    /// Share of a region's area the buffered region must keep for the
    /// caller's origin to be honoured.
    pub min_area_retention: f64,
    /// Extra clearance around label boxes when testing for collisions, in
    /// pixels.
    pub padding: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            wrap_period: None,
            edge_margin: 0.1,
            min_area_retention: 0.9,
            padding: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementStats {
    pub placed: usize,
    pub forced: usize,
    pub dropped: usize,
}

/// Indexes, renderer, canvas and projection of one chart render.
pub struct PlacementSession<R, E, P = IdentityProjection> {
    renderer: R,
    extent: E,
    projection: P,
    index: SpatialIndexManager,
    config: PlacementConfig,
    stats: PlacementStats,
}

impl<R: Renderer, E: CanvasExtent> PlacementSession<R, E> {
    pub fn new(renderer: R, extent: E) -> Self {
        Self {
            renderer,
            extent,
            projection: IdentityProjection,
            index: SpatialIndexManager::new(),
            config: PlacementConfig::default(),
            stats: PlacementStats::default(),
        }
    }
}

impl<R: Renderer, E: CanvasExtent, P: ProjectionProvider> PlacementSession<R, E, P> {
    pub fn with_projection<Q: ProjectionProvider>(self, projection: Q) -> PlacementSession<R, E, Q> {
        PlacementSession {
            renderer: self.renderer,
            extent: self.extent,
            projection,
            index: self.index,
            config: self.config,
            stats: self.stats,
        }
    }

    pub fn with_config(mut self, config: PlacementConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn register_marker(&mut self, bbox: BoundingBox) -> bool {
        self.index.insert(Category::Marker, bbox)
    }

    pub fn register_star(&mut self, bbox: BoundingBox) -> bool {
        self.index.insert(Category::Star, bbox)
    }

    pub fn register_constellation_segment(&mut self, bbox: BoundingBox) -> bool {
        self.index.insert(Category::ConstellationLine, bbox)
    }

    pub fn index(&self) -> &SpatialIndexManager {
        &self.index
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn stats(&self) -> PlacementStats {
        self.stats
    }

    /// Places a label by its target kind.
    pub fn place(&mut self, request: &LabelRequest<'_>) -> Option<BoundingBox> {
        match &request.target {
            Target::Point(_) => self.place_point_label(request),
            Target::Region { polygon, .. } => self.place_area_label(request, polygon),
        }
    }

    /// Ends the session and hands back the renderer.
    pub fn into_renderer(self) -> R {
        log::debug!(
            "label placement finished: {} placed, {} forced, {} dropped ({} labels indexed)",
            self.stats.placed,
            self.stats.forced,
            self.stats.dropped,
            self.index.len(Category::Label)
        );
        self.renderer
    }

    /// Open-space test shared by both placers. Each collision class is
    /// checked only when the policy forbids it.
    fn is_open(&self, bbox: &BoundingBox, policy: &CollisionPolicy) -> bool {
        if !bbox.is_finite() {
            return false;
        }
        if !policy.allow_clipped() && !self.extent.contains(bbox) {
            return false;
        }
        let query = bbox.inflate(self.config.padding);
        if !policy.allow_label_collisions() && self.index.query_intersects(Category::Label, &query) {
            return false;
        }
        if !policy.allow_marker_collisions()
            && (self.index.query_intersects(Category::Marker, &query)
                || self.index.query_intersects(Category::Star, &query))
        {
            return false;
        }
        if !policy.allow_line_collisions()
            && self
                .index
                .query_intersects(Category::ConstellationLine, &query)
        {
            return false;
        }
        true
    }

    fn accept(&mut self, bbox: BoundingBox, forced: bool) -> BoundingBox {
        self.index.insert(Category::Label, bbox);
        if forced {
            self.stats.forced += 1;
        } else {
            self.stats.placed += 1;
        }
        bbox
    }

    fn drop_label(&mut self, text: &str, reason: &str) -> Option<BoundingBox> {
        log::trace!("dropped label {text:?}: {reason}");
        self.stats.dropped += 1;
        None
    }
}

/// RNG for one placement call. A fixed seed makes area placement
/// reproducible across runs.
pub(crate) fn placement_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
