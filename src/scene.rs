//! JSON description of a chart: what to draw and what to label.
//!
//! Positions are in the domain of the scene's projection (degrees of RA/Dec
//! for sky projections, pixels for `identity`). Labels are placed in the order
//! markers, named stars (brightest first), then areas.

use crate::geometry::{largest_polygon, merge_across_boundary, polygon_is_valid, unwrap_polygon};
use crate::policy::PolicyOverrides;
use crate::projection::{Equirectangular, IdentityProjection, ProjectionProvider, Stereographic};
use crate::theme::LabelStyle;
use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("invalid scene JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid scene JSON5: {0}")]
    Json5(#[from] json5::Error),
    #[error("canvas size must be positive and finite, got {width}x{height}")]
    InvalidCanvas { width: f64, height: f64 },
    #[error("area {label:?} has no ring with at least three points")]
    EmptyArea { label: String },
    #[error("{what} at index {index} has a non-finite coordinate")]
    NonFinite { what: &'static str, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionSpec {
    #[default]
    Identity,
    Equirectangular {
        ra_min: f64,
        ra_max: f64,
        dec_min: f64,
        dec_max: f64,
    },
    Stereographic {
        center_ra: f64,
        center_dec: f64,
        radius_deg: f64,
    },
}

impl ProjectionSpec {
    pub fn build(&self, width: f64, height: f64) -> SceneProjection {
        match *self {
            ProjectionSpec::Identity => SceneProjection::Identity(IdentityProjection),
            ProjectionSpec::Equirectangular {
                ra_min,
                ra_max,
                dec_min,
                dec_max,
            } => SceneProjection::Equirectangular(Equirectangular {
                ra_min,
                ra_max,
                dec_min,
                dec_max,
                width,
                height,
            }),
            ProjectionSpec::Stereographic {
                center_ra,
                center_dec,
                radius_deg,
            } => SceneProjection::Stereographic(Stereographic {
                center_ra,
                center_dec,
                radius_deg,
                width,
                height,
            }),
        }
    }

    /// Sky projections have a cyclic RA axis.
    pub fn is_sky(&self) -> bool {
        !matches!(self, ProjectionSpec::Identity)
    }
}

/// Projection chosen at runtime from a scene file.
#[derive(Debug, Clone, Copy)]
pub enum SceneProjection {
    Identity(IdentityProjection),
    Equirectangular(Equirectangular),
    Stereographic(Stereographic),
}

impl ProjectionProvider for SceneProjection {
    fn project(&self, point: Coord<f64>) -> Coord<f64> {
        match self {
            SceneProjection::Identity(p) => p.project(point),
            SceneProjection::Equirectangular(p) => p.project(point),
            SceneProjection::Stereographic(p) => p.project(point),
        }
    }

    fn visible_region(&self) -> Option<Polygon<f64>> {
        match self {
            SceneProjection::Identity(p) => p.visible_region(),
            SceneProjection::Equirectangular(p) => p.visible_region(),
            SceneProjection::Stereographic(p) => p.visible_region(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Star {
    pub position: [f64; 2],
    #[serde(default = "default_magnitude")]
    pub magnitude: f64,
    pub name: Option<String>,
    pub style: Option<LabelStyle>,
}

fn default_magnitude() -> f64 {
    3.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Marker {
    pub position: [f64; 2],
    pub label: Option<String>,
    pub style: Option<LabelStyle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Area {
    pub label: String,
    /// Outline pieces. A region cut at the RA seam may be given as several
    /// rings; they are joined before placement.
    pub rings: Vec<Vec<[f64; 2]>>,
    pub origin: Option<[f64; 2]>,
    pub style: Option<LabelStyle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub projection: ProjectionSpec,
    pub stars: Vec<Star>,
    pub markers: Vec<Marker>,
    pub constellation_lines: Vec<[[f64; 2]; 2]>,
    pub areas: Vec<Area>,
    pub policy: Option<PolicyOverrides>,
}

impl Scene {
    pub fn from_json_str(input: &str) -> Result<Self, SceneError> {
        let scene: Scene = serde_json::from_str(input)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn from_json5_str(input: &str) -> Result<Self, SceneError> {
        let scene: Scene = json5::from_str(input)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        let (w, h) = (self.width.unwrap_or(1.0), self.height.unwrap_or(1.0));
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(SceneError::InvalidCanvas {
                width: w,
                height: h,
            });
        }
        check_finite("star", self.stars.iter().map(|s| s.position))?;
        check_finite("marker", self.markers.iter().map(|m| m.position))?;
        check_finite(
            "constellation line",
            self.constellation_lines.iter().flat_map(|line| line.iter().copied()),
        )?;
        for area in &self.areas {
            if !area.rings.iter().any(|ring| ring.len() >= 3) {
                return Err(SceneError::EmptyArea {
                    label: area.label.clone(),
                });
            }
        }
        Ok(())
    }
}

fn check_finite(
    what: &'static str,
    points: impl Iterator<Item = [f64; 2]>,
) -> Result<(), SceneError> {
    for (index, [x, y]) in points.enumerate() {
        if !(x.is_finite() && y.is_finite()) {
            return Err(SceneError::NonFinite { what, index });
        }
    }
    Ok(())
}

pub fn to_coord([x, y]: [f64; 2]) -> Coord<f64> {
    Coord { x, y }
}

impl Area {
    /// Joins the rings into one region. With a wrap period, each ring is first
    /// unwrapped across the seam (a ring around a pole is closed at the pole)
    /// and pieces cut at the seam are moved next to each other.
    pub fn polygon(&self, wrap_period: Option<f64>) -> Option<Polygon<f64>> {
        let pieces: Vec<Polygon<f64>> = self
            .rings
            .iter()
            .filter(|ring| ring.len() >= 3)
            .map(|ring| {
                Polygon::new(
                    LineString::from(ring.iter().copied().map(to_coord).collect::<Vec<_>>()),
                    Vec::new(),
                )
            })
            .map(|piece| match wrap_period {
                Some(period) => unwrap_polygon(&piece, period),
                None => piece,
            })
            .filter(polygon_is_valid)
            .collect();
        match (pieces.len(), wrap_period) {
            (0, _) => None,
            (1, _) => pieces.into_iter().next(),
            (_, Some(period)) => merge_across_boundary(&pieces, period),
            (_, None) => {
                let mut merged = MultiPolygon::new(Vec::new());
                for piece in pieces {
                    merged = merged.union(&MultiPolygon::new(vec![piece]));
                }
                largest_polygon(merged)
            }
        }
    }
}
