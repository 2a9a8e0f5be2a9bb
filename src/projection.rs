//! Domain-to-canvas projections.
//!
//! The domain is right ascension / declination in degrees for sky charts, or
//! plain canvas pixels with [`IdentityProjection`]. A projection returns a
//! non-finite coordinate for points it cannot show (e.g. the antipode of a
//! stereographic chart's center); the placers treat such candidates as
//! closed.

use geo::{Coord, Polygon, Rect};
use serde::{Deserialize, Serialize};

pub trait ProjectionProvider {
    fn project(&self, point: Coord<f64>) -> Coord<f64>;

    /// Domain region covered by the canvas, if the projection knows it.
    fn visible_region(&self) -> Option<Polygon<f64>> {
        None
    }
}

/// Domain coordinates already are canvas pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjection;

impl ProjectionProvider for IdentityProjection {
    fn project(&self, point: Coord<f64>) -> Coord<f64> {
        point
    }
}

impl<P: ProjectionProvider + ?Sized> ProjectionProvider for &P {
    fn project(&self, point: Coord<f64>) -> Coord<f64> {
        (**self).project(point)
    }

    fn visible_region(&self) -> Option<Polygon<f64>> {
        (**self).visible_region()
    }
}

/// Plate carrée over an RA window that may cross 0h.
///
/// RA increases to the left, as on a sky chart seen from inside the sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equirectangular {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
    pub width: f64,
    pub height: f64,
}

impl Equirectangular {
    /// RA span in degrees; `ra_max < ra_min` means the window crosses 0.
    pub fn ra_span(&self) -> f64 {
        let span = (self.ra_max - self.ra_min).rem_euclid(360.0);
        if span == 0.0 { 360.0 } else { span }
    }
}

impl ProjectionProvider for Equirectangular {
    fn project(&self, point: Coord<f64>) -> Coord<f64> {
        let span = self.ra_span();
        let dec_span = self.dec_max - self.dec_min;
        if !point.x.is_finite() || !point.y.is_finite() || dec_span <= 0.0 {
            return Coord {
                x: f64::NAN,
                y: f64::NAN,
            };
        }
        let ra = (point.x - self.ra_min).rem_euclid(360.0);
        Coord {
            x: self.width * (1.0 - ra / span),
            y: self.height * (self.dec_max - point.y) / dec_span,
        }
    }

    fn visible_region(&self) -> Option<Polygon<f64>> {
        Some(
            Rect::new(
                Coord {
                    x: self.ra_min,
                    y: self.dec_min,
                },
                Coord {
                    x: self.ra_min + self.ra_span(),
                    y: self.dec_max,
                },
            )
            .to_polygon(),
        )
    }
}

/// Stereographic projection centred on `(center_ra, center_dec)`, scaled so
/// that `radius_deg` from the center reaches the shorter canvas half-side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stereographic {
    pub center_ra: f64,
    pub center_dec: f64,
    pub radius_deg: f64,
    pub width: f64,
    pub height: f64,
}

impl Stereographic {
    fn scale(&self) -> f64 {
        let edge = 2.0 * (self.radius_deg.to_radians() * 0.5).tan();
        (self.width.min(self.height) * 0.5) / edge.max(f64::EPSILON)
    }
}

impl ProjectionProvider for Stereographic {
    fn project(&self, point: Coord<f64>) -> Coord<f64> {
        let (ra, dec) = (point.x.to_radians(), point.y.to_radians());
        let (ra0, dec0) = (self.center_ra.to_radians(), self.center_dec.to_radians());
        let cos_c = dec0.sin() * dec.sin() + dec0.cos() * dec.cos() * (ra - ra0).cos();
        let denom = 1.0 + cos_c;
        if !(denom > 1e-9) {
            return Coord {
                x: f64::NAN,
                y: f64::NAN,
            };
        }
        let k = 2.0 / denom;
        let x = k * dec.cos() * (ra - ra0).sin();
        let y = k * (dec0.cos() * dec.sin() - dec0.sin() * dec.cos() * (ra - ra0).cos());
        let scale = self.scale();
        Coord {
            x: self.width * 0.5 - x * scale,
            y: self.height * 0.5 - y * scale,
        }
    }

    /// RA/Dec box enclosing the charted cap. Past a pole it spans all RA.
    fn visible_region(&self) -> Option<Polygon<f64>> {
        let half_diagonal = self.radius_deg * std::f64::consts::SQRT_2;
        let dec_min = (self.center_dec - half_diagonal).max(-90.0);
        let dec_max = (self.center_dec + half_diagonal).min(90.0);
        let widest = dec_min.abs().max(dec_max.abs());
        let ra_half = if widest >= 89.999 {
            180.0
        } else {
            (half_diagonal / widest.to_radians().cos()).min(180.0)
        };
        Some(
            Rect::new(
                Coord {
                    x: self.center_ra - ra_half,
                    y: dec_min,
                },
                Coord {
                    x: self.center_ra + ra_half,
                    y: dec_max,
                },
            )
            .to_polygon(),
        )
    }
}
