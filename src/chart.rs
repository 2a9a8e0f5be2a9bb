//! Scene to chart: draws the scene's glyphs, registers them as obstacles and
//! places every label in priority order.

use crate::canvas::CanvasRect;
use crate::config::Config;
use crate::geometry::{BoundingBox, coord_is_finite, split_at_boundary};
use crate::placement::{LabelRequest, PlacementSession, PlacementStats};
use crate::policy::CollisionPolicy;
use crate::projection::ProjectionProvider;
use crate::render::SvgCanvas;
use crate::scene::{Scene, SceneProjection, to_coord};
use crate::theme::{LabelStyle, Theme};
use anyhow::{Context, Result};
use geo::{Coord, Polygon};

pub struct Chart {
    pub canvas: SvgCanvas,
    pub stats: PlacementStats,
}

impl Chart {
    pub fn to_svg(&self, theme: &Theme) -> String {
        self.canvas.to_svg(theme)
    }
}

type ChartSession = PlacementSession<SvgCanvas, CanvasRect, SceneProjection>;

pub fn plot_scene(scene: &Scene, config: &Config) -> Result<Chart> {
    let width = scene.width.unwrap_or(config.render.width);
    let height = scene.height.unwrap_or(config.render.height);
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(anyhow::anyhow!("Invalid canvas size {width}x{height}"));
    }

    let policy = match scene.policy.clone() {
        Some(overrides) => overrides
            .apply(&config.policy)
            .context("invalid collision policy in scene")?,
        None => config.policy.clone(),
    };

    let projection = scene.projection.build(width, height);
    let mut placement = config.placement.clone();
    if scene.projection.is_sky() && placement.wrap_period.is_none() {
        placement.wrap_period = Some(360.0);
    }
    let wrap_period = placement.wrap_period;

    let mut extent = CanvasRect::new(width, height);
    if let Some(region) = projection.visible_region() {
        extent = extent.with_clip(region);
    }
    let canvas =
        SvgCanvas::new(width, height).with_font_metrics(!config.render.fast_text_metrics);
    let mut session = PlacementSession::new(canvas, extent)
        .with_projection(projection)
        .with_config(placement);

    let areas: Vec<(&crate::scene::Area, Polygon<f64>)> = scene
        .areas
        .iter()
        .filter_map(|area| match area.polygon(wrap_period) {
            Some(polygon) => Some((area, polygon)),
            None => {
                log::debug!("area {:?} has no usable outline", area.label);
                None
            }
        })
        .collect();
    for (_, polygon) in &areas {
        draw_region_outline(&mut session, polygon, wrap_period);
    }

    draw_obstacles(&mut session, scene, config);
    place_labels(&mut session, scene, config, &policy, &areas);

    let stats = session.stats();
    Ok(Chart {
        canvas: session.into_renderer(),
        stats,
    })
}

fn draw_obstacles(session: &mut ChartSession, scene: &Scene, config: &Config) {
    let projection = *session.projection();
    let half_width = session.renderer().width * 0.5;

    for [a, b] in &scene.constellation_lines {
        let (a, b) = (projection.project(to_coord(*a)), projection.project(to_coord(*b)));
        // A segment crossing the RA seam would be drawn across the whole chart.
        if !(coord_is_finite(a) && coord_is_finite(b)) || (a.x - b.x).abs() > half_width {
            continue;
        }
        session.renderer_mut().draw_line(a, b);
        session.register_constellation_segment(BoundingBox::from_segment(a, b));
    }

    for star in &scene.stars {
        let at = projection.project(to_coord(star.position));
        if !coord_is_finite(at) {
            continue;
        }
        let radius = star_radius(star.magnitude, config.render.star_radius);
        session.renderer_mut().draw_star(at, radius);
        session.register_star(BoundingBox::around(at, radius));
    }

    for marker in &scene.markers {
        let at = projection.project(to_coord(marker.position));
        if !coord_is_finite(at) {
            continue;
        }
        let radius = config.render.marker_radius;
        session.renderer_mut().draw_marker(at, radius);
        session.register_marker(BoundingBox::around(at, radius));
    }
}

fn place_labels(
    session: &mut ChartSession,
    scene: &Scene,
    config: &Config,
    policy: &CollisionPolicy,
    areas: &[(&crate::scene::Area, Polygon<f64>)],
) {
    let projection = *session.projection();
    let point_style = config.theme.point_label_style();
    let area_style = config.theme.area_label_style();

    for marker in &scene.markers {
        let Some(text) = &marker.label else { continue };
        let at = projection.project(to_coord(marker.position));
        let style = clear_of_glyph(
            merged_style(&point_style, marker.style.as_ref()),
            config.render.marker_radius,
        );
        session.place(&LabelRequest::point(text.clone(), at, style, policy));
    }

    let mut named: Vec<_> = scene.stars.iter().filter(|s| s.name.is_some()).collect();
    named.sort_by(|a, b| a.magnitude.total_cmp(&b.magnitude));
    for star in named {
        let Some(text) = &star.name else { continue };
        let at = projection.project(to_coord(star.position));
        let style = clear_of_glyph(
            merged_style(&point_style, star.style.as_ref()),
            star_radius(star.magnitude, config.render.star_radius),
        );
        session.place(&LabelRequest::point(text.clone(), at, style, policy));
    }

    for (area, polygon) in areas {
        let style = merged_style(&area_style, area.style.as_ref());
        let origin = area.origin.map(to_coord);
        session.place(&LabelRequest::region(
            area.label.clone(),
            polygon.clone(),
            origin,
            style,
            policy,
        ));
    }
}

fn draw_region_outline(session: &mut ChartSession, polygon: &Polygon<f64>, wrap_period: Option<f64>) {
    let projection = *session.projection();
    let pieces = match wrap_period {
        Some(period) => split_at_boundary(polygon, period).0,
        None => vec![polygon.clone()],
    };
    for piece in pieces {
        let points: Vec<Coord<f64>> = piece
            .exterior()
            .coords()
            .map(|c| projection.project(*c))
            .collect();
        if points.iter().all(|p| coord_is_finite(*p)) {
            session.renderer_mut().draw_outline(points);
        }
    }
}

/// Brighter stars (lower magnitude) are drawn larger.
pub fn star_radius(magnitude: f64, base: f64) -> f64 {
    (base * (1.0 + 0.35 * (4.0 - magnitude))).clamp(base * 0.4, base * 3.0)
}

/// A per-object style replaces the theme's, except that unset fonts and
/// colors still come from the theme.
fn merged_style(base: &LabelStyle, custom: Option<&LabelStyle>) -> LabelStyle {
    let Some(custom) = custom else {
        return base.clone();
    };
    LabelStyle {
        font_family: custom.font_family.clone().or_else(|| base.font_family.clone()),
        color: custom.color.clone().or_else(|| base.color.clone()),
        ..custom.clone()
    }
}

/// Pushes the label offset out past the glyph, so a label never collides with
/// the object it names.
fn clear_of_glyph(mut style: LabelStyle, radius: f64) -> LabelStyle {
    style.offset_x = style.offset_x.abs().max(radius) * sign(style.offset_x);
    style.offset_y = style.offset_y.abs().max(radius) * sign(style.offset_y);
    style
}

fn sign(v: f64) -> f64 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brighter_stars_are_larger() {
        assert!(star_radius(0.0, 2.0) > star_radius(4.0, 2.0));
        assert_eq!(star_radius(4.0, 2.0), 2.0);
        assert_eq!(star_radius(-10.0, 2.0), 6.0);
    }

    #[test]
    fn offsets_clear_the_glyph() {
        let style = LabelStyle {
            offset_x: -2.0,
            offset_y: 3.0,
            ..LabelStyle::default()
        };
        let cleared = clear_of_glyph(style, 5.0);
        assert_eq!(cleared.offset_x, -5.0);
        assert_eq!(cleared.offset_y, 5.0);
    }

    #[test]
    fn custom_style_keeps_theme_font() {
        let base = Theme::default().point_label_style();
        let custom = LabelStyle {
            font_size: 20.0,
            ..LabelStyle::default()
        };
        let merged = merged_style(&base, Some(&custom));
        assert_eq!(merged.font_size, 20.0);
        assert_eq!(merged.font_family, base.font_family);
    }

    #[test]
    fn marker_labels_do_not_hit_their_own_marker() {
        let scene = Scene::from_json_str(
            r#"{ "width": 300, "height": 200, "markers": [ { "position": [100, 100], "label": "M57" } ] }"#,
        )
        .expect("scene");
        let chart = plot_scene(&scene, &Config::default()).expect("chart");
        assert_eq!(chart.stats.placed, 1);
        assert_eq!(chart.canvas.text_count(), 1);
    }

    #[test]
    fn sky_scene_places_star_and_area_labels() {
        let scene = Scene::from_json_str(
            r#"{
                "width": 400, "height": 400,
                "projection": { "kind": "equirectangular", "ra_min": 340, "ra_max": 20, "dec_min": -20, "dec_max": 20 },
                "stars": [ { "position": [355, 5], "magnitude": 1.0, "name": "Alpha" } ],
                "constellation_lines": [ [[15, 15], [18, 18]] ],
                "areas": [ { "label": "Seam", "rings": [[[350, 10], [10, 10], [10, -10], [350, -10]]] } ]
            }"#,
        )
        .expect("scene");
        let mut config = Config::default();
        config.policy = config.policy.to_builder().seed(Some(11)).build().expect("policy");
        let chart = plot_scene(&scene, &config).expect("chart");
        assert_eq!(chart.stats.placed, 2, "stats: {:?}", chart.stats);
        let boxes = chart.canvas.text_boxes();
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                assert!(!a.intersects(b));
            }
        }
        let svg = chart.to_svg(&config.theme);
        assert!(svg.contains("Seam"));
        assert!(svg.contains("<line"));
    }
}
