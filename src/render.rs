//! Rendering seam of the placers and the SVG canvas that implements it.

use crate::config::RenderConfig;
use crate::geometry::BoundingBox;
use crate::policy::{AnchorPoint, HorizontalAlign, VerticalAlign};
use crate::text_metrics::{self, TextExtent};
use crate::theme::{LabelStyle, Theme};
use anyhow::Result;
use geo::Coord;
use std::path::Path;

/// Opaque reference to a piece of text held by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub usize);

/// A label that has been drawn and measured but not yet accepted.
///
/// Every measurement is consumed by exactly one of [`Renderer::commit`] or
/// [`Renderer::rollback`], so a rejected candidate can never linger on the
/// canvas.
#[must_use = "a proposed label must be committed or rolled back"]
#[derive(Debug)]
pub struct Measurement {
    handle: RenderHandle,
    bbox: BoundingBox,
}

impl Measurement {
    pub fn handle(&self) -> RenderHandle {
        self.handle
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// Draws and measures label text.
///
/// Implementors provide the three primitive calls; the two-phase
/// `propose`/`commit`/`rollback` protocol the placers use is built on top.
pub trait Renderer {
    fn render_text(
        &mut self,
        at: Coord<f64>,
        anchor: AnchorPoint,
        offset: (f64, f64),
        style: &LabelStyle,
        text: &str,
    ) -> RenderHandle;

    /// Canvas-pixel extent of rendered text. Unknown handles measure as
    /// [`BoundingBox::INVALID`].
    fn measure(&self, handle: RenderHandle) -> BoundingBox;

    fn remove(&mut self, handle: RenderHandle);

    fn propose(
        &mut self,
        at: Coord<f64>,
        anchor: AnchorPoint,
        offset: (f64, f64),
        style: &LabelStyle,
        text: &str,
    ) -> Measurement {
        let handle = self.render_text(at, anchor, offset, style, text);
        Measurement {
            handle,
            bbox: self.measure(handle),
        }
    }

    fn commit(&mut self, measurement: Measurement) -> BoundingBox {
        measurement.bbox
    }

    fn rollback(&mut self, measurement: Measurement) {
        self.remove(measurement.handle);
    }
}

/// Box of a `width` x `height` label pinned at `at + offset` with the given
/// anchor. This is what the placers use to reposition an already measured
/// label without drawing it again.
pub fn anchored_box(
    at: Coord<f64>,
    anchor: AnchorPoint,
    offset: (f64, f64),
    width: f64,
    height: f64,
) -> BoundingBox {
    let (va, ha) = anchor.alignment();
    let x = at.x + offset.0 - width * ha.fraction();
    let y = at.y + offset.1 - height * va.fraction();
    BoundingBox::from_size(x, y, width, height)
}

#[derive(Debug, Clone)]
struct TextItem {
    text: String,
    x: f64,
    baseline: f64,
    align: HorizontalAlign,
    extent: TextExtent,
    font_size: f64,
    font_family: Option<String>,
    color: Option<String>,
}

impl TextItem {
    fn bbox(&self) -> BoundingBox {
        let xmin = match self.align {
            HorizontalAlign::Left => self.x,
            HorizontalAlign::Center => self.x - self.extent.width * 0.5,
            HorizontalAlign::Right => self.x - self.extent.width,
        };
        BoundingBox::new(
            xmin,
            self.baseline - self.extent.ascent,
            xmin + self.extent.width,
            self.baseline + self.extent.descent,
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Glyph {
    Star { at: Coord<f64>, radius: f64 },
    Marker { at: Coord<f64>, radius: f64 },
}

/// In-memory SVG canvas.
///
/// Text is laid out the way SVG draws it: a horizontal `text-anchor` and an
/// alphabetic baseline. Measurement reads the stored layout back, so it is
/// independent of [`anchored_box`].
#[derive(Debug, Clone)]
pub struct SvgCanvas {
    pub width: f64,
    pub height: f64,
    fast_metrics: bool,
    texts: Vec<Option<TextItem>>,
    glyphs: Vec<Glyph>,
    lines: Vec<(Coord<f64>, Coord<f64>)>,
    outlines: Vec<Vec<Coord<f64>>>,
}

impl SvgCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            fast_metrics: true,
            texts: Vec::new(),
            glyphs: Vec::new(),
            lines: Vec::new(),
            outlines: Vec::new(),
        }
    }

    /// Measure text with system fonts instead of the built-in width table.
    pub fn with_font_metrics(mut self, enabled: bool) -> Self {
        self.fast_metrics = !enabled;
        self
    }

    pub fn draw_star(&mut self, at: Coord<f64>, radius: f64) {
        self.glyphs.push(Glyph::Star { at, radius });
    }

    pub fn draw_marker(&mut self, at: Coord<f64>, radius: f64) {
        self.glyphs.push(Glyph::Marker { at, radius });
    }

    pub fn draw_line(&mut self, a: Coord<f64>, b: Coord<f64>) {
        self.lines.push((a, b));
    }

    /// Closed outline in canvas pixels, drawn beneath everything else.
    pub fn draw_outline(&mut self, points: Vec<Coord<f64>>) {
        if points.len() >= 3 {
            self.outlines.push(points);
        }
    }

    /// Number of labels currently on the canvas.
    pub fn text_count(&self) -> usize {
        self.texts.iter().filter(|t| t.is_some()).count()
    }

    /// Boxes of every label currently on the canvas, in drawing order.
    pub fn text_boxes(&self) -> Vec<BoundingBox> {
        self.texts.iter().flatten().map(TextItem::bbox).collect()
    }

    fn extent(&self, text: &str, style: &LabelStyle) -> TextExtent {
        match (&style.font_family, self.fast_metrics) {
            (Some(family), false) => text_metrics::measure_extent(text, style.font_size, family),
            _ => text_metrics::fast_extent(text, style.font_size),
        }
    }

    pub fn to_svg(&self, theme: &Theme) -> String {
        let mut svg = String::new();
        let (width, height) = (self.width, self.height);
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
        ));
        svg.push_str(&format!(
            "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            theme.background
        ));

        for outline in &self.outlines {
            let points: Vec<String> = outline
                .iter()
                .map(|p| format!("{:.2},{:.2}", p.x, p.y))
                .collect();
            svg.push_str(&format!(
                "<polygon points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"0.8\" stroke-dasharray=\"4 3\"/>",
                points.join(" "),
                theme.region_color
            ));
        }

        for (a, b) in &self.lines {
            svg.push_str(&format!(
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{}\"/>",
                a.x, a.y, b.x, b.y, theme.line_color, theme.line_width
            ));
        }

        for glyph in &self.glyphs {
            match glyph {
                Glyph::Star { at, radius } => svg.push_str(&format!(
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\"/>",
                    at.x, at.y, radius, theme.star_color
                )),
                Glyph::Marker { at, radius } => svg.push_str(&format!(
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.2\"/>",
                    at.x, at.y, radius, theme.marker_color
                )),
            }
        }

        for item in self.texts.iter().flatten() {
            let anchor = match item.align {
                HorizontalAlign::Left => "start",
                HorizontalAlign::Center => "middle",
                HorizontalAlign::Right => "end",
            };
            let family = item.font_family.as_deref().unwrap_or(&theme.font_family);
            let color = item.color.as_deref().unwrap_or(&theme.label_color);
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"{anchor}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                item.x,
                item.baseline,
                escape_xml(family),
                item.font_size,
                color,
                escape_xml(&item.text)
            ));
        }

        svg.push_str("</svg>");
        svg
    }
}

impl Renderer for SvgCanvas {
    fn render_text(
        &mut self,
        at: Coord<f64>,
        anchor: AnchorPoint,
        offset: (f64, f64),
        style: &LabelStyle,
        text: &str,
    ) -> RenderHandle {
        let extent = self.extent(text, style);
        let (va, ha) = anchor.alignment();
        let x = at.x + offset.0;
        let y = at.y + offset.1;
        let baseline = match va {
            VerticalAlign::Top => y + extent.ascent,
            VerticalAlign::Center => y + (extent.ascent - extent.descent) * 0.5,
            VerticalAlign::Bottom => y - extent.descent,
        };
        self.texts.push(Some(TextItem {
            text: text.to_string(),
            x,
            baseline,
            align: ha,
            extent,
            font_size: style.font_size,
            font_family: style.font_family.clone(),
            color: style.color.clone(),
        }));
        RenderHandle(self.texts.len() - 1)
    }

    fn measure(&self, handle: RenderHandle) -> BoundingBox {
        match self.texts.get(handle.0) {
            Some(Some(item)) => item.bbox(),
            _ => BoundingBox::INVALID,
        }
    }

    /// Removed slots at the end are released, so the canvas holds one slot
    /// per kept label plus any holes left below them.
    fn remove(&mut self, handle: RenderHandle) {
        if let Some(slot) = self.texts.get_mut(handle.0) {
            *slot = None;
        }
        while matches!(self.texts.last(), Some(None)) {
            self.texts.pop();
        }
    }
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, svg)?,
        None => println!("{svg}"),
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|f| f.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "sans-serif".to_string());
    opt.default_size = usvg::Size::from_wh(render_cfg.width as f32, render_cfg.height as f32)
        .ok_or_else(|| anyhow::anyhow!("Invalid canvas size {}x{}", render_cfg.width, render_cfg.height))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig, _theme: &Theme) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHORS: [AnchorPoint; 9] = [
        AnchorPoint::Center,
        AnchorPoint::TopLeft,
        AnchorPoint::TopCenter,
        AnchorPoint::TopRight,
        AnchorPoint::LeftCenter,
        AnchorPoint::RightCenter,
        AnchorPoint::BottomLeft,
        AnchorPoint::BottomCenter,
        AnchorPoint::BottomRight,
    ];

    #[test]
    fn bottom_right_label_hangs_below_and_right() {
        let mut canvas = SvgCanvas::new(400.0, 400.0);
        let style = LabelStyle::default();
        let at = Coord { x: 100.0, y: 100.0 };
        let handle = canvas.render_text(at, AnchorPoint::BottomRight, (5.0, 5.0), &style, "Sirius");
        let bbox = canvas.measure(handle);
        assert!((bbox.xmin - 105.0).abs() < 1e-9);
        assert!((bbox.ymin - 105.0).abs() < 1e-9);
        assert!(bbox.width() > 0.0 && bbox.height() > 0.0);
    }

    #[test]
    fn analytic_box_matches_measured_box_for_every_anchor() {
        let mut canvas = SvgCanvas::new(400.0, 400.0);
        let style = LabelStyle::default();
        let at = Coord { x: 200.0, y: 150.0 };
        let first = canvas.render_text(at, AnchorPoint::BottomRight, (6.0, 3.0), &style, "Aldebaran");
        let reference = canvas.measure(first);
        for anchor in ANCHORS {
            let offset = anchor.adjust_offset(AnchorPoint::BottomRight, (6.0, 3.0));
            let handle = canvas.render_text(at, anchor, offset, &style, "Aldebaran");
            let measured = canvas.measure(handle);
            let analytic = anchored_box(at, anchor, offset, reference.width(), reference.height());
            assert!(
                measured.approx_eq(&analytic, 1e-9),
                "{anchor:?}: measured {measured:?} vs analytic {analytic:?}"
            );
        }
    }

    #[test]
    fn rollback_removes_text() {
        let mut canvas = SvgCanvas::new(100.0, 100.0);
        let style = LabelStyle::default();
        let proposal = canvas.propose(Coord { x: 10.0, y: 10.0 }, AnchorPoint::Center, (0.0, 0.0), &style, "M31");
        let handle = proposal.handle();
        canvas.rollback(proposal);
        assert_eq!(canvas.text_count(), 0);
        assert!(!canvas.measure(handle).is_finite());
    }

    #[test]
    fn rejected_candidates_release_their_slots() {
        let mut canvas = SvgCanvas::new(100.0, 100.0);
        let style = LabelStyle::default();
        let kept = canvas.propose(Coord { x: 10.0, y: 10.0 }, AnchorPoint::Center, (0.0, 0.0), &style, "M1");
        canvas.commit(kept);
        for _ in 0..50 {
            let proposal = canvas.propose(Coord { x: 50.0, y: 50.0 }, AnchorPoint::Center, (0.0, 0.0), &style, "M2");
            canvas.rollback(proposal);
        }
        assert_eq!(canvas.texts.len(), 1);
        assert_eq!(canvas.text_count(), 1);
    }

    #[test]
    fn commit_keeps_text() {
        let mut canvas = SvgCanvas::new(100.0, 100.0);
        let style = LabelStyle::default();
        let proposal = canvas.propose(Coord { x: 10.0, y: 10.0 }, AnchorPoint::Center, (0.0, 0.0), &style, "M42");
        let expected = proposal.bbox();
        assert_eq!(canvas.commit(proposal), expected);
        assert_eq!(canvas.text_boxes(), vec![expected]);
    }

    #[test]
    fn svg_output_escapes_label_text() {
        let mut canvas = SvgCanvas::new(100.0, 100.0);
        let style = LabelStyle::default();
        canvas.render_text(Coord { x: 10.0, y: 10.0 }, AnchorPoint::BottomRight, (0.0, 0.0), &style, "A&B <x>");
        canvas.draw_star(Coord { x: 10.0, y: 10.0 }, 2.0);
        let svg = canvas.to_svg(&Theme::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("A&amp;B &lt;x&gt;"));
        assert!(svg.contains("<circle"));
    }
}
