use super::{LabelRequest, PlacementSession, Target};
use crate::canvas::CanvasExtent;
use crate::geometry::BoundingBox;
use crate::policy::{AnchorPoint, CollisionPolicy};
use crate::projection::ProjectionProvider;
use crate::render::{Renderer, anchored_box};
use crate::theme::LabelStyle;

/// One anchor/offset pair to try for a point label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub anchor: AnchorPoint,
    pub offset: (f64, f64),
}

/// Ordered candidates for a point label: the style's own anchor first, then
/// the policy fallbacks with offsets mirrored to suit each anchor. Capped at
/// `policy.attempts()`.
pub fn point_candidates(style: &LabelStyle, policy: &CollisionPolicy) -> Vec<Candidate> {
    let preferred = style.anchor;
    let offset = style.offset();
    let mut candidates = Vec::with_capacity(policy.anchor_fallbacks().len() + 1);
    candidates.push(Candidate {
        anchor: preferred,
        offset: preferred.adjust_offset(preferred, offset),
    });
    candidates.extend(
        policy
            .anchor_fallbacks()
            .iter()
            .filter(|anchor| **anchor != preferred)
            .map(|&anchor| Candidate {
                anchor,
                offset: anchor.adjust_offset(preferred, offset),
            }),
    );
    candidates.truncate(policy.attempts());
    candidates
}

impl<R: Renderer, E: CanvasExtent, P: ProjectionProvider> PlacementSession<R, E, P> {
    /// Places a label next to a canvas point.
    ///
    /// The first candidate is drawn and measured; later candidates reuse its
    /// size and are only drawn once one of them is open. Returns the box of
    /// the accepted label, or `None` when every candidate collides and the
    /// policy does not force placement.
    pub fn place_point_label(&mut self, request: &LabelRequest<'_>) -> Option<BoundingBox> {
        let Target::Point(at) = request.target else {
            return self.drop_label(&request.text, "region target given to the point placer");
        };
        let policy = request.policy;
        let style = &request.style;
        let candidates = point_candidates(style, policy);
        let mut size: Option<(f64, f64)> = None;

        for candidate in &candidates {
            let bbox = match size {
                Some((width, height)) => {
                    anchored_box(at, candidate.anchor, candidate.offset, width, height)
                }
                None => {
                    let proposal = self.renderer.propose(
                        at,
                        candidate.anchor,
                        candidate.offset,
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
                    log::trace!(
                        "label {:?} rejected at {:?}",
                        request.text,
                        candidate.anchor
                    );
                    continue;
                }
            };
            if self.is_open(&bbox, policy) {
                let proposal = self.renderer.propose(
                    at,
                    candidate.anchor,
                    candidate.offset,
                    style,
                    &request.text,
                );
                let bbox = self.renderer.commit(proposal);
                return Some(self.accept(bbox, false));
            }
            log::trace!(
                "label {:?} rejected at {:?}",
                request.text,
                candidate.anchor
            );
        }

        let Some(last) = candidates.last().filter(|_| policy.plot_on_fail()) else {
            return self.drop_label(&request.text, "no open candidate");
        };
        let proposal = self
            .renderer
            .propose(at, last.anchor, last.offset, style, &request.text);
        if !proposal.bbox().is_finite() {
            self.renderer.rollback(proposal);
            return self.drop_label(&request.text, "target cannot be drawn");
        }
        let bbox = self.renderer.commit(proposal);
        log::trace!("forced label {:?} at {:?}", request.text, last.anchor);
        Some(self.accept(bbox, true))
    }
}
