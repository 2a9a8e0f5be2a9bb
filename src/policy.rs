//! Anchors and the collision policy handed to every placement call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

impl VerticalAlign {
    /// Fraction of the label height that sits above the anchor position.
    pub fn fraction(self) -> f64 {
        match self {
            VerticalAlign::Top => 0.0,
            VerticalAlign::Center => 0.5,
            VerticalAlign::Bottom => 1.0,
        }
    }
}

impl HorizontalAlign {
    /// Fraction of the label width that sits left of the anchor position.
    pub fn fraction(self) -> f64 {
        match self {
            HorizontalAlign::Left => 0.0,
            HorizontalAlign::Center => 0.5,
            HorizontalAlign::Right => 1.0,
        }
    }
}

/// Where a label sits relative to the point it annotates.
///
/// Canvas y grows downward, so `BottomRight` puts the label below and to the
/// right of the point: the label's top-left corner is pinned there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPoint {
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    LeftCenter,
    RightCenter,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl AnchorPoint {
    pub fn alignment(self) -> (VerticalAlign, HorizontalAlign) {
        use HorizontalAlign as H;
        use VerticalAlign as V;
        match self {
            AnchorPoint::Center => (V::Center, H::Center),
            AnchorPoint::TopLeft => (V::Bottom, H::Right),
            AnchorPoint::TopCenter => (V::Bottom, H::Center),
            AnchorPoint::TopRight => (V::Bottom, H::Left),
            AnchorPoint::LeftCenter => (V::Center, H::Right),
            AnchorPoint::RightCenter => (V::Center, H::Left),
            AnchorPoint::BottomLeft => (V::Top, H::Right),
            AnchorPoint::BottomCenter => (V::Top, H::Center),
            AnchorPoint::BottomRight => (V::Top, H::Left),
        }
    }

    /// Offset to use for this anchor when the caller's offset was written for
    /// `preferred`: a component flips sign when its axis alignment differs.
    /// A component is dropped when either anchor is centred on that axis,
    /// since a centred preferred anchor gives it no direction to mirror.
    pub fn adjust_offset(self, preferred: AnchorPoint, offset: (f64, f64)) -> (f64, f64) {
        let (va, ha) = self.alignment();
        let (pref_va, pref_ha) = preferred.alignment();
        let x = if ha == HorizontalAlign::Center || pref_ha == HorizontalAlign::Center {
            0.0
        } else if ha == pref_ha {
            offset.0
        } else {
            -offset.0
        };
        let y = if va == VerticalAlign::Center || pref_va == VerticalAlign::Center {
            0.0
        } else if va == pref_va {
            offset.1
        } else {
            -offset.1
        };
        (x, y)
    }
}

/// Bottom-right and top-left come first; they are the least likely to land on
/// a marker drawn above or below the point.
pub const DEFAULT_ANCHOR_FALLBACKS: [AnchorPoint; 8] = [
    AnchorPoint::BottomRight,
    AnchorPoint::TopLeft,
    AnchorPoint::TopRight,
    AnchorPoint::BottomLeft,
    AnchorPoint::BottomCenter,
    AnchorPoint::TopCenter,
    AnchorPoint::RightCenter,
    AnchorPoint::LeftCenter,
];

pub const DEFAULT_ATTEMPTS: usize = 500;
pub const DEFAULT_AREA_MAX_DISTANCE: f64 = 25.0;
pub const DEFAULT_AREA_DISTANCE_STEP: f64 = 0.05;
pub const DEFAULT_SAMPLING_RETRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("anchor fallback list is empty")]
    EmptyFallbacks,
    #[error("attempt budget must be at least 1")]
    ZeroAttempts,
    #[error("area search distance step must be positive and finite, got {0}")]
    InvalidDistanceStep(f64),
    #[error("area search max distance must be non-negative and finite, got {0}")]
    InvalidMaxDistance(f64),
    #[error("sampling retry budget must be at least 1")]
    ZeroSamplingRetries,
}

/// Permissiveness and search budget for placement calls.
///
/// Built once per chart (or per call) with [`CollisionPolicy::builder`] and
/// then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionPolicy {
    allow_clipped: bool,
    allow_label_collisions: bool,
    allow_marker_collisions: bool,
    allow_line_collisions: bool,
    plot_on_fail: bool,
    attempts: usize,
    seed: Option<u64>,
    anchor_fallbacks: Vec<AnchorPoint>,
    max_distance: f64,
    distance_step: f64,
    sampling_retries: usize,
}

impl Default for CollisionPolicy {
    fn default() -> Self {
        Self {
            allow_clipped: false,
            allow_label_collisions: false,
            allow_marker_collisions: false,
            allow_line_collisions: false,
            plot_on_fail: false,
            attempts: DEFAULT_ATTEMPTS,
            seed: None,
            anchor_fallbacks: DEFAULT_ANCHOR_FALLBACKS.to_vec(),
            max_distance: DEFAULT_AREA_MAX_DISTANCE,
            distance_step: DEFAULT_AREA_DISTANCE_STEP,
            sampling_retries: DEFAULT_SAMPLING_RETRIES,
        }
    }
}

impl CollisionPolicy {
    pub fn builder() -> CollisionPolicyBuilder {
        CollisionPolicyBuilder::default()
    }

    /// Builder pre-filled with this policy's values.
    pub fn to_builder(&self) -> CollisionPolicyBuilder {
        CollisionPolicyBuilder {
            policy: self.clone(),
        }
    }

    pub fn allow_clipped(&self) -> bool {
        self.allow_clipped
    }

    pub fn allow_label_collisions(&self) -> bool {
        self.allow_label_collisions
    }

    pub fn allow_marker_collisions(&self) -> bool {
        self.allow_marker_collisions
    }

    pub fn allow_line_collisions(&self) -> bool {
        self.allow_line_collisions
    }

    pub fn plot_on_fail(&self) -> bool {
        self.plot_on_fail
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn anchor_fallbacks(&self) -> &[AnchorPoint] {
        &self.anchor_fallbacks
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn distance_step(&self) -> f64 {
        self.distance_step
    }

    pub fn sampling_retries(&self) -> usize {
        self.sampling_retries
    }

    /// Number of distance steps the area search walks through, capped by the
    /// attempt budget.
    pub fn area_steps(&self) -> usize {
        let steps = (self.max_distance / self.distance_step).ceil().max(1.0) as usize;
        steps.min(self.attempts)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollisionPolicyBuilder {
    policy: CollisionPolicy,
}

impl CollisionPolicyBuilder {
    pub fn allow_clipped(mut self, value: bool) -> Self {
        self.policy.allow_clipped = value;
        self
    }

    pub fn allow_label_collisions(mut self, value: bool) -> Self {
        self.policy.allow_label_collisions = value;
        self
    }

    pub fn allow_marker_collisions(mut self, value: bool) -> Self {
        self.policy.allow_marker_collisions = value;
        self
    }

    pub fn allow_line_collisions(mut self, value: bool) -> Self {
        self.policy.allow_line_collisions = value;
        self
    }

    pub fn plot_on_fail(mut self, value: bool) -> Self {
        self.policy.plot_on_fail = value;
        self
    }

    pub fn attempts(mut self, value: usize) -> Self {
        self.policy.attempts = value;
        self
    }

    pub fn seed(mut self, value: Option<u64>) -> Self {
        self.policy.seed = value;
        self
    }

    pub fn anchor_fallbacks(mut self, value: impl Into<Vec<AnchorPoint>>) -> Self {
        self.policy.anchor_fallbacks = value.into();
        self
    }

    pub fn max_distance(mut self, value: f64) -> Self {
        self.policy.max_distance = value;
        self
    }

    pub fn distance_step(mut self, value: f64) -> Self {
        self.policy.distance_step = value;
        self
    }

    pub fn sampling_retries(mut self, value: usize) -> Self {
        self.policy.sampling_retries = value;
        self
    }

    pub fn build(self) -> Result<CollisionPolicy, PolicyError> {
        let policy = self.policy;
        if policy.anchor_fallbacks.is_empty() {
            return Err(PolicyError::EmptyFallbacks);
        }
        if policy.attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !(policy.distance_step.is_finite() && policy.distance_step > 0.0) {
            return Err(PolicyError::InvalidDistanceStep(policy.distance_step));
        }
        if !(policy.max_distance.is_finite() && policy.max_distance >= 0.0) {
            return Err(PolicyError::InvalidMaxDistance(policy.max_distance));
        }
        if policy.sampling_retries == 0 {
            return Err(PolicyError::ZeroSamplingRetries);
        }
        Ok(policy)
    }
}

/// Mirror of [`CollisionPolicy`] with every field optional, as read from a
/// config file. Missing fields keep the base policy's value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverrides {
    pub allow_clipped: Option<bool>,
    pub allow_label_collisions: Option<bool>,
    pub allow_marker_collisions: Option<bool>,
    pub allow_line_collisions: Option<bool>,
    pub plot_on_fail: Option<bool>,
    pub attempts: Option<usize>,
    pub seed: Option<u64>,
    pub anchor_fallbacks: Option<Vec<AnchorPoint>>,
    pub max_distance: Option<f64>,
    pub distance_step: Option<f64>,
    pub sampling_retries: Option<usize>,
}

impl PolicyOverrides {
    pub fn apply(self, base: &CollisionPolicy) -> Result<CollisionPolicy, PolicyError> {
        let mut builder = base.to_builder();
        if let Some(v) = self.allow_clipped {
            builder = builder.allow_clipped(v);
        }
        if let Some(v) = self.allow_label_collisions {
            builder = builder.allow_label_collisions(v);
        }
        if let Some(v) = self.allow_marker_collisions {
            builder = builder.allow_marker_collisions(v);
        }
        if let Some(v) = self.allow_line_collisions {
            builder = builder.allow_line_collisions(v);
        }
        if let Some(v) = self.plot_on_fail {
            builder = builder.plot_on_fail(v);
        }
        if let Some(v) = self.attempts {
            builder = builder.attempts(v);
        }
        if let Some(v) = self.seed {
            builder = builder.seed(Some(v));
        }
        if let Some(v) = self.anchor_fallbacks {
            builder = builder.anchor_fallbacks(v);
        }
        if let Some(v) = self.max_distance {
            builder = builder.max_distance(v);
        }
        if let Some(v) = self.distance_step {
            builder = builder.distance_step(v);
        }
        if let Some(v) = self.sampling_retries {
            builder = builder.sampling_retries(v);
        }
        builder.build()
    }
}
