pub mod canvas;
pub mod chart;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod geometry;
pub mod index;
pub mod placement;
pub mod policy;
pub mod projection;
pub mod render;
pub mod scene;
pub mod text_metrics;
pub mod theme;

pub use canvas::{CanvasExtent, CanvasRect};
#[cfg(feature = "cli")]
pub use cli::run;
pub use geometry::BoundingBox;
pub use index::{Category, SpatialIndexManager};
pub use placement::{LabelRequest, PlacementConfig, PlacementSession, PlacementStats, Target};
pub use policy::{AnchorPoint, CollisionPolicy, PolicyError};
pub use projection::ProjectionProvider;
pub use render::{Measurement, RenderHandle, Renderer, SvgCanvas};
pub use theme::LabelStyle;
