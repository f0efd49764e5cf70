//! Tile layer: viewport resolution and the layer that drives it
//!
//! [`ViewportResolver`] decides, for one viewport state, which cached tiles
//! can be drawn (falling back to coarser ancestors) and which must be
//! fetched. [`TileLayer`] owns a viewport and re-runs the resolver lazily
//! whenever the view or the cache changed.

pub mod layer;
pub mod resolver;

pub use layer::{TileLayer, TilePlacement};
pub use resolver::{CellRange, Resolution, ResolutionPlan, ViewportResolver};
