//! Viewport resolution: which tiles to draw now and which to fetch.

use crate::core::geo::{grid_size, TileAddress};
use crate::core::viewport::Viewport;
use crate::prelude::BTreeSet;
use crate::tiles::cache::{RequestOutcome, TileCache};
use crate::tiles::prioritizer::RequestPrioritizer;
use crate::tiles::provider::TileProvider;

#[cfg(feature = "debug")]
use log;

/// Drawable and requested tiles for one viewport state, before any request
/// has been issued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionPlan {
    pub base_zoom: u8,
    /// Cached tiles covering the view, exact or ancestor substitutes
    pub drawable: BTreeSet<TileAddress>,
    /// Tiles that are not cached yet, including missing ancestors
    pub requested: BTreeSet<TileAddress>,
}

/// Outcome of a full resolution pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub base_zoom: u8,
    pub drawable: BTreeSet<TileAddress>,
    /// Requested tiles in issuance order
    pub requested: Vec<TileAddress>,
    /// Requests newly scheduled by this pass
    pub scheduled: usize,
    /// Stale queued requests dropped before issuing new ones
    pub cancelled: usize,
}

/// Inclusive-exclusive cell rectangle at the base zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl CellRange {
    pub fn is_empty(&self) -> bool {
        self.min_col >= self.max_col || self.min_row >= self.max_row
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.max_col - self.min_col) * (self.max_row - self.min_row)) as usize
    }
}

pub struct ViewportResolver;

impl ViewportResolver {
    /// Integer zoom tiles are selected at: the view zoom rounded and clamped
    /// into the provider's range.
    pub fn base_zoom(viewport: &Viewport, provider: &TileProvider) -> u8 {
        provider.clamp_zoom(viewport.zoom().round()) as u8
    }

    /// Cells intersecting the viewport at `base_zoom`, padded and clamped to
    /// the grid. A zero-size viewport yields an empty range.
    pub fn cell_range(viewport: &Viewport, base_zoom: u8) -> CellRange {
        let empty = CellRange {
            min_col: 0,
            max_col: 0,
            min_row: 0,
            max_row: 0,
        };
        if viewport.is_empty() {
            return empty;
        }

        let zoom = base_zoom as f64;
        let corners = viewport
            .corners()
            .map(|corner| viewport.layer_point_to_tile_address(corner).rebase_to_zoom(zoom));

        let (mut min_col, mut max_col) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_row, mut max_row) = (f64::INFINITY, f64::NEG_INFINITY);
        for corner in &corners {
            min_col = min_col.min(corner.column.floor());
            max_col = max_col.max(corner.column.ceil());
            min_row = min_row.min(corner.row.floor());
            max_row = max_row.max(corner.row.ceil());
        }
        if !(min_col.is_finite() && max_col.is_finite() && min_row.is_finite() && max_row.is_finite()) {
            return empty;
        }

        let (padding_cols, padding_rows) = viewport.padding();
        let grid = grid_size(zoom);
        let bound = |value: f64| value.clamp(0.0, grid) as u32;

        CellRange {
            min_col: bound(min_col - padding_cols as f64),
            max_col: bound(max_col + padding_cols as f64),
            min_row: bound(min_row - padding_rows as f64),
            max_row: bound(max_row + padding_rows as f64),
        }
    }

    /// Compute drawable and requested sets from the cache's current contents.
    ///
    /// Has no side effects: nothing is requested or cancelled, and repeated
    /// calls against an unchanged cache return equal plans.
    pub fn plan(viewport: &Viewport, provider: &TileProvider, cache: &TileCache) -> ResolutionPlan {
        let base_zoom = Self::base_zoom(viewport, provider);
        let range = Self::cell_range(viewport, base_zoom);
        let min_zoom = provider.min_zoom();

        let mut plan = ResolutionPlan {
            base_zoom,
            ..Default::default()
        };

        for row in range.min_row..range.max_row {
            for col in range.min_col..range.max_col {
                let candidate = TileAddress::new(row as f64, col as f64, base_zoom as f64);
                if cache.contains(candidate) {
                    plan.drawable.insert(candidate);
                    continue;
                }

                plan.requested.insert(candidate);

                // Nearest coarser cached tile stands in for the missing one.
                for zoom in (min_zoom..=base_zoom).rev() {
                    let ancestor = candidate.rebase_to_zoom(zoom as f64).floored().clamped();
                    if cache.contains(ancestor) {
                        plan.drawable.insert(ancestor);
                        break;
                    }
                    plan.requested.insert(ancestor);
                }
            }
        }

        #[cfg(feature = "debug")]
        log::trace!(
            "planned zoom {} cells {:?}: {} drawable, {} requested",
            base_zoom,
            range,
            plan.drawable.len(),
            plan.requested.len()
        );

        plan
    }

    /// Plan, drop stale queued requests, then issue fetches nearest the view
    /// center first.
    pub fn resolve(viewport: &Viewport, provider: &TileProvider, cache: &TileCache) -> Resolution {
        let plan = Self::plan(viewport, provider, cache);
        let cancelled = cache.cancel_queued();

        let requested = RequestPrioritizer::new(viewport.center()).sorted(plan.requested);
        let scheduled = requested
            .iter()
            .map(|address| cache.request_fetch(*address, provider.fetch(address)))
            .filter(|outcome| *outcome == RequestOutcome::Scheduled)
            .count();

        #[cfg(feature = "debug")]
        log::debug!(
            "resolved zoom {}: {} drawable, {} requested ({} new), {} cancelled",
            plan.base_zoom,
            plan.drawable.len(),
            requested.len(),
            scheduled,
            cancelled
        );

        Resolution {
            base_zoom: plan.base_zoom,
            drawable: plan.drawable,
            requested,
            scheduled,
            cancelled,
        }
    }
}
