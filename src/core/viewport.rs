use crate::core::constants::{MAX_SUPPORTED_ZOOM, TILE_SIZE};
use crate::core::geo::{LatLng, Point, TileAddress};
use crate::tiles::provider::TileProvider;
use serde::{Deserialize, Serialize};

/// Manages the current view of the tile pyramid: center, zoom, padding and
/// screen dimensions.
///
/// Every mutation raises the dirty flag; whoever owns the derived tile sets
/// consumes it with [`Viewport::take_dirty`] before recomputing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width of the viewport in pixels
    width: f64,
    /// Height of the viewport in pixels
    height: f64,
    /// Center of the view; its zoom is the (possibly fractional) view zoom
    center: TileAddress,
    /// Extra columns requested on each side of the visible area
    padding_cols: u32,
    /// Extra rows requested on each side of the visible area
    padding_rows: u32,
    /// Pixel size of one tile at the center's zoom
    tile_size: Point,
    /// The minimum allowed zoom level
    min_zoom: f64,
    /// The maximum allowed zoom level
    max_zoom: f64,
    #[serde(skip, default = "dirty_on_load")]
    dirty: bool,
}

// A restored view has never been resolved.
fn dirty_on_load() -> bool {
    true
}

impl Viewport {
    /// Creates a new viewport centered on the whole world at zoom 0
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: sanitize_extent(width),
            height: sanitize_extent(height),
            center: TileAddress::default(),
            padding_cols: 0,
            padding_rows: 0,
            tile_size: Point::new(TILE_SIZE as f64, TILE_SIZE as f64),
            min_zoom: 0.0,
            max_zoom: MAX_SUPPORTED_ZOOM as f64,
            dirty: true,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn size(&self) -> Point {
        Point::new(self.width, self.height)
    }

    pub fn center(&self) -> TileAddress {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.center.zoom
    }

    pub fn padding(&self) -> (u32, u32) {
        (self.padding_cols, self.padding_rows)
    }

    pub fn tile_size(&self) -> Point {
        self.tile_size
    }

    pub fn zoom_limits(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether the view changed since the flag was last taken.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the dirty flag and clears it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Sets the center, clamping its zoom to the zoom limits
    pub fn set_center(&mut self, center: TileAddress) {
        let zoom = center.zoom.clamp(self.min_zoom, self.max_zoom);
        self.center = center.rebase_to_zoom(zoom);
        self.dirty = true;
    }

    /// Sets the zoom level around the current center
    pub fn set_zoom(&mut self, zoom: f64) {
        self.set_center(self.center.rebase_to_zoom(zoom));
    }

    /// Sets the zoom limits
    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom.min(max_zoom);
        self.max_zoom = max_zoom.max(min_zoom);
        self.set_center(self.center);
    }

    pub fn set_padding(&mut self, padding_cols: u32, padding_rows: u32) {
        self.padding_cols = padding_cols;
        self.padding_rows = padding_rows;
        self.dirty = true;
    }

    /// Sets the on-screen size of a tile, normally taken from the provider.
    pub fn set_tile_size(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.tile_size = Point::new(width, height);
            self.dirty = true;
        }
    }

    /// Sets the viewport size in pixels; negative or NaN extents become zero.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = sanitize_extent(width);
        self.height = sanitize_extent(height);
        self.dirty = true;
    }

    /// Moves the view by the given pixel offset.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.center = self
            .center
            .offset(dx / self.tile_size.x, dy / self.tile_size.y);
        self.dirty = true;
    }

    /// Zooms by `delta` levels keeping `anchor` (a layer point) fixed on
    /// screen; without an anchor the view zooms about its center.
    pub fn zoom_by(&mut self, delta: f64, anchor: Option<Point>) {
        let target = (self.center.zoom + delta).clamp(self.min_zoom, self.max_zoom);
        let Some(anchor) = anchor else {
            self.set_zoom(target);
            return;
        };

        let factor = self.anchor_offset(anchor);
        let pinned = self.layer_point_to_tile_address(anchor).rebase_to_zoom(target);
        self.center = pinned.offset(-factor.x, -factor.y);
        self.dirty = true;
    }

    /// Centers the view on a geographic coordinate at the given zoom.
    pub fn recenter(&mut self, provider: &TileProvider, coordinate: LatLng, zoom: f64) {
        self.set_center(provider.geo_to_tile(coordinate).rebase_to_zoom(zoom));
    }

    /// The four corners of the viewport in layer points.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(0.0, 0.0),
            Point::new(self.width, 0.0),
            Point::new(0.0, self.height),
            Point::new(self.width, self.height),
        ]
    }

    /// Converts a layer point (pixels from the top-left corner) to a tile
    /// address at the center's zoom.
    pub fn layer_point_to_tile_address(&self, point: Point) -> TileAddress {
        let factor = self.anchor_offset(point);
        self.center.offset(factor.x, factor.y)
    }

    /// Converts a tile address to a layer point.
    pub fn tile_address_to_layer_point(&self, address: &TileAddress) -> Point {
        let at_center_zoom = address.rebase_to_zoom(self.center.zoom);
        Point::new(
            self.width / 2.0 + (at_center_zoom.column - self.center.column) * self.tile_size.x,
            self.height / 2.0 + (at_center_zoom.row - self.center.row) * self.tile_size.y,
        )
    }

    /// Offset of a layer point from the viewport center, in tiles.
    fn anchor_offset(&self, point: Point) -> Point {
        let half = Point::new(self.width / 2.0, self.height / 2.0);
        let delta = point.subtract(&half);
        Point::new(delta.x / self.tile_size.x, delta.y / self.tile_size.y)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

fn sanitize_extent(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
