use crate::core::constants::MAX_SUPPORTED_ZOOM;
use crate::core::projection::Projection;
use crate::tiles::provider::TileProvider;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Wraps longitude to [-180, 180) range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
        if wrapped.is_finite() {
            wrapped
        } else {
            0.0
        }
    }

    /// Clamps latitude to the given symmetric limit
    pub fn clamp_lat(lat: f64, limit: f64) -> f64 {
        if lat.is_nan() {
            return 0.0;
        }
        lat.clamp(-limit, limit)
    }
}

/// A 2D point in pixel or tile space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Extent of the grid along one axis at `zoom`, in tiles.
pub fn grid_size(zoom: f64) -> f64 {
    2_f64.powf(zoom)
}

/// A fractional position in the tile pyramid.
///
/// Rows and columns are real valued so a viewport center can sit anywhere
/// inside a tile, and the zoom is real valued so it can be animated. Only the
/// floored and clamped form ([`TileAddress::key`]) identifies an actual tile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TileAddress {
    pub row: f64,
    pub column: f64,
    pub zoom: f64,
}

impl TileAddress {
    pub fn new(row: f64, column: f64, zoom: f64) -> Self {
        Self { row, column, zoom }
    }

    /// Rescales row and column by `2^(zoom - self.zoom)`.
    pub fn rebase_to_zoom(&self, zoom: f64) -> Self {
        let factor = 2_f64.powf(zoom - self.zoom);
        Self {
            row: self.row * factor,
            column: self.column * factor,
            zoom,
        }
    }

    /// Truncates row, column and zoom toward negative infinity.
    pub fn floored(&self) -> Self {
        Self {
            row: self.row.floor(),
            column: self.column.floor(),
            zoom: self.zoom.floor(),
        }
    }

    /// Clamps row and column into `[0, 2^zoom)`.
    ///
    /// Addresses already in range are returned unchanged. The upper bound is
    /// the largest value below the grid extent, so a clamped address always
    /// floors to an existing cell.
    pub fn clamped(&self) -> Self {
        let max = grid_size(self.zoom) * (1.0 - f64::EPSILON);
        Self {
            row: clamp_coord(self.row, max),
            column: clamp_coord(self.column, max),
            zoom: self.zoom,
        }
    }

    /// Shifts the address by a number of columns and rows at its own zoom.
    pub fn offset(&self, columns: f64, rows: f64) -> Self {
        Self {
            row: self.row + rows,
            column: self.column + columns,
            zoom: self.zoom,
        }
    }

    /// Integer cache key of the tile containing this address.
    pub fn key(&self) -> TileKey {
        let zoom = self.zoom.floor().clamp(0.0, MAX_SUPPORTED_ZOOM as f64);
        let cell = TileAddress::new(self.row, self.column, zoom).floored().clamped();
        TileKey::new(zoom as u8, cell.column as u32, cell.row as u32)
    }

    /// Euclidean distance in (row, column) space, measured at the finer zoom
    /// of the two addresses.
    pub fn distance_to(&self, other: &TileAddress) -> f64 {
        let zoom = self.zoom.max(other.zoom);
        let a = self.rebase_to_zoom(zoom);
        let b = other.rebase_to_zoom(zoom);
        let dr = a.row - b.row;
        let dc = a.column - b.column;
        (dr * dr + dc * dc).sqrt()
    }

    /// Geographic position of this address through `projection`.
    pub fn to_geo_with(&self, projection: &dyn Projection) -> LatLng {
        let n = 2_f64.powf(self.zoom);
        projection.to_geo(self.column / n, self.row / n)
    }

    /// Places `coordinate` in the pyramid at this address's zoom.
    pub fn from_geo_with(&self, projection: &dyn Projection, coordinate: LatLng) -> Self {
        let (u, v) = projection.to_normalized(coordinate);
        let n = 2_f64.powf(self.zoom);
        Self::new(v * n, u * n, self.zoom)
    }

    /// Geographic position of this address using the provider's projection.
    pub fn to_geo(&self, provider: &TileProvider) -> LatLng {
        self.to_geo_with(provider.projection())
    }

    /// Address of `coordinate` at this address's zoom using the provider's projection.
    pub fn from_geo(&self, provider: &TileProvider, coordinate: LatLng) -> Self {
        self.from_geo_with(provider.projection(), coordinate)
    }
}

fn clamp_coord(value: f64, max: f64) -> f64 {
    if value.is_nan() || value <= 0.0 {
        return 0.0;
    }
    value.min(max.max(0.0))
}

impl Default for TileAddress {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.0)
    }
}

/// Total order on floats with `-0.0` and `0.0` treated as the same value.
fn cmp_coord(a: f64, b: f64) -> Ordering {
    (a + 0.0).total_cmp(&(b + 0.0))
}

// Canonical order: zoom, then column, then row.
impl Ord for TileAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_coord(self.zoom, other.zoom)
            .then_with(|| cmp_coord(self.column, other.column))
            .then_with(|| cmp_coord(self.row, other.row))
    }
}

impl PartialOrd for TileAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TileAddress {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TileAddress {}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3} @ z{:.2})", self.row, self.column, self.zoom)
    }
}

impl From<TileKey> for TileAddress {
    fn from(key: TileKey) -> Self {
        key.to_address()
    }
}

/// Represents a tile coordinate in the slippy map tile system
///
/// Field order matters: the derived ordering matches the canonical
/// [`TileAddress`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub zoom: u8,
    pub column: u32,
    pub row: u32,
}

impl TileKey {
    pub fn new(zoom: u8, column: u32, row: u32) -> Self {
        Self { zoom, column, row }
    }

    pub fn to_address(&self) -> TileAddress {
        TileAddress::new(self.row as f64, self.column as f64, self.zoom as f64)
    }

}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.column, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::SphericalMercator;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rebase_is_transitive() {
        let a = TileAddress::new(1.5, 2.25, 3.0);
        for (z1, z2) in [(0.0, 5.0), (7.0, 2.0), (3.0, 3.0), (10.0, 0.0)] {
            let direct = a.rebase_to_zoom(z2);
            let via = a.rebase_to_zoom(z1).rebase_to_zoom(z2);
            assert!(approx(direct.row, via.row));
            assert!(approx(direct.column, via.column));
            assert_eq!(direct.zoom, via.zoom);
        }
    }

    #[test]
    fn test_floored_and_clamped() {
        let a = TileAddress::new(-0.5, 4.7, 2.0);
        let f = a.floored();
        assert_eq!((f.row, f.column), (-1.0, 4.0));

        let c = f.clamped();
        assert_eq!(c.row, 0.0);
        assert!(c.column < 4.0 && c.column.floor() == 3.0);
    }

    #[test]
    fn test_clamped_keeps_in_range_addresses() {
        let inside = TileAddress::new(3.7, 2.5, 2.0);
        assert_eq!(inside.clamped(), inside);

        // The extent at a fractional zoom is 2^zoom, not 2^floor(zoom).
        let fractional = TileAddress::new(5.0, 1.0, 2.5);
        assert_eq!(fractional.clamped(), fractional);
        assert!(TileAddress::new(6.0, 0.0, 2.5).clamped().row < 2_f64.powf(2.5));
    }

    #[test]
    fn test_key_from_fractional_address() {
        let key = TileAddress::new(1.5, 2.9, 2.0).key();
        assert_eq!(key, TileKey::new(2, 2, 1));

        // Out of range values land on the border cell.
        let key = TileAddress::new(9.0, -3.0, 2.0).key();
        assert_eq!(key, TileKey::new(2, 0, 3));
    }

    #[test]
    fn test_canonical_order() {
        let a = TileAddress::new(5.0, 0.0, 1.0);
        let b = TileAddress::new(0.0, 1.0, 1.0);
        let c = TileAddress::new(0.0, 0.0, 2.0);
        let mut v = vec![c, b, a];
        v.sort();
        assert_eq!(v, vec![a, b, c]);
    }

    #[test]
    fn test_distance_uses_finer_zoom() {
        let center = TileAddress::new(1.0, 1.0, 1.0);
        let other = TileAddress::new(2.0, 2.0, 2.0);
        // center at zoom 2 is (2, 2)
        assert!(approx(center.distance_to(&other), 0.0));
        assert!(approx(other.distance_to(&center), 0.0));

        let far = TileAddress::new(2.0, 5.0, 2.0);
        assert!(approx(center.distance_to(&far), 3.0));
    }

    #[test]
    fn test_signed_zero_addresses_are_equal() {
        let a = TileAddress::new(-0.0, 1.0, 2.0);
        let b = TileAddress::new(0.0, 1.0, 2.0);
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);

        let set: std::collections::BTreeSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_geo_conversion_keeps_zoom() {
        let projection = SphericalMercator;
        let at_zoom = TileAddress::new(0.0, 0.0, 4.0);
        let placed = at_zoom.from_geo_with(&projection, LatLng::new(0.0, 0.0));
        assert_eq!(placed.zoom, 4.0);
        assert!(approx(placed.row, 8.0));
        assert!(approx(placed.column, 8.0));

        let back = placed.to_geo_with(&projection);
        assert!(approx(back.lat, 0.0));
        assert!(approx(back.lng, 0.0));
    }

    #[test]
    fn test_wrap_lng() {
        assert!(approx(LatLng::wrap_lng(190.0), -170.0));
        assert!(approx(LatLng::wrap_lng(-190.0), 170.0));
        assert!(approx(LatLng::wrap_lng(45.0), 45.0));
    }
}
