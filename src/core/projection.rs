//! Geographic projections into normalized tile space.
//!
//! Normalized space is the unit square covered by the single zoom-0 tile:
//! `u` grows eastward from the antimeridian, `v` grows southward from the
//! projection's northern limit.

use crate::core::constants::MAX_MERCATOR_LATITUDE;
use crate::core::geo::LatLng;
use std::f64::consts::PI;
use std::fmt::Debug;

/// Pure transform between geographic coordinates and normalized tile space.
///
/// Both directions are total: latitudes outside the valid range are clamped
/// and longitudes are wrapped instead of failing, since panning can briefly
/// ask for positions off the edge of the world.
pub trait Projection: Debug + Send + Sync {
    /// Geographic coordinate to `(u, v)` in `[0, 1]²`.
    fn to_normalized(&self, coordinate: LatLng) -> (f64, f64);

    /// Normalized `(u, v)` back to a geographic coordinate.
    fn to_geo(&self, u: f64, v: f64) -> LatLng;

    /// EPSG-style identifier, informational only.
    fn name(&self) -> &'static str;
}

fn normalized_lng(lng: f64) -> f64 {
    // Keep +180 on the eastern edge rather than wrapping it to the west.
    if lng == 180.0 {
        return 1.0;
    }
    (LatLng::wrap_lng(lng) + 180.0) / 360.0
}

fn geo_lng(u: f64) -> f64 {
    if u == 1.0 {
        return 180.0;
    }
    LatLng::wrap_lng(u * 360.0 - 180.0)
}

/// Spherical Mercator (EPSG:3857), the projection used by OSM-style tile servers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SphericalMercator;

impl Projection for SphericalMercator {
    fn to_normalized(&self, coordinate: LatLng) -> (f64, f64) {
        let lat = LatLng::clamp_lat(coordinate.lat, MAX_MERCATOR_LATITUDE);
        let lat_rad = lat.to_radians();
        let u = normalized_lng(coordinate.lng);
        let v = (1.0 - lat_rad.tan().asinh() / PI) / 2.0;
        (u, v.clamp(0.0, 1.0))
    }

    fn to_geo(&self, u: f64, v: f64) -> LatLng {
        let lat = (PI * (1.0 - 2.0 * v)).sinh().atan().to_degrees();
        LatLng::new(LatLng::clamp_lat(lat, MAX_MERCATOR_LATITUDE), geo_lng(u))
    }

    fn name(&self) -> &'static str {
        "EPSG:3857"
    }
}

/// Plate carrée: latitude and longitude map linearly onto the unit square.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Equirectangular;

impl Projection for Equirectangular {
    fn to_normalized(&self, coordinate: LatLng) -> (f64, f64) {
        let lat = LatLng::clamp_lat(coordinate.lat, 90.0);
        (normalized_lng(coordinate.lng), (90.0 - lat) / 180.0)
    }

    fn to_geo(&self, u: f64, v: f64) -> LatLng {
        let lat = 90.0 - v * 180.0;
        LatLng::new(LatLng::clamp_lat(lat, 90.0), geo_lng(u))
    }

    fn name(&self) -> &'static str {
        "EPSG:4326"
    }
}
